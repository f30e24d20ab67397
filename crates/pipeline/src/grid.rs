//! Dense uniform grid over a fixed rectangle, used as the broadphase of the
//! grain solver. Points outside the rectangle are clamped into the border
//! cells.

use glam::Vec2;

#[derive(Debug, Clone)]
pub struct UniformGrid {
    origin: Vec2,
    cell_size: f32,
    cols: usize,
    rows: usize,
}

/// Up to nine cell indices around a cell, border-clipped.
#[derive(Debug, Clone, Copy)]
pub struct Neighborhood {
    cells: [usize; 9],
    len: usize,
}

impl Neighborhood {
    pub fn as_slice(&self) -> &[usize] {
        &self.cells[..self.len]
    }
}

/// Upper bound on the number of cells; larger grids get coarser cells.
pub const MAX_CELLS: usize = 1 << 20;

impl UniformGrid {
    /// Cover `[min, max]` with square cells of at least `cell_size`.
    ///
    /// Cells grow past `cell_size` when the rectangle would need more than
    /// [`MAX_CELLS`] of them.
    pub fn new(min: Vec2, max: Vec2, cell_size: f32) -> Self {
        let span = (max - min).max(Vec2::splat(f32::EPSILON));
        let coarsest = (span.x * span.y / MAX_CELLS as f32).sqrt();
        let cell_size = cell_size.max(coarsest).max(f32::EPSILON);
        let extent = span.max(Vec2::splat(cell_size));
        Self {
            origin: min,
            cell_size,
            cols: (extent.x / cell_size).ceil() as usize,
            rows: (extent.y / cell_size).ceil() as usize,
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column and row of the cell holding `p`, clamped to the grid.
    pub fn coords_of(&self, p: Vec2) -> (usize, usize) {
        let rel = (p - self.origin) / self.cell_size;
        // `as` saturates, so NaN and huge values land on a border.
        let col = (rel.x.floor() as i64).clamp(0, self.cols as i64 - 1) as usize;
        let row = (rel.y.floor() as i64).clamp(0, self.rows as i64 - 1) as usize;
        (col, row)
    }

    pub fn cell_of(&self, p: Vec2) -> usize {
        let (col, row) = self.coords_of(p);
        row * self.cols + col
    }

    /// The 3×3 block of cells centred on `p`'s cell.
    pub fn neighborhood(&self, p: Vec2) -> Neighborhood {
        let (col, row) = self.coords_of(p);
        let mut out = Neighborhood {
            cells: [0; 9],
            len: 0,
        };
        for r in row.saturating_sub(1)..=(row + 1).min(self.rows - 1) {
            for c in col.saturating_sub(1)..=(col + 1).min(self.cols - 1) {
                out.cells[out.len] = r * self.cols + c;
                out.len += 1;
            }
        }
        out
    }

    /// Every cell overlapping the axis-aligned box `[min, max]`.
    pub fn cells_overlapping(&self, min: Vec2, max: Vec2) -> Vec<usize> {
        let (c0, r0) = self.coords_of(min);
        let (c1, r1) = self.coords_of(max);
        let mut cells = Vec::with_capacity((c1 - c0 + 1) * (r1 - r0 + 1));
        for r in r0..=r1 {
            for c in c0..=c1 {
                cells.push(r * self.cols + c);
            }
        }
        cells
    }
}
