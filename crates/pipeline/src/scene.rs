//! Wall geometry and initial grain scatter for one bake.
//!
//! Walls follow the silhouette slat by slat: each slat contributes one
//! segment per side running from the half-width at its top edge to the
//! half-width at its bottom edge, so the wall is never a flat shelf a grain
//! could rest on. Two horizontal caps close the chamber.
//!
//! Grains start in the upper chamber (`y < 0`, +y points down), between
//! just under the top cap and `0.15·H` above the neck, each well inside the
//! local half-width.

use glam::Vec2;
use hourglass_core::shape::ShapeParameters;
use rand::Rng;

use crate::physics::{BodyHandle, PhysicsWorld};

/// Distance from the top cap to the highest grain spawn height.
pub const TOP_CLEARANCE: f64 = 12.0;
/// Fraction of `H` above the neck that stays empty at spawn.
pub const NECK_CLEARANCE_FRACTION: f64 = 0.15;
/// Horizontal spawn offset as a fraction of the usable half-width.
pub const SPAWN_SHRINK: f64 = 0.75;
/// How far the caps extend past the bulb on each side.
pub const CAP_OVERHANG: f64 = 20.0;

/// A simulated grain, owned by the bake for its duration.
#[derive(Debug, Clone, Copy)]
pub struct Grain {
    pub id: u32,
    pub radius: f32,
    pub body: BodyHandle,
}

/// Bodies inserted into the world.
#[derive(Debug, Clone)]
pub struct Scene {
    pub walls: Vec<BodyHandle>,
    pub grains: Vec<Grain>,
}

pub struct SceneBuilder<'a> {
    shape: &'a ShapeParameters,
    grain_radius: f64,
    grain_count: u32,
}

impl<'a> SceneBuilder<'a> {
    pub fn new(shape: &'a ShapeParameters, grain_radius: f64, grain_count: u32) -> Self {
        Self {
            shape,
            grain_radius,
            grain_count,
        }
    }

    /// Wall segments: two oriented slat segments per slat, then the top and
    /// bottom caps.
    pub fn wall_segments(&self) -> Vec<(Vec2, Vec2)> {
        let h = self.shape.half_height;
        let step = self.shape.wall_step;
        let slats = ((2.0 * h) / step).ceil().max(1.0) as usize;

        let mut segments = Vec::with_capacity(slats * 2 + 2);
        for k in 0..slats {
            let y0 = -h + k as f64 * step;
            let y1 = (y0 + step).min(h);
            let w0 = self.shape.width_at(y0);
            let w1 = self.shape.width_at(y1);
            segments.push((point(-w0, y0), point(-w1, y1)));
            segments.push((point(w0, y0), point(w1, y1)));
        }

        let cap = self.shape.bulb + CAP_OVERHANG;
        segments.push((point(-cap, -h), point(cap, -h)));
        segments.push((point(-cap, h), point(cap, h)));
        segments
    }

    /// Spawn heights range for grain centres, top to bottom.
    ///
    /// Always within `[-H + r, -r]`. Chambers too short for the usual
    /// clearances use that whole interval.
    pub fn spawn_band(&self) -> (f64, f64) {
        let h = self.shape.half_height;
        let r = self.grain_radius;
        let (highest, lowest) = (-h + r, (-r).max(-h + r));

        let top = -h + TOP_CLEARANCE.max(r * 1.5);
        let bottom = -h * NECK_CLEARANCE_FRACTION;
        if top < bottom {
            (top.clamp(highest, lowest), bottom.clamp(highest, lowest))
        } else {
            (highest, lowest)
        }
    }

    /// Random grain centres inside the upper chamber.
    pub fn grain_positions<R: Rng>(&self, rng: &mut R) -> Vec<Vec2> {
        let (top, bottom) = self.spawn_band();
        (0..self.grain_count)
            .map(|_| {
                let y = rng.random_range(top..=bottom);
                let half = ((self.shape.width_at(y) - self.grain_radius) * SPAWN_SHRINK).max(0.0);
                let x = rng.random_range(-half..=half);
                point(x, y)
            })
            .collect()
    }

    /// Insert walls and grains into `world`.
    pub fn build<W: PhysicsWorld, R: Rng>(&self, world: &mut W, rng: &mut R) -> Scene {
        let walls = self
            .wall_segments()
            .into_iter()
            .map(|(a, b)| world.add_static_segment(a, b))
            .collect();

        let radius = self.grain_radius as f32;
        let grains = self
            .grain_positions(rng)
            .into_iter()
            .enumerate()
            .map(|(i, p)| Grain {
                id: i as u32,
                radius,
                body: world.add_dynamic_circle(p, radius),
            })
            .collect();

        let scene = Scene { walls, grains };
        tracing::debug!(
            walls = scene.walls.len(),
            grains = scene.grains.len(),
            "Scene built"
        );
        scene
    }
}

fn point(x: f64, y: f64) -> Vec2 {
    Vec2::new(x as f32, y as f32)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
