//! Rigid-body capability used by the bake, plus the granular solver that
//! backs it.
//!
//! The bake only ever talks to [`PhysicsWorld`]: create static segments and
//! dynamic circles, advance time, read positions, push bodies around. Any
//! engine exposing those operations can drive a bake.
//!
//! [`GrainWorld`] is a small position-based solver for equal-mass circles
//! against static line segments:
//! - semi-implicit gravity integration with air drag and a per-substep
//!   travel cap so grains cannot tunnel through thin walls
//! - uniform-grid broadphase for circle–circle and circle–segment pairs
//! - Gauss–Seidel overlap projection, walls solved last in each iteration
//! - velocities re-derived from corrected positions, with tangential
//!   friction on wall contacts
//!
//! Iteration order depends only on insertion order, so identical inputs step
//! identically.
//!
//! Units are scene units and seconds. Circles have unit mass, so an applied
//! force is an acceleration.

use glam::Vec2;

use crate::grid::UniformGrid;

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// Opaque handle to a body owned by a [`PhysicsWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(u32);

impl BodyHandle {
    /// Handles are minted by world implementations, in insertion order.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

pub trait PhysicsWorld {
    /// Insert an immovable line segment from `a` to `b`.
    fn add_static_segment(&mut self, a: Vec2, b: Vec2) -> BodyHandle;

    /// Insert a free circle at `center`.
    fn add_dynamic_circle(&mut self, center: Vec2, radius: f32) -> BodyHandle;

    /// Advance the simulation by `dt` seconds. Accumulated forces are
    /// consumed and cleared.
    fn step(&mut self, dt: f32);

    /// Current position (segment midpoint for static segments).
    fn position(&self, body: BodyHandle) -> Vec2;

    /// Accumulate `force` on `body` for the next step. No-op on static bodies.
    fn apply_force(&mut self, body: BodyHandle, force: Vec2);
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Gravity magnitude in scene units per second squared.
pub const DEFAULT_GRAVITY: f32 = 1800.0;

/// Largest distance a circle may travel in one substep, as a fraction of its
/// radius.
const MAX_TRAVEL_FRACTION: f32 = 0.5;

#[derive(Clone, Copy, Debug)]
pub struct WorldParams {
    /// Gravity vector (+y points down).
    pub gravity: Vec2,
    /// Substeps per [`PhysicsWorld::step`] call.
    pub substeps: u32,
    /// Projection iterations per substep.
    pub iterations: u32,
    /// Linear drag coefficient, per second.
    pub air_drag: f32,
    /// Fraction of tangential velocity removed on wall contact.
    pub wall_friction: f32,
}

impl Default for WorldParams {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, DEFAULT_GRAVITY),
            substeps: 3,
            iterations: 2,
            air_drag: 0.06,
            wall_friction: 0.1,
        }
    }
}

impl WorldParams {
    /// Rotate gravity by `degrees`; positive tilts pull toward `+x`.
    pub fn tilted(mut self, degrees: f32) -> Self {
        let g = self.gravity.length();
        let theta = degrees.to_radians();
        self.gravity = Vec2::new(g * theta.sin(), g * theta.cos());
        self
    }
}

// ---------------------------------------------------------------------------
// GrainWorld
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum BodyRef {
    Segment(usize),
    Circle(usize),
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    a: Vec2,
    b: Vec2,
}

#[derive(Debug, Clone, Copy)]
struct Circle {
    pos: Vec2,
    prev: Vec2,
    vel: Vec2,
    radius: f32,
    force: Vec2,
    /// Normal of the last wall contact in the current substep.
    wall_normal: Option<Vec2>,
}

pub struct GrainWorld {
    params: WorldParams,
    bounds_min: Vec2,
    bounds_max: Vec2,
    grid: UniformGrid,
    bodies: Vec<BodyRef>,
    segments: Vec<Segment>,
    /// Segment indices per grid cell, padded by one cell size.
    segment_cells: Vec<Vec<u32>>,
    circles: Vec<Circle>,
    /// Linked-list spatial hash over circles: head per cell, next per circle.
    cell_head: Vec<i32>,
    circle_next: Vec<i32>,
}

impl GrainWorld {
    /// Create an empty world confined to `[min, max]`.
    ///
    /// `cell_size` must be at least the largest circle diameter that will be
    /// inserted.
    pub fn new(params: WorldParams, min: Vec2, max: Vec2, cell_size: f32) -> Self {
        let grid = UniformGrid::new(min, max, cell_size);
        let cells = grid.len();
        Self {
            params,
            bounds_min: min,
            bounds_max: max,
            grid,
            bodies: Vec::new(),
            segments: Vec::new(),
            segment_cells: vec![Vec::new(); cells],
            circles: Vec::new(),
            cell_head: vec![-1; cells],
            circle_next: Vec::new(),
        }
    }

    pub fn params(&self) -> &WorldParams {
        &self.params
    }

    pub fn circle_count(&self) -> usize {
        self.circles.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn integrate(&mut self, h: f32) {
        let params = self.params;
        for c in &mut self.circles {
            c.vel += (params.gravity + c.force) * h;
            c.vel /= 1.0 + params.air_drag * h;
            c.vel = c.vel.clamp_length_max(MAX_TRAVEL_FRACTION * c.radius / h);
            c.prev = c.pos;
            c.pos += c.vel * h;
            c.wall_normal = None;
        }
    }

    fn rebuild_hash(&mut self) {
        self.cell_head.fill(-1);
        self.circle_next.clear();
        self.circle_next.resize(self.circles.len(), -1);
        for (i, c) in self.circles.iter().enumerate() {
            let cell = self.grid.cell_of(c.pos);
            self.circle_next[i] = self.cell_head[cell];
            self.cell_head[cell] = i as i32;
        }
    }

    fn solve_circle_contacts(&mut self) {
        for i in 0..self.circles.len() {
            let neighborhood = self.grid.neighborhood(self.circles[i].pos);
            for &cell in neighborhood.as_slice() {
                let mut j = self.cell_head[cell];
                while j >= 0 {
                    let ju = j as usize;
                    if ju > i {
                        separate_pair(&mut self.circles, i, ju);
                    }
                    j = self.circle_next[ju];
                }
            }
        }
    }

    fn solve_wall_contacts(&mut self) {
        for c in &mut self.circles {
            let cell = self.grid.cell_of(c.pos);
            for &s in &self.segment_cells[cell] {
                let seg = self.segments[s as usize];
                let closest = closest_point_on_segment(seg.a, seg.b, c.pos);
                let d = c.pos - closest;
                let dist_sq = d.length_squared();
                if dist_sq >= c.radius * c.radius {
                    continue;
                }
                let dist = dist_sq.sqrt();
                let normal = if dist > f32::EPSILON {
                    d / dist
                } else {
                    // Centre on the wall line: push back toward where it came from.
                    let perp = (seg.b - seg.a).perp().normalize_or(Vec2::Y);
                    if (c.prev - closest).dot(perp) >= 0.0 {
                        perp
                    } else {
                        -perp
                    }
                };
                c.pos += normal * (c.radius - dist);
                c.wall_normal = Some(normal);
            }
            c.pos = c.pos.clamp(self.bounds_min, self.bounds_max);
        }
    }

    fn update_velocities(&mut self, h: f32) {
        let friction = self.params.wall_friction.clamp(0.0, 1.0);
        for c in &mut self.circles {
            let mut v = (c.pos - c.prev) / h;
            if let Some(n) = c.wall_normal {
                let vn = n * v.dot(n);
                v = vn + (v - vn) * (1.0 - friction);
            }
            c.vel = v.clamp_length_max(MAX_TRAVEL_FRACTION * c.radius / h);
        }
    }
}

impl PhysicsWorld for GrainWorld {
    fn add_static_segment(&mut self, a: Vec2, b: Vec2) -> BodyHandle {
        let index = self.segments.len();
        self.segments.push(Segment { a, b });

        let pad = Vec2::splat(self.grid.cell_size());
        for cell in self.grid.cells_overlapping(a.min(b) - pad, a.max(b) + pad) {
            self.segment_cells[cell].push(index as u32);
        }

        self.bodies.push(BodyRef::Segment(index));
        BodyHandle(self.bodies.len() as u32 - 1)
    }

    fn add_dynamic_circle(&mut self, center: Vec2, radius: f32) -> BodyHandle {
        let index = self.circles.len();
        self.circles.push(Circle {
            pos: center,
            prev: center,
            vel: Vec2::ZERO,
            radius,
            force: Vec2::ZERO,
            wall_normal: None,
        });
        self.bodies.push(BodyRef::Circle(index));
        BodyHandle(self.bodies.len() as u32 - 1)
    }

    fn step(&mut self, dt: f32) {
        if dt > 0.0 && !self.circles.is_empty() {
            let substeps = self.params.substeps.max(1);
            let h = dt / substeps as f32;
            for _ in 0..substeps {
                self.integrate(h);
                self.rebuild_hash();
                for _ in 0..self.params.iterations.max(1) {
                    self.solve_circle_contacts();
                    self.solve_wall_contacts();
                }
                self.update_velocities(h);
            }
        }
        for c in &mut self.circles {
            c.force = Vec2::ZERO;
        }
    }

    fn position(&self, body: BodyHandle) -> Vec2 {
        match self.bodies[body.0 as usize] {
            BodyRef::Segment(i) => (self.segments[i].a + self.segments[i].b) * 0.5,
            BodyRef::Circle(i) => self.circles[i].pos,
        }
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vec2) {
        if let BodyRef::Circle(i) = self.bodies[body.0 as usize] {
            self.circles[i].force += force;
        }
    }
}

/// Push two overlapping circles apart symmetrically.
fn separate_pair(circles: &mut [Circle], i: usize, j: usize) {
    let delta = circles[i].pos - circles[j].pos;
    let min_dist = circles[i].radius + circles[j].radius;
    let dist_sq = delta.length_squared();
    if dist_sq >= min_dist * min_dist {
        return;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist > f32::EPSILON {
        delta / dist
    } else {
        Vec2::X
    };
    let correction = normal * ((min_dist - dist) * 0.5);
    circles[i].pos += correction;
    circles[j].pos -= correction;
}

fn closest_point_on_segment(a: Vec2, b: Vec2, p: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> GrainWorld {
        GrainWorld::new(
            WorldParams::default(),
            Vec2::new(-100.0, -100.0),
            Vec2::new(100.0, 100.0),
            6.0,
        )
    }

    #[test]
    fn circle_falls_under_gravity() {
        let mut w = world();
        let c = w.add_dynamic_circle(Vec2::new(0.0, -50.0), 2.0);
        for _ in 0..24 {
            w.step(1.0 / 240.0);
        }
        assert!(w.position(c).y > -50.0);
        assert!(w.position(c).x.abs() < 1e-4);
    }

    #[test]
    fn floor_segment_stops_the_fall() {
        let mut w = world();
        w.add_static_segment(Vec2::new(-50.0, 0.0), Vec2::new(50.0, 0.0));
        let c = w.add_dynamic_circle(Vec2::new(0.0, -20.0), 2.0);
        for _ in 0..480 {
            w.step(1.0 / 240.0);
        }
        let p = w.position(c);
        assert!(p.y <= -1.9 && p.y > -2.5, "resting height {}", p.y);
    }

    #[test]
    fn overlapping_circles_separate() {
        let mut w = GrainWorld::new(
            WorldParams {
                gravity: Vec2::ZERO,
                ..Default::default()
            },
            Vec2::splat(-100.0),
            Vec2::splat(100.0),
            6.0,
        );
        let a = w.add_dynamic_circle(Vec2::new(0.0, 0.0), 2.0);
        let b = w.add_dynamic_circle(Vec2::new(1.0, 0.0), 2.0);
        for _ in 0..30 {
            w.step(1.0 / 240.0);
        }
        assert!(w.position(a).distance(w.position(b)) >= 3.9);
    }

    #[test]
    fn forces_are_cleared_after_a_step() {
        let mut w = GrainWorld::new(
            WorldParams {
                gravity: Vec2::ZERO,
                air_drag: 0.0,
                ..Default::default()
            },
            Vec2::splat(-100.0),
            Vec2::splat(100.0),
            6.0,
        );
        let c = w.add_dynamic_circle(Vec2::ZERO, 2.0);
        w.apply_force(c, Vec2::new(100.0, 0.0));
        w.step(1.0 / 240.0);
        let after_push = w.position(c).x;
        assert!(after_push > 0.0);
        w.step(1.0 / 240.0);
        let drift = w.position(c).x - after_push;
        // Coasting at the velocity gained from the single push.
        assert!((drift - after_push).abs() < after_push);
    }

    #[test]
    fn static_segment_ignores_forces() {
        let mut w = world();
        let s = w.add_static_segment(Vec2::new(-10.0, 5.0), Vec2::new(10.0, 5.0));
        w.apply_force(s, Vec2::new(1000.0, 0.0));
        w.step(1.0 / 240.0);
        assert_eq!(w.position(s), Vec2::new(0.0, 5.0));
    }

    #[test]
    fn tilt_rotates_gravity() {
        let p = WorldParams::default().tilted(90.0);
        assert!((p.gravity.x - DEFAULT_GRAVITY).abs() < 1e-2);
        assert!(p.gravity.y.abs() < 1e-2);
    }

    #[test]
    fn identical_worlds_step_identically() {
        let build = || {
            let mut w = world();
            w.add_static_segment(Vec2::new(-50.0, 0.0), Vec2::new(50.0, 0.0));
            let handles: Vec<_> = (0..20)
                .map(|i| w.add_dynamic_circle(Vec2::new(i as f32 * 1.5 - 15.0, -30.0), 2.0))
                .collect();
            for _ in 0..120 {
                w.step(1.0 / 240.0);
            }
            handles.iter().map(|&h| w.position(h)).collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
    }
}
