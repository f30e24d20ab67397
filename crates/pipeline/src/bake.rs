//! The bake loop: fixed-rate stepping, periodic capture, and the drain phase.
//!
//! ```text
//!   Running ──(frames == target)──▶ Draining ──(neck clear | cap hit)──▶ Done
//! ```
//!
//! The world advances at [`INTERNAL_RATE_HZ`]; every `cadence` ticks the
//! positions of all grains are quantized into one [`FrameSample`]. Once the
//! nominal frame target is captured, sampling continues while any grain is
//! still above the neck, up to `fps × DRAIN_CAP_SECONDS` extra frames.
//! Grains that never drain within the cap stay where they are.
//!
//! Grains near the neck get a small random horizontal shove every tick to
//! break arches. The shove grows toward the end of the bake.

use glam::Vec2;
use rand::Rng;

use crate::encoder::{FrameSample, Quantizer};
use crate::physics::PhysicsWorld;
use crate::scene::{Grain, Scene};

/// Physics ticks per simulated second.
pub const INTERNAL_RATE_HZ: u32 = 240;
/// Upper bound of the drain phase, in simulated seconds.
pub const DRAIN_CAP_SECONDS: u32 = 20;
/// Grains with `|y|` below this receive the anti-jam shove.
pub const NECK_BAND: f32 = 20.0;
/// Peak horizontal acceleration of the anti-jam shove.
pub const JIGGLE_ACCELERATION: f32 = 90.0;
/// Fraction of the target after which the shove is boosted.
pub const LATE_PHASE_FRACTION: f64 = 0.85;
pub const LATE_BOOST: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakePhase {
    Running,
    Draining,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BakeConfig {
    pub fps: u32,
    /// Frames to capture before draining starts.
    pub target_frames: u32,
    /// Most frames the drain phase may add.
    pub drain_cap_frames: u32,
    /// Physics ticks per captured frame.
    pub cadence: u32,
}

impl BakeConfig {
    pub fn new(fps: u32, target_frames: u32) -> Self {
        let fps = fps.max(1);
        Self {
            fps,
            target_frames,
            drain_cap_frames: fps * DRAIN_CAP_SECONDS,
            cadence: cadence_for(fps),
        }
    }

    /// Frame index from which the anti-jam shove is boosted.
    fn late_threshold(&self) -> u32 {
        (self.target_frames as f64 * LATE_PHASE_FRACTION).floor() as u32
    }
}

/// `max(1, round(240 / fps))`.
pub fn cadence_for(fps: u32) -> u32 {
    ((INTERNAL_RATE_HZ as f64 / fps.max(1) as f64).round() as u32).max(1)
}

/// Summary of a finished loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BakeOutcome {
    /// Frames captured in total, drain included.
    pub frames: u32,
    /// Frames added by the drain phase.
    pub drained_frames: u32,
    /// Grains still above the neck when the loop stopped.
    pub residual_above_neck: usize,
}

pub struct BakeLoop<W, R> {
    world: W,
    rng: R,
    grains: Vec<Grain>,
    config: BakeConfig,
    quantizer: Quantizer,
    phase: BakePhase,
    samples: Vec<FrameSample>,
}

impl<W: PhysicsWorld, R: Rng> BakeLoop<W, R> {
    pub fn new(world: W, scene: Scene, rng: R, config: BakeConfig, quantizer: Quantizer) -> Self {
        let phase = if config.target_frames == 0 {
            BakePhase::Done
        } else {
            BakePhase::Running
        };
        Self {
            world,
            rng,
            grains: scene.grains,
            config,
            quantizer,
            phase,
            samples: Vec::with_capacity(config.target_frames as usize),
        }
    }

    pub fn phase(&self) -> BakePhase {
        self.phase
    }

    pub fn config(&self) -> &BakeConfig {
        &self.config
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    /// Frames captured so far.
    pub fn frames(&self) -> u32 {
        self.samples.len() as u32
    }

    pub fn drained_frames(&self) -> u32 {
        self.frames().saturating_sub(self.config.target_frames)
    }

    /// Grains whose centre is still in the upper chamber.
    pub fn residual_above_neck(&self) -> usize {
        self.grains
            .iter()
            .filter(|g| self.world.position(g.body).y < 0.0)
            .count()
    }

    /// Step one captured frame forward and return the new phase.
    ///
    /// A no-op once the loop is [`BakePhase::Done`].
    pub fn advance(&mut self) -> BakePhase {
        if self.phase == BakePhase::Done {
            return self.phase;
        }

        for _ in 0..self.config.cadence {
            self.tick();
        }
        self.capture();

        if self.phase == BakePhase::Running && self.frames() >= self.config.target_frames {
            self.phase = BakePhase::Draining;
            tracing::debug!(frames = self.frames(), "Target reached, draining");
        }
        if self.phase == BakePhase::Draining
            && (self.drained_frames() >= self.config.drain_cap_frames
                || self.residual_above_neck() == 0)
        {
            self.phase = BakePhase::Done;
        }
        self.phase
    }

    /// Run to completion.
    ///
    /// `on_progress(frame, target)` fires once per simulated second of
    /// captured frames and once more when the loop finishes.
    pub fn run<F>(mut self, mut on_progress: F) -> (Vec<FrameSample>, BakeOutcome)
    where
        F: FnMut(u32, u32),
    {
        while self.phase != BakePhase::Done {
            let phase = self.advance();
            if phase == BakePhase::Done || self.frames() % self.config.fps == 0 {
                on_progress(self.frames(), self.config.target_frames);
            }
        }

        let outcome = BakeOutcome {
            frames: self.frames(),
            drained_frames: self.drained_frames(),
            residual_above_neck: self.residual_above_neck(),
        };
        if outcome.residual_above_neck > 0 {
            tracing::warn!(
                residual = outcome.residual_above_neck,
                drained_frames = outcome.drained_frames,
                "Drain cap reached with grains above the neck"
            );
        } else {
            tracing::info!(
                frames = outcome.frames,
                drained_frames = outcome.drained_frames,
                "Bake loop finished"
            );
        }
        (self.samples, outcome)
    }

    fn tick(&mut self) {
        let late = self.phase == BakePhase::Draining || self.frames() >= self.config.late_threshold();
        let amplitude = if late {
            JIGGLE_ACCELERATION * LATE_BOOST
        } else {
            JIGGLE_ACCELERATION
        };

        for grain in &self.grains {
            if self.world.position(grain.body).y.abs() < NECK_BAND {
                let push = self.rng.random_range(-1.0f32..=1.0) * amplitude;
                self.world.apply_force(grain.body, Vec2::new(push, 0.0));
            }
        }
        self.world.step(1.0 / INTERNAL_RATE_HZ as f32);
    }

    fn capture(&mut self) {
        let values = self
            .grains
            .iter()
            .map(|g| self.quantizer.quantize(self.world.position(g.body)))
            .collect();
        self.samples.push(FrameSample { values });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
