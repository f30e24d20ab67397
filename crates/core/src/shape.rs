//! Parametric hourglass silhouette.
//!
//! The chamber half-width is a pure function of the vertical coordinate:
//! `neck` at the neck plane `y = 0`, `bulb` at the caps `y = ±H`, blended in
//! between by a curve that strictly increases with `|y|`. A blend that ever
//! decreases would fold the wall back on itself.

use serde::{Deserialize, Serialize};

/// Interpolation curve between neck and bulb, defined on `t = |y| / H`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ShapeBlend {
    /// `t^exponent`, `exponent > 0`. An exponent of 2 gives the classic
    /// parabolic profile.
    Power { exponent: f64 },
    /// Cubic Bernstein blend with control values `0, c1, c2, 1`.
    ///
    /// Monotone whenever `0 <= c1 <= c2 <= 1`.
    Cubic { c1: f64, c2: f64 },
}

impl ShapeBlend {
    /// Evaluate the blend at `t`, clamped to `[0, 1]`.
    pub fn at(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Power { exponent } => t.powf(exponent),
            Self::Cubic { c1, c2 } => {
                let u = 1.0 - t;
                3.0 * u * u * t * c1 + 3.0 * u * t * t * c2 + t * t * t
            }
        }
    }
}

/// Everything that determines the wall geometry of one bake.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeParameters {
    pub neck: f64,
    pub bulb: f64,
    pub half_height: f64,
    pub blend: ShapeBlend,
    pub tilt_degrees: f64,
    pub wall_step: f64,
}

impl ShapeParameters {
    /// Chamber half-width at height `y`.
    ///
    /// Symmetric about the neck plane; `y` outside `[-H, H]` is clamped.
    pub fn width_at(&self, y: f64) -> f64 {
        let t = (y.abs() / self.half_height).min(1.0);
        self.neck + (self.bulb - self.neck) * self.blend.at(t)
    }

    /// Whether a circle of `radius` centred at `(x, y)` lies inside the
    /// chamber envelope at its own height.
    pub fn contains(&self, x: f64, y: f64, radius: f64) -> bool {
        y.abs() <= self.half_height && x.abs() + radius <= self.width_at(y)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
