//! Bake invocation options, their defaults, validation, and translation to
//! worker command-line arguments.
//!
//! The same [`BakeOptions`] value travels three ways: as the (sparse) JSON
//! body of `POST /api/bake`, as `--name value` argument pairs on the worker
//! command line, and back out as the `meta` event the worker echoes once the
//! options are resolved.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::shape::{ShapeBlend, ShapeParameters};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_DURATION_SECS: f64 = 60.0;
pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_GRAINS: u32 = 2000;
pub const DEFAULT_FILL: f64 = 1.0;
pub const DEFAULT_NECK: f64 = 16.0;
pub const DEFAULT_HALF_HEIGHT: f64 = 330.0;
pub const DEFAULT_BULB: f64 = 205.0;
pub const DEFAULT_GRAIN_RADIUS: f64 = 2.6;
pub const DEFAULT_POWER: f64 = 2.0;
pub const DEFAULT_C1: f64 = 0.25;
pub const DEFAULT_C2: f64 = 0.75;
pub const DEFAULT_TILT_DEGREES: f64 = 0.0;
pub const DEFAULT_WALL_STEP: f64 = 8.0;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Longest bake a single request may ask for (one hour).
pub const MAX_DURATION_SECS: f64 = 3600.0;
/// Highest sampling rate; matches the internal simulation rate.
pub const MAX_FPS: u32 = 240;
pub const MAX_GRAINS: u32 = 200_000;
/// Tilt beyond this turns the hourglass into a ramp.
pub const MAX_TILT_DEGREES: f64 = 45.0;
/// Largest chamber dimension (bulb or half-height) in grain radii. Bounds
/// the size of the collision grid.
pub const MAX_SPAN_IN_RADII: f64 = 1000.0;
/// Smallest half-height in grain radii that leaves room for the spawn band.
pub const MIN_HALF_HEIGHT_IN_RADII: f64 = 4.0;

// ---------------------------------------------------------------------------
// BlendKind
// ---------------------------------------------------------------------------

/// Which silhouette blend the bake uses between neck and bulb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendKind {
    #[default]
    Power,
    Cubic,
}

impl BlendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Cubic => "cubic",
        }
    }
}

impl fmt::Display for BlendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlendKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "power" => Ok(Self::Power),
            "cubic" => Ok(Self::Cubic),
            other => Err(CoreError::Validation(format!(
                "blend must be 'power' or 'cubic', got '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// BakeOptions
// ---------------------------------------------------------------------------

/// Fully resolved bake options.
///
/// Deserialization is sparse: any missing field takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BakeOptions {
    /// Requested playback duration in seconds.
    pub duration: f64,
    /// Sampling rate in frames per second.
    pub fps: u32,
    /// Total grain count before the fill fraction is applied.
    pub grains: u32,
    /// Fraction of `grains` actually simulated.
    pub fill: f64,
    pub neck: f64,
    pub half_height: f64,
    pub bulb: f64,
    pub grain_radius: f64,
    pub blend: BlendKind,
    /// Exponent of the power-law blend.
    pub power: f64,
    /// First control value of the cubic blend.
    pub c1: f64,
    /// Second control value of the cubic blend.
    pub c2: f64,
    /// Gravity tilt in degrees; breaks the left/right symmetry.
    pub tilt: f64,
    /// Height of one wall slat.
    pub wall_step: f64,
    /// Random seed; a fresh one is drawn when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for BakeOptions {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION_SECS,
            fps: DEFAULT_FPS,
            grains: DEFAULT_GRAINS,
            fill: DEFAULT_FILL,
            neck: DEFAULT_NECK,
            half_height: DEFAULT_HALF_HEIGHT,
            bulb: DEFAULT_BULB,
            grain_radius: DEFAULT_GRAIN_RADIUS,
            blend: BlendKind::default(),
            power: DEFAULT_POWER,
            c1: DEFAULT_C1,
            c2: DEFAULT_C2,
            tilt: DEFAULT_TILT_DEGREES,
            wall_step: DEFAULT_WALL_STEP,
            seed: None,
        }
    }
}

impl BakeOptions {
    /// Check every option against its allowed range.
    ///
    /// Returns the first violation as [`CoreError::Validation`].
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_positive(self.duration, "duration")?;
        if self.duration > MAX_DURATION_SECS {
            return Err(CoreError::Validation(format!(
                "duration must be at most {MAX_DURATION_SECS} seconds, got {}",
                self.duration
            )));
        }
        if self.fps == 0 || self.fps > MAX_FPS {
            return Err(CoreError::Validation(format!(
                "fps must be between 1 and {MAX_FPS}, got {}",
                self.fps
            )));
        }
        if self.grains == 0 || self.grains > MAX_GRAINS {
            return Err(CoreError::Validation(format!(
                "grains must be between 1 and {MAX_GRAINS}, got {}",
                self.grains
            )));
        }
        if !(self.fill > 0.0 && self.fill <= 1.0) {
            return Err(CoreError::Validation(format!(
                "fill must be in (0.0, 1.0], got {}",
                self.fill
            )));
        }
        validate_positive(self.neck, "neck")?;
        validate_positive(self.half_height, "halfHeight")?;
        validate_positive(self.grain_radius, "grainRadius")?;
        validate_positive(self.wall_step, "wallStep")?;
        validate_positive(self.power, "power")?;
        if self.bulb <= self.neck {
            return Err(CoreError::Validation(format!(
                "bulb ({}) must be wider than neck ({})",
                self.bulb, self.neck
            )));
        }
        if self.grain_radius >= self.neck {
            return Err(CoreError::Validation(format!(
                "grainRadius ({}) must be smaller than neck ({})",
                self.grain_radius, self.neck
            )));
        }
        if self.half_height < self.grain_radius * MIN_HALF_HEIGHT_IN_RADII {
            return Err(CoreError::Validation(format!(
                "halfHeight ({}) must be at least {MIN_HALF_HEIGHT_IN_RADII} grain radii ({})",
                self.half_height,
                self.grain_radius * MIN_HALF_HEIGHT_IN_RADII
            )));
        }
        let span = self.bulb.max(self.half_height);
        if span > self.grain_radius * MAX_SPAN_IN_RADII {
            return Err(CoreError::Validation(format!(
                "grainRadius ({}) is too small for a chamber spanning {span}; the minimum is {}",
                self.grain_radius,
                span / MAX_SPAN_IN_RADII
            )));
        }
        if self.wall_step > self.half_height {
            return Err(CoreError::Validation(format!(
                "wallStep ({}) must not exceed halfHeight ({})",
                self.wall_step, self.half_height
            )));
        }
        validate_unit_range(self.c1, "c1")?;
        validate_unit_range(self.c2, "c2")?;
        if self.c1 > self.c2 {
            return Err(CoreError::Validation(format!(
                "c1 ({}) must not exceed c2 ({})",
                self.c1, self.c2
            )));
        }
        if !self.tilt.is_finite() || self.tilt.abs() > MAX_TILT_DEGREES {
            return Err(CoreError::Validation(format!(
                "tilt must be within ±{MAX_TILT_DEGREES} degrees, got {}",
                self.tilt
            )));
        }
        Ok(())
    }

    /// Number of grains actually simulated after the fill fraction.
    ///
    /// Never less than one.
    pub fn simulated_grains(&self) -> u32 {
        ((self.grains as f64 * self.fill).round() as u32).max(1)
    }

    /// Nominal frame target, `ceil(duration × fps)`.
    pub fn target_frames(&self) -> u32 {
        (self.duration * self.fps as f64).ceil() as u32
    }

    /// The silhouette these options describe.
    pub fn shape(&self) -> ShapeParameters {
        let blend = match self.blend {
            BlendKind::Power => ShapeBlend::Power {
                exponent: self.power,
            },
            BlendKind::Cubic => ShapeBlend::Cubic {
                c1: self.c1,
                c2: self.c2,
            },
        };
        ShapeParameters {
            neck: self.neck,
            bulb: self.bulb,
            half_height: self.half_height,
            blend,
            tilt_degrees: self.tilt,
            wall_step: self.wall_step,
        }
    }

    /// File name of the bake these options produce.
    pub fn file_name(&self) -> String {
        format!(
            "hourglass_{}s_neck{}.json",
            format_number(self.duration),
            format_number(self.neck)
        )
    }

    /// Translate every option into a `--name value` pair for the worker.
    ///
    /// Names are the kebab-case form of the JSON field names.
    pub fn to_args(&self) -> Vec<String> {
        let mut pairs: Vec<(&str, String)> = vec![
            ("duration", format_number(self.duration)),
            ("fps", self.fps.to_string()),
            ("grains", self.grains.to_string()),
            ("fill", format_number(self.fill)),
            ("neck", format_number(self.neck)),
            ("half-height", format_number(self.half_height)),
            ("bulb", format_number(self.bulb)),
            ("grain-radius", format_number(self.grain_radius)),
            ("blend", self.blend.to_string()),
            ("power", format_number(self.power)),
            ("c1", format_number(self.c1)),
            ("c2", format_number(self.c2)),
            ("tilt", format_number(self.tilt)),
            ("wall-step", format_number(self.wall_step)),
        ];
        if let Some(seed) = self.seed {
            pairs.push(("seed", seed.to_string()));
        }

        pairs
            .into_iter()
            .flat_map(|(name, value)| [format!("--{name}"), value])
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Render a float without a trailing `.0` for whole numbers.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn validate_positive(value: f64, name: &str) -> Result<(), CoreError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(CoreError::Validation(format!(
            "{name} must be a positive number, got {value}"
        )));
    }
    Ok(())
}

/// Validate that a value falls within `[0.0, 1.0]`.
fn validate_unit_range(value: f64, name: &str) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CoreError::Validation(format!(
            "{name} must be between 0.0 and 1.0, got {value}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
