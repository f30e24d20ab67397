//! Fixed-point encoding of captured frames.
//!
//! Each coordinate becomes `clamp(round((coord + offset) × Q), 0, 65535)`,
//! offsets chosen so the whole chamber (plus a small margin) maps to
//! non-negative values. Frames are packed grain-major: `x0 y0 x1 y1 …` for
//! frame 0, then frame 1, and so on.

use glam::Vec2;
use hourglass_core::options::BakeOptions;
use hourglass_core::shape::ShapeParameters;
use serde::{Deserialize, Serialize};

/// Version of the bake document layout written by this crate.
pub const FORMAT_VERSION: u32 = 2;

/// Quantization steps per scene unit.
pub const DEFAULT_QUANTIZATION: u32 = 32;

/// Margin added past the bulb and the caps before quantizing.
pub const OFFSET_MARGIN: f64 = 5.0;

// ---------------------------------------------------------------------------
// Quantizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantizer {
    pub factor: u32,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Quantizer {
    pub fn for_shape(shape: &ShapeParameters, factor: u32) -> Self {
        Self {
            factor,
            offset_x: shape.bulb + OFFSET_MARGIN,
            offset_y: shape.half_height + OFFSET_MARGIN,
        }
    }

    /// Quantize a position. Out-of-range coordinates saturate.
    pub fn quantize(&self, p: Vec2) -> [u16; 2] {
        [
            quantize_axis(p.x as f64, self.offset_x, f64::from(self.factor)),
            quantize_axis(p.y as f64, self.offset_y, f64::from(self.factor)),
        ]
    }

    /// Scene coordinates of a quantized pair.
    pub fn dequantize(&self, value: [u16; 2]) -> (f64, f64) {
        let factor = f64::from(self.factor);
        (
            f64::from(value[0]) / factor - self.offset_x,
            f64::from(value[1]) / factor - self.offset_y,
        )
    }
}

fn quantize_axis(coord: f64, offset: f64, factor: f64) -> u16 {
    // NaN casts to 0.
    ((coord + offset) * factor).round().clamp(0.0, u16::MAX as f64) as u16
}

// ---------------------------------------------------------------------------
// Frames and results
// ---------------------------------------------------------------------------

/// Quantized positions of every grain at one sampling instant, in grain-id
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSample {
    pub values: Vec<[u16; 2]>,
}

/// Descriptive header of a bake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BakeMetadata {
    pub format_version: u32,
    /// Playback rate that makes the captured frames last `duration` seconds.
    pub fps: f64,
    /// Rate the frames were sampled at.
    pub sample_fps: u32,
    pub grains: u32,
    pub frames: u32,
    pub quantization_factor: u32,
    pub offset_x: f64,
    pub offset_y: f64,
    pub duration: f64,
    pub grain_radius: f64,
    #[serde(flatten)]
    pub shape: ShapeParameters,
}

impl BakeMetadata {
    pub fn quantizer(&self) -> Quantizer {
        Quantizer {
            factor: self.quantization_factor,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
        }
    }

    /// Length the packed buffer must have.
    pub fn expected_len(&self) -> usize {
        self.frames as usize * self.grains as usize * 2
    }
}

/// A finished bake: header plus the packed buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BakeResult {
    pub metadata: BakeMetadata,
    pub packed: Vec<u16>,
}

impl BakeResult {
    /// Decoded scene position of `grain` at `frame`.
    pub fn position(&self, frame: u32, grain: u32) -> Option<(f64, f64)> {
        let m = &self.metadata;
        if frame >= m.frames || grain >= m.grains {
            return None;
        }
        let base = (frame as usize * m.grains as usize + grain as usize) * 2;
        Some(m.quantizer().dequantize([self.packed[base], self.packed[base + 1]]))
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

pub struct Encoder<'a> {
    options: &'a BakeOptions,
    quantizer: Quantizer,
}

impl<'a> Encoder<'a> {
    pub fn new(options: &'a BakeOptions, quantizer: Quantizer) -> Self {
        Self { options, quantizer }
    }

    /// Pack `samples` and compute the retimed rate.
    ///
    /// Every sample must hold exactly `grains` values.
    pub fn encode(&self, samples: &[FrameSample], grains: u32) -> BakeResult {
        let frames = samples.len() as u32;
        let mut packed = Vec::with_capacity(samples.len() * grains as usize * 2);
        for sample in samples {
            debug_assert_eq!(sample.values.len(), grains as usize);
            packed.extend(sample.values.iter().flatten().copied());
        }

        let metadata = BakeMetadata {
            format_version: FORMAT_VERSION,
            fps: retimed_fps(frames, self.options.duration),
            sample_fps: self.options.fps,
            grains,
            frames,
            quantization_factor: self.quantizer.factor,
            offset_x: self.quantizer.offset_x,
            offset_y: self.quantizer.offset_y,
            duration: self.options.duration,
            grain_radius: self.options.grain_radius,
            shape: self.options.shape(),
        };
        BakeResult { metadata, packed }
    }
}

/// Playback rate that spreads `frames` over `duration` seconds.
pub fn retimed_fps(frames: u32, duration: f64) -> f64 {
    frames as f64 / duration
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn quantizer() -> Quantizer {
        Quantizer::for_shape(&BakeOptions::default().shape(), DEFAULT_QUANTIZATION)
    }

    #[test]
    fn offsets_include_the_margin() {
        let q = quantizer();
        assert_eq!(q.offset_x, 210.0);
        assert_eq!(q.offset_y, 335.0);
    }

    #[test]
    fn quantize_clamps_to_u16_range() {
        let q = quantizer();
        assert_eq!(q.quantize(Vec2::new(-10_000.0, -10_000.0)), [0, 0]);
        assert_eq!(q.quantize(Vec2::new(10_000.0, 10_000.0)), [65535, 65535]);
        assert_eq!(q.quantize(Vec2::new(f32::NAN, 0.0))[0], 0);
    }

    #[test]
    fn quantize_is_within_half_a_step() {
        let q = quantizer();
        let p = Vec2::new(-12.34, 101.7);
        let (x, y) = q.dequantize(q.quantize(p));
        assert!((x - p.x as f64).abs() <= 0.5 / 32.0 + 1e-4);
        assert!((y - p.y as f64).abs() <= 0.5 / 32.0 + 1e-4);
    }

    #[test]
    fn packs_grain_major_and_retimes() {
        let options = BakeOptions {
            duration: 2.0,
            fps: 10,
            ..Default::default()
        };
        let samples = vec![
            FrameSample {
                values: vec![[1, 2], [3, 4]],
            },
            FrameSample {
                values: vec![[5, 6], [7, 8]],
            },
            FrameSample {
                values: vec![[9, 10], [11, 12]],
            },
        ];
        let result = Encoder::new(&options, quantizer()).encode(&samples, 2);
        assert_eq!(result.packed, (1..=12).collect::<Vec<u16>>());
        assert_eq!(result.packed.len(), result.metadata.expected_len());
        assert_eq!(result.metadata.frames, 3);
        assert_eq!(result.metadata.fps, 1.5);
        assert_eq!(result.metadata.sample_fps, 10);
    }

    #[test]
    fn metadata_serializes_flat_camel_case() {
        let options = BakeOptions::default();
        let result = Encoder::new(&options, quantizer()).encode(&[], 1);
        let json = serde_json::to_value(&result.metadata).unwrap();
        assert_eq!(json["formatVersion"], 2);
        assert_eq!(json["halfHeight"], 330.0);
        assert_eq!(json["quantizationFactor"].as_u64(), Some(32));
        assert_eq!(json["blend"]["kind"], "power");
        let back: BakeMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, result.metadata);
    }

    #[test]
    fn position_is_bounds_checked() {
        let options = BakeOptions::default();
        let q = quantizer();
        let samples = vec![FrameSample {
            values: vec![q.quantize(Vec2::new(1.0, -2.0))],
        }];
        let result = Encoder::new(&options, q).encode(&samples, 1);
        let (x, y) = result.position(0, 0).unwrap();
        assert!((x - 1.0).abs() < 0.05 && (y + 2.0).abs() < 0.05);
        assert!(result.position(1, 0).is_none());
        assert!(result.position(0, 1).is_none());
    }
}
