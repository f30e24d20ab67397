use std::path::PathBuf;

use clap::Parser;
use hourglass_core::options::{
    BakeOptions, BlendKind, DEFAULT_BULB, DEFAULT_C1, DEFAULT_C2, DEFAULT_DURATION_SECS,
    DEFAULT_FILL, DEFAULT_FPS, DEFAULT_GRAINS, DEFAULT_GRAIN_RADIUS, DEFAULT_HALF_HEIGHT,
    DEFAULT_NECK, DEFAULT_POWER, DEFAULT_TILT_DEGREES, DEFAULT_WALL_STEP,
};

/// Bake a granular hourglass simulation into a compact playback file.
#[derive(Debug, Clone, Parser)]
#[command(name = "hourglass-worker", version)]
pub struct WorkerArgs {
    /// Playback duration in seconds.
    #[arg(long, default_value_t = DEFAULT_DURATION_SECS)]
    pub duration: f64,

    /// Sampling rate in frames per second.
    #[arg(long, default_value_t = DEFAULT_FPS)]
    pub fps: u32,

    /// Grain count before the fill fraction.
    #[arg(long, default_value_t = DEFAULT_GRAINS)]
    pub grains: u32,

    /// Fraction of grains actually simulated, in (0, 1].
    #[arg(long, default_value_t = DEFAULT_FILL)]
    pub fill: f64,

    /// Half-width at the neck.
    #[arg(long, default_value_t = DEFAULT_NECK)]
    pub neck: f64,

    /// Distance from the neck to each cap.
    #[arg(long, default_value_t = DEFAULT_HALF_HEIGHT)]
    pub half_height: f64,

    /// Half-width at the caps.
    #[arg(long, default_value_t = DEFAULT_BULB)]
    pub bulb: f64,

    #[arg(long, default_value_t = DEFAULT_GRAIN_RADIUS)]
    pub grain_radius: f64,

    /// Silhouette blend: `power` or `cubic`.
    #[arg(long, default_value_t = BlendKind::Power)]
    pub blend: BlendKind,

    /// Exponent of the power blend.
    #[arg(long, default_value_t = DEFAULT_POWER)]
    pub power: f64,

    /// First control value of the cubic blend.
    #[arg(long, default_value_t = DEFAULT_C1)]
    pub c1: f64,

    /// Second control value of the cubic blend.
    #[arg(long, default_value_t = DEFAULT_C2)]
    pub c2: f64,

    /// Gravity tilt in degrees.
    #[arg(long, default_value_t = DEFAULT_TILT_DEGREES, allow_negative_numbers = true)]
    pub tilt: f64,

    /// Height of one wall slat.
    #[arg(long, default_value_t = DEFAULT_WALL_STEP)]
    pub wall_step: f64,

    /// Random seed; drawn fresh when omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Emit `BAKE ` protocol lines on stdout.
    #[arg(long)]
    pub progress: bool,

    /// Directory receiving the bake file and the catalog.
    #[arg(long, default_value = "bakes")]
    pub out_dir: PathBuf,

    /// URL path segment the output directory is served under.
    #[arg(long, default_value = "bakes")]
    pub url_prefix: String,
}

impl WorkerArgs {
    pub fn options(&self) -> BakeOptions {
        BakeOptions {
            duration: self.duration,
            fps: self.fps,
            grains: self.grains,
            fill: self.fill,
            neck: self.neck,
            half_height: self.half_height,
            bulb: self.bulb,
            grain_radius: self.grain_radius,
            blend: self.blend,
            power: self.power,
            c1: self.c1,
            c2: self.c2,
            tilt: self.tilt,
            wall_step: self.wall_step,
            seed: self.seed,
        }
    }
}
