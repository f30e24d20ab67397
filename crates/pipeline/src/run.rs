//! One complete bake: options in, packed result out.

use glam::Vec2;
use hourglass_core::options::BakeOptions;
use rand::Rng;

use crate::bake::{BakeConfig, BakeLoop, BakeOutcome};
use crate::encoder::{BakeResult, Encoder, Quantizer, DEFAULT_QUANTIZATION};
use crate::error::PipelineError;
use crate::physics::{GrainWorld, WorldParams};
use crate::scene::{SceneBuilder, CAP_OVERHANG};

#[derive(Debug, Clone)]
pub struct BakeReport {
    pub result: BakeResult,
    pub outcome: BakeOutcome,
}

/// Simulate and encode a bake.
///
/// `on_progress(frame, target)` is forwarded from the loop.
pub fn bake<R, F>(options: &BakeOptions, mut rng: R, on_progress: F) -> Result<BakeReport, PipelineError>
where
    R: Rng,
    F: FnMut(u32, u32),
{
    options.validate()?;

    let shape = options.shape();
    let grains = options.simulated_grains();
    let radius = options.grain_radius as f32;

    let margin = CAP_OVERHANG as f32 + 2.0 * radius;
    let half_extent = Vec2::new(shape.bulb as f32, shape.half_height as f32) + Vec2::splat(margin);
    let params = WorldParams::default().tilted(shape.tilt_degrees as f32);
    let mut world = GrainWorld::new(params, -half_extent, half_extent, 2.0 * radius);

    let scene = SceneBuilder::new(&shape, options.grain_radius, grains).build(&mut world, &mut rng);

    let config = BakeConfig::new(options.fps, options.target_frames());
    tracing::info!(
        grains,
        target_frames = config.target_frames,
        cadence = config.cadence,
        "Bake started"
    );

    let quantizer = Quantizer::for_shape(&shape, DEFAULT_QUANTIZATION);
    let (samples, outcome) =
        BakeLoop::new(world, scene, rng, config, quantizer).run(on_progress);

    let result = Encoder::new(options, quantizer).encode(&samples, grains);
    Ok(BakeReport { result, outcome })
}
