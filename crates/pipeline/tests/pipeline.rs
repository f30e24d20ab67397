//! Full bakes on the granular solver, encoded and written to disk.

use assert_matches::assert_matches;
use hourglass_core::error::CoreError;
use hourglass_core::options::BakeOptions;
use hourglass_pipeline::output::{read_bake, write_bake};
use hourglass_pipeline::scene::CAP_OVERHANG;
use hourglass_pipeline::{bake, PipelineError};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn small_options() -> BakeOptions {
    BakeOptions {
        duration: 2.0,
        fps: 10,
        grains: 50,
        seed: Some(7),
        ..Default::default()
    }
}

#[test]
fn buffer_length_matches_frames_and_grains() {
    let report = bake(&small_options(), StdRng::seed_from_u64(7), |_, _| {}).unwrap();
    let meta = &report.result.metadata;

    assert!(meta.frames >= 20);
    assert_eq!(meta.grains, 50);
    assert_eq!(report.result.packed.len(), meta.frames as usize * 50 * 2);
    assert_eq!(meta.frames, report.outcome.frames);
}

#[test]
fn retimed_fps_spans_the_requested_duration() {
    let report = bake(&small_options(), StdRng::seed_from_u64(7), |_, _| {}).unwrap();
    let meta = &report.result.metadata;
    assert_eq!(meta.fps * 2.0, meta.frames as f64);
    assert_eq!(meta.sample_fps, 10);
}

#[test]
fn drain_never_exceeds_the_cap() {
    let report = bake(&small_options(), StdRng::seed_from_u64(7), |_, _| {}).unwrap();
    assert!(report.outcome.frames <= 20 + 10 * 20);
    assert_eq!(report.outcome.drained_frames, report.outcome.frames - 20);
}

#[test]
fn grains_stay_inside_the_world_bounds() {
    let options = small_options();
    let report = bake(&options, StdRng::seed_from_u64(7), |_, _| {}).unwrap();
    let shape = options.shape();
    let meta = &report.result.metadata;
    let margin = CAP_OVERHANG + 2.0 * options.grain_radius + 0.1;

    for frame in 0..meta.frames {
        for grain in 0..meta.grains {
            let (x, y) = report.result.position(frame, grain).unwrap();
            assert!(y.abs() <= shape.half_height + margin, "frame {frame} grain {grain} y={y}");
            assert!(x.abs() <= shape.bulb + margin, "frame {frame} grain {grain} x={x}");
        }
    }
}

#[test]
fn grains_start_in_the_upper_chamber() {
    let report = bake(&small_options(), StdRng::seed_from_u64(7), |_, _| {}).unwrap();
    for grain in 0..report.result.metadata.grains {
        let (_, y) = report.result.position(0, grain).unwrap();
        assert!(y < 0.0, "grain {grain} starts below the neck at y={y}");
    }
}

#[test]
fn progress_reports_reach_the_final_frame() {
    let mut reports = Vec::new();
    let out = bake(&small_options(), StdRng::seed_from_u64(7), |frame, target| {
        reports.push((frame, target))
    })
    .unwrap();

    assert_eq!(reports.first(), Some(&(10, 20)));
    assert_eq!(reports.last(), Some(&(out.outcome.frames, 20)));
    assert!(reports.windows(2).all(|w| w[0].0 < w[1].0));
}

#[test]
fn same_seed_same_bake() {
    let a = bake(&small_options(), StdRng::seed_from_u64(3), |_, _| {}).unwrap();
    let b = bake(&small_options(), StdRng::seed_from_u64(3), |_, _| {}).unwrap();
    assert_eq!(a.result, b.result);
}

#[test]
fn fill_reduces_simulated_grains() {
    let options = BakeOptions {
        fill: 0.5,
        ..small_options()
    };
    let report = bake(&options, StdRng::seed_from_u64(7), |_, _| {}).unwrap();
    assert_eq!(report.result.metadata.grains, 25);
}

#[test]
fn invalid_options_are_rejected_before_simulating() {
    let options = BakeOptions {
        fps: 0,
        ..small_options()
    };
    let err = bake(&options, StdRng::seed_from_u64(7), |_, _| {}).unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));
}

#[test]
fn grain_radius_too_small_for_the_chamber_is_rejected() {
    let options = BakeOptions {
        grain_radius: 0.01,
        ..small_options()
    };
    let err = bake(&options, StdRng::seed_from_u64(7), |_, _| {}).unwrap_err();
    assert_matches!(err, PipelineError::Core(CoreError::Validation(_)));
}

#[test]
fn written_bake_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let options = small_options();
    let report = bake(&options, StdRng::seed_from_u64(7), |_, _| {}).unwrap();

    let path = write_bake(&dir.path().join("bakes"), &options.file_name(), &report.result).unwrap();
    assert!(path.ends_with("hourglass_2s_neck16.json"));

    let doc: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(doc["meta"]["formatVersion"], 2);
    assert!(doc["meta"]["quantizationFactor"].is_u64());
    assert_eq!(doc["meta"]["quantizationFactor"].as_u64(), Some(32));
    assert!(doc["data"].is_string());

    assert_eq!(read_bake(&path).unwrap(), report.result);
}

#[test]
fn truncated_buffer_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let options = small_options();
    let mut report = bake(&options, StdRng::seed_from_u64(7), |_, _| {}).unwrap();
    report.result.packed.truncate(10);

    let path = write_bake(dir.path(), "broken.json", &report.result).unwrap();
    assert_matches!(read_bake(&path), Err(PipelineError::InvalidBake(_)));
}

#[test]
fn zero_quantization_factor_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let options = small_options();
    let mut report = bake(&options, StdRng::seed_from_u64(7), |_, _| {}).unwrap();
    report.result.metadata.quantization_factor = 0;

    let path = write_bake(dir.path(), "zero.json", &report.result).unwrap();
    assert_matches!(read_bake(&path), Err(PipelineError::InvalidBake(_)));
}
