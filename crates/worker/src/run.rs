//! One worker invocation: bake, write, catalog, report.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use hourglass_core::catalog::{CatalogEntry, CatalogIndex};
use hourglass_core::protocol::WorkerMessage;
use hourglass_pipeline::output::write_bake;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cli::WorkerArgs;

/// What a finished invocation produced.
#[derive(Debug, Clone)]
pub struct WorkerSummary {
    pub path: PathBuf,
    pub frames: u32,
    pub fps: f64,
    pub grains: u32,
    pub seed: u64,
}

/// Run the bake described by `args`, writing protocol lines to `out` when
/// `--progress` is set.
pub fn run(args: &WorkerArgs, out: &mut dyn Write) -> anyhow::Result<WorkerSummary> {
    let mut options = args.options();
    let seed = options.seed.unwrap_or_else(rand::random);
    options.seed = Some(seed);
    options.validate()?;

    let mut emit = |message: WorkerMessage| -> std::io::Result<()> {
        if args.progress {
            writeln!(out, "{}", message.to_line())?;
            out.flush()?;
        }
        Ok(())
    };

    emit(WorkerMessage::Meta(options.clone()))?;

    let mut emit_error = None;
    let report = hourglass_pipeline::bake(&options, StdRng::seed_from_u64(seed), |frame, target| {
        if emit_error.is_none() {
            if let Err(e) = emit(WorkerMessage::Progress {
                frame: frame as u64,
                target: target as u64,
            }) {
                emit_error = Some(e);
            }
        }
    })?;
    if let Some(e) = emit_error {
        return Err(e).context("Failed to write progress");
    }

    let meta = &report.result.metadata;
    let file_name = options.file_name();
    let path = write_bake(&args.out_dir, &file_name, &report.result)?;

    let entry = CatalogEntry::for_bake(
        file_name.clone(),
        &options,
        meta.grains,
        meta.frames,
        meta.fps,
        Utc::now(),
    );
    CatalogIndex::in_dir(&args.out_dir)
        .upsert(entry)
        .context("Failed to update the catalog")?;

    tracing::info!(
        frames = meta.frames,
        fps = meta.fps,
        grains = meta.grains,
        drained_frames = report.outcome.drained_frames,
        residual = report.outcome.residual_above_neck,
        seed,
        "Bake complete"
    );

    let prefix = args.url_prefix.trim_matches('/');
    let file = if prefix.is_empty() {
        file_name
    } else {
        format!("{prefix}/{file_name}")
    };
    emit(WorkerMessage::Done {
        file,
        frames: meta.frames as u64,
        fps: meta.fps,
    })?;

    Ok(WorkerSummary {
        path,
        frames: meta.frames,
        fps: meta.fps,
        grains: meta.grains,
        seed,
    })
}
