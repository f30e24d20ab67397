use std::process::ExitCode;

use clap::Parser;
use hourglass_worker::WorkerArgs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // stdout carries protocol lines only.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hourglass_worker=info,hourglass_pipeline=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();

    let args = WorkerArgs::parse();
    let stdout = std::io::stdout();
    match hourglass_worker::run(&args, &mut stdout.lock()) {
        Ok(summary) => {
            tracing::info!(path = %summary.path.display(), "Wrote bake");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Bake failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
