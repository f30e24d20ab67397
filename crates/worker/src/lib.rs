//! Hourglass bake worker.
//!
//! Parses bake options from the command line, runs the pipeline, writes the
//! bake file and updates the catalog. With `--progress` it reports on stdout
//! using the `BAKE ` line protocol; its own logs go to stderr.

pub mod cli;
pub mod run;

pub use cli::WorkerArgs;
pub use run::{run, WorkerSummary};
