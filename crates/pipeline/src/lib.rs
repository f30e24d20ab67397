//! Offline hourglass bake pipeline.
//!
//! [`scene`] builds walls and grains into a [`physics::PhysicsWorld`],
//! [`bake::BakeLoop`] steps and samples it, [`encoder`] packs the samples and
//! [`output`] writes the bake document. [`run::bake`] ties them together.

pub mod bake;
pub mod encoder;
pub mod error;
pub mod grid;
pub mod output;
pub mod physics;
pub mod run;
pub mod scene;

pub use error::PipelineError;
pub use run::{bake, BakeReport};
