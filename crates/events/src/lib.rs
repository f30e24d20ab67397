//! Bake task orchestration.
//!
//! - [`TaskRegistry`] -- repository of submitted bakes, their logs and their
//!   subscribers.
//! - [`ProgressBus`] -- per-task ordered log with replaying fan-out.
//! - [`WorkerLauncher`] -- how a worker is started; [`ProcessLauncher`] runs
//!   the worker binary.

pub mod bus;
pub mod error;
pub mod launcher;
pub mod registry;

pub use bus::{ProgressBus, SubscriberId, Subscription};
pub use error::RegistryError;
pub use launcher::{ProcessLauncher, WorkerLauncher, WorkerOutput};
pub use registry::TaskRegistry;
