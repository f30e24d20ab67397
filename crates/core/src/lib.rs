//! Hourglass domain types and pure logic.
//!
//! - [`options`] -- bake options, defaults, validation, worker arguments.
//! - [`shape`] -- the parametric silhouette.
//! - [`protocol`] -- worker line protocol and event classification.
//! - [`catalog`] -- the sorted index of produced bakes.

pub mod catalog;
pub mod error;
pub mod options;
pub mod protocol;
pub mod shape;
pub mod types;
