//! HTTP surface of the hourglass baker.
//!
//! Accepts bake submissions, streams worker progress as server-sent events
//! and serves the bake catalog plus the static front end.

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod state;
