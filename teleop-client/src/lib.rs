//! HTTP client for the teleop backend
//!
//! The backend is an external service consumed as a black box: system metrics,
//! screenshot and recording storage. Every call is best-effort, at-most-once;
//! there is no retry or authentication.

pub mod api;
pub mod metrics;

pub use api::*;
pub use metrics::*;
