//! Action execution for spotctl.
//!
//! The [`catalog`] declares the built-in actions, the [`engine`] gates,
//! routes and retries them, and [`handlers`] turn validated parameters into
//! calls against the remote music service.

pub mod catalog;
pub mod engine;
pub mod handlers;
pub mod ops;
pub mod params;
pub mod rate_limit;

#[cfg(test)]
mod test_helpers;

pub use catalog::build_registry;
pub use engine::{ActionHandler, ActionRequest, EngineStatus, ExecutionConfig, ExecutionEngine};
