//! modgate Core
//!
//! Core types and error handling shared across modgate components.
//!
//! This crate provides:
//! - Moderation outcomes, risk levels, and the `Decision` record
//! - Error types for policy loading and configuration

pub mod error;
pub mod types;

pub use error::{Error, LoadError, Result};
pub use types::{ActionDetail, Decision, DecisionSource, Outcome, RiskLevel};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, LoadError, Result};
    pub use crate::types::{ActionDetail, Decision, DecisionSource, Outcome, RiskLevel};
}
