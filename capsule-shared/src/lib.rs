//! Capsule Shared - common types for the builder library and the CLI
//!
//! This crate contains the error taxonomy and the constants that both
//! the `capsule` library and the `capsule` binary agree on.

pub mod constants;
pub mod errors;

pub use errors::{CapsuleError, CapsuleResult};
