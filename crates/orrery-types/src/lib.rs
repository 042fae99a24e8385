//! # orrery-types
//!
//! Shared identifiers, error types, and constants for the Orrery
//! physics module pipeline.
//!
//! This crate has zero scheduling logic; it defines the vocabulary
//! that all other Orrery crates share.

pub mod constants;
pub mod error;
pub mod ids;

pub use error::{OrreryError, OrreryResult};
pub use ids::DeviceId;
