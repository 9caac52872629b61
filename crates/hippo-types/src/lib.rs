//! Core types for the Hippo memory engine.
//!
//! This crate defines the shared data model (records, lineage, state deltas,
//! classifications), the error taxonomy and the configuration structs used
//! across the memory, runtime and kernel crates. It contains no business logic.

pub mod config;
pub mod delta;
pub mod error;
pub mod inference;
pub mod lineage;
pub mod record;
pub mod report;
pub mod serde_compat;

pub use error::{HippoError, HippoResult};
