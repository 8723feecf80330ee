//! Shared utilities for cadtrail.
//!
//! This crate provides common utilities used across the cadtrail workspace:
//! - ULID-based identifier generation
//! - Logging setup with tracing
//! - History and config path resolution
//! - RAII-based timing for operation measurement

pub mod id;
pub mod log;
pub mod path;
pub mod timing;

pub use id::{IdPrefix, Identifier};
pub use timing::{Operation, TimingGuard};
