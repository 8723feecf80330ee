//! Core tracking engine for cadtrail.
//!
//! This crate provides the coordination layer between a live CAD document
//! and its stored history:
//! - Configuration management (multi-source, JSONC support)
//! - Event bus for history view notifications
//! - Change detection by polling the feature tree
//! - The per-document snapshot chain with undo/redo
//! - Rollback of the live document to any snapshot
//! - Background legacy history migration

pub mod bus;
pub mod config;
pub mod detector;
pub mod error;
pub mod manager;
pub mod migration;
pub mod rollback;
pub mod scheduler;
pub mod session;
pub mod tracker;

pub use bus::{
    Bus, BusEvent, FeaturesChanged, RollbackCompleted, SnapshotCreated, TrackingStarted,
    TrackingStopped,
};
pub use config::{Config, TrackerSettings};
pub use detector::ChangeDetector;
pub use error::{ConfigError, CoreError, CoreResult};
pub use manager::SnapshotManager;
pub use migration::{MigrationGate, MigrationStatus};
pub use rollback::{RollbackEngine, RollbackOutcome};
pub use session::{SnapshotChain, TrackingSession};
pub use tracker::{PollReport, SessionInfo, Tracker};
