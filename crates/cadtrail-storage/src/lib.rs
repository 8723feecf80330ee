//! Persistent history store for cadtrail.
//!
//! On-disk layout:
//! - one compressed blob per snapshot in a per-document history folder
//!   (see [`cadtrail_util::path::history_dir`])
//! - a shared SQLite database with the snapshot index and the append-only
//!   change-event log
//! - legacy flat-file histories, imported once by
//!   [`HistoryStore::migrate_legacy`]

pub mod blob;
pub mod db;
pub mod error;
pub mod index;
pub mod legacy;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use index::HistoryStats;
pub use legacy::{legacy_file, LegacyHistory, MigrationReport};
pub use store::{HistoryStore, PurgeReport};
