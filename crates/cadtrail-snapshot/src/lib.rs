//! Feature-tree snapshots for cadtrail.
//!
//! This crate holds the data model shared by every other cadtrail crate and
//! the two pure services built on it:
//! - Snapshot codec: compact serialization plus gzip compression
//! - Diff service: structured comparison of two snapshots
//!
//! # Example
//!
//! ```
//! use cadtrail_snapshot::{codec, DocumentSnapshot, SnapshotKind};
//!
//! let snapshot = DocumentSnapshot::new("/parts/bracket.sldprt", "Initial state", SnapshotKind::Initial, 1);
//! let encoded = codec::encode(&snapshot).unwrap();
//! let decoded = codec::decode(&encoded.bytes).unwrap();
//! assert_eq!(decoded, snapshot);
//! ```

pub mod codec;
pub mod diff;
mod error;
mod event;
mod feature;
mod snapshot;

pub use diff::{compare, DiffKind, FeatureDiff, PropertyChange};
pub use error::{SnapshotError, SnapshotResult};
pub use event::{ChangeEvent, ChangeKind};
pub use feature::{
    has_changed, DimensionKind, FeatureState, ParameterValue, SketchDimension,
    DEFAULT_TOLERANCE,
};
pub use snapshot::{DocumentSnapshot, HistoryIndexEntry, SnapshotId, SnapshotKind};
