//! History index schema.
//!
//! `snapshots` holds one row per persisted snapshot blob, `change_events`
//! is the append-only change log. Both are keyed by the normalized document
//! key so differently spelled paths of one document share a history.

/// Initial schema.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS snapshots (
    snapshot_id   TEXT PRIMARY KEY,
    document_key  TEXT NOT NULL,
    document_path TEXT NOT NULL,
    timestamp     TEXT NOT NULL,
    description   TEXT NOT NULL,
    kind          TEXT NOT NULL,
    version       INTEGER NOT NULL,
    feature_count INTEGER NOT NULL,
    blob_size     INTEGER NOT NULL,
    blob_location TEXT NOT NULL,
    parent_id     TEXT,
    tags_json     TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_snapshots_document_time
    ON snapshots (document_key, timestamp);

CREATE TABLE IF NOT EXISTS change_events (
    event_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    document_key   TEXT NOT NULL,
    document_path  TEXT NOT NULL,
    timestamp      TEXT NOT NULL,
    kind           TEXT NOT NULL,
    feature_name   TEXT NOT NULL,
    new_state_json TEXT NOT NULL,
    old_state_json TEXT
);

CREATE INDEX IF NOT EXISTS idx_events_document_time
    ON change_events (document_key, timestamp);

CREATE INDEX IF NOT EXISTS idx_events_document_feature
    ON change_events (document_key, feature_name);

CREATE UNIQUE INDEX IF NOT EXISTS idx_events_identity
    ON change_events (document_key, timestamp, kind, feature_name);
"#;

/// Indexes every migrated database must have.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_snapshots_document_time",
    "idx_events_document_time",
    "idx_events_document_feature",
    "idx_events_identity",
];
