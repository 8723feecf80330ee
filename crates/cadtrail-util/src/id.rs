//! Prefixed ULID identifiers: `snp_01hq...` for snapshots, `trk_01hq...` for
//! tracking sessions. ULIDs sort by creation time, so ids do too.

use ulid::Ulid;

/// Length of the short form used in blob file names.
pub const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    Snapshot,
    Session,
}

impl IdPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::Snapshot => "snp",
            IdPrefix::Session => "trk",
        }
    }
}

pub struct Identifier;

impl Identifier {
    /// A new id for `prefix`; later ids compare greater.
    pub fn ascending(prefix: IdPrefix) -> String {
        format!("{}_{}", prefix.as_str(), Ulid::new().to_string().to_lowercase())
    }

    /// Last `SHORT_ID_LEN` characters of the id body, the random part of a
    /// ULID. Shorter ids are returned whole.
    pub fn short(id: &str) -> &str {
        let body = id.split_once('_').map_or(id, |(_, rest)| rest);
        let start = body.len().saturating_sub(SHORT_ID_LEN);
        body.get(start..).unwrap_or(body)
    }

    pub fn snapshot() -> String {
        Self::ascending(IdPrefix::Snapshot)
    }

    pub fn session() -> String {
        Self::ascending(IdPrefix::Session)
    }
}
