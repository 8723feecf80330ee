//! Legacy flat-file history format.
//!
//! Older installs kept one uncompressed JSON file per document, named after
//! the hash of the document path, holding every snapshot and change event.
//! Imported files are renamed with a `.migrated` suffix.

use cadtrail_snapshot::{ChangeEvent, DocumentSnapshot};
use cadtrail_util::path::document_hash;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Suffix appended to a legacy file once imported.
pub const MIGRATED_SUFFIX: &str = "migrated";

/// Contents of one legacy history file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyHistory {
    pub document_path: PathBuf,
    #[serde(default)]
    pub snapshots: Vec<DocumentSnapshot>,
    #[serde(default)]
    pub changes: Vec<ChangeEvent>,
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    /// Legacy files imported and renamed.
    pub files: usize,
    pub snapshots: usize,
    pub events: usize,
    /// Files that could not be imported and were left in place.
    pub failed: usize,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.files == 0 && self.failed == 0
    }
}

/// Where the legacy file of a document lives.
pub fn legacy_file(legacy_dir: &Path, document: &Path) -> PathBuf {
    legacy_dir.join(format!("{}.json", document_hash(document)))
}

/// Name a legacy file gets once imported.
pub fn migrated_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(".");
    name.push(MIGRATED_SUFFIX);
    PathBuf::from(name)
}

/// Whether a directory entry is a legacy file still waiting for import.
pub fn is_pending(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_file_is_keyed_by_hash() {
        let file = legacy_file(Path::new("/legacy"), Path::new("/parts/a.sldprt"));
        let name = file.file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), 64 + ".json".len());
        assert_eq!(file, legacy_file(Path::new("/legacy"), Path::new("/parts/./a.sldprt")));
    }

    #[test]
    fn migrated_name_appends_suffix() {
        assert_eq!(
            migrated_path(Path::new("/legacy/abc.json")),
            PathBuf::from("/legacy/abc.json.migrated")
        );
    }

    #[test]
    fn legacy_json_uses_camel_case() {
        let json = r#"{"documentPath": "/parts/a.sldprt", "snapshots": []}"#;
        let history: LegacyHistory = serde_json::from_str(json).unwrap();
        assert_eq!(history.document_path, PathBuf::from("/parts/a.sldprt"));
        assert!(history.changes.is_empty());
    }
}
