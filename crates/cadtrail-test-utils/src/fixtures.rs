//! Ready-made documents and temporary history roots.

use crate::{MockDocument, MockFeature};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A simple part: origin, planes, a dimensioned sketch and an extrusion.
///
/// Tracked features are `Sketch1` (dimension `D1@Sketch1` = 10) and
/// `Boss-Extrude1` (depth 10).
pub fn bracket_document(path: impl Into<PathBuf>) -> MockDocument {
    MockDocument::new(path)
        .with_feature(MockFeature::origin())
        .with_feature(MockFeature::plane("Front Plane"))
        .with_feature(MockFeature::plane("Top Plane"))
        .with_feature(MockFeature::plane("Right Plane"))
        .with_feature(MockFeature::sketch("Sketch1").with_dimension("D1@Sketch1", 10.0))
        .with_feature(MockFeature::extrude("Boss-Extrude1", 10.0))
        .with_property("PartNo", "BR-001")
}

/// Temporary directory laid out like a tracker installation.
///
/// Cleaned up on drop.
///
/// # Example
///
/// ```rust
/// use cadtrail_test_utils::TestHistory;
///
/// let history = TestHistory::new();
/// assert!(history.data_dir().exists());
/// assert!(history.document("bracket.sldprt").ends_with("parts/bracket.sldprt"));
/// ```
pub struct TestHistory {
    temp_dir: TempDir,
}

impl TestHistory {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        for dir in ["data", "history", "legacy", "parts"] {
            fs::create_dir_all(temp_dir.path().join(dir)).expect("Failed to create directory");
        }
        Self { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory for the index database.
    pub fn data_dir(&self) -> PathBuf {
        self.path().join("data")
    }

    /// Root for snapshot blob folders.
    pub fn history_root(&self) -> PathBuf {
        self.path().join("history")
    }

    /// Directory scanned for legacy JSON history files.
    pub fn legacy_dir(&self) -> PathBuf {
        self.path().join("legacy")
    }

    /// Path of a document inside the fixture's `parts` folder.
    pub fn document(&self, file_name: &str) -> PathBuf {
        self.path().join("parts").join(file_name)
    }
}

impl Default for TestHistory {
    fn default() -> Self {
        Self::new()
    }
}
