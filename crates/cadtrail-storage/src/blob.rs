//! Compressed snapshot blob files.
//!
//! One file per snapshot in the document's history folder, named
//! `<YYYYmmdd_HHMMSS>_<kind>_<short id>.snap.gz`.

use crate::StorageResult;
use cadtrail_snapshot::{codec, DocumentSnapshot, SnapshotId};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of a snapshot's blob.
pub fn blob_file_name(snapshot: &DocumentSnapshot) -> String {
    format!(
        "{}_{}_{}.{}",
        snapshot.timestamp.format("%Y%m%d_%H%M%S"),
        snapshot.kind.as_str(),
        snapshot.id.short(),
        codec::BLOB_EXTENSION
    )
}

/// Encode a snapshot and write it into `dir`.
///
/// Returns the blob path and its compressed size. The file is written to a
/// temporary name first and renamed into place.
pub fn write_blob(dir: &Path, snapshot: &DocumentSnapshot) -> StorageResult<(PathBuf, u64)> {
    let encoded = codec::encode(snapshot)?;
    fs::create_dir_all(dir)?;

    let path = dir.join(blob_file_name(snapshot));
    let temp_path = path.with_extension("gz.tmp");
    fs::write(&temp_path, &encoded.bytes)?;
    fs::rename(&temp_path, &path)?;

    info!(
        snapshot_id = %snapshot.id,
        path = %path.display(),
        raw_bytes = encoded.raw_len,
        compressed_bytes = encoded.bytes.len(),
        ratio = format!("{:.1}%", encoded.ratio() * 100.0),
        "Saved snapshot blob"
    );

    Ok((path, encoded.bytes.len() as u64))
}

/// Read and decode a blob.
pub fn read_blob(path: &Path) -> StorageResult<DocumentSnapshot> {
    let bytes = fs::read(path)?;
    debug!(path = %path.display(), bytes = bytes.len(), "Loading snapshot blob");
    Ok(codec::decode(&bytes)?)
}

/// Remove a blob file, `false` if it did not exist.
pub fn remove_blob(path: &Path) -> StorageResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Blob files in `dir` whose name carries the snapshot's short id.
pub fn find_blobs(dir: &Path, id: &SnapshotId) -> StorageResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let marker = format!("_{}.{}", id.short(), codec::BLOB_EXTENSION);
    let mut found = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(&marker));
        if matches {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
