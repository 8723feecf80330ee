//! Snapshot codec: compact JSON inside a gzip stream.
//!
//! Blobs carry a small envelope with a format version so older binaries can
//! refuse blobs they do not understand instead of misreading them.

use crate::{DocumentSnapshot, SnapshotError, SnapshotResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::{trace, warn};

/// Format version written by this codec.
pub const FORMAT_VERSION: u32 = 1;

/// File extension used for snapshot blobs.
pub const BLOB_EXTENSION: &str = "snap.gz";

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format: u32,
    snapshot: &'a DocumentSnapshot,
}

#[derive(Deserialize)]
struct Envelope {
    format: u32,
    snapshot: DocumentSnapshot,
}

/// Result of encoding a snapshot.
#[derive(Debug, Clone)]
pub struct EncodedSnapshot {
    /// Compressed bytes.
    pub bytes: Vec<u8>,
    /// Size of the serialized form before compression.
    pub raw_len: usize,
}

impl EncodedSnapshot {
    /// Compressed size divided by raw size (lower is better).
    pub fn ratio(&self) -> f64 {
        if self.raw_len == 0 {
            return 1.0;
        }
        self.bytes.len() as f64 / self.raw_len as f64
    }
}

/// Serialize and compress a snapshot.
pub fn encode(snapshot: &DocumentSnapshot) -> SnapshotResult<EncodedSnapshot> {
    let raw = serde_json::to_vec(&EnvelopeRef {
        format: FORMAT_VERSION,
        snapshot,
    })?;

    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 4), Compression::default());
    encoder.write_all(&raw)?;
    let bytes = encoder.finish()?;
    trace!(snapshot = %snapshot.id, raw = raw.len(), compressed = bytes.len(), "Encoded snapshot");

    Ok(EncodedSnapshot {
        bytes,
        raw_len: raw.len(),
    })
}

/// Decompress and deserialize a snapshot.
pub fn decode(bytes: &[u8]) -> SnapshotResult<DocumentSnapshot> {
    if bytes.is_empty() {
        warn!("Refusing to decode an empty snapshot blob");
        return Err(SnapshotError::corrupted("empty blob"));
    }

    let mut raw = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut raw).map_err(|e| {
        warn!(len = bytes.len(), error = %e, "Snapshot blob failed to decompress");
        SnapshotError::corrupted(format!("decompression failed: {e}"))
    })?;

    let envelope: Envelope = serde_json::from_slice(&raw).map_err(|e| {
        warn!(raw = raw.len(), error = %e, "Snapshot blob holds invalid JSON");
        e
    })?;
    if envelope.format > FORMAT_VERSION {
        warn!(
            format = envelope.format,
            supported = FORMAT_VERSION,
            "Snapshot blob written by a newer format"
        );
        return Err(SnapshotError::UnsupportedFormat(envelope.format));
    }

    Ok(envelope.snapshot)
}
