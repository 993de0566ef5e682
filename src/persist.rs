//! Saving order book snapshots to disk.
//!
//! Each save writes one pretty-printed JSON file holding the full book in
//! the same `{type, payload}` envelope the server pushes snapshots in, named
//! `orderbook_<label>_<YYYYMMDDThhmmssZ>.json`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::Result;
use crate::models::{OrderBookSnapshot, SnapshotEnvelope};

/// Why a snapshot is being saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveCause {
    /// Operator asked for a save.
    Manual,
    /// The autosave timer fired.
    Autosave,
}

impl SaveCause {
    /// Returns the label embedded in the file name.
    pub fn label(&self) -> &'static str {
        match self {
            SaveCause::Manual => "snapshot",
            SaveCause::Autosave => "snapshot-autosave",
        }
    }
}

/// Builds the file name for a save made at `at`.
#[must_use]
pub fn snapshot_file_name(cause: SaveCause, at: DateTime<Utc>) -> String {
    format!(
        "orderbook_{}_{}.json",
        cause.label(),
        at.format("%Y%m%dT%H%M%SZ")
    )
}

/// Writes `snapshot` into `dir` and returns the path of the new file.
///
/// # Errors
///
/// Returns [`MirrorError::Io`](crate::MirrorError::Io) if the file cannot be
/// created or written, or [`MirrorError::Json`](crate::MirrorError::Json) if
/// serialization fails.
pub fn save_snapshot(
    dir: &Path,
    snapshot: &OrderBookSnapshot,
    cause: SaveCause,
    at: DateTime<Utc>,
) -> Result<PathBuf> {
    let path = dir.join(snapshot_file_name(cause, at));
    let envelope = SnapshotEnvelope::new(snapshot.clone());

    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, &envelope)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    Ok(path)
}

/// Reads a snapshot previously written by [`save_snapshot`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not contain a
/// snapshot envelope.
pub fn load_snapshot(path: &Path) -> Result<OrderBookSnapshot> {
    let contents = std::fs::read_to_string(path)?;
    let envelope: SnapshotEnvelope = serde_json::from_str(&contents)?;
    Ok(envelope.payload)
}
