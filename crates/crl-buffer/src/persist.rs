//! Disk-spill persistence for [`crate::buffer::MessageBuffer`] (spec.md §4.1,
//! §6): a snapshot is one JSON (optionally gzip-compressed) file per
//! `persistToDisk` call, named `buffer-<unix_millis>.json[.gz]`.

use crate::config::BufferConfig;
use crate::message::BufferedMessage;
use crl_core::{CrlError, CrlResult};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn snapshot_file_name(compressed: bool) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    if compressed {
        format!("buffer-{millis}.json.gz")
    } else {
        format!("buffer-{millis}.json")
    }
}

/// Writes `messages` as one spill file under `config.persist_path`, gzipped
/// when `config.compress_on_persist` is set, and returns the file's path.
pub fn write_snapshot(config: &BufferConfig, messages: &[BufferedMessage]) -> CrlResult<PathBuf> {
    std::fs::create_dir_all(&config.persist_path)?;
    let json = serde_json::to_vec(messages).map_err(|e| CrlError::Serialization(e.to_string()))?;

    let file_name = snapshot_file_name(config.compress_on_persist);
    let path = config.persist_path.join(file_name);
    let file = std::fs::File::create(&path)?;

    if config.compress_on_persist {
        let mut encoder =
            flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(&json)?;
        encoder.finish()?;
    } else {
        let mut file = file;
        file.write_all(&json)?;
    }

    Ok(path)
}

/// Reads back a spill file written by [`write_snapshot`]. Transparently
/// gunzips when `path` ends in `.gz`.
pub fn read_snapshot(path: &Path) -> CrlResult<Vec<BufferedMessage>> {
    let raw = std::fs::read(path)?;
    let json = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        let mut decoder = flate2::read::GzDecoder::new(raw.as_slice());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        out
    } else {
        raw
    };
    serde_json::from_slice(&json).map_err(|e| CrlError::Serialization(e.to_string()))
}

/// Keeps the most recently written spill files whose combined size fits
/// under `config.max_disk_size`, deleting older ones (spec.md §4.1's
/// disk-file pruning).
pub fn prune(config: &BufferConfig) -> CrlResult<()> {
    if !config.persist_path.exists() {
        return Ok(());
    }

    let mut files: Vec<(PathBuf, std::time::SystemTime, u64)> = std::fs::read_dir(&config.persist_path)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            let modified = meta.modified().ok()?;
            Some((entry.path(), modified, meta.len()))
        })
        .collect();

    // Newest first so we keep the most recent files under the cap.
    files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut total: u64 = 0;
    for (path, _modified, len) in files {
        total += len;
        if total > config.max_disk_size as u64 {
            let _ = std::fs::remove_file(path);
        }
    }
    Ok(())
}
