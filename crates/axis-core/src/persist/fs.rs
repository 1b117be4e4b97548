//! Atomic file primitives for snapshot persistence.
//!
//! Writes follow the temp-file + fsync + rename protocol: a crash at any
//! point leaves either the old complete file or the new complete file on
//! disk, never a partial one, and a concurrent reader always observes a
//! consistent snapshot. Reads are bounded: the file size is checked against
//! a cap before any allocation or deserialisation.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Default upper bound for a single state-file read (16 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Errors from the atomic file primitives.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FsError {
    /// File exceeds the configured size cap.
    #[error("file too large: {size} bytes exceeds maximum of {max} bytes")]
    FileTooLarge {
        /// Actual file size in bytes.
        size: u64,
        /// Maximum allowed size in bytes.
        max: u64,
    },

    /// The final path has no parent directory to stage the temp file in.
    #[error("path has no parent directory: {}", path.display())]
    NoParentDirectory {
        /// Path with no parent.
        path: std::path::PathBuf,
    },

    /// JSON serialisation failed.
    #[error("json serialisation failed: {0}")]
    Serialize(#[source] serde_json::Error),

    /// JSON deserialisation failed.
    #[error("json deserialisation failed: {0}")]
    Deserialize(#[source] serde_json::Error),

    /// An I/O error during the operation.
    #[error("I/O error during {context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Writes `data` to `path` atomically.
///
/// 1. A temp file is created in the same directory (same filesystem, so the
///    rename is atomic).
/// 2. Data is written, flushed, and fsynced.
/// 3. The temp file is renamed over the final path.
/// 4. The parent directory is fsynced so the rename itself is durable.
///
/// # Errors
///
/// Returns [`FsError`] if any filesystem step fails.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), FsError> {
    let parent = path.parent().ok_or_else(|| FsError::NoParentDirectory {
        path: path.to_path_buf(),
    })?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent).map_err(|e| FsError::io("create parent directory", e))?;
    }

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| FsError::io("create temp file", e))?;
    tmp.write_all(data)
        .map_err(|e| FsError::io("write to temp file", e))?;
    tmp.flush().map_err(|e| FsError::io("flush temp file", e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| FsError::io("fsync temp file", e))?;
    tmp.persist(path)
        .map_err(|e| FsError::io("atomic rename to final path", e.error))?;

    // Make the directory entry durable as well.
    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}

/// Serialises `value` to pretty JSON and writes it atomically.
///
/// Serialisation happens in memory first, so a serialisation failure never
/// leaves a partial file behind.
///
/// # Errors
///
/// Returns [`FsError::Serialize`] or any error from [`atomic_write`].
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), FsError> {
    let json = serde_json::to_string_pretty(value).map_err(FsError::Serialize)?;
    atomic_write(path, json.as_bytes())
}

/// Reads and deserialises a JSON file, capping the read at `max_size` bytes.
///
/// The size is taken from the open handle's metadata, so a file swapped in
/// after the check cannot bypass the cap.
///
/// # Errors
///
/// - [`FsError::FileTooLarge`] if the file exceeds the cap.
/// - [`FsError::Deserialize`] if the content is not valid for `T`.
/// - [`FsError::Io`] for any underlying I/O failure.
pub fn bounded_read_json<T: DeserializeOwned>(path: &Path, max_size: u64) -> Result<T, FsError> {
    let file = File::open(path).map_err(|e| FsError::io("open state file", e))?;
    let size = file
        .metadata()
        .map_err(|e| FsError::io("stat state file", e))?
        .len();
    if size > max_size {
        return Err(FsError::FileTooLarge {
            size,
            max: max_size,
        });
    }

    let mut reader = file.take(max_size);
    let mut buf = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
    reader
        .read_to_end(&mut buf)
        .map_err(|e| FsError::io("read state file", e))?;
    serde_json::from_slice(&buf).map_err(FsError::Deserialize)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct State {
        counter: u64,
        label: String,
    }

    #[test]
    fn write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = State {
            counter: 7,
            label: "seven".to_string(),
        };
        atomic_write_json(&path, &state).unwrap();
        let loaded: State = bounded_read_json(&path, DEFAULT_MAX_FILE_SIZE).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn overwrite_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        atomic_write(&path, b"{\"counter\":1,\"label\":\"long first version\"}").unwrap();
        atomic_write(&path, b"{\"counter\":2,\"label\":\"x\"}").unwrap();
        let loaded: State = bounded_read_json(&path, DEFAULT_MAX_FILE_SIZE).unwrap();
        assert_eq!(loaded.counter, 2);
    }

    #[test]
    fn oversized_file_refused_before_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        atomic_write(&path, &vec![b'x'; 128]).unwrap();
        let err = bounded_read_json::<State>(&path, 64).unwrap_err();
        assert!(matches!(err, FsError::FileTooLarge { size: 128, max: 64 }));
    }

    #[test]
    fn missing_parent_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/state.json");
        atomic_write(&path, b"{}").unwrap();
        assert!(path.exists());
    }
}
