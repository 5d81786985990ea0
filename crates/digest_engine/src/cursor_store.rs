use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use digest_core::Cursor;
use digest_logging::{digest_debug, digest_info, digest_warn};
use serde::{Deserialize, Serialize};

use crate::persist::{file_name_of, AtomicFileWriter, PersistError};

/// Durable per-source cursors.
pub trait CursorStore: Send + Sync {
    /// Never fails: unreadable storage reads as "no cursor".
    fn get(&self, source: &str) -> Option<Cursor>;

    /// Persists before returning. Replaces the previous value wholesale.
    fn set(&self, source: &str, last_seen_id: &str) -> Result<(), PersistError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CursorEntry {
    last_seen_id: String,
}

/// All cursors in one JSON file: `{"<source>": {"last_seen_id": "<id>"}}`.
#[derive(Debug, Clone)]
pub struct JsonCursorStore {
    path: PathBuf,
}

impl JsonCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_all(&self) -> BTreeMap<String, CursorEntry> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                digest_debug!("No cursor file at {:?}", self.path);
                return BTreeMap::new();
            }
            Err(err) => {
                digest_warn!("Failed to read cursors from {:?}: {}", self.path, err);
                return BTreeMap::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(err) => {
                digest_warn!(
                    "Ignoring unparsable cursor file {:?}: {}",
                    self.path,
                    err
                );
                BTreeMap::new()
            }
        }
    }
}

impl CursorStore for JsonCursorStore {
    fn get(&self, source: &str) -> Option<Cursor> {
        self.load_all()
            .remove(source)
            .filter(|entry| !entry.last_seen_id.is_empty())
            .map(|entry| Cursor::new(source, entry.last_seen_id))
    }

    fn set(&self, source: &str, last_seen_id: &str) -> Result<(), PersistError> {
        let mut entries = self.load_all();
        entries.insert(
            source.to_string(),
            CursorEntry {
                last_seen_id: last_seen_id.to_string(),
            },
        );

        let content =
            serde_json::to_string_pretty(&entries).map_err(|err| PersistError::Encode {
                what: "cursors",
                message: err.to_string(),
            })?;
        let writer = AtomicFileWriter::for_file(&self.path);
        writer.write(file_name_of(&self.path)?, &content)?;
        digest_info!("Cursor for @{} now at {}", source, last_seen_id);
        Ok(())
    }
}
