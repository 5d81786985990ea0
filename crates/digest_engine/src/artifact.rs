use std::fs;
use std::path::{Path, PathBuf};

use digest_logging::{digest_debug, digest_info, digest_warn};

use crate::persist::{file_name_of, AtomicFileWriter, PersistError};
use crate::SessionCookie;

/// Cookies saved after an interactive login, as a JSON array.
#[derive(Debug, Clone)]
pub struct SessionArtifactStore {
    path: PathBuf,
}

impl SessionArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing, unreadable, unparsable or empty artifacts all read as `None`.
    pub fn load(&self) -> Option<Vec<SessionCookie>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                digest_debug!("No saved session at {:?}", self.path);
                return None;
            }
            Err(err) => {
                digest_warn!("Failed to read saved session {:?}: {}", self.path, err);
                return None;
            }
        };

        match serde_json::from_str::<Vec<SessionCookie>>(&content) {
            Ok(cookies) if cookies.is_empty() => None,
            Ok(cookies) => {
                digest_debug!("Loaded {} saved cookie(s) from {:?}", cookies.len(), self.path);
                Some(cookies)
            }
            Err(err) => {
                digest_warn!("Ignoring unparsable saved session {:?}: {}", self.path, err);
                None
            }
        }
    }

    pub fn save(&self, cookies: &[SessionCookie]) -> Result<PathBuf, PersistError> {
        let content =
            serde_json::to_string_pretty(cookies).map_err(|err| PersistError::Encode {
                what: "session cookies",
                message: err.to_string(),
            })?;
        let writer = AtomicFileWriter::for_file(&self.path);
        let path = writer.write(file_name_of(&self.path)?, &content)?;
        digest_info!("Saved {} session cookie(s) to {:?}", cookies.len(), path);
        Ok(path)
    }
}
