//! Filesystem backend: one pretty-printed JSON file per session.
//!
//! ```text
//! base_dir/
//! ├── <session-id-1>.json
//! └── <session-id-2>.json
//! ```
//!
//! There is no locking. Concurrent saves of one session race at the OS level
//! and the last write wins.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendConfig};
use crate::error::{Error, Result};
use crate::session::Session;

const EXTENSION: &str = "json";

/// Session storage backed by a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FileSystemBackend {
    base_dir: PathBuf,
}

impl FileSystemBackend {
    pub const TYPE: &'static str = "filesystem";

    /// Open the store, creating `base_dir` (recursively) if needed.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).map_err(|e| {
            Error::io(
                format!("creating sessions directory {}", base_dir.display()),
                e,
            )
        })?;
        info!(base_dir = %base_dir.display(), "Filesystem session store ready");
        Ok(Self { base_dir })
    }

    /// Registry constructor; reads the `path` setting.
    pub fn from_config(config: &BackendConfig) -> Result<Box<dyn Backend>> {
        Ok(Box::new(Self::new(config.path()?)?))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the file holding session `id`.
    pub fn session_path(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self.base_dir.join(format!("{id}.{EXTENSION}")))
    }

    /// Like [`Self::session_path`], but an ID that cannot name a file is
    /// reported as not found.
    fn existing_path(&self, id: &str) -> Result<PathBuf> {
        self.session_path(id)
            .map_err(|_| Error::session_not_found(id))
    }

    fn read_session(path: &Path) -> Result<Session> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn session_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.base_dir).map_err(|e| {
            Error::io(format!("reading directory {}", self.base_dir.display()), e)
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                Error::io(format!("reading directory {}", self.base_dir.display()), e)
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl Backend for FileSystemBackend {
    fn name(&self) -> &'static str {
        Self::TYPE
    }

    fn save(&self, session: &mut Session) -> Result<()> {
        let path = self.session_path(&session.id)?;
        session.touch();
        let content = serde_json::to_string_pretty(session)?;

        let mut options = fs::OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let mut file = options
            .open(&path)
            .map_err(|e| Error::io(format!("writing {}", path.display()), e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| Error::io(format!("writing {}", path.display()), e))?;

        debug!(session_id = %session.id, path = %path.display(), "Session saved");
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Session> {
        let path = self.existing_path(id)?;
        match fs::read_to_string(&path) {
            Ok(content) => {
                let session = serde_json::from_str(&content)?;
                debug!(session_id = %id, "Session loaded");
                Ok(session)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::session_not_found(id)),
            Err(e) => Err(Error::io(format!("reading {}", path.display()), e)),
        }
    }

    fn delete(&self, id: &str) -> Result<()> {
        let path = self.existing_path(id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(session_id = %id, "Session deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::session_not_found(id)),
            Err(e) => Err(Error::io(format!("removing {}", path.display()), e)),
        }
    }

    fn exists(&self, id: &str) -> Result<bool> {
        Ok(validate_id(id).is_ok() && self.session_path(id)?.is_file())
    }

    fn load_all(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        for path in self.session_files()? {
            match Self::read_session(&path) {
                Ok(session) => sessions.push(session),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable session file"),
            }
        }
        Ok(sessions)
    }
}

/// Session IDs become file names, so they must not carry path syntax.
fn validate_id(id: &str) -> Result<()> {
    let bad = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\'])
        || id.contains('\0');
    if bad {
        return Err(Error::Validation(format!("invalid session id '{id}'")));
    }
    Ok(())
}
