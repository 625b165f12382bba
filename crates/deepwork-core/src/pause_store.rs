//! Locally measured pause intervals, kept between controllers.
//!
//! The backend only records when a pause began, so resume times live on the
//! client. Every committed command saves the session's intervals; opening the
//! session again merges them back in.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::config::data_dir;
use crate::error::Result;
use crate::session::PauseInterval;

pub trait PauseStore: Send + Sync {
    fn load(&self, session_id: i64) -> Result<Vec<PauseInterval>>;

    fn save(&self, session_id: i64, pauses: &[PauseInterval]) -> Result<()>;
}

/// JSON file keyed by session id, next to `config.toml`.
pub struct FilePauseStore {
    path: PathBuf,
    lock: Mutex<()>,
}

type PauseFile = BTreeMap<i64, Vec<PauseInterval>>;

impl FilePauseStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `~/.config/deepwork[-dev]/pauses.json`.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(data_dir()?.join("pauses.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> Result<PauseFile> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(PauseFile::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PauseFile::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl PauseStore for FilePauseStore {
    fn load(&self, session_id: i64) -> Result<Vec<PauseInterval>> {
        let _guard = self.guard();
        Ok(self.read()?.remove(&session_id).unwrap_or_default())
    }

    fn save(&self, session_id: i64, pauses: &[PauseInterval]) -> Result<()> {
        let _guard = self.guard();
        let mut file = self.read()?;
        if pauses.is_empty() {
            file.remove(&session_id);
        } else {
            file.insert(session_id, pauses.to_vec());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

/// Process-local store; the engine's default.
#[derive(Debug, Default)]
pub struct InMemoryPauseStore {
    pauses: Mutex<HashMap<i64, Vec<PauseInterval>>>,
}

impl InMemoryPauseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PauseStore for InMemoryPauseStore {
    fn load(&self, session_id: i64) -> Result<Vec<PauseInterval>> {
        let pauses = self.pauses.lock().unwrap_or_else(|e| e.into_inner());
        Ok(pauses.get(&session_id).cloned().unwrap_or_default())
    }

    fn save(&self, session_id: i64, pauses: &[PauseInterval]) -> Result<()> {
        let mut stored = self.pauses.lock().unwrap_or_else(|e| e.into_inner());
        stored.insert(session_id, pauses.to_vec());
        Ok(())
    }
}
