//! Session persistence
//!
//! The engine never writes sessions itself; callers load one, run a round,
//! and save the session the round hands back.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use eyre::{Context, Result, eyre};
use tracing::debug;

use crate::cache::file_stem;
use crate::domain::DiscoverySession;

/// Load/save interface for discovery sessions
pub trait SessionStore: Send + Sync {
    /// Session by id, or None when it does not exist
    fn load(&self, session_id: &str) -> Result<Option<DiscoverySession>>;

    /// Create or replace a session
    fn save(&self, session: &DiscoverySession) -> Result<()>;

    /// Ids of every stored session
    fn list(&self) -> Result<Vec<String>>;
}

/// JSON file per session under a directory
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        debug!(?dir, "FileSessionStore::new: called");
        Self { dir }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(session_id)))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, session_id: &str) -> Result<Option<DiscoverySession>> {
        let path = self.path_for(session_id);
        debug!(?path, "FileSessionStore::load: called");
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).context(format!("Failed to read session {}", path.display()))?;
        let session: DiscoverySession =
            serde_json::from_str(&content).context(format!("Failed to parse session {}", path.display()))?;

        if session.session_id != session_id {
            return Err(eyre!(
                "Session file {} holds session {}, expected {}",
                path.display(),
                session.session_id,
                session_id
            ));
        }
        Ok(Some(session))
    }

    fn save(&self, session: &DiscoverySession) -> Result<()> {
        debug!(session_id = %session.session_id, round = session.round, "FileSessionStore::save: called");
        fs::create_dir_all(&self.dir).context(format!("Failed to create {}", self.dir.display()))?;

        let path = self.path_for(&session.session_id);
        let json = serde_json::to_string_pretty(session)?;

        let tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        fs::write(tmp.path(), json)?;
        tmp.persist(&path)
            .context(format!("Failed to persist session {}", path.display()))?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            // file names are encoded; the id inside the file is authoritative
            let parsed = fs::read_to_string(&path)
                .map_err(eyre::Report::from)
                .and_then(|content| serde_json::from_str::<DiscoverySession>(&content).map_err(eyre::Report::from));
            match parsed {
                Ok(session) => ids.push(session.session_id),
                Err(e) => debug!(?path, error = %e, "FileSessionStore::list: skipping unreadable file"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// In-process session store
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, DiscoverySession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, session_id: &str) -> Result<Option<DiscoverySession>> {
        let sessions = self.sessions.lock().map_err(|e| eyre!("session store poisoned: {}", e))?;
        Ok(sessions.get(session_id).cloned())
    }

    fn save(&self, session: &DiscoverySession) -> Result<()> {
        let mut sessions = self.sessions.lock().map_err(|e| eyre!("session store poisoned: {}", e))?;
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let sessions = self.sessions.lock().map_err(|e| eyre!("session store poisoned: {}", e))?;
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
