//! Per-project profile cache
//!
//! Caching is an optimization only: every read failure is "no cache" and
//! every write failure is logged and dropped. There is no locking; two rounds
//! for the same project racing on a write leave whichever rename landed last.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use eyre::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::AnalysisReport;

/// Schema version written into every artifact
pub const PROFILE_VERSION: u32 = 1;

/// Durable summary of a project's characteristics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileArtifact {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub summary: String,
    #[serde(rename = "stackHints")]
    pub hints: Vec<String>,
    pub signals: Vec<String>,
    pub confidence: u8,
}

impl ProfileArtifact {
    /// Build a fresh artifact from the profile job's report
    pub fn from_report(report: &AnalysisReport) -> Self {
        Self {
            version: PROFILE_VERSION,
            updated_at: Utc::now(),
            summary: report.summary.clone(),
            hints: report.stack_hints.clone(),
            signals: report.signals.clone(),
            confidence: report.confidence,
        }
    }

    /// The artifact in the same shape analysis jobs report
    pub fn to_report(&self) -> AnalysisReport {
        AnalysisReport {
            summary: self.summary.clone(),
            findings: Vec::new(),
            signals: self.signals.clone(),
            pain_points: Vec::new(),
            constraints: Vec::new(),
            scope_hints: Vec::new(),
            stack_hints: self.hints.clone(),
            documentation_hints: Vec::new(),
            open_questions: Vec::new(),
            confidence: self.confidence,
        }
    }
}

/// Key-to-artifact store, one artifact per project
pub trait ProfileStore: Send + Sync {
    /// Cached artifact, or None when missing or unreadable
    fn read(&self, project_id: &str) -> Option<ProfileArtifact>;

    /// Replace the artifact; failures are logged, never returned
    fn write(&self, project_id: &str, artifact: &ProfileArtifact);

    /// Drop the artifact; returns whether one existed
    fn clear(&self, project_id: &str) -> bool;
}

/// Map an arbitrary key to a safe file stem, one stem per key
///
/// ASCII alphanumerics and `-` pass through; every other byte, `_` included,
/// becomes `_xx` hex, so distinct keys never share a file.
pub fn file_stem(key: &str) -> String {
    if key.is_empty() {
        return "_".to_string();
    }
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("_{:02x}", byte));
        }
    }
    stem
}

/// One JSON file per project under a directory
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        debug!(?dir, "FileProfileStore::new: called");
        Self { dir }
    }

    pub fn path_for(&self, project_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(project_id)))
    }

    fn try_write(&self, project_id: &str, artifact: &ProfileArtifact) -> eyre::Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.path_for(project_id);
        let json = serde_json::to_string_pretty(artifact)?;

        // Readers only ever see a complete file
        let tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        fs::write(tmp.path(), json)?;
        tmp.persist(&path)
            .with_context(|| format!("Failed to persist {}", path.display()))?;
        Ok(())
    }
}

impl ProfileStore for FileProfileStore {
    fn read(&self, project_id: &str) -> Option<ProfileArtifact> {
        let path = self.path_for(project_id);
        debug!(?path, "FileProfileStore::read: called");

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!(?path, error = %e, "FileProfileStore::read: no cache");
                return None;
            }
        };

        match serde_json::from_str::<ProfileArtifact>(&content) {
            Ok(artifact) if artifact.version == PROFILE_VERSION => Some(artifact),
            Ok(artifact) => {
                debug!(version = artifact.version, "FileProfileStore::read: version mismatch");
                None
            }
            Err(e) => {
                warn!(?path, error = %e, "FileProfileStore::read: unparsable cache file");
                None
            }
        }
    }

    fn write(&self, project_id: &str, artifact: &ProfileArtifact) {
        debug!(%project_id, "FileProfileStore::write: called");
        if let Err(e) = self.try_write(project_id, artifact) {
            warn!(%project_id, error = %e, "FileProfileStore::write: failed, continuing without cache");
        }
    }

    fn clear(&self, project_id: &str) -> bool {
        let path = self.path_for(project_id);
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) => {
                debug!(?path, error = %e, "FileProfileStore::clear: nothing removed");
                false
            }
        }
    }
}

/// In-process store for tests and embedding
#[derive(Default)]
pub struct MemoryProfileStore {
    artifacts: Mutex<HashMap<String, ProfileArtifact>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn read(&self, project_id: &str) -> Option<ProfileArtifact> {
        self.artifacts.lock().ok()?.get(project_id).cloned()
    }

    fn write(&self, project_id: &str, artifact: &ProfileArtifact) {
        match self.artifacts.lock() {
            Ok(mut map) => {
                map.insert(project_id.to_string(), artifact.clone());
            }
            Err(e) => warn!(%project_id, error = %e, "MemoryProfileStore::write: poisoned"),
        }
    }

    fn clear(&self, project_id: &str) -> bool {
        self.artifacts
            .lock()
            .map(|mut map| map.remove(project_id).is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn artifact() -> ProfileArtifact {
        ProfileArtifact {
            version: PROFILE_VERSION,
            updated_at: Utc::now(),
            summary: "Rust service on Postgres".to_string(),
            hints: vec!["rust".to_string(), "postgres".to_string()],
            signals: vec!["monorepo".to_string()],
            confidence: 72,
        }
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(artifact()).unwrap();
        assert_eq!(json["version"], 1);
        assert!(json.get("updatedAt").is_some());
        assert_eq!(json["stackHints"][0], "rust");
        assert!(json.get("hints").is_none());
    }

    #[test]
    fn test_file_round_trip() {
        let temp = tempdir().unwrap();
        let store = FileProfileStore::new(temp.path());
        let written = artifact();

        store.write("acme/crm", &written);
        let read = store.read("acme/crm").unwrap();

        assert_eq!(read.summary, written.summary);
        assert_eq!(read.hints, written.hints);
        assert_eq!(read.signals, written.signals);
        assert_eq!(read.confidence, written.confidence);
    }

    #[test]
    fn test_missing_and_corrupt_are_none() {
        let temp = tempdir().unwrap();
        let store = FileProfileStore::new(temp.path());
        assert!(store.read("nothing").is_none());

        fs::write(store.path_for("broken"), "{ not json").unwrap();
        assert!(store.read("broken").is_none());
    }

    #[test]
    fn test_wrong_version_is_none() {
        let temp = tempdir().unwrap();
        let store = FileProfileStore::new(temp.path());
        let mut old = artifact();
        old.version = 0;
        store.write("p", &old);

        assert!(store.read("p").is_none());
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let temp = tempdir().unwrap();
        let blocker = temp.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();

        let store = FileProfileStore::new(&blocker);
        store.write("p", &artifact());
        assert!(store.read("p").is_none());
    }

    #[test]
    fn test_clear() {
        let temp = tempdir().unwrap();
        let store = FileProfileStore::new(temp.path());
        store.write("p", &artifact());

        assert!(store.clear("p"));
        assert!(!store.clear("p"));
        assert!(store.read("p").is_none());
    }

    #[test]
    fn test_file_stem_sanitizes() {
        assert_eq!(file_stem("acme/crm"), "acme_2fcrm");
        assert_eq!(file_stem("../etc"), "_2e_2e_2fetc");
        assert_eq!(file_stem(""), "_");
        assert_eq!(file_stem("ok-name1"), "ok-name1");
        assert!(!file_stem("../etc").contains('/'));
    }

    #[test]
    fn test_file_stem_keeps_keys_apart() {
        let keys = ["acme/crm", "acme_crm", "acme.crm", "acme crm", "acme_2fcrm", "", "_"];
        let stems: std::collections::HashSet<String> = keys.iter().map(|k| file_stem(k)).collect();
        assert_eq!(stems.len(), keys.len());
    }

    #[test]
    fn test_similar_project_ids_get_separate_profiles() {
        let temp = tempdir().unwrap();
        let store = FileProfileStore::new(temp.path());
        store.write("acme/crm", &artifact());

        assert!(store.read("acme/crm").is_some());
        assert!(store.read("acme_crm").is_none());
        assert!(store.read("acme.crm").is_none());
        assert_ne!(store.path_for("acme/crm"), store.path_for("acme_crm"));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryProfileStore::new();
        assert!(store.read("p").is_none());
        store.write("p", &artifact());
        assert_eq!(store.read("p").unwrap().confidence, 72);
        assert!(store.clear("p"));
    }

    #[test]
    fn test_report_conversion_keeps_profile_fields() {
        let a = artifact();
        let report = a.to_report();
        assert_eq!(report.stack_hints, a.hints);

        let back = ProfileArtifact::from_report(&report);
        assert_eq!(back.summary, a.summary);
        assert_eq!(back.signals, a.signals);
        assert_eq!(back.confidence, a.confidence);
    }
}
