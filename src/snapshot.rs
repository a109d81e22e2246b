//! Per-session transcript snapshots.
//!
//! Only what outlives a kernel is saved: the history items and the session
//! attributes. In-flight requests are meaningless after a restart and are
//! never persisted. Each session is saved to sessions/{session_id}.json.

use crate::history::HistoryItem;
use crate::state::TranscriptState;
use crate::{Result, TranscriptError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Saved transcript of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSnapshot {
    pub session_id: String,
    pub saved_at: DateTime<Utc>,
    pub items: Vec<HistoryItem>,
    #[serde(default)]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub cwd: Option<String>,
}

impl TranscriptSnapshot {
    pub fn capture(session_id: &str, state: &TranscriptState) -> Self {
        Self {
            session_id: session_id.to_string(),
            saved_at: Utc::now(),
            items: state.items.items().to_vec(),
            font_size: state.session.font_size,
            cwd: state.session.cwd.clone(),
        }
    }
}

/// Manages per-session snapshot files.
///
/// Directory layout:
///   {sessions_dir}/{session_id}.json
pub struct SnapshotStore {
    sessions_dir: PathBuf,
}

impl SnapshotStore {
    /// Create a new snapshot store. Creates the directory if needed.
    pub async fn new(home: &Path) -> Result<Self> {
        let sessions_dir = home.join("sessions");
        fs::create_dir_all(&sessions_dir).await?;
        Ok(Self { sessions_dir })
    }

    /// Save the current transcript for a session.
    pub async fn save(&self, session_id: &str, state: &TranscriptState) -> Result<()> {
        let path = self.session_path(session_id)?;
        let snapshot = TranscriptSnapshot::capture(session_id, state);
        let content = serde_json::to_string_pretty(&snapshot)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        debug!("Saved {} items for session {}", snapshot.items.len(), session_id);
        Ok(())
    }

    /// Load a previously saved snapshot.
    /// Returns None if no snapshot exists or it cannot be parsed.
    pub async fn load(&self, session_id: &str) -> Result<Option<TranscriptSnapshot>> {
        let path = self.session_path(session_id)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        match serde_json::from_str::<TranscriptSnapshot>(&content) {
            Ok(snapshot) => {
                info!("Loaded snapshot for session {}", session_id);
                Ok(Some(snapshot))
            }
            Err(e) => {
                warn!("Failed to parse snapshot for {}: {}", session_id, e);
                Ok(None)
            }
        }
    }

    /// List all saved session ids.
    pub async fn list_sessions(&self) -> Result<Vec<String>> {
        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.sessions_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(session_id) = name.strip_suffix(".json") {
                    sessions.push(session_id.to_string());
                }
            }
        }
        sessions.sort();
        Ok(sessions)
    }

    /// Remove old snapshots, keeping the most recent `keep`.
    pub async fn cleanup(&self, keep: usize) -> Result<()> {
        let mut entries: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
        let mut dir = fs::read_dir(&self.sessions_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(modified) = entry.metadata().await.and_then(|meta| meta.modified()) {
                entries.push((path, modified));
            }
        }

        if entries.len() <= keep {
            return Ok(());
        }

        // Newest first
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        for (path, _) in entries.into_iter().skip(keep) {
            if let Err(e) = fs::remove_file(&path).await {
                warn!("Failed to remove old snapshot {:?}: {}", path, e);
            }
        }
        Ok(())
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !session_id.starts_with('.');
        if !valid {
            return Err(TranscriptError::Snapshot(format!(
                "invalid session id {:?}",
                session_id
            )));
        }
        Ok(self.sessions_dir.join(format!("{}.json", session_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranscriptConfig;
    use crate::history::HistoryLog;
    use tempfile::TempDir;

    fn sample_state() -> TranscriptState {
        let mut state = TranscriptState::new(&TranscriptConfig::new().with_cwd("/work"));
        state.items = HistoryLog::new()
            .append(HistoryItem::stdout("hello"))
            .append(HistoryItem::PageBreak);
        state.session.font_size = Some(15.0);
        state
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path()).await.unwrap();

        store.save("abc", &sample_state()).await.unwrap();
        let snapshot = store.load("abc").await.unwrap().unwrap();

        assert_eq!(snapshot.session_id, "abc");
        assert_eq!(snapshot.items.len(), 2);
        assert_eq!(snapshot.font_size, Some(15.0));
        assert_eq!(snapshot.cwd.as_deref(), Some("/work"));
    }

    #[tokio::test]
    async fn test_load_missing() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path()).await.unwrap();
        assert!(store.load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_corrupt_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path()).await.unwrap();
        std::fs::write(temp_dir.path().join("sessions").join("bad.json"), "{ not json").unwrap();
        assert!(store.load("bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path()).await.unwrap();
        assert!(store.save("../escape", &sample_state()).await.is_err());
        assert!(store.load("").await.is_err());
    }

    #[tokio::test]
    async fn test_list_and_cleanup() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path()).await.unwrap();
        for id in ["a", "b", "c"] {
            store.save(id, &sample_state()).await.unwrap();
        }
        assert_eq!(store.list_sessions().await.unwrap(), vec!["a", "b", "c"]);

        store.cleanup(5).await.unwrap();
        assert_eq!(store.list_sessions().await.unwrap().len(), 3);

        store.cleanup(1).await.unwrap();
        assert_eq!(store.list_sessions().await.unwrap().len(), 1);
    }
}
