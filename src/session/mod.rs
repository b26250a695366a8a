use log::warn;
use serde::{ Serialize, Deserialize };
use std::fs;
use std::io;
use std::path::Path;
use uuid::Uuid;

/// Where the active session is persisted, relative to the working directory.
/// The tool is per-project, so the store lives next to the project it serves.
pub const STATE_PATH: &str = "storage/latest.json";

/// Local record of the tip of the turn chain and the active conversation.
///
/// `last_message_id` always holds a value: before the first turn of a fresh
/// session it is a random id the backend will accept as the parent of a
/// conversation-opening message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub last_message_id: String,
    pub conversation_id: Option<String>,
}

impl SessionState {
    pub fn fresh() -> Self {
        Self {
            last_message_id: Uuid::new_v4().to_string(),
            conversation_id: None,
        }
    }

    /// Read the persisted state. A missing or corrupt store is not fatal:
    /// the session simply starts with no conversation selected.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Could not read session store {}: {}", path.display(), e);
                }
                return Self::fresh();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!("Corrupt session store {}: {}", path.display(), e);
                Self::fresh()
            }
        }
    }

    /// Overwrite the persisted state. Called after every successful turn;
    /// failures propagate, a session that cannot record its tip must not
    /// keep submitting turns against a stale parent.
    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage/latest.json");
        let state = SessionState {
            last_message_id: "5f3c".to_string(),
            conversation_id: Some("a63fe212-0a01-4c8e-9d5f-0e2f3b1c9d10".to_string()),
        };
        state.save(&path).unwrap();
        assert_eq!(SessionState::load(&path), state);
    }

    #[test]
    fn missing_store_starts_without_conversation() {
        let dir = tempdir().unwrap();
        let state = SessionState::load(dir.path().join("latest.json"));
        assert!(state.conversation_id.is_none());
        assert!(!state.last_message_id.is_empty());
    }

    #[test]
    fn corrupt_store_starts_without_conversation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latest.json");
        fs::write(&path, "{ not json").unwrap();
        let state = SessionState::load(&path);
        assert!(state.conversation_id.is_none());
    }

    #[test]
    fn fresh_states_get_distinct_tips() {
        assert_ne!(SessionState::fresh().last_message_id, SessionState::fresh().last_message_id);
    }

    #[test]
    fn save_creates_missing_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/latest.json");
        SessionState::fresh().save(&path).unwrap();
        assert!(path.exists());
    }
}
