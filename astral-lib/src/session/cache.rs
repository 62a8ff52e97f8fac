//! The single-slot opening cache and the key-value stores behind it.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::constants::OPENING_CACHE_KEY;

use super::error::SessionError;
use super::transcript::{ChatMessage, Role};

/// Minimal storage capability: string values by key.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&mut self, key: &str) -> Result<(), SessionError>;
}

/// In-process store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        match fs::read_to_string(self.path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpeningSnapshot {
    pub campaign_id: String,
    pub messages: Vec<ChatMessage>,
}

/// The opening transcript of the most recent campaign.
///
/// Every failure reads as a miss; nothing here is fatal.
pub struct OpeningCache {
    store: Box<dyn KeyValueStore>,
}

impl OpeningCache {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Cached DM messages for `campaign_id`, if the slot holds that campaign.
    pub fn load(&self, campaign_id: &str) -> Option<Vec<ChatMessage>> {
        let snapshot = self.peek()?;
        if snapshot.campaign_id != campaign_id {
            debug!(
                "opening cache holds {}, not {}",
                snapshot.campaign_id, campaign_id
            );
            return None;
        }
        let messages: Vec<ChatMessage> = snapshot
            .messages
            .into_iter()
            .filter(|m| m.role == Role::Dm)
            .collect();
        if messages.is_empty() {
            return None;
        }
        Some(messages)
    }

    /// Overwrite the slot with `messages` for `campaign_id`.
    pub fn save(&mut self, campaign_id: &str, messages: &[ChatMessage]) {
        let snapshot = OpeningSnapshot {
            campaign_id: campaign_id.to_string(),
            messages: messages.to_vec(),
        };
        let result = serde_json::to_string(&snapshot)
            .map_err(SessionError::from)
            .and_then(|json| self.store.set(OPENING_CACHE_KEY, &json));
        if let Err(err) = result {
            warn!("could not save opening cache: {}", err);
        }
    }

    /// Whatever the slot holds, regardless of campaign.
    pub fn peek(&self) -> Option<OpeningSnapshot> {
        let raw = match self.store.get(OPENING_CACHE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("could not read opening cache: {}", err);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!("ignoring corrupt opening cache: {}", err);
                None
            }
        }
    }

    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.store.remove(OPENING_CACHE_KEY)
    }
}
