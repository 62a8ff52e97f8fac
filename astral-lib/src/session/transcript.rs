//! Chat transcript entries.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Dm,
    System,
}

/// One transcript line. Serialized in the same shape as the opening cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            speaker: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn dm(content: impl Into<String>) -> Self {
        Self::new(Role::Dm, content)
    }

    pub fn player(content: impl Into<String>) -> Self {
        Self::new(Role::Player, content)
    }
}
