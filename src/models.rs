use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::emotion::EmotionalState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    // Browser sessions store the companion's turns as "lyra"
    #[serde(rename = "lyra", alias = "assistant")]
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub timestamp: i64, // epoch millis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_create_result: Option<bool>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            timestamp: now_millis(),
            is_create_result: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn marked_create_result(mut self) -> Self {
        self.is_create_result = Some(true);
        self
    }
}

/// Unit of persistence shared by the local store and the cloud drive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub emotional_state: EmotionalState,
    #[serde(default)]
    pub last_update: i64,
}

impl SessionDocument {
    pub fn new(messages: Vec<Message>, emotional_state: EmotionalState) -> Self {
        Self {
            messages,
            emotional_state,
            last_update: now_millis(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub signal_strength: String,
    pub emotion: String,
    pub energy: String,
}

/// Creative artifact (lyrics + music prompt). Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResult {
    pub lyrics: String,
    pub suno_prompt: String,
    pub emotional_context: String,
    pub metadata: ArtifactMetadata,
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
