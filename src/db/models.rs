use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::engine::phase::Phase;
use crate::engine::profile::Profile;
use crate::engine::topic::Topic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Older rows used `bot` for replies.
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "assistant" | "bot" => Self::Assistant,
            _ => Self::User,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn role(&self) -> Role {
        Role::from_str_loose(&self.role)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProfileRow {
    pub session_id: String,
    pub birthdate: Option<String>,
    pub birthtime: Option<String>,
    pub city: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            birthdate: row.birthdate,
            birthtime: row.birthtime,
            city: row.city,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DialogueStateRow {
    pub session_id: String,
    pub phase: String,
    pub topic: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted position of a session in the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogueState {
    pub phase: Phase,
    pub topic: Option<Topic>,
}

impl DialogueStateRow {
    /// `None` when the stored phase name is unknown.
    pub fn into_state(self) -> Option<DialogueState> {
        Some(DialogueState {
            phase: Phase::parse(&self.phase)?,
            topic: self.topic.as_deref().and_then(Topic::from_key),
        })
    }
}
