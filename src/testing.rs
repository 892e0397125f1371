//! In-memory collaborators for handler and router tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::ai::llm::{ChatMessage, Completion};
use crate::bot::messenger::Messenger;
use crate::bot::AppState;
use crate::config::AppConfig;
use crate::db::models::{DialogueState, Message, Role};
use crate::db::Store;
use crate::engine::extract::Extractor;
use crate::engine::profile::Profile;
use crate::error::{CompletionError, StoreError, TransportError};

#[derive(Default)]
struct Tables {
    messages: Vec<Message>,
    profiles: HashMap<String, Profile>,
    states: HashMap<String, DialogueState>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    pub fail_upserts: AtomicBool,
    pub fail_reads: AtomicBool,
}

impl MemoryStore {
    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(StoreError::Timeout)
        } else {
            Ok(())
        }
    }

    pub fn put_profile(&self, session_id: &str, profile: Profile) {
        self.tables
            .lock()
            .unwrap()
            .profiles
            .insert(session_id.to_string(), profile);
    }

    pub fn push_message(&self, session_id: &str, role: Role, content: &str) {
        self.tables.lock().unwrap().messages.push(Message {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            role: role.as_str().to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn profile(&self, session_id: &str) -> Option<Profile> {
        self.tables.lock().unwrap().profiles.get(session_id).cloned()
    }

    pub fn state(&self, session_id: &str) -> Option<DialogueState> {
        self.tables.lock().unwrap().states.get(session_id).copied()
    }

    fn session_messages(&self, session_id: &str) -> Vec<Message> {
        self.tables
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn roles(&self, session_id: &str) -> Vec<Role> {
        self.session_messages(session_id)
            .iter()
            .map(Message::role)
            .collect()
    }

    pub fn contents(&self, session_id: &str) -> Vec<String> {
        self.session_messages(session_id)
            .into_iter()
            .map(|m| m.content)
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), StoreError> {
        self.push_message(session_id, role, content);
        Ok(())
    }

    async fn recent_messages(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<Message>, StoreError> {
        self.check_reads()?;
        let all = self.session_messages(session_id);
        let skip = all.len().saturating_sub(limit.max(0) as usize);
        Ok(all.into_iter().skip(skip).collect())
    }

    async fn last_bot_message(&self, session_id: &str) -> Result<Option<String>, StoreError> {
        self.check_reads()?;
        Ok(self
            .session_messages(session_id)
            .into_iter()
            .rev()
            .find(|m| m.role() == Role::Assistant)
            .map(|m| m.content))
    }

    async fn get_profile(&self, session_id: &str) -> Result<Option<Profile>, StoreError> {
        self.check_reads()?;
        Ok(self.profile(session_id))
    }

    async fn upsert_profile(
        &self,
        session_id: &str,
        profile: &Profile,
    ) -> Result<Profile, StoreError> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout);
        }
        self.put_profile(session_id, profile.clone());
        Ok(profile.clone())
    }

    async fn get_dialogue_state(
        &self,
        session_id: &str,
    ) -> Result<Option<DialogueState>, StoreError> {
        self.check_reads()?;
        Ok(self.state(session_id))
    }

    async fn set_dialogue_state(
        &self,
        session_id: &str,
        state: DialogueState,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let topic = state
            .topic
            .or_else(|| tables.states.get(session_id).and_then(|s| s.topic));
        tables.states.insert(
            session_id.to_string(),
            DialogueState {
                phase: state.phase,
                topic,
            },
        );
        Ok(())
    }
}

/// Completion fake that answers with a fixed text (or fails) and records calls.
pub struct ScriptedCompletion {
    reply: Option<String>,
    calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl ScriptedCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<ChatMessage>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completion for ScriptedCompletion {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
    ) -> Result<String, CompletionError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), history.to_vec()));
        self.reply.clone().ok_or(CompletionError::Timeout)
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(i64, String)>>,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        telegram_bot_token: "token".to_string(),
        openai_api_key: "key".to_string(),
        database_url: "postgres://localhost/test".to_string(),
        openai_base_url: "http://localhost".to_string(),
        openai_model: "test-model".to_string(),
        llm_temperature: 0.7,
        llm_max_tokens: 300,
        request_timeout_secs: 1,
        bind_addr: "127.0.0.1:0".to_string(),
        webhook_url: None,
        history_limit: 20,
        default_city: "Москва".to_string(),
    }
}

pub fn test_state(store: Arc<MemoryStore>, llm: Arc<dyn Completion>) -> AppState {
    test_state_with_messenger(store, llm, Arc::new(RecordingMessenger::default()))
}

pub fn test_state_with_messenger(
    store: Arc<MemoryStore>,
    llm: Arc<dyn Completion>,
    messenger: Arc<dyn Messenger>,
) -> AppState {
    let config = test_config();
    AppState {
        extractor: Extractor::new(config.extractor_defaults()),
        config,
        store,
        llm,
        messenger,
    }
}
