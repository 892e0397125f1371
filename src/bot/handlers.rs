use crate::ai::llm::ChatMessage;
use crate::ai::prompt::{self, BirthContext};
use crate::bot::{replies, AppState};
use crate::db::models::{DialogueState, Message, Role};
use crate::engine::phase::Phase;
use crate::engine::profile::Profile;
use crate::engine::topic::Topic;
use crate::engine::{plan_turn, TurnInput, TurnPlan};
use crate::error::StoreError;

/// What a turn of the onboarding dialogue produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// `None` when the turn failed before a phase was decided.
    pub phase: Option<Phase>,
    pub replies: Vec<String>,
}

/// Run one turn of the Telegram dialogue. Never fails: any error becomes an
/// apology for the user.
pub async fn handle_dialogue_turn(state: &AppState, session_id: &str, text: &str) -> TurnOutcome {
    match dialogue_turn(state, session_id, text).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(session_id, error = %e, "dialogue turn failed");
            save_reply(state, session_id, replies::PROCESSING_FAILED).await;
            TurnOutcome {
                phase: None,
                replies: vec![replies::PROCESSING_FAILED.to_string()],
            }
        }
    }
}

async fn dialogue_turn(
    state: &AppState,
    session_id: &str,
    text: &str,
) -> Result<TurnOutcome, StoreError> {
    // ── 1. Always save the incoming message ────────────────────────

    if let Err(e) = state.store.insert_message(session_id, Role::User, text).await {
        tracing::warn!(session_id, error = %e, "failed to store user message");
    }

    // ── 2. Load profile and where the dialogue stopped ─────────────

    let profile = state.store.get_profile(session_id).await?;
    let previous = previous_phase(state, session_id).await;

    // ── 3. Decide ──────────────────────────────────────────────────

    let plan = plan_turn(
        &state.extractor,
        TurnInput {
            message: text,
            profile: profile.as_ref(),
            previous,
            today: chrono::Local::now().date_naive(),
        },
    );

    if !plan.transition.is_expected() {
        tracing::warn!(
            session_id,
            from = ?plan.transition.from,
            to = %plan.phase(),
            "unexpected dialogue transition"
        );
    }
    for note in &plan.notes {
        tracing::warn!(session_id, note = ?note, "suspicious birth data");
    }
    tracing::info!(session_id, phase = %plan.phase(), "dialogue phase resolved");

    // ── 4. Act on the decision ─────────────────────────────────────

    let mut next_state = Some(DialogueState {
        phase: plan.phase(),
        topic: plan.topic,
    });

    let reply = match plan.phase() {
        Phase::NeedsGreeting => replies::ONBOARDING.to_string(),
        Phase::AwaitingBirthData => replies::ask_missing(&plan.missing),
        Phase::AwaitingTopic => replies::topic_menu(),
        Phase::ReadyForTopicSelection => match &plan.patch {
            Some(patch) => match state.store.upsert_profile(session_id, patch).await {
                Ok(saved) => {
                    tracing::info!(session_id, profile = %saved.describe(), "profile saved");
                    replies::profile_saved(&saved)
                }
                Err(e) => {
                    tracing::error!(session_id, error = %e, "failed to save profile");
                    next_state = None;
                    replies::SAVE_FAILED.to_string()
                }
            },
            None => replies::topic_menu(),
        },
        Phase::ReadyForPrediction => predict(state, session_id, profile.as_ref(), &plan).await,
    };

    // ── 5. Remember the phase and the reply ────────────────────────

    if let Some(next_state) = next_state {
        if let Err(e) = state.store.set_dialogue_state(session_id, next_state).await {
            tracing::warn!(session_id, error = %e, "failed to store dialogue state");
        }
    }
    save_reply(state, session_id, &reply).await;

    Ok(TurnOutcome {
        phase: Some(plan.phase()),
        replies: vec![reply],
    })
}

/// Persisted phase, or a guess from the last thing the bot said.
async fn previous_phase(state: &AppState, session_id: &str) -> Option<Phase> {
    match state.store.get_dialogue_state(session_id).await {
        Ok(Some(saved)) => return Some(saved.phase),
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(session_id, error = %e, "failed to load dialogue state");
            return None;
        }
    }

    match state.store.last_bot_message(session_id).await {
        Ok(last) => last.as_deref().and_then(Phase::infer_from_bot_message),
        Err(e) => {
            tracing::warn!(session_id, error = %e, "failed to load last bot message");
            None
        }
    }
}

async fn predict(
    state: &AppState,
    session_id: &str,
    profile: Option<&Profile>,
    plan: &TurnPlan,
) -> String {
    let (Some(profile), Some(topic)) = (profile, plan.topic) else {
        return replies::topic_menu();
    };

    let history = match state
        .store
        .recent_messages(session_id, state.config.history_limit)
        .await
    {
        Ok(history) => history,
        Err(e) => {
            tracing::warn!(session_id, error = %e, "failed to load history");
            Vec::new()
        }
    };

    let system_prompt = prompt::build_system_prompt(&BirthContext {
        profile: Some(profile),
        birthdate_hint: None,
    });
    let messages = prediction_messages(&history, topic, profile);

    match state.llm.complete(&system_prompt, &messages).await {
        Ok(reply) => prompt::sanitize_reply(&reply),
        Err(e) => {
            tracing::error!(session_id, topic = topic.key(), error = %e, "completion failed");
            replies::UNAVAILABLE.to_string()
        }
    }
}

/// Stored history with the topic request as the final user turn.
fn prediction_messages(history: &[Message], topic: Topic, profile: &Profile) -> Vec<ChatMessage> {
    let mut messages = history_to_chat(history);
    // the raw menu pick ("3") is replaced by the expanded request
    if messages.last().is_some_and(|m| m.role == Role::User.as_str()) {
        messages.pop();
    }
    messages.push(ChatMessage::user(prompt::topic_request(topic, profile)));
    messages
}

pub fn history_to_chat(history: &[Message]) -> Vec<ChatMessage> {
    history
        .iter()
        .map(|m| match m.role() {
            Role::User => ChatMessage::user(m.content.clone()),
            Role::Assistant => ChatMessage::assistant(m.content.clone()),
        })
        .collect()
}

pub async fn save_reply(state: &AppState, session_id: &str, reply: &str) {
    if let Err(e) = state
        .store
        .insert_message(session_id, Role::Assistant, reply)
        .await
    {
        tracing::warn!(session_id, error = %e, "failed to store bot reply");
    }
}
