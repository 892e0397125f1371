//! Dialogue phases and the rules that move a session between them.

use std::fmt;

use super::extract::contains_date;
use super::profile::ProfileState;
use super::topic::select_topic;

/// Step of the onboarding / topic-selection dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    NeedsGreeting,
    AwaitingTopic,
    AwaitingBirthData,
    ReadyForTopicSelection,
    ReadyForPrediction,
}

/// Text fragments of the bot's own prompts, used to recover the phase of
/// sessions that have no persisted state row. Checked in order.
const BOT_MARKERS: &[(&str, Phase)] = &[
    ("Данные сохранены", Phase::ReadyForTopicSelection),
    ("Не хватает данных", Phase::AwaitingBirthData),
    ("Укажите дату", Phase::NeedsGreeting),
    ("Выберите тему", Phase::AwaitingTopic),
];

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeedsGreeting => "NEEDS_GREETING",
            Self::AwaitingTopic => "AWAITING_TOPIC",
            Self::AwaitingBirthData => "AWAITING_BIRTH_DATA",
            Self::ReadyForTopicSelection => "READY_FOR_TOPIC_SELECTION",
            Self::ReadyForPrediction => "READY_FOR_PREDICTION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEEDS_GREETING" => Some(Self::NeedsGreeting),
            "AWAITING_TOPIC" => Some(Self::AwaitingTopic),
            "AWAITING_BIRTH_DATA" => Some(Self::AwaitingBirthData),
            "READY_FOR_TOPIC_SELECTION" => Some(Self::ReadyForTopicSelection),
            "READY_FOR_PREDICTION" => Some(Self::ReadyForPrediction),
            _ => None,
        }
    }

    /// Best guess at the phase a bot message left the dialogue in.
    pub fn infer_from_bot_message(text: &str) -> Option<Self> {
        BOT_MARKERS
            .iter()
            .find(|(marker, _)| text.contains(marker))
            .map(|(_, phase)| *phase)
    }

    /// Legal edges of the dialogue graph.
    pub fn can_transition_to(&self, next: Phase) -> bool {
        use Phase::*;
        match self {
            NeedsGreeting => matches!(next, NeedsGreeting | ReadyForTopicSelection),
            AwaitingBirthData => matches!(next, AwaitingBirthData | ReadyForTopicSelection),
            ReadyForTopicSelection | AwaitingTopic | ReadyForPrediction => matches!(
                next,
                AwaitingTopic | ReadyForTopicSelection | ReadyForPrediction
            ),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Option<Phase>,
    pub to: Phase,
}

impl Transition {
    /// A fresh session may land anywhere.
    pub fn is_expected(&self) -> bool {
        self.from.map_or(true, |from| from.can_transition_to(self.to))
    }
}

/// Decide the phase a message moves the dialogue into.
///
/// A date in the message always wins: it is (re)extracted and saved, and the
/// topic menu follows. Topic numbers are only looked at once the profile is
/// complete.
pub fn resolve(state: ProfileState, previous: Option<Phase>, message: &str) -> Transition {
    let to = if contains_date(message) {
        Phase::ReadyForTopicSelection
    } else {
        match state {
            ProfileState::None => Phase::NeedsGreeting,
            ProfileState::Partial => Phase::AwaitingBirthData,
            ProfileState::Complete if select_topic(message).is_some() => {
                Phase::ReadyForPrediction
            }
            ProfileState::Complete => Phase::AwaitingTopic,
        }
    };
    Transition { from: previous, to }
}
