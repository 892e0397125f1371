//! Dialogue state and birth-data extraction.
//!
//! Everything here is pure: no I/O, no clocks. Handlers feed in the stored
//! profile and the previous phase, and get back a [`TurnPlan`] describing what
//! to save and what to ask the model.

pub mod extract;
pub mod phase;
pub mod profile;
pub mod topic;

use chrono::NaiveDate;

use extract::{ExtractionNote, Extractor};
use phase::{Phase, Transition};
use profile::{Field, Profile};
use topic::Topic;

pub struct TurnInput<'a> {
    pub message: &'a str,
    pub profile: Option<&'a Profile>,
    pub previous: Option<Phase>,
    pub today: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnPlan {
    pub transition: Transition,
    /// Full profile to upsert, already merged over the stored one.
    pub patch: Option<Profile>,
    pub topic: Option<Topic>,
    /// Fields to ask for when the profile is still partial.
    pub missing: Vec<Field>,
    pub notes: Vec<ExtractionNote>,
}

impl TurnPlan {
    pub fn phase(&self) -> Phase {
        self.transition.to
    }
}

pub fn plan_turn(extractor: &Extractor, input: TurnInput<'_>) -> TurnPlan {
    let message = input.message.trim();
    let state = profile::classify(input.profile);
    let transition = phase::resolve(state, input.previous, message);

    let mut plan = TurnPlan {
        transition,
        patch: None,
        topic: None,
        missing: Vec::new(),
        notes: Vec::new(),
    };

    match transition.to {
        Phase::ReadyForTopicSelection => {
            if let Some(result) = extractor.extract(message, input.today) {
                plan.notes = result.notes.clone();
                let extracted = result.into_profile();
                plan.patch = Some(match input.profile {
                    Some(stored) => stored.merge(&extracted),
                    None => extracted,
                });
            }
        }
        Phase::AwaitingBirthData => {
            let missing = profile::missing_fields(input.profile);
            match input
                .profile
                .and_then(|stored| fill_missing(extractor, message, stored, &missing))
            {
                Some(completed) => {
                    plan.transition.to = Phase::ReadyForTopicSelection;
                    plan.patch = Some(completed);
                }
                None => plan.missing = missing,
            }
        }
        Phase::ReadyForPrediction => plan.topic = topic::select_topic(message),
        Phase::NeedsGreeting | Phase::AwaitingTopic => {}
    }

    plan
}

/// Try to complete a partial profile from a message without a date.
///
/// The date itself can only come through the full extractor, and bare topic
/// numbers are never read as an hour. Without a date there is no context to
/// tell a place from chatter, so the city needs an explicit `город:` marker.
fn fill_missing(
    extractor: &Extractor,
    message: &str,
    stored: &Profile,
    missing: &[Field],
) -> Option<Profile> {
    if missing.contains(&Field::Birthdate) || topic::select_topic(message).is_some() {
        return None;
    }

    let mut patch = Profile::default();
    for field in missing {
        match field {
            Field::Birthtime => {
                patch.birthtime = Some(extractor.extract_time(message)?.to_string());
            }
            Field::City => patch.city = Some(extractor.extract_marked_city(message)?),
            Field::Birthdate => return None,
        }
    }

    let merged = stored.merge(&patch);
    merged.is_complete().then_some(merged)
}
