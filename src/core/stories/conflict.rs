use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::core::domain::Domain;
use crate::core::events::{ACTION_LISTEN_NAME, EventKind};
use crate::core::tracker::Tracker;

/// Sample trackers kept per competing action.
const MAX_EXAMPLES_PER_ACTION: usize = 5;

/// What a policy sees right before predicting the next action.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TurnState {
    pub prev_action: Option<String>,
    /// Only present right after the user spoke.
    pub intent: Option<String>,
    pub slots: BTreeMap<String, String>,
    pub active_loop: Option<String>,
}

impl TurnState {
    /// Only slots that influence the conversation are part of the state.
    pub fn from_tracker(tracker: &Tracker, domain: &Domain) -> Self {
        let prev_action = tracker.latest_action_name().map(str::to_string);
        let intent = if prev_action.as_deref() == Some(ACTION_LISTEN_NAME) {
            tracker.latest_intent_name().map(str::to_string)
        } else {
            None
        };
        let slots = tracker
            .slots()
            .iter()
            .filter(|(name, value)| {
                !value.is_null()
                    && domain
                        .slot(name)
                        .is_some_and(|slot| slot.influence_conversation)
            })
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();

        Self {
            prev_action,
            intent,
            slots,
            active_loop: tracker.active_loop_name().map(str::to_string),
        }
    }
}

/// Two or more stories predict different actions after the same history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoryConflict {
    pub conversation_history_hash: String,
    pub competing_next_actions: BTreeSet<String>,
    /// Sender ids of trackers that predict each action, capped per action.
    pub example_trackers: BTreeMap<String, Vec<String>>,
    pub sliced_states: Vec<TurnState>,
}

impl StoryConflict {
    fn describe_history(&self) -> String {
        match self.sliced_states.last() {
            Some(TurnState {
                intent: Some(intent),
                ..
            }) => format!("after intent '{intent}'"),
            Some(TurnState {
                prev_action: Some(action),
                ..
            }) => format!("after action '{action}'"),
            _ => "at the beginning of stories".to_string(),
        }
    }
}

impl fmt::Display for StoryConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Story structure conflict {}:", self.describe_history())?;
        for (action, stories) in &self.example_trackers {
            let stories = stories
                .iter()
                .map(|story| format!("'{story}'"))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(f, "  {action} predicted in {stories}")?;
        }
        Ok(())
    }
}

/// Hex SHA-256 of the canonical JSON of `states`.
pub fn fingerprint(states: &[TurnState]) -> String {
    let canonical = serde_json::to_vec(states).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}

/// Keeps the last `max_history` turns. Zero means the full history.
fn sliced(states: &[TurnState], max_history: Option<usize>) -> &[TurnState] {
    match max_history.filter(|&max| max > 0) {
        Some(max) if states.len() > max => &states[states.len() - max..],
        _ => states,
    }
}

#[derive(Default)]
struct Occurrences {
    sliced_states: Vec<TurnState>,
    actions: BTreeMap<String, Vec<String>>,
}

/// Finds histories after which the trackers disagree on the next action.
///
/// `max_history` limits how many turns are compared; `None` compares the
/// full history. Conflicts are sorted by history hash.
pub fn find_story_conflicts(
    trackers: &[Tracker],
    domain: &Domain,
    max_history: Option<usize>,
) -> Vec<StoryConflict> {
    let mut by_history: BTreeMap<String, Occurrences> = BTreeMap::new();

    for tracker in trackers {
        let mut replay = Tracker::with_schema(tracker.sender_id(), tracker.schema().clone());
        let mut states = Vec::new();
        for event in tracker.events() {
            if let EventKind::ActionExecuted { action_name, .. } = event.kind() {
                states.push(TurnState::from_tracker(&replay, domain));
                let window = sliced(&states, max_history);
                let occurrences = by_history.entry(fingerprint(window)).or_default();
                if occurrences.sliced_states.is_empty() {
                    occurrences.sliced_states = window.to_vec();
                }
                let examples = occurrences.actions.entry(action_name.clone()).or_default();
                if examples.len() < MAX_EXAMPLES_PER_ACTION
                    && !examples.iter().any(|sender| sender == tracker.sender_id())
                {
                    examples.push(tracker.sender_id().to_string());
                }
            }
            replay.append(event.clone());
        }
    }

    let conflicts: Vec<StoryConflict> = by_history
        .into_iter()
        .filter(|(_, occurrences)| occurrences.actions.len() > 1)
        .map(|(hash, occurrences)| StoryConflict {
            conversation_history_hash: hash,
            competing_next_actions: occurrences.actions.keys().cloned().collect(),
            example_trackers: occurrences.actions,
            sliced_states: occurrences.sliced_states,
        })
        .collect();

    for conflict in &conflicts {
        tracing::warn!("{conflict}");
    }
    conflicts
}
