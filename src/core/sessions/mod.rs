//! Session-scoped state for a running conversation.
//!
//! [`SessionContext`] remembers actions and responses created while the
//! session runs (for example during interactive story authoring), and
//! [`Conversation`] ties a tracker to that context and applies action
//! outcomes to it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::core::actions::{Action, ActionExecutor, ActionOutcome, RemoteAction};
use crate::core::domain::Domain;
use crate::core::events::{ACTION_LISTEN_NAME, Event, EventKind};
use crate::core::tracker::Tracker;
use crate::error::ActionError;

/// Actions and responses introduced during the current session.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    new_actions: BTreeSet<String>,
    new_responses: BTreeMap<String, Vec<String>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_new_action(&mut self, action_name: impl Into<String>) {
        self.new_actions.insert(action_name.into());
    }

    pub fn register_new_response(&mut self, response_name: impl Into<String>, text: impl Into<String>) {
        let response_name = response_name.into();
        self.new_actions.insert(response_name.clone());
        self.new_responses
            .entry(response_name)
            .or_default()
            .push(text.into());
    }

    pub fn is_new_action(&self, action_name: &str) -> bool {
        self.new_actions.contains(action_name)
    }

    pub fn new_actions(&self) -> &BTreeSet<String> {
        &self.new_actions
    }

    pub fn new_responses(&self) -> &BTreeMap<String, Vec<String>> {
        &self.new_responses
    }

    /// A remote action for `action_name`; actions created in this session
    /// are provisional.
    pub fn remote_action(
        &self,
        action_name: impl Into<String>,
        executor: Arc<dyn ActionExecutor>,
    ) -> RemoteAction {
        let action_name = action_name.into();
        if self.is_new_action(&action_name) {
            RemoteAction::provisional(action_name, executor)
        } else {
            RemoteAction::new(action_name, executor)
        }
    }
}

/// Whether choosing `action_name` now means the active loop was rejected.
pub fn form_is_rejected(action_name: &str, tracker: &Tracker) -> bool {
    tracker
        .active_loop_name()
        .is_some_and(|name| action_name != name && action_name != ACTION_LISTEN_NAME)
}

/// Whether `action_name` resumes the active loop after it was rejected.
pub fn form_is_restored(action_name: &str, tracker: &Tracker) -> bool {
    tracker.active_loop().is_some_and(|active_loop| {
        active_loop.rejected
            && tracker.latest_action_name() == Some(ACTION_LISTEN_NAME)
            && action_name == active_loop.name
    })
}

/// Events to log when a user corrects the bot's choice of `action_name`.
///
/// Picking something other than the active loop rejects the loop. Picking
/// the loop again after a rejection may switch its input validation off
/// (`validate_input == Some(false)`) or back on.
pub fn loop_correction_events(
    action_name: &str,
    tracker: &Tracker,
    validate_input: Option<bool>,
) -> Vec<Event> {
    if form_is_rejected(action_name, tracker) {
        return vec![Event::active_loop_rejected(
            tracker.active_loop_name().map(str::to_string),
        )];
    }
    if !form_is_restored(action_name, tracker) {
        return Vec::new();
    }
    let currently_validating = tracker
        .active_loop()
        .is_some_and(|active_loop| active_loop.validate);
    match validate_input {
        Some(false) => vec![Event::form_validation(false)],
        Some(true) if !currently_validating => {
            tracing::warn!(
                action = action_name,
                "loop was predicted not to validate input; remove contradictory stories"
            );
            vec![Event::form_validation(true)]
        }
        _ => Vec::new(),
    }
}

/// Events that undo the latest bot action or user message, whichever came last.
pub fn undo_latest(tracker: &Tracker) -> Vec<Event> {
    let latest = tracker.events().iter().rev().find(|event| {
        matches!(
            event.kind(),
            EventKind::ActionExecuted { .. } | EventKind::UserUttered(_) | EventKind::Restarted
        )
    });
    match latest.map(Event::kind) {
        Some(EventKind::ActionExecuted { .. }) => vec![Event::action_reverted()],
        Some(EventKind::UserUttered(_)) => {
            vec![Event::user_utterance_reverted(), Event::action_listen()]
        }
        _ => Vec::new(),
    }
}

/// Splits `events` at restarts, dropping the restart events and empty parts.
pub fn split_conversation_at_restarts(events: &[Event]) -> Vec<Vec<Event>> {
    events
        .split(|event| matches!(event.kind(), EventKind::Restarted))
        .filter(|part| !part.is_empty())
        .map(<[Event]>::to_vec)
        .collect()
}

/// A tracker together with its session context.
#[derive(Debug, Clone)]
pub struct Conversation {
    tracker: Tracker,
    session: SessionContext,
}

impl Conversation {
    pub fn new(tracker: Tracker) -> Self {
        Self {
            tracker,
            session: SessionContext::new(),
        }
    }

    pub fn with_session(tracker: Tracker, session: SessionContext) -> Self {
        Self { tracker, session }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionContext {
        &mut self.session
    }

    pub fn into_tracker(self) -> Tracker {
        self.tracker
    }

    pub fn append(&mut self, events: impl IntoIterator<Item = Event>) {
        self.tracker.extend(events);
    }

    /// Runs `action` and logs the result: `ActionExecuted` followed by the
    /// action's events, or the rejection event if it declined to run.
    /// Fatal errors leave the tracker untouched.
    pub async fn execute(
        &mut self,
        action: &dyn Action,
        domain: &Domain,
    ) -> Result<ActionOutcome, ActionError> {
        let outcome = action.run(&self.tracker, domain).await?;
        match &outcome {
            ActionOutcome::Completed(events) => {
                self.tracker.append(Event::action(action.name()));
                self.tracker.extend(events.iter().cloned());
            }
            ActionOutcome::Rejected(rejection) => {
                tracing::debug!(action = %rejection.action_name, reason = %rejection.reason, "action rejected");
                self.tracker.append(rejection.event());
            }
        }
        Ok(outcome)
    }

    /// Runs a custom action by name; actions registered as new in this
    /// session tolerate an unreachable action server.
    pub async fn execute_remote(
        &mut self,
        action_name: &str,
        executor: Arc<dyn ActionExecutor>,
        domain: &Domain,
    ) -> Result<ActionOutcome, ActionError> {
        let action = self.session.remote_action(action_name, executor);
        self.execute(&action, domain).await
    }
}
