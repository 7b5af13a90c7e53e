use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::core::domain::SlotSpec;
use crate::core::events::{Event, EventKind, UserMessage};

/// Declared slots and their initial values.
///
/// Shared between every tracker of a conversation (and every hypothetical
/// copy of it), so it is built once and handed around behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotSchema {
    initial: BTreeMap<String, Value>,
}

impl SlotSchema {
    pub fn from_slots(slots: &[SlotSpec]) -> Self {
        Self {
            initial: slots
                .iter()
                .map(|slot| (slot.name.clone(), slot.initial_value.clone()))
                .collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.initial.contains_key(name)
    }

    pub fn initial_values(&self) -> &BTreeMap<String, Value> {
        &self.initial
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveLoop {
    pub name: String,
    /// Whether the next user input should be validated against the loop.
    pub validate: bool,
    /// Set when the loop's last run could not extract the requested slot.
    pub rejected: bool,
}

impl ActiveLoop {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            validate: true,
            rejected: false,
        }
    }
}

/// Everything a conversation's event log folds down to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DialogueState {
    slots: BTreeMap<String, Value>,
    active_loop: Option<ActiveLoop>,
    latest_action_name: Option<String>,
    latest_message: Option<UserMessage>,
    latest_bot_utterance: Option<String>,
}

impl DialogueState {
    pub fn initial(schema: &SlotSchema) -> Self {
        Self {
            slots: schema.initial.clone(),
            ..Self::default()
        }
    }

    /// Folds every event of `events`, honouring restarts and reverts.
    pub fn replay<'a>(schema: &SlotSchema, events: impl IntoIterator<Item = &'a Event>) -> Self {
        let events: Vec<&Event> = events.into_iter().collect();
        let mut state = Self::initial(schema);
        for event in applied_events(&events) {
            state.apply(event, schema);
        }
        state
    }

    /// Applies a single event.
    ///
    /// Reverts are not handled here: they need the history they undo and are
    /// resolved by [`DialogueState::replay`].
    pub fn apply(&mut self, event: &Event, schema: &SlotSchema) {
        match event.kind() {
            EventKind::SlotSet { name, value } => {
                if schema.contains(name) {
                    self.slots.insert(name.clone(), value.clone());
                } else {
                    tracing::warn!(
                        slot = %name,
                        "tried to set non existent slot; make sure the slot is listed in the domain"
                    );
                }
            }
            EventKind::UserUttered(message) => self.latest_message = Some(message.clone()),
            EventKind::BotUttered { text, .. } => self.latest_bot_utterance.clone_from(text),
            EventKind::ActionExecuted { action_name, .. } => {
                self.latest_action_name = Some(action_name.clone());
                if let Some(active_loop) = &mut self.active_loop {
                    active_loop.validate = true;
                    if active_loop.name == *action_name {
                        active_loop.rejected = false;
                    }
                }
            }
            EventKind::FormActivated { name } => self.active_loop = Some(ActiveLoop::new(name)),
            EventKind::FormDeactivated => self.active_loop = None,
            EventKind::FormValidation { validate } => {
                if let Some(active_loop) = &mut self.active_loop {
                    active_loop.validate = *validate;
                }
            }
            EventKind::ActiveLoopRejected { name } => {
                if let Some(active_loop) = &mut self.active_loop
                    && name.as_deref().is_none_or(|name| name == active_loop.name)
                {
                    active_loop.rejected = true;
                }
            }
            EventKind::Restarted => *self = Self::initial(schema),
            EventKind::ActionReverted | EventKind::UserUtteranceReverted => {}
        }
    }

    pub fn slots(&self) -> &BTreeMap<String, Value> {
        &self.slots
    }

    pub fn active_loop(&self) -> Option<&ActiveLoop> {
        self.active_loop.as_ref()
    }

    pub fn latest_action_name(&self) -> Option<&str> {
        self.latest_action_name.as_deref()
    }

    pub fn latest_message(&self) -> Option<&UserMessage> {
        self.latest_message.as_ref()
    }

    pub fn latest_bot_utterance(&self) -> Option<&str> {
        self.latest_bot_utterance.as_deref()
    }
}

/// The events that still contribute to the current state once restarts and
/// reverts are taken into account.
pub fn applied_events<'a>(events: &[&'a Event]) -> Vec<&'a Event> {
    let mut applied: Vec<&Event> = Vec::with_capacity(events.len());
    for &event in events {
        match event.kind() {
            EventKind::Restarted => applied.clear(),
            EventKind::ActionReverted => {
                undo_until(&mut applied, |kind| {
                    matches!(kind, EventKind::ActionExecuted { .. })
                });
            }
            // Also drops the `action_listen` that preceded the message.
            EventKind::UserUtteranceReverted => {
                undo_until(&mut applied, |kind| matches!(kind, EventKind::UserUttered(_)));
                undo_until(&mut applied, |kind| {
                    matches!(kind, EventKind::ActionExecuted { .. })
                });
            }
            _ => applied.push(event),
        }
    }
    applied
}

fn undo_until(applied: &mut Vec<&Event>, is_boundary: impl Fn(&EventKind) -> bool) {
    while let Some(event) = applied.pop() {
        if is_boundary(event.kind()) {
            return;
        }
    }
}
