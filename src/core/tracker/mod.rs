//! Conversation tracker: an append-only event log plus the state it folds to.

mod state;

pub use state::{ActiveLoop, DialogueState, SlotSchema, applied_events};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::core::domain::SlotSpec;
use crate::core::events::{Event, EventKind, UserMessage};

/// Maintains the state of a single conversation.
///
/// The state is updated incrementally on [`Tracker::append`]; only reverts
/// trigger a replay of the events since the last restart. A tracker built
/// from an event list is therefore indistinguishable from one that had the
/// same events appended one by one.
#[derive(Debug, Clone)]
pub struct Tracker {
    sender_id: String,
    events: Vec<Event>,
    generation_start: usize,
    schema: Arc<SlotSchema>,
    state: DialogueState,
}

impl Tracker {
    pub fn new(sender_id: impl Into<String>, slots: &[SlotSpec]) -> Self {
        Self::with_schema(sender_id, Arc::new(SlotSchema::from_slots(slots)))
    }

    pub fn with_schema(sender_id: impl Into<String>, schema: Arc<SlotSchema>) -> Self {
        let state = DialogueState::initial(&schema);
        Self {
            sender_id: sender_id.into(),
            events: Vec::new(),
            generation_start: 0,
            schema,
            state,
        }
    }

    /// A tracker for a new conversation with a random sender id.
    pub fn new_conversation(slots: &[SlotSpec]) -> Self {
        Self::new(uuid::Uuid::new_v4().simple().to_string(), slots)
    }

    pub fn from_events(
        sender_id: impl Into<String>,
        events: impl IntoIterator<Item = Event>,
        slots: &[SlotSpec],
    ) -> Self {
        let mut tracker = Self::new(sender_id, slots);
        tracker.extend(events);
        tracker
    }

    /// A copy of this tracker with `extra` appended. The original is untouched.
    pub fn hypothetical<'a>(&self, extra: impl IntoIterator<Item = &'a Event>) -> Self {
        let mut copy = self.clone();
        copy.extend(extra.into_iter().cloned());
        copy
    }

    pub fn append(&mut self, event: Event) {
        match event.kind() {
            EventKind::Restarted => {
                self.events.push(event);
                self.generation_start = self.events.len();
                self.state = DialogueState::initial(&self.schema);
            }
            EventKind::ActionReverted | EventKind::UserUtteranceReverted => {
                self.events.push(event);
                self.state = DialogueState::replay(
                    &self.schema,
                    &self.events[self.generation_start..],
                );
            }
            _ => {
                self.state.apply(&event, &self.schema);
                self.events.push(event);
            }
        }
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.append(event);
        }
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn with_sender_id(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = sender_id.into();
        self
    }

    pub fn schema(&self) -> &Arc<SlotSchema> {
        &self.schema
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events after the most recent `Restarted`, or all events if there was none.
    pub fn events_since_last_restart(&self) -> std::slice::Iter<'_, Event> {
        self.events[self.generation_start..].iter()
    }

    /// Events that still shape the state after reverts are resolved.
    pub fn applied_events(&self) -> Vec<&Event> {
        let events: Vec<&Event> = self.events.iter().collect();
        applied_events(&events)
    }

    pub fn state(&self) -> &DialogueState {
        &self.state
    }

    /// The slot's current value. An unset slot and a slot set to `null` are
    /// both reported as `None`.
    pub fn get_slot(&self, name: &str) -> Option<&Value> {
        self.state.slots().get(name).filter(|value| !value.is_null())
    }

    pub fn slots(&self) -> &BTreeMap<String, Value> {
        self.state.slots()
    }

    pub fn active_loop(&self) -> Option<&ActiveLoop> {
        self.state.active_loop()
    }

    pub fn active_loop_name(&self) -> Option<&str> {
        self.active_loop().map(|active_loop| active_loop.name.as_str())
    }

    pub fn latest_action_name(&self) -> Option<&str> {
        self.state.latest_action_name()
    }

    pub fn latest_message(&self) -> Option<&UserMessage> {
        self.state.latest_message()
    }

    pub fn latest_intent_name(&self) -> Option<&str> {
        self.latest_message().and_then(UserMessage::intent_name)
    }

    /// Values of `entity` in the latest user message.
    ///
    /// `role` and `group` match exactly: `None` only matches entities that
    /// carry no role (or group) at all.
    pub fn get_latest_entity_values<'a>(
        &'a self,
        entity: &'a str,
        role: Option<&'a str>,
        group: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Value> + 'a {
        self.latest_message()
            .map(UserMessage::entities)
            .unwrap_or_default()
            .iter()
            .filter(move |candidate| {
                candidate.entity == entity
                    && candidate.role.as_deref() == role
                    && candidate.group.as_deref() == group
            })
            .map(|candidate| &candidate.value)
    }

    pub fn latest_event_time(&self) -> Option<f64> {
        self.events.last().map(Event::timestamp)
    }

    /// The serialisable view sent to action servers.
    pub fn snapshot(&self) -> TrackerSnapshot<'_> {
        TrackerSnapshot {
            sender_id: &self.sender_id,
            slots: self.state.slots(),
            latest_message: self.state.latest_message(),
            latest_action_name: self.state.latest_action_name(),
            active_loop: self.state.active_loop(),
            latest_event_time: self.latest_event_time(),
            events: self.events.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackerSnapshot<'a> {
    pub sender_id: &'a str,
    pub slots: &'a BTreeMap<String, Value>,
    pub latest_message: Option<&'a UserMessage>,
    pub latest_action_name: Option<&'a str>,
    pub active_loop: Option<&'a ActiveLoop>,
    pub latest_event_time: Option<f64>,
    pub events: Vec<&'a Event>,
}

#[cfg(test)]
mod tests;
