//! Typed conversation events.
//!
//! Every change to a conversation is recorded as an [`Event`]. Events are
//! immutable once created: the tracker never edits one in place, it appends
//! a compensating event instead (`ActionReverted`, `UserUtteranceReverted`,
//! `Restarted`).

mod wire;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the action that hands control back to the user.
pub const ACTION_LISTEN_NAME: &str = "action_listen";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor: Option<String>,
}

impl Entity {
    pub fn new(entity: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            entity: entity.into(),
            value: value.into(),
            role: None,
            group: None,
            start: None,
            end: None,
            confidence: None,
            extractor: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// NLU output attached to a user message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub parse_data: ParseData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_channel: Option<String>,
}

impl UserMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_intent(mut self, name: impl Into<String>) -> Self {
        self.parse_data.intent = Some(Intent {
            name: name.into(),
            confidence: Some(1.0),
        });
        self
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.parse_data.entities.push(entity);
        self
    }

    pub fn intent_name(&self) -> Option<&str> {
        self.parse_data.intent.as_ref().map(|intent| intent.name.as_str())
    }

    pub fn entities(&self) -> &[Entity] {
        &self.parse_data.entities
    }
}

/// The closed set of things that can happen in a conversation.
#[derive(Debug, Clone, PartialEq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    SlotSet {
        name: String,
        value: Value,
    },
    UserUttered(UserMessage),
    BotUttered {
        text: Option<String>,
        data: Map<String, Value>,
    },
    ActionExecuted {
        action_name: String,
        policy: Option<String>,
        confidence: Option<f64>,
    },
    /// Undoes everything back to and including the latest `ActionExecuted`.
    ActionReverted,
    /// Undoes everything back to and including the latest `UserUttered`.
    UserUtteranceReverted,
    Restarted,
    FormActivated {
        name: String,
    },
    FormDeactivated,
    FormValidation {
        validate: bool,
    },
    ActiveLoopRejected {
        name: Option<String>,
    },
}

/// A timestamped, immutable conversation event.
///
/// Equality compares only the described change: timestamps and metadata are
/// ignored so that `events.contains(&Event::form_deactivated())` works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "wire::WireEvent", into = "wire::WireEvent")]
pub struct Event {
    kind: EventKind,
    timestamp: f64,
    metadata: Option<Map<String, Value>>,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            timestamp: now_timestamp(),
            metadata: None,
        }
    }

    pub fn slot_set(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(EventKind::SlotSet {
            name: name.into(),
            value: value.into(),
        })
    }

    pub fn user(message: UserMessage) -> Self {
        Self::new(EventKind::UserUttered(message))
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(EventKind::BotUttered {
            text: Some(text.into()),
            data: Map::new(),
        })
    }

    pub fn action(name: impl Into<String>) -> Self {
        Self::new(EventKind::ActionExecuted {
            action_name: name.into(),
            policy: None,
            confidence: None,
        })
    }

    pub fn action_with_policy(
        name: impl Into<String>,
        policy: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self::new(EventKind::ActionExecuted {
            action_name: name.into(),
            policy: Some(policy.into()),
            confidence: Some(confidence),
        })
    }

    pub fn action_listen() -> Self {
        Self::action(ACTION_LISTEN_NAME)
    }

    pub fn action_reverted() -> Self {
        Self::new(EventKind::ActionReverted)
    }

    pub fn user_utterance_reverted() -> Self {
        Self::new(EventKind::UserUtteranceReverted)
    }

    pub fn restarted() -> Self {
        Self::new(EventKind::Restarted)
    }

    pub fn form_activated(name: impl Into<String>) -> Self {
        Self::new(EventKind::FormActivated { name: name.into() })
    }

    pub fn form_deactivated() -> Self {
        Self::new(EventKind::FormDeactivated)
    }

    pub fn form_validation(validate: bool) -> Self {
        Self::new(EventKind::FormValidation { validate })
    }

    pub fn active_loop_rejected(name: Option<String>) -> Self {
        Self::new(EventKind::ActiveLoopRejected { name })
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }

    /// The executed action's name, if this is an `ActionExecuted` event.
    pub fn action_name(&self) -> Option<&str> {
        match &self.kind {
            EventKind::ActionExecuted { action_name, .. } => Some(action_name),
            _ => None,
        }
    }

    pub fn is_action_listen(&self) -> bool {
        self.action_name() == Some(ACTION_LISTEN_NAME)
    }
}

/// Parses a JSON array of wire events.
pub fn deserialise_events(value: Value) -> Result<Vec<Event>, serde_json::Error> {
    serde_json::from_value(value)
}

/// Serialises events into the wire format used by the action server.
pub fn serialise_events(events: &[Event]) -> Value {
    Value::Array(
        events
            .iter()
            .map(|event| serde_json::to_value(event).unwrap_or(Value::Null))
            .collect(),
    )
}
