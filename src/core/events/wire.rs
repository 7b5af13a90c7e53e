use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Event, EventKind, ParseData, UserMessage, now_timestamp};

/// JSON shape of an event as exchanged with action servers and stored in
/// event logs: `{"event": "<tag>", ...fields, "timestamp": ..., "metadata": ...}`.
#[derive(Serialize, Deserialize)]
pub(super) struct WireEvent {
    #[serde(flatten)]
    kind: WireKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "event")]
enum WireKind {
    #[serde(rename = "slot")]
    Slot {
        name: String,
        #[serde(default)]
        value: Value,
    },
    #[serde(rename = "user")]
    User {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default)]
        parse_data: ParseData,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_channel: Option<String>,
    },
    #[serde(rename = "bot")]
    Bot {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        data: Map<String, Value>,
    },
    #[serde(rename = "action")]
    Action {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        policy: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },
    #[serde(rename = "undo")]
    Undo {},
    #[serde(rename = "rewind")]
    Rewind {},
    #[serde(rename = "restart")]
    Restart {},
    #[serde(rename = "form", alias = "active_loop")]
    Form {
        #[serde(default)]
        name: Option<String>,
    },
    #[serde(rename = "form_validation")]
    FormValidation { validate: bool },
    #[serde(rename = "action_execution_rejected")]
    ActionExecutionRejected {
        #[serde(default)]
        name: Option<String>,
    },
}

impl From<WireEvent> for Event {
    fn from(wire: WireEvent) -> Self {
        let kind = match wire.kind {
            WireKind::Slot { name, value } => EventKind::SlotSet { name, value },
            WireKind::User {
                text,
                parse_data,
                input_channel,
            } => EventKind::UserUttered(UserMessage {
                text,
                parse_data,
                input_channel,
            }),
            WireKind::Bot { text, data } => EventKind::BotUttered { text, data },
            WireKind::Action {
                name,
                policy,
                confidence,
            } => EventKind::ActionExecuted {
                action_name: name,
                policy,
                confidence,
            },
            WireKind::Undo {} => EventKind::ActionReverted,
            WireKind::Rewind {} => EventKind::UserUtteranceReverted,
            WireKind::Restart {} => EventKind::Restarted,
            WireKind::Form { name: Some(name) } => EventKind::FormActivated { name },
            WireKind::Form { name: None } => EventKind::FormDeactivated,
            WireKind::FormValidation { validate } => EventKind::FormValidation { validate },
            WireKind::ActionExecutionRejected { name } => EventKind::ActiveLoopRejected { name },
        };

        Self {
            kind,
            timestamp: wire.timestamp.unwrap_or_else(now_timestamp),
            metadata: wire.metadata,
        }
    }
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        let kind = match event.kind {
            EventKind::SlotSet { name, value } => WireKind::Slot { name, value },
            EventKind::UserUttered(message) => WireKind::User {
                text: message.text,
                parse_data: message.parse_data,
                input_channel: message.input_channel,
            },
            EventKind::BotUttered { text, data } => WireKind::Bot { text, data },
            EventKind::ActionExecuted {
                action_name,
                policy,
                confidence,
            } => WireKind::Action {
                name: action_name,
                policy,
                confidence,
            },
            EventKind::ActionReverted => WireKind::Undo {},
            EventKind::UserUtteranceReverted => WireKind::Rewind {},
            EventKind::Restarted => WireKind::Restart {},
            EventKind::FormActivated { name } => WireKind::Form { name: Some(name) },
            EventKind::FormDeactivated => WireKind::Form { name: None },
            EventKind::FormValidation { validate } => WireKind::FormValidation { validate },
            EventKind::ActiveLoopRejected { name } => WireKind::ActionExecutionRejected { name },
        };

        Self {
            kind,
            timestamp: Some(event.timestamp),
            metadata: event.metadata,
        }
    }
}
