//! Actions and the gateway to remote action servers.
//!
//! An [`Action`] runs against a tracker and returns the events it produced.
//! The caller is responsible for logging the `ActionExecuted` event itself.
//! Custom actions are executed through an [`ActionExecutor`]: either the
//! HTTP gateway ([`HttpActionExecutor`]) or pre-canned stubs
//! ([`StubActionExecutor`]) for end-to-end tests.

mod http;
mod stub;

pub use http::HttpActionExecutor;
pub use stub::{
    STUB_KEY_SEPARATOR, StubActionExecutor, StubCustomAction, StubRegistry,
    stub_custom_action_key,
};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::domain::Domain;
use crate::core::events::{Event, EventKind};
use crate::core::tracker::{Tracker, TrackerSnapshot};
use crate::error::ActionError;

/// Boxed future returned by the action traits.
pub type ActionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ActionError>> + Send + 'a>>;

/// Anything that can run as the bot's next action.
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    fn run<'a>(&'a self, tracker: &'a Tracker, domain: &'a Domain)
    -> ActionFuture<'a, ActionOutcome>;
}

/// Executes custom actions by name.
pub trait ActionExecutor: Send + Sync {
    fn run<'a>(
        &'a self,
        action_name: &'a str,
        tracker: &'a Tracker,
        domain: &'a Domain,
    ) -> ActionFuture<'a, ActionResponse>;
}

/// What an action server sends back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub responses: Vec<Value>,
}

impl ActionResponse {
    /// The bot utterances for `responses`, followed by `events`.
    pub fn into_events(self) -> Vec<Event> {
        let mut events: Vec<Event> = self.responses.into_iter().map(response_to_event).collect();
        events.extend(self.events);
        events
    }
}

fn response_to_event(response: Value) -> Event {
    let mut data = match response {
        Value::Object(object) => object,
        Value::String(text) => {
            return Event::bot(text);
        }
        other => {
            let mut object = Map::new();
            object.insert("custom".into(), other);
            object
        }
    };
    let text = match data.remove("text") {
        Some(Value::String(text)) => Some(text),
        _ => None,
    };
    if text.is_none() {
        tracing::debug!(?data, "action response carries no text");
    }
    Event::new(EventKind::BotUttered { text, data })
}

/// Request body posted to an action server.
#[derive(Debug, Serialize)]
pub struct ActionRequest<'a> {
    pub next_action: &'a str,
    pub sender_id: &'a str,
    pub tracker: TrackerSnapshot<'a>,
    pub domain: &'a Domain,
    pub version: &'static str,
}

impl<'a> ActionRequest<'a> {
    pub fn new(action_name: &'a str, tracker: &'a Tracker, domain: &'a Domain) -> Self {
        Self {
            next_action: action_name,
            sender_id: tracker.sender_id(),
            tracker: tracker.snapshot(),
            domain,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// The action declined to run, e.g. a form that could not extract the
/// requested slot. Policies should pick a different action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub action_name: String,
    pub reason: String,
}

impl Rejection {
    pub fn event(&self) -> Event {
        Event::active_loop_rejected(Some(self.action_name.clone()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Completed(Vec<Event>),
    Rejected(Rejection),
}

impl ActionOutcome {
    pub fn events(&self) -> &[Event] {
        match self {
            Self::Completed(events) => events,
            Self::Rejected(_) => &[],
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// A custom action executed through an [`ActionExecutor`].
///
/// A provisional action was created during an interactive session and may
/// not exist on the action server yet: transport failures and non-2xx answers
/// are logged and the action completes without events instead of failing the
/// turn.
pub struct RemoteAction {
    name: String,
    executor: Arc<dyn ActionExecutor>,
    provisional: bool,
}

impl RemoteAction {
    pub fn new(name: impl Into<String>, executor: Arc<dyn ActionExecutor>) -> Self {
        Self {
            name: name.into(),
            executor,
            provisional: false,
        }
    }

    pub fn provisional(name: impl Into<String>, executor: Arc<dyn ActionExecutor>) -> Self {
        Self {
            provisional: true,
            ..Self::new(name, executor)
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.provisional
    }
}

impl Action for RemoteAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(
        &'a self,
        tracker: &'a Tracker,
        domain: &'a Domain,
    ) -> ActionFuture<'a, ActionOutcome> {
        Box::pin(async move {
            match self.executor.run(&self.name, tracker, domain).await {
                Ok(response) => Ok(ActionOutcome::Completed(response.into_events())),
                Err(ActionError::Rejected { action_name, message }) => {
                    tracing::info!(action = %action_name, %message, "action server rejected execution");
                    Ok(ActionOutcome::Rejected(Rejection {
                        action_name,
                        reason: message,
                    }))
                }
                Err(error) if self.provisional && error.is_soft_failure() => {
                    tracing::warn!(
                        action = %self.name,
                        %error,
                        "action server could not run new action; continuing without it"
                    );
                    Ok(ActionOutcome::Completed(Vec::new()))
                }
                Err(error) => Err(error),
            }
        })
    }
}
