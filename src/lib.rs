#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod config;
pub mod core;
pub mod error;
pub mod observability;

pub use config::Config;
pub use crate::core::actions::{Action, ActionExecutor, ActionOutcome, RemoteAction};
pub use crate::core::domain::Domain;
pub use crate::core::events::{Event, EventKind, UserMessage};
pub use crate::core::forms::FormAction;
pub use crate::core::sessions::Conversation;
pub use crate::core::tracker::Tracker;
pub use error::{DialogueError, Result};
