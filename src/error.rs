use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `convo-core`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; config loading continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum DialogueError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Slot mappings ───────────────────────────────────────────────────
    #[error("slot mapping: {0}")]
    Mapping(#[from] MappingError),

    // ── Actions / remote gateway ────────────────────────────────────────
    #[error("action: {0}")]
    Action(#[from] ActionError),

    // ── Flows ───────────────────────────────────────────────────────────
    #[error("flow: {0}")]
    Flow(#[from] FlowError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid mapping for slot '{slot}': {source}")]
    SlotMapping {
        slot: String,
        #[source]
        source: MappingError,
    },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Slot mapping errors ─────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("provided incompatible slot mapping: expected an object, got {0}")]
    NotAMapping(String),

    #[error("provided incompatible slot mapping: missing 'type'")]
    MissingType,

    #[error("slot mapping type '{0}' is not supported")]
    UnsupportedType(String),

    #[error("slot mapping '{mapping_type}' is missing required field '{field}'")]
    MissingField {
        mapping_type: &'static str,
        field: &'static str,
    },

    #[error("providing both intent {intent:?} and not_intent {not_intent:?} is not supported")]
    ConflictingIntentFilters {
        intent: Vec<String>,
        not_intent: Vec<String>,
    },
}

// ─── Action errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action {action_name} transport failed: {message}")]
    Transport {
        action_name: String,
        message: String,
    },

    #[error("action {action_name} timed out after {timeout_secs}s")]
    Timeout {
        action_name: String,
        timeout_secs: u64,
    },

    #[error("action server returned {status} for action {action_name}: {body}")]
    Server {
        action_name: String,
        status: u16,
        body: String,
    },

    #[error("action {action_name} returned a malformed response: {message}")]
    Decode {
        action_name: String,
        message: String,
    },

    #[error("action {action_name} was rejected by the action server: {message}")]
    Rejected {
        action_name: String,
        message: String,
    },

    #[error("action `{action_name}` has not been stubbed")]
    Unstubbed { action_name: String },

    #[error("form {form_name} is not defined in the domain")]
    UnknownForm { form_name: String },
}

impl ActionError {
    /// Whether the failure happened before a response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }

    /// Failures a not-yet-deployed action tolerates: no response at all, or a
    /// non-2xx answer from a server that does not know the action.
    pub fn is_soft_failure(&self) -> bool {
        self.is_transport() || matches!(self, Self::Server { .. })
    }

    pub fn action_name(&self) -> Option<&str> {
        match self {
            Self::Transport { action_name, .. }
            | Self::Timeout { action_name, .. }
            | Self::Server { action_name, .. }
            | Self::Decode { action_name, .. }
            | Self::Rejected { action_name, .. }
            | Self::Unstubbed { action_name } => Some(action_name),
            Self::UnknownForm { .. } => None,
        }
    }
}

// ─── Flow errors ─────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("detected duplicate flow name '{0}'; flow names must be unique")]
    DuplicateName(String),

    #[error("detected duplicate flow description for flow '{0}'; flow descriptions must be unique")]
    DuplicateDescription(String),

    #[error("slot '{slot}' is used in step '{step}' of flow '{flow}' but is not listed in the domain slots")]
    UnknownSlot {
        slot: String,
        step: String,
        flow: String,
    },

    #[error("action '{action}' is used in step '{step}' of flow '{flow}' but is not listed in the domain")]
    UnknownAction {
        action: String,
        step: String,
        flow: String,
    },

    #[error("step '{step}' of flow '{flow}' links to unknown step '{target}'")]
    UnknownLinkTarget {
        target: String,
        step: String,
        flow: String,
    },

    #[error("detected invalid condition '{condition}' at step '{step}' for flow '{flow}'")]
    InvalidCondition {
        condition: String,
        step: String,
        flow: String,
    },

    #[error("invalid flow definition: {0}")]
    Parse(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, DialogueError>;
