use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::domain::Domain;
use crate::core::tracker::Tracker;
use crate::error::ActionError;

use super::{ActionExecutor, ActionFuture, ActionResponse};

/// Separates a test file or test case prefix from the action name in stub keys.
pub const STUB_KEY_SEPARATOR: &str = "::";

/// Key under which a stub scoped to `prefix` (a test file or test case) is stored.
pub fn stub_custom_action_key(prefix: &str, action_name: &str) -> String {
    format!("{prefix}{STUB_KEY_SEPARATOR}{action_name}")
}

/// A pre-canned action server response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StubCustomAction {
    pub action_name: String,
    #[serde(flatten)]
    pub response: ActionResponse,
}

impl StubCustomAction {
    /// Builds a stub from `{"events": [...], "responses": [...]}`.
    pub fn from_value(action_name: impl Into<String>, data: Value) -> Result<Self, serde_json::Error> {
        Ok(Self {
            action_name: action_name.into(),
            response: serde_json::from_value(data)?,
        })
    }

    pub fn as_value(&self) -> Value {
        serde_json::to_value(&self.response).unwrap_or(Value::Null)
    }
}

/// Stubs indexed by key.
///
/// Lookups prefer a stub scoped to the current test case, then one scoped to
/// the current test file, then an unscoped one.
#[derive(Debug, Clone, Default)]
pub struct StubRegistry {
    test_file: Option<String>,
    test_case: Option<String>,
    stubs: HashMap<String, StubCustomAction>,
}

impl StubRegistry {
    pub fn new(test_file: Option<String>, test_case: Option<String>) -> Self {
        Self {
            test_file,
            test_case,
            stubs: HashMap::new(),
        }
    }

    /// Registers `stub` under `key`, which may carry a scope prefix.
    pub fn insert(&mut self, key: impl Into<String>, stub: StubCustomAction) {
        self.stubs.insert(key.into(), stub);
    }

    /// Parses `key -> {events, responses}` entries. The action name is the
    /// part of the key after the last separator.
    pub fn from_entries(
        test_file: Option<String>,
        test_case: Option<String>,
        entries: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Self, serde_json::Error> {
        let mut registry = Self::new(test_file, test_case);
        for (key, data) in entries {
            let action_name = key
                .rsplit(STUB_KEY_SEPARATOR)
                .next()
                .unwrap_or(key.as_str())
                .to_string();
            let stub = StubCustomAction::from_value(action_name, data)?;
            registry.insert(key, stub);
        }
        Ok(registry)
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    pub fn get(&self, action_name: &str) -> Option<&StubCustomAction> {
        let scoped = [self.test_case.as_deref(), self.test_file.as_deref()]
            .into_iter()
            .flatten()
            .map(|prefix| stub_custom_action_key(prefix, action_name));
        scoped
            .chain(std::iter::once(action_name.to_string()))
            .find_map(|key| self.stubs.get(&key))
    }

    pub fn require(&self, action_name: &str) -> Result<&StubCustomAction, ActionError> {
        self.get(action_name).ok_or_else(|| ActionError::Unstubbed {
            action_name: action_name.to_string(),
        })
    }
}

/// Executes custom actions from a [`StubRegistry`] without any network I/O.
#[derive(Debug, Clone, Default)]
pub struct StubActionExecutor {
    registry: StubRegistry,
}

impl StubActionExecutor {
    pub fn new(registry: StubRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &StubRegistry {
        &self.registry
    }
}

impl ActionExecutor for StubActionExecutor {
    fn run<'a>(
        &'a self,
        action_name: &'a str,
        _tracker: &'a Tracker,
        _domain: &'a Domain,
    ) -> ActionFuture<'a, ActionResponse> {
        Box::pin(async move {
            let stub = self.registry.require(action_name)?;
            tracing::debug!(action = action_name, "running stubbed custom action");
            Ok(stub.response.clone())
        })
    }
}
