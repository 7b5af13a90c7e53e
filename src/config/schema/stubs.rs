use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::actions::StubRegistry;
use crate::error::ConfigError;

/// Canned custom action answers used instead of an action server.
///
/// Keys of `actions` are bare action names or carry a
/// `test_file::test_case::` scope prefix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StubConfig {
    #[serde(default)]
    pub test_file: Option<String>,
    #[serde(default)]
    pub test_case: Option<String>,
    #[serde(default)]
    pub actions: BTreeMap<String, Value>,
}

impl StubConfig {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn registry(&self) -> Result<StubRegistry, ConfigError> {
        StubRegistry::from_entries(
            self.test_file.clone(),
            self.test_case.clone(),
            self.actions.clone(),
        )
        .map_err(|error| ConfigError::Load(format!("invalid stubbed action: {error}")))
    }
}
