use super::super::{ActionEndpointConfig, ObservabilityConfig, StubConfig, ValidationConfig};
use crate::core::actions::{ActionExecutor, HttpActionExecutor, StubActionExecutor};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - set by the loader, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub action_endpoint: ActionEndpointConfig,

    #[serde(default)]
    pub stubs: StubConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.action_endpoint.url).map_err(|error| {
            ConfigError::Validation(format!(
                "action_endpoint.url '{}' is not a valid URL: {error}",
                self.action_endpoint.url
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "action_endpoint.url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.action_endpoint.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "action_endpoint.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.action_endpoint.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "action_endpoint.connect_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.validation.max_history == Some(0) {
            return Err(ConfigError::Validation(
                "validation.max_history must be greater than 0 when set".into(),
            ));
        }
        Ok(())
    }

    /// Stubbed actions when any are configured, the action server otherwise.
    pub fn action_executor(&self) -> Result<Arc<dyn ActionExecutor>, ConfigError> {
        if self.stubs.is_empty() {
            tracing::debug!(url = %self.action_endpoint.url, "using remote action server");
            return Ok(Arc::new(HttpActionExecutor::new(
                self.action_endpoint.clone(),
            )));
        }
        let registry = self.stubs.registry()?;
        tracing::debug!(stubs = registry.len(), "using stubbed custom actions");
        Ok(Arc::new(StubActionExecutor::new(registry)))
    }
}
