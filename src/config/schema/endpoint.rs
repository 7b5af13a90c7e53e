use serde::{Deserialize, Serialize};

/// Where custom actions are executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEndpointConfig {
    /// Action server webhook (default: http://localhost:5055/webhook)
    #[serde(default = "default_action_endpoint_url")]
    pub url: String,
    /// Whole-request timeout in seconds (default: 10)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Connection timeout in seconds (default: 5)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Sent as the `token` query parameter when set.
    #[serde(default)]
    pub token: Option<String>,
}

fn default_action_endpoint_url() -> String {
    "http://localhost:5055/webhook".into()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    5
}

impl Default for ActionEndpointConfig {
    fn default() -> Self {
        Self {
            url: default_action_endpoint_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            token: None,
        }
    }
}
