use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::ActionEndpointConfig;
use crate::core::domain::Domain;
use crate::core::tracker::Tracker;
use crate::error::ActionError;

use super::{ActionExecutor, ActionFuture, ActionRequest, ActionResponse};

/// Executes custom actions by posting the tracker to an action server.
pub struct HttpActionExecutor {
    endpoint: ActionEndpointConfig,
    client: Client,
}

/// Body of a 400 answer: the server refused to run the action.
#[derive(Deserialize)]
struct RejectionBody {
    action_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpActionExecutor {
    pub fn new(endpoint: ActionEndpointConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .connect_timeout(Duration::from_secs(endpoint.connect_timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { endpoint, client }
    }

    pub fn endpoint(&self) -> &ActionEndpointConfig {
        &self.endpoint
    }

    async fn post(
        &self,
        action_name: &str,
        tracker: &Tracker,
        domain: &Domain,
    ) -> Result<ActionResponse, ActionError> {
        let payload = ActionRequest::new(action_name, tracker, domain);
        let mut request = self.client.post(self.endpoint.url.as_str()).json(&payload);
        if let Some(token) = &self.endpoint.token {
            request = request.query(&[("token", token.as_str())]);
        }

        tracing::debug!(action = action_name, url = %self.endpoint.url, "calling action server");
        let response = request
            .send()
            .await
            .map_err(|error| self.transport_error(action_name, &error))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| self.transport_error(action_name, &error))?;

        if status == StatusCode::BAD_REQUEST
            && let Ok(rejection) = serde_json::from_str::<RejectionBody>(&body)
            && let Some(rejected) = rejection.action_name
        {
            return Err(ActionError::Rejected {
                action_name: rejected,
                message: rejection.error.unwrap_or_default(),
            });
        }

        if !status.is_success() {
            return Err(ActionError::Server {
                action_name: action_name.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|error| ActionError::Decode {
            action_name: action_name.to_string(),
            message: error.to_string(),
        })
    }

    fn transport_error(&self, action_name: &str, error: &reqwest::Error) -> ActionError {
        if error.is_timeout() {
            ActionError::Timeout {
                action_name: action_name.to_string(),
                timeout_secs: self.endpoint.timeout_secs,
            }
        } else {
            ActionError::Transport {
                action_name: action_name.to_string(),
                message: error.to_string(),
            }
        }
    }
}

impl ActionExecutor for HttpActionExecutor {
    fn run<'a>(
        &'a self,
        action_name: &'a str,
        tracker: &'a Tracker,
        domain: &'a Domain,
    ) -> ActionFuture<'a, ActionResponse> {
        Box::pin(self.post(action_name, tracker, domain))
    }
}
