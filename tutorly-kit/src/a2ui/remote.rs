//! A2UI Remote Backend
//!
//! HTTP plumbing towards the content backend: fetching screens and
//! forwarding actions.

use futures::future::BoxFuture;
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use super::action::Action;
use super::error::{ActionError, LoadError};
use super::loader::ScreenSource;
use super::pipeline::ActionHandler;

/// Fetches screens with `GET {base}/screens/{id}`.
#[derive(Debug, Clone)]
pub struct HttpScreenSource {
    client: reqwest::Client,
    base: Url,
    auth_token: Option<String>,
}

impl HttpScreenSource {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(HttpScreenSource {
            client: reqwest::Client::new(),
            base: directory_url(base_url)?,
            auth_token: None,
        })
    }

    /// Set authentication token
    pub fn with_auth(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// URL of a screen; the id is percent-encoded as a single path segment
    pub fn screen_url(&self, screen_id: &str) -> Result<Url, LoadError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| LoadError::Transport(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .push("screens")
            .push(screen_id);
        Ok(url)
    }
}

impl ScreenSource for HttpScreenSource {
    fn fetch(&self, screen_id: &str) -> BoxFuture<'static, Result<String, LoadError>> {
        let client = self.client.clone();
        let auth_token = self.auth_token.clone();
        let screen_id = screen_id.to_string();
        let url = self.screen_url(&screen_id);

        Box::pin(async move {
            let url = url?;
            ::log::debug!("[A2UI loader] GET {}", url);

            let mut request = client.get(url).header("Accept", "application/json");
            if let Some(token) = &auth_token {
                request = request.header("Authorization", format!("Bearer {}", token));
            }

            let response = request
                .send()
                .await
                .map_err(|e| LoadError::Transport(format!("HTTP request failed: {e}")))?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(LoadError::NotFound(screen_id));
            }
            if !status.is_success() {
                return Err(LoadError::Status(status.as_u16()));
            }

            response
                .text()
                .await
                .map_err(|e| LoadError::Transport(format!("Failed to read response body: {e}")))
        })
    }
}

/// What gets POSTed for each forwarded action
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEnvelope {
    pub message_id: String,
    /// RFC 3339
    pub timestamp: String,
    pub action: Action,
}

impl ActionEnvelope {
    pub fn new(action: Action) -> Self {
        ActionEnvelope {
            message_id: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            action,
        }
    }
}

/// Forwards actions to a backend endpoint.
///
/// Register it for the action types the backend owns, or as the pipeline's
/// default handler.
#[derive(Debug, Clone)]
pub struct RemoteActionHandler {
    client: reqwest::Client,
    endpoint: Url,
    auth_token: Option<String>,
}

impl RemoteActionHandler {
    pub fn new(endpoint: &str) -> Result<Self, url::ParseError> {
        Ok(RemoteActionHandler {
            client: reqwest::Client::new(),
            endpoint: Url::parse(endpoint)?,
            auth_token: None,
        })
    }

    pub fn with_auth(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl ActionHandler for RemoteActionHandler {
    fn handle(&self, action: Action) -> BoxFuture<'static, Result<(), ActionError>> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let auth_token = self.auth_token.clone();

        Box::pin(async move {
            let envelope = ActionEnvelope::new(action);
            ::log::info!(
                "[A2UI] Forwarding action {} ({}) to {}",
                envelope.action.action_id,
                envelope.message_id,
                endpoint
            );

            let mut request = client
                .post(endpoint)
                .header("Content-Type", "application/json")
                .json(&envelope);
            if let Some(token) = &auth_token {
                request = request.header("Authorization", format!("Bearer {}", token));
            }

            let response = request
                .send()
                .await
                .map_err(|e| ActionError::Remote(format!("HTTP request failed: {e}")))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<no body>".to_string());
                return Err(ActionError::Remote(format!(
                    "endpoint returned status {}: {}",
                    status, body
                )));
            }

            Ok(())
        })
    }
}

/// Parse a base URL so that relative joins land beneath it
fn directory_url(base_url: &str) -> Result<Url, url::ParseError> {
    if base_url.ends_with('/') {
        Url::parse(base_url)
    } else {
        Url::parse(&format!("{}/", base_url))
    }
}
