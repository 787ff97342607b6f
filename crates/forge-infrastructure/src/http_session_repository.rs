//! HttpSessionRepository - session persistence over the remote session API.
//!
//! Routes (relative to the configured base URL):
//! - `GET    /api/sessions/{id}` → `{ "session": { ... } }`
//! - `PUT    /api/sessions/{id}` with the full record
//! - `PATCH  /api/sessions/{id}` with `{ sessionName?, lastModified, revision }`
//! - `DELETE /api/sessions/{id}`
//! - `GET    /api/sessions` → `{ "sessions": [ ... ] }`
//!
//! The API speaks camelCase (`sessionName`, `chatHistory`, `generatedCode.jsx`).
//! Those names never leave this module.

use crate::dto::{
    ChatMessageV1_0_0, ComponentPropertyV1_0_0, GeneratedCodeV1_0_0, properties_into_domain,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forge_core::config::StorageConfig;
use forge_core::session::{Session, SessionPatch, SessionRepository, SessionSummary};
use forge_core::{ForgeError, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session repository backed by the remote session API.
#[derive(Clone)]
pub struct HttpSessionRepository {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpSessionRepository {
    /// Creates a repository for `base_url`; every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::Config` if the URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ForgeError::config(format!("Invalid base_url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ForgeError::config(format!(
                "base_url '{}' cannot be a base",
                base_url
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForgeError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_token: api_token.filter(|token| !token.trim().is_empty()),
        })
    }

    /// Builds the repository from the `[storage]` section.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| ForgeError::config("storage.base_url is required"))?;
        Self::new(
            base_url,
            config.api_token.clone(),
            config.request_timeout(),
        )
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ForgeError::config(format!("base_url '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "sessions"])
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, session_id: &str) -> Result<Response> {
        let request = match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read session API error body".to_string());
            return Err(map_http_error(status, body_text, session_id));
        }

        Ok(response)
    }
}

#[async_trait]
impl SessionRepository for HttpSessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        let url = self.endpoint(&[session_id])?;
        let response = match self.send(self.client.get(url), session_id).await {
            Ok(response) => response,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };

        let envelope: SessionEnvelope = response.json().await.map_err(map_transport_error)?;
        Ok(Some(envelope.session.into_domain()))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let url = self.endpoint(&[&session.id])?;
        let body = SessionWire::from_domain(session);
        self.send(self.client.put(url).json(&body), &session.id)
            .await?;
        Ok(())
    }

    async fn patch(&self, session_id: &str, patch: &SessionPatch) -> Result<()> {
        let url = self.endpoint(&[session_id])?;
        let body = PatchWire {
            session_name: patch.name.clone(),
            last_modified: patch.last_modified,
            revision: patch.revision,
        };
        self.send(self.client.patch(url).json(&body), session_id)
            .await?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let url = self.endpoint(&[session_id])?;
        match self.send(self.client.delete(url), session_id).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn list_summaries(&self) -> Result<Vec<SessionSummary>> {
        let url = self.endpoint(&[])?;
        let response = self.send(self.client.get(url), "*").await?;
        let listing: SessionListing = response.json().await.map_err(map_transport_error)?;

        let mut summaries: Vec<SessionSummary> = listing
            .sessions
            .into_iter()
            .map(|wire| wire.into_domain().summary())
            .collect();
        summaries.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(summaries)
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionWire {
    #[serde(alias = "_id")]
    id: String,
    session_name: String,
    #[serde(default)]
    chat_history: Vec<ChatMessageV1_0_0>,
    #[serde(default)]
    generated_code: GeneratedCodeV1_0_0,
    #[serde(default)]
    component_properties: Vec<ComponentPropertyV1_0_0>,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    #[serde(default)]
    revision: u64,
}

impl SessionWire {
    fn from_domain(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            session_name: session.name.clone(),
            chat_history: session
                .chat_history
                .iter()
                .map(ChatMessageV1_0_0::from_domain)
                .collect(),
            generated_code: (&session.generated_code).into(),
            component_properties: session
                .component_properties
                .iter()
                .map(ComponentPropertyV1_0_0::from_domain)
                .collect(),
            created_at: session.created_at,
            last_modified: session.last_modified,
            revision: session.revision,
        }
    }

    fn into_domain(self) -> Session {
        Session {
            id: self.id,
            name: self.session_name,
            chat_history: self
                .chat_history
                .into_iter()
                .filter_map(ChatMessageV1_0_0::into_domain)
                .collect(),
            generated_code: self.generated_code.into(),
            component_properties: properties_into_domain(self.component_properties),
            created_at: self.created_at,
            last_modified: self.last_modified,
            revision: self.revision,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PatchWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    session_name: Option<String>,
    last_modified: DateTime<Utc>,
    revision: u64,
}

#[derive(Deserialize)]
struct SessionEnvelope {
    session: SessionWire,
}

#[derive(Deserialize)]
struct SessionListing {
    #[serde(default)]
    sessions: Vec<SessionWire>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

// ============================================================================
// Error mapping
// ============================================================================

fn map_transport_error(err: reqwest::Error) -> ForgeError {
    if err.is_decode() {
        return ForgeError::Serialization {
            format: "JSON".to_string(),
            message: format!("Failed to parse session API response: {err}"),
        };
    }
    if err.is_builder() {
        return ForgeError::internal(format!("Invalid session API request: {err}"));
    }
    if err.is_timeout() {
        return ForgeError::transient(format!("Session API request timed out: {err}"));
    }
    ForgeError::transient(format!("Session API request failed: {err}"))
}

fn map_http_error(status: StatusCode, body: String, session_id: &str) -> ForgeError {
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|wrapper| wrapper.error)
        .unwrap_or(body);

    match status {
        StatusCode::NOT_FOUND => ForgeError::not_found("session", session_id),
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
            ForgeError::conflict(session_id, message)
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ForgeError::invalid_input(message)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ForgeError::Unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            ForgeError::transient(format!("{status}: {message}"))
        }
        s if s.is_server_error() => ForgeError::transient(format!("{status}: {message}")),
        _ => ForgeError::internal(format!("Unexpected session API status {status}: {message}")),
    }
}
