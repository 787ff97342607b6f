//! GeminiGenerationClient - Direct REST API implementation for Gemini.
//!
//! Renders the component prompt, calls `models/{model}:generateContent` and
//! extracts fenced code from the reply.

use async_trait::async_trait;
use forge_core::config::GenerationConfig;
use forge_core::generation::{
    GenerationClient, GenerationRequest, GenerationResponse, build_component_prompt,
};
use forge_core::{ForgeError, Result};
use reqwest::{Client, StatusCode, header::HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.8,
            max_output_tokens: 4096,
        }
    }
}

/// Generation client that talks to the Gemini HTTP API.
#[derive(Clone)]
pub struct GeminiGenerationClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    sampling: SamplingConfig,
}

impl GeminiGenerationClient {
    /// Creates a client with the provided API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: BASE_URL.to_string(),
            sampling: SamplingConfig::default(),
        }
    }

    /// Builds the client from the `[generation]` section.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::Config` when no API key is configured.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ForgeError::config("generation.api_key (or GOOGLE_API_KEY) is not set")
            })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ForgeError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            ..Self::new(api_key, config.model.clone())
        })
    }

    /// Overrides the API root (for proxies and tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_request(&self, body: &GenerateContentRequest) -> Result<String> {
        let url = format!(
            "{}/{model}:generateContent?key={api_key}",
            self.base_url,
            model = self.model,
            api_key = self.api_key
        );

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                ForgeError::generation(
                    format!("Gemini API request failed: {err}"),
                    err.is_connect() || err.is_timeout(),
                )
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(map_http_error(status, body_text, retry_after));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|err| {
            ForgeError::generation(format!("Failed to parse Gemini response: {err}"), false)
        })?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl GenerationClient for GeminiGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let prompt = build_component_prompt(request)?;
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: self.sampling,
        };

        tracing::debug!(
            "Requesting generation from {} ({} history messages)",
            self.model,
            request.recent_history.len()
        );
        let text = self.send_request(&body).await?;
        Ok(GenerationResponse::from_text(text))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: SamplingConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn extract_text_response(response: GenerateContentResponse) -> Result<String> {
    response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| {
            ForgeError::generation("Gemini API returned no text in the response candidates", false)
        })
}

fn map_http_error(status: StatusCode, body: String, retry_after: Option<Duration>) -> ForgeError {
    let message = serde_json::from_str::<ErrorWrapper>(&body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.clone());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.clone());

    let is_retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    let message = match retry_after {
        Some(delay) => format!("{} {message} (retry after {}s)", status.as_u16(), delay.as_secs()),
        None => format!("{} {message}", status.as_u16()),
    };
    ForgeError::generation(message, is_retryable)
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
