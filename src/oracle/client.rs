//! Generative oracle trait and the Gemini-style HTTP implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::types::{GenerationRequest, GroundingSource, OracleResponse};

/// The external content-generation oracle.
///
/// A single request/response operation; all staging and sequencing lives
/// above this trait. Implementations must be thread-safe so lookup calls
/// can run concurrently with an active workflow.
#[async_trait]
pub trait GenerativeOracle: Send + Sync {
    /// Issue one generation call.
    async fn generate(&self, request: GenerationRequest) -> Result<OracleResponse>;
}

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key
    pub api_key: String,
    /// Base URL override
    pub base_url: Option<String>,
    /// Default model
    pub default_model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Max retries on retryable failures
    pub max_retries: u32,
    /// Base delay between retries in milliseconds (linear backoff)
    pub retry_delay_ms: u64,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            default_model: GeminiClient::DEFAULT_MODEL.to_string(),
            timeout_secs: 120,
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// Google Gemini client.
pub struct GeminiClient {
    config: ClientConfig,
    http: Client,
}

impl GeminiClient {
    const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";
    const DEFAULT_MODEL: &'static str = "gemini-2.0-flash";

    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }

    async fn generate_once(&self, request: &GenerationRequest) -> Result<OracleResponse> {
        let model = request
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model);

        let system_instruction = request.role_instruction.as_ref().map(|s| GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart { text: s.clone() }],
        });

        // Grounding and a response schema are mutually exclusive on the
        // wire; grounding wins when both are requested.
        let (generation_config, tools) = if request.grounded_search {
            (
                Some(GeminiGenerationConfig {
                    response_mime_type: Some("application/json".to_string()),
                    response_schema: None,
                }),
                Some(vec![GeminiTool {
                    google_search: EmptyObject {},
                }]),
            )
        } else {
            (
                Some(GeminiGenerationConfig {
                    response_mime_type: Some("application/json".to_string()),
                    response_schema: request.schema.as_ref().map(|s| s.to_value()),
                }),
                None,
            )
        };

        let api_request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction,
            generation_config,
            tools,
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url(),
            model,
            self.config.api_key
        );

        debug!(model, grounded = request.grounded_search, "oracle call");

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(self.config.timeout_secs * 1000)
                } else {
                    Error::transport(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<GeminiError>(&body) {
                return Err(Error::oracle_rejection(
                    status.as_u16(),
                    error.error.message,
                ));
            }
            return Err(Error::oracle_rejection(status.as_u16(), body));
        }

        let api_response: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| Error::transport(format!("failed to parse response envelope: {e}")))?;

        let candidate = api_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::oracle_rejection(status.as_u16(), "no candidates in response"))?;

        let text = candidate
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        // Grounding entries without a resolvable uri are dropped silently.
        let sources = candidate
            .grounding_metadata
            .and_then(|m| m.grounding_chunks)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|chunk| {
                let web = chunk.web?;
                let uri = web.uri?;
                Some(GroundingSource {
                    title: web.title,
                    uri,
                })
            })
            .collect();

        Ok(OracleResponse::new(text, model).with_sources(sources))
    }
}

#[async_trait]
impl GenerativeOracle for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<OracleResponse> {
        let mut attempt = 0;
        loop {
            match self.generate_once(&request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.retry_delay_ms * u64::from(attempt);
                    warn!(
                        attempt,
                        max = self.config.max_retries,
                        delay_ms = delay,
                        "oracle call failed, retrying: {e}"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// Gemini API types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    google_search: EmptyObject,
}

#[derive(Debug, Serialize)]
struct EmptyObject {}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: GeminiContent,
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGroundingMetadata {
    grounding_chunks: Option<Vec<GeminiGroundingChunk>>,
}

#[derive(Debug, Deserialize)]
struct GeminiGroundingChunk {
    web: Option<GeminiWebSource>,
}

#[derive(Debug, Deserialize)]
struct GeminiWebSource {
    title: Option<String>,
    uri: Option<String>,
}
