use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::RateError;
use crate::llm::extract_label;
use crate::models::{ClassificationRequest, ClassificationResult, EmpathyScale};

const BACKOFF_CAP: Duration = Duration::from_secs(8);

/// Configuration for the rating service client
#[derive(Debug, Clone)]
pub struct RatingConfig {
    /// API key (from ANTHROPIC_API_KEY env var)
    pub api_key: String,
    /// Model to use (e.g., "claude-sonnet-4-20250514")
    pub model: String,
    /// Temperature (0-1, lower = more deterministic)
    pub temperature: f64,
    /// Maximum tokens in response
    pub max_tokens: u32,
    /// Per-call timeout
    pub request_timeout: Duration,
    /// Maximum service calls per (segment, modality) pair
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt up to a cap
    pub initial_backoff: Duration,
    /// Ordinal scale accepted from responses
    pub scale: EmpathyScale,
}

impl RatingConfig {
    /// Create config from environment variables. A missing key is a fatal
    /// configuration error, raised before any segment is processed.
    pub fn from_env(scale: EmpathyScale) -> Result<Self, RateError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            RateError::Configuration("ANTHROPIC_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key, scale))
    }

    pub fn new(api_key: String, scale: EmpathyScale) -> Self {
        Self {
            api_key,
            model: "claude-sonnet-4-20250514".to_string(),
            temperature: 0.0,
            max_tokens: 256,
            request_timeout: Duration::from_secs(60),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            scale,
        }
    }
}

/// Transport seam between retry/parsing policy and the wire.
///
/// The production implementation is `HttpTransport`; tests substitute fakes
/// so the retry bound and parser run without a network.
#[async_trait]
pub trait RatingTransport: Send + Sync {
    /// Make exactly one service call and return the raw response text.
    async fn complete(&self, request: &ClassificationRequest) -> Result<String, RateError>;
}

/// HTTP transport for the multimodal rating service
pub struct HttpTransport {
    client: Client,
    config: RatingConfig,
}

impl HttpTransport {
    pub fn new(config: RatingConfig) -> Result<Self, RateError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RateError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Assemble the request body. The audio clip is read and encoded here,
    /// once per attempt; a read failure counts as a transport failure and
    /// goes through the same retry policy.
    fn build_body(&self, request: &ClassificationRequest) -> Result<ApiRequest, RateError> {
        let mut content = vec![ContentPart::Text {
            text: request.payload.clone(),
        }];

        if let Some(clip) = &request.audio_clip {
            let bytes = std::fs::read(clip).map_err(|e| {
                RateError::Transport(format!("failed to read audio clip {:?}: {}", clip, e))
            })?;
            content.push(ContentPart::InputAudio {
                source: AudioSource {
                    source_type: "base64".to_string(),
                    media_type: "audio/wav".to_string(),
                    data: general_purpose::STANDARD.encode(bytes),
                },
            });
        }

        Ok(ApiRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            system: Some(request.instructions.clone()),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content,
            }],
        })
    }
}

#[async_trait]
impl RatingTransport for HttpTransport {
    async fn complete(&self, request: &ClassificationRequest) -> Result<String, RateError> {
        let body = self.build_body(request)?;

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RateError::Transport(format!(
                "rating service error: {} - {}",
                status, body
            )));
        }

        let response: ApiResponse = response
            .json()
            .await
            .map_err(|e| RateError::Transport(format!("malformed service response: {}", e)))?;

        response
            .content
            .iter()
            .find(|c| c.content_type == "text")
            .map(|c| c.text.clone())
            .ok_or_else(|| RateError::Transport("no text content in response".to_string()))
    }
}

/// Rating client: bounded retry with backoff around a transport, plus label
/// extraction. Every call path ends in a terminal result; errors never
/// propagate to the caller.
pub struct RatingClient<T: RatingTransport> {
    transport: T,
    config: RatingConfig,
}

/// Client wired to the real HTTP transport.
pub type HttpRatingClient = RatingClient<HttpTransport>;

/// Build a client talking to the real rating service.
pub fn http_client(config: RatingConfig) -> Result<HttpRatingClient, RateError> {
    let transport = HttpTransport::new(config.clone())?;
    Ok(RatingClient::new(transport, config))
}

impl<T: RatingTransport> RatingClient<T> {
    pub fn new(transport: T, config: RatingConfig) -> Self {
        Self { transport, config }
    }

    /// Rate one request. Transport failures and timeouts are retried up to
    /// the configured bound with exponential backoff; exhausting the bound
    /// yields a `ServiceError` row. A response that arrives but contains no
    /// in-range integer yields a `ParseError` row with the raw text kept.
    pub async fn rate(&self, request: &ClassificationRequest) -> ClassificationResult {
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = self.config.initial_backoff;
        let mut attempts = 0;

        while attempts < max_attempts {
            attempts += 1;
            debug!(
                request_id = %request.request_id,
                segment = %request.segment_id,
                modality = %request.modality,
                attempt = attempts,
                "calling rating service"
            );

            let call = self.transport.complete(request);
            let outcome = match tokio::time::timeout(self.config.request_timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(RateError::Transport(format!(
                    "call timed out after {:?}",
                    self.config.request_timeout
                ))),
            };

            match outcome {
                Ok(raw) => {
                    return match extract_label(&raw, self.config.scale) {
                        Some(label) => ClassificationResult::ok(request, label, raw, attempts),
                        None => {
                            warn!(
                                request_id = %request.request_id,
                                segment = %request.segment_id,
                                modality = %request.modality,
                                "no label in range {}..={} in response",
                                self.config.scale.min,
                                self.config.scale.max
                            );
                            ClassificationResult::parse_error(request, raw, attempts)
                        }
                    };
                }
                Err(err) => {
                    warn!(
                        request_id = %request.request_id,
                        segment = %request.segment_id,
                        modality = %request.modality,
                        attempt = attempts,
                        "rating call failed: {}",
                        err
                    );
                    if attempts < max_attempts {
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(BACKOFF_CAP);
                    }
                }
            }
        }

        ClassificationResult::service_error(request, attempts)
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    InputAudio { source: AudioSource },
}

#[derive(Debug, Serialize)]
struct AudioSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}
