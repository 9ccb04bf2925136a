//! [`VlmClient`] – validated hypotheses from an external vision-language model.
//!
//! The raw service is abstracted behind [`VlmTransport`]; [`OllamaTransport`]
//! talks to a local [Ollama](https://ollama.com) server's `/api/generate`
//! endpoint with the [`Hypothesis`] JSON Schema injected as the structured
//! output `format`.
//!
//! # Retry contract
//!
//! | Outcome of an attempt | Behaviour |
//! |---|---|
//! | transport / service error | fail immediately with the error tag, no retry |
//! | no JSON object in the reply | retry with [`REPAIR_PROMPT`], else `json_extraction_failed` |
//! | object fails validation | retry with [`REPAIR_PROMPT`], else `schema_invalid:<message>` |
//! | object validates | success |
//!
//! A hypothesis that failed validation is never returned.
//!
//! # Example
//!
//! ```rust,no_run
//! use seeker_runtime::vlm_client::{OllamaConfig, OllamaTransport, VlmClient};
//!
//! let transport = OllamaTransport::new(&OllamaConfig::default()).unwrap();
//! let client = VlmClient::new(Box::new(transport), 1);
//! // client.propose(&context).await – requires a running Ollama instance.
//! ```

use std::time::{Duration, Instant};

use async_trait::async_trait;
use seeker_kernel::HypothesisValidator;
use seeker_types::{Hypothesis, hypothesis_json_schema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::extractor::extract_json_object;
use crate::prompt::{PromptContext, REPAIR_PROMPT, build_prompt};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Failures of a single call to the external service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("HTTP status {0}")]
    Http(u16),
    #[error("request timed out")]
    Timeout,
    #[error("response body is not JSON: {0}")]
    ResponseParse(String),
    #[error("service reported: {0}")]
    Service(String),
    #[error("response has no `response` field")]
    MissingResponseField,
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl TransportError {
    /// Stable tag recorded as `vlm_error`.
    pub fn tag(&self) -> String {
        match self {
            TransportError::ConnectionFailed(m) => format!("connection_failed:{m}"),
            TransportError::Http(code) => format!("http_error:{code}"),
            TransportError::Timeout => "timeout".to_string(),
            TransportError::ResponseParse(m) => format!("response_parse_error:{m}"),
            TransportError::Service(m) => format!("ollama_error:{m}"),
            TransportError::MissingResponseField => "missing_response_field".to_string(),
            TransportError::Unexpected(m) => format!("unexpected_error:{m}"),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::ConnectionFailed(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Http(status.as_u16())
        } else if e.is_decode() {
            TransportError::ResponseParse(e.to_string())
        } else {
            TransportError::Unexpected(e.to_string())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport seam
// ─────────────────────────────────────────────────────────────────────────────

/// The external vision-language service: prompt in, untrusted text out.
#[async_trait]
pub trait VlmTransport: Send + Sync {
    /// Backend identity recorded in step metadata.
    fn backend(&self) -> &str;

    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, TransportError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Ollama
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: f64,
    pub max_retries: u32,
    pub temperature: f64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5vl:7b".to_string(),
            timeout_secs: 30.0,
            max_retries: 1,
            temperature: 0.2,
        }
    }
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f64,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
    format: &'a Value,
}

pub struct OllamaTransport {
    base_url: String,
    model: String,
    temperature: f64,
    schema: Value,
    client: reqwest::Client,
}

impl OllamaTransport {
    /// # Errors
    ///
    /// Returns [`TransportError::Unexpected`] if the HTTP client cannot be
    /// built (e.g. no TLS backend).
    pub fn new(config: &OllamaConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(config.timeout_secs.max(0.0)))
            .build()
            .map_err(|e| TransportError::Unexpected(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            schema: hypothesis_json_schema(),
            client,
        })
    }

    fn interpret(body: &Value) -> Result<String, TransportError> {
        if let Some(err) = body.get("error") {
            let msg = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
            return Err(TransportError::Service(msg));
        }
        match body.get("response") {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(TransportError::MissingResponseField),
        }
    }
}

#[async_trait]
impl VlmTransport for OllamaTransport {
    fn backend(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, TransportError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
            format: &self.schema,
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;
        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| TransportError::ResponseParse(e.to_string()))?;
        Self::interpret(&parsed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// VlmClient
// ─────────────────────────────────────────────────────────────────────────────

/// Diagnostics of one [`VlmClient::propose`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VlmMeta {
    pub vlm_backend: String,
    pub vlm_model: String,
    pub vlm_latency_ms: f64,
    pub vlm_parse_ok: bool,
    pub vlm_schema_ok: bool,
    pub vlm_retry_count: u32,
    pub vlm_error: Option<String>,
}

/// Result of [`VlmClient::propose`]. `object` and `hypothesis` are either both
/// present (validated) or both absent.
#[derive(Debug, Clone, PartialEq)]
pub struct VlmProposal {
    pub object: Option<Value>,
    pub hypothesis: Option<Hypothesis>,
    pub meta: VlmMeta,
}

pub struct VlmClient {
    transport: Box<dyn VlmTransport>,
    validator: HypothesisValidator,
    max_retries: u32,
}

impl VlmClient {
    pub fn new(transport: Box<dyn VlmTransport>, max_retries: u32) -> Self {
        Self {
            transport,
            validator: HypothesisValidator::default(),
            max_retries,
        }
    }

    pub fn backend(&self) -> &str {
        self.transport.backend()
    }

    /// Ask the model for a hypothesis about `ctx`.
    pub async fn propose(&self, ctx: &PromptContext) -> VlmProposal {
        let started = Instant::now();
        let mut meta = VlmMeta {
            vlm_backend: self.transport.backend().to_string(),
            vlm_model: self.transport.model().to_string(),
            vlm_latency_ms: 0.0,
            vlm_parse_ok: false,
            vlm_schema_ok: false,
            vlm_retry_count: 0,
            vlm_error: None,
        };
        let elapsed_ms = |s: Instant| s.elapsed().as_secs_f64() * 1000.0;
        let fail = |mut meta: VlmMeta, tag: String| {
            meta.vlm_error = Some(tag);
            meta.vlm_latency_ms = elapsed_ms(started);
            VlmProposal {
                object: None,
                hypothesis: None,
                meta,
            }
        };

        let first_prompt = build_prompt(ctx);
        for attempt in 0..=self.max_retries {
            let prompt = if attempt == 0 {
                first_prompt.as_str()
            } else {
                meta.vlm_retry_count = attempt;
                debug!(attempt, "re-prompting model after unusable output");
                REPAIR_PROMPT
            };
            let last_attempt = attempt == self.max_retries;

            let text = match self.transport.generate(prompt).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, backend = self.transport.backend(), "model call failed");
                    return fail(meta, e.tag());
                }
            };

            let Some(object) = extract_json_object(&text) else {
                meta.vlm_parse_ok = false;
                if last_attempt {
                    warn!("no JSON object in model output");
                    return fail(meta, "json_extraction_failed".to_string());
                }
                continue;
            };
            meta.vlm_parse_ok = true;

            let object = Value::Object(object);
            match self.validator.validate(&object) {
                Ok(hypothesis) => {
                    meta.vlm_schema_ok = true;
                    meta.vlm_latency_ms = elapsed_ms(started);
                    return VlmProposal {
                        object: Some(object),
                        hypothesis: Some(hypothesis),
                        meta,
                    };
                }
                Err(e) => {
                    meta.vlm_schema_ok = false;
                    if last_attempt {
                        warn!(error = %e.message, "model output failed validation");
                        return fail(meta, format!("schema_invalid:{}", e.message));
                    }
                }
            }
        }
        fail(meta, "max_retries_exceeded".to_string())
    }
}
