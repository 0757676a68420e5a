//! OpenAI-compatible oracle: one `/chat/completions` call per request.
//!
//! The prompt goes out as a single user message; stop sequences, `max_tokens` and
//! `temperature` map onto the request body. Works with any server exposing the
//! OpenAI chat API (OpenAI, vLLM, Ollama, llama.cpp server, ...).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;

use super::{Completion, CompletionRequest, Oracle, TokenUsage};

/// Default API base when `OPENAI_BASE_URL` is not set.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model when `OPENAI_MODEL` is not set.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// The chat API accepts at most this many stop sequences.
const MAX_STOP_SEQUENCES: usize = 4;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "no_stop")]
    stop: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

fn no_stop(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiOracle {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key: None,
            model: model.into(),
        }
    }

    /// Reads `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_MODEL`, falling back to defaults.
    pub fn from_env() -> Self {
        let model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string());
        let mut oracle = Self::new(model);
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            oracle = oracle.with_base_url(url);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            oracle = oracle.with_api_key(key);
        }
        oracle
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Uses a preconfigured client (proxies, TLS, connection pool limits).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn build_body<'a>(model: &'a str, request: &'a CompletionRequest) -> ChatRequest<'a> {
    let stop_len = request.stop.len().min(MAX_STOP_SEQUENCES);
    ChatRequest {
        model,
        messages: [ChatMessage {
            role: "user",
            content: &request.prompt,
        }],
        stop: &request.stop[..stop_len],
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

fn parse_response(response: ChatResponse) -> Result<Completion, OracleError> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| OracleError::InvalidResponse("no choices in response".to_string()))?;
    Ok(Completion {
        text,
        usage: response.usage,
    })
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, OracleError> {
        let body = build_body(&self.model, request);
        tracing::debug!(
            kind = ?request.kind,
            model = %self.model,
            prompt_chars = request.prompt.len(),
            "chat completion request"
        );
        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }
        let res = builder
            .send()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(OracleError::Status { status, body });
        }
        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
        parse_response(parsed)
    }
}
