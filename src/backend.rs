//! LLM backends that turn a rendered prompt into a completion.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const CHAT_COMPLETIONS_PATH: &str = "/api/chat/completions";
const MAX_ERROR_BODY: usize = 500;

/// A model that answers a single prompt with a single reply.
pub trait LlmBackend {
    /// Sends `prompt` as one user message and returns the reply text.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the reply is unusable.
    fn complete(&self, prompt: &str) -> Result<String>;
}

impl<T: LlmBackend + ?Sized> LlmBackend for Box<T> {
    fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt)
    }
}

/// `[components.<name>.model]` section of a pipeline config.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ModelConfig {
    /// OpenWebUI's OpenAI-compatible chat endpoint
    #[serde(rename = "openwebui")]
    OpenWebUi(OpenWebUiConfig),
}

impl ModelConfig {
    /// Builds the backend described by this section.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is incomplete or the HTTP client
    /// cannot be created.
    pub fn build(&self) -> Result<Box<dyn LlmBackend>> {
        match self {
            Self::OpenWebUi(config) => Ok(Box::new(OpenWebUi::new(config.clone())?)),
        }
    }
}

/// Settings for the OpenWebUI backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenWebUiConfig {
    /// Model identifier as listed by OpenWebUI
    pub name: String,

    /// Base URL of the OpenWebUI instance
    pub url: String,

    /// Bearer credential
    pub api_key: String,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Upper bound on generated tokens
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Request timeout; unset waits indefinitely
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Blocking client for an OpenWebUI instance.
pub struct OpenWebUi {
    client: reqwest::blocking::Client,
    endpoint: String,
    config: OpenWebUiConfig,
}

impl std::fmt::Debug for OpenWebUi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWebUi")
            .field("endpoint", &self.endpoint)
            .field("model", &self.config.name)
            .finish_non_exhaustive()
    }
}

impl OpenWebUi {
    /// Creates a client for the configured instance.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL, key, or model name is
    /// empty, or an HTTP error if the client cannot be built.
    pub fn new(config: OpenWebUiConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(Error::config("openwebui model requires a non-empty 'url'"));
        }
        if config.api_key.is_empty() {
            return Err(Error::config(
                "openwebui model requires a non-empty 'api_key'",
            ));
        }
        if config.name.trim().is_empty() {
            return Err(Error::config("openwebui model requires a 'name'"));
        }

        let endpoint = format!(
            "{}{}",
            config.url.trim().trim_end_matches('/'),
            CHAT_COMPLETIONS_PATH
        );
        let parsed = reqwest::Url::parse(&endpoint)
            .map_err(|e| Error::config(format!("invalid openwebui url '{}': {e}", config.url)))?;

        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout_secs.map(Duration::from_secs));

        // proxies from the environment cannot reach a local instance
        if is_loopback(&parsed) {
            builder = builder.no_proxy();
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    /// Returns the full chat completions URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl LlmBackend for OpenWebUi {
    #[instrument(skip_all, fields(model = %self.config.name))]
    fn complete(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.name,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(
            "POST {} ({} prompt chars)",
            self.endpoint,
            prompt.chars().count()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        let text = response.text()?;

        if !status.is_success() {
            return Err(Error::Service {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY),
            });
        }

        debug!("LLM service replied {} ({} bytes)", status, text.len());
        parse_reply(&text)
    }
}

fn parse_reply(body: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| Error::malformed(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| Error::malformed("reply has no message content"))
}

fn is_loopback(url: &reqwest::Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
