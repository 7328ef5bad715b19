use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vocalkart_core::config::{LlmConfig, LlmProvider};

const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `chat/completions` endpoint.
///
/// Transient statuses (429, 500, 502, 503, 504) and connect/timeout failures are
/// retried up to `max_retries` times with a linear delay. Any other non-2xx
/// status fails immediately.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    requires_key: bool,
    max_retries: u32,
    retry_delay: Duration,
}

impl ChatCompletionsClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build generator HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|key| !key.expose_secret().trim().is_empty()),
            requires_key: config.provider == LlmProvider::OpenAi,
            max_retries: config.max_retries,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, prompt: &str) -> reqwest::RequestBuilder {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
        };
        let request = self.client.post(&self.endpoint).json(&body);
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if self.requires_key && self.api_key.is_none() {
            bail!("generator api key is not configured");
        }

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                warn!(
                    event_name = "pipeline.generate.retry",
                    attempt,
                    "retrying generator request after transient failure"
                );
                tokio::time::sleep(self.retry_delay * attempt).await;
            }

            let response = match self.request(prompt).send().await {
                Ok(response) => response,
                Err(error)
                    if (error.is_connect() || error.is_timeout()) && attempt < self.max_retries =>
                {
                    warn!(error = %error, attempt, "generator request failed, will retry");
                    attempt += 1;
                    continue;
                }
                Err(error) => return Err(error).context("generator request failed"),
            };

            let status = response.status();
            debug!(status = %status, attempt, "generator response received");

            if status.is_success() {
                let body: ChatResponse =
                    response.json().await.context("failed to decode generator response")?;
                return body
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .ok_or_else(|| anyhow!("generator response carried no message content"));
            }

            if is_transient(status) && attempt < self.max_retries {
                warn!(status = %status, attempt, "transient generator status, will retry");
                attempt += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            bail!("generator returned {status}: {body}");
        }
    }
}

fn is_transient(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// Replays queued replies in order and records every prompt it receives.
/// An exhausted script fails the call.
#[derive(Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push(Ok(reply.into()));
        self
    }

    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|prompts| prompts.clone()).unwrap_or_default()
    }

    fn push(&self, reply: Result<String, String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self
            .replies
            .lock()
            .map_err(|_| anyhow!("scripted generator lock poisoned"))?
            .pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow!(message)),
            None => bail!("scripted generator has no reply left"),
        }
    }
}
