use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::types::{CompletionProfile, LlmClient};
use super::StructuringError;
use crate::config::{self, ServiceConfig};

/// OpenAI-compatible chat-completion client (OpenRouter by default).
pub struct ChatCompletionClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl ChatCompletionClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, StructuringError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StructuringError::Upstream(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, StructuringError> {
        Self::new(
            &config.llm_base_url,
            &config.api_key,
            &config.model,
            config.http_timeout_secs,
        )
    }
}

/// Request body for /chat/completions
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response body from /chat/completions
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl LlmClient for ChatCompletionClient {
    fn complete(
        &self,
        prompt: &str,
        profile: &CompletionProfile,
    ) -> Result<String, StructuringError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: profile.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
        };

        tracing::debug!(
            model = %self.model,
            prompt_length = prompt.len(),
            max_tokens = profile.max_tokens,
            "Sending chat completion"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", config::APP_REFERER)
            .header("X-Title", config::APP_TITLE)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    StructuringError::Upstream(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    StructuringError::Upstream(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StructuringError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| StructuringError::ResponseParsing(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                StructuringError::ResponseParsing("Completion contained no message content".into())
            })?;

        tracing::debug!(response_length = content.len(), "Chat completion received");

        Ok(content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock LLM client for testing. Returns a configurable response or a
/// configurable upstream failure, and records every prompt it receives.
pub struct MockLlmClient {
    response: String,
    failure: Option<(u16, String)>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            failure: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with `UpstreamStatus { status, body }`.
    pub fn failing(status: u16, body: &str) -> Self {
        Self {
            failure: Some((status, body.to_string())),
            ..Self::new("")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok().and_then(|p| p.last().cloned())
    }
}

impl LlmClient for MockLlmClient {
    fn complete(
        &self,
        prompt: &str,
        _profile: &CompletionProfile,
    ) -> Result<String, StructuringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        match &self.failure {
            Some((status, body)) => Err(StructuringError::UpstreamStatus {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(self.response.clone()),
        }
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
