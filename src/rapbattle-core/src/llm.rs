//! Chat-completion client abstraction.
//!
//! The orchestrator talks to the model through [`ChatCompleter`]; the
//! concrete implementation targets any OpenAI-compatible endpoint.

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::DebateError;

/// Who said a line of debate history, from the model's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// One prior message handed to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// Per-call completion options.
#[derive(Debug, Clone, Copy)]
pub struct CompletionOpts {
    pub temperature: f32,
    /// Upper bound on the response length; enforcement is the caller's job
    /// via [`truncate_at_whitespace`].
    pub max_chars: usize,
}

/// Chat-completion seam.
///
/// Implementations map failures onto the shared taxonomy: network trouble
/// and 5xx-class responses are `Transient`, rejected requests `Permanent`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        opts: CompletionOpts,
    ) -> Result<String, DebateError>;
}

/// Client for OpenAI-compatible chat endpoints.
pub struct OpenAiChatClient {
    client: Client<OpenAIConfig>,
    deployment: String,
}

impl OpenAiChatClient {
    pub fn new(endpoint: &str, api_key: &str, deployment: &str) -> Result<Self, DebateError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DebateError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(endpoint);

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
            deployment: deployment.to_string(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, DebateError> {
        Self::new(&config.endpoint, &config.api_key, &config.deployment)
    }
}

#[async_trait]
impl ChatCompleter for OpenAiChatClient {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        opts: CompletionOpts,
    ) -> Result<String, DebateError> {
        let mut request_messages = vec![ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessage {
                content: system_prompt.into(),
                name: None,
            },
        )];
        for message in messages {
            request_messages.push(match message.role {
                ChatRole::User => {
                    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                        content: message.text.clone().into(),
                        name: None,
                    })
                }
                ChatRole::Assistant => {
                    ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                        content: Some(message.text.clone().into()),
                        name: None,
                        tool_calls: None,
                        refusal: None,
                        audio: None,
                        function_call: None,
                    })
                }
            });
        }

        // Rough chars-per-token bound keeps the response under the char cap
        // without starving the model.
        let max_tokens = (opts.max_chars as u32 / 2).max(256);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.deployment)
            .temperature(opts.temperature)
            .max_completion_tokens(max_tokens)
            .messages(request_messages)
            .build()
            .map_err(|e| DebateError::Permanent(format!("invalid completion request: {}", e)))?;

        match self.client.chat().create(request).await {
            Ok(response) => Ok(response
                .choices
                .first()
                .and_then(|c| c.message.content.clone())
                .unwrap_or_default()),
            Err(e) => Err(classify_openai_error(e)),
        }
    }
}

fn classify_openai_error(err: OpenAIError) -> DebateError {
    match err {
        OpenAIError::Reqwest(e) => DebateError::Transient(e.to_string()),
        OpenAIError::ApiError(api) => {
            let kind = api.r#type.as_deref().unwrap_or("");
            if kind == "server_error" || kind == "rate_limit_exceeded" {
                DebateError::Transient(api.message)
            } else {
                DebateError::Permanent(api.message)
            }
        }
        other => DebateError::Permanent(other.to_string()),
    }
}

/// Tags whose whole block is model scratch work, never a deliverable line.
const REASONING_TAGS: [&str; 6] = [
    "thinking",
    "think",
    "reasoning",
    "reflection",
    "scratchpad",
    "internal",
];

/// Strip model reasoning artifacts from an utterance.
///
/// Removes `<think>`-style blocks, orphan tags, and markdown emphasis, then
/// collapses whitespace. Responses are spoken aloud, so anything that is not
/// a deliverable line has to go.
pub fn sanitize_utterance(response: &str) -> String {
    let mut result = response.to_string();

    for tag in REASONING_TAGS {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>");
        if let Ok(re) = Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    if let Ok(re) = Regex::new(r"</?[\w]+[^>]*>") {
        result = re.replace_all(&result, "").to_string();
    }

    result = result.replace('*', "");

    if let Ok(re) = Regex::new(r"\s+") {
        result = re.replace_all(&result, " ").to_string();
    }

    result.trim().to_string()
}

/// Truncate `text` to at most `max_chars` characters, cutting at the last
/// whitespace boundary and appending an ellipsis when anything was dropped.
pub fn truncate_at_whitespace(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    let cut = match head.rfind(char::is_whitespace) {
        Some(idx) => head[..idx].trim_end(),
        None => head.as_str(),
    };
    format!("{}…", cut)
}
