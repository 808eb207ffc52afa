//! Message generation and moderation via an OpenAI-compatible chat API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::AssistantConfig;

/// Generated messages are cut to this many characters.
pub const GENERATED_MAX_CHARS: usize = 100;

const MODERATION_PROMPT: &str = "You are a strict content moderator for a public blockchain guestbook. \
Review the input for hate speech, racial slurs, obvious scams, or illegal content. \
Be lenient with 'crypto slang' or mild swearing, but strict on toxicity. \
Reply with a JSON object of the form {\"isSafe\": boolean, \"reason\": string}.";

const GENERATION_PROMPT: &str = "You are a witty crypto native. Generate a short, funny, \
slightly degen message for a blockchain guestbook. Max 100 chars. No hashtags.";

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upstream rate limited: {0}")]
    RateLimited(String),

    #[error("Upstream error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Moderation outcome for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationVerdict {
    pub is_safe: bool,
    pub reason: String,
}

#[async_trait]
pub trait Assistant: Send + Sync {
    async fn moderate(&self, message: &str) -> Result<ModerationVerdict, AssistantError>;

    async fn generate(&self) -> Result<String, AssistantError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Raw verdict as the model returns it; both fields must be present.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVerdict {
    is_safe: Option<bool>,
    reason: Option<String>,
}

pub struct OpenAiAssistant {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiAssistant {
    pub fn new(config: &AssistantConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to build HTTP client with custom timeout, using default client");
                Client::new()
            });

        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> Result<String, AssistantError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %request.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(AssistantError::RateLimited(body));
            }
            error!(status = %status, "Chat completion failed: {}", body);
            return Err(AssistantError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = response.json().await?;
        first_content(body)
    }
}

#[async_trait]
impl Assistant for OpenAiAssistant {
    async fn moderate(&self, message: &str) -> Result<ModerationVerdict, AssistantError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MODERATION_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Review this message: \"{message}\""),
                },
            ],
            max_tokens: None,
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
        };
        let content = self.complete(&request).await?;
        parse_verdict(&content)
    }

    async fn generate(&self) -> Result<String, AssistantError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: GENERATION_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: "Write a guestbook message.".to_string(),
                },
            ],
            max_tokens: Some(60),
            response_format: None,
        };
        let content = self.complete(&request).await?;
        Ok(clip_generated(&content))
    }
}

fn first_content(response: ChatResponse) -> Result<String, AssistantError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or_else(|| AssistantError::MalformedResponse("no message content in choices".into()))
}

pub(crate) fn parse_verdict(content: &str) -> Result<ModerationVerdict, AssistantError> {
    let raw: RawVerdict = serde_json::from_str(content)
        .map_err(|e| AssistantError::MalformedResponse(format!("verdict is not JSON: {e}")))?;

    match (raw.is_safe, raw.reason) {
        (Some(is_safe), Some(reason)) => Ok(ModerationVerdict { is_safe, reason }),
        (None, _) => Err(AssistantError::MalformedResponse("missing isSafe".into())),
        (_, None) => Err(AssistantError::MalformedResponse("missing reason".into())),
    }
}

pub(crate) fn clip_generated(text: &str) -> String {
    text.trim().chars().take(GENERATED_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verdict() {
        let verdict = parse_verdict(r#"{"isSafe": false, "reason": "scam link"}"#).unwrap();
        assert_eq!(
            verdict,
            ModerationVerdict {
                is_safe: false,
                reason: "scam link".to_string()
            }
        );
    }

    #[test]
    fn test_parse_verdict_missing_fields() {
        assert!(matches!(
            parse_verdict(r#"{"reason": "ok"}"#),
            Err(AssistantError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_verdict(r#"{"isSafe": true}"#),
            Err(AssistantError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_verdict("definitely safe"),
            Err(AssistantError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_first_content_requires_a_choice() {
        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            first_content(empty),
            Err(AssistantError::MalformedResponse(_))
        ));

        let full: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"role": "assistant", "content": "gm"}}]}"#)
                .unwrap();
        assert_eq!(first_content(full).unwrap(), "gm");
    }

    #[test]
    fn test_clip_generated() {
        assert_eq!(clip_generated("  wagmi  \n"), "wagmi");
        let long = "🚀".repeat(150);
        assert_eq!(clip_generated(&long).chars().count(), GENERATED_MAX_CHARS);
    }

    #[test]
    fn test_verdict_serializes_camel_case() {
        let json = serde_json::to_value(ModerationVerdict {
            is_safe: true,
            reason: "fine".into(),
        })
        .unwrap();
        assert_eq!(json["isSafe"], true);
        assert_eq!(json["reason"], "fine");
    }
}
