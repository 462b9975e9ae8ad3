use serde::Serialize;

use crate::request::HttpRequest;

#[derive(Clone, PartialEq)]
pub struct ChatCompletionConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl std::fmt::Debug for ChatCompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

/// System message first (if any), then the user's message.
pub fn chat_messages(system_prompt: Option<&str>, user: String) -> Vec<ChatMessage> {
    system_prompt
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ChatMessage::system)
        .into_iter()
        .chain(std::iter::once(ChatMessage::user(user)))
        .collect()
}

pub fn build_chat_completions_request(
    cfg: &ChatCompletionConfig,
    messages: &[ChatMessage],
) -> anyhow::Result<HttpRequest> {
    let payload = ChatPayload {
        model: &cfg.model,
        messages,
        temperature: cfg.temperature,
    };
    let json = serde_json::to_string(&payload)?;

    Ok(
        HttpRequest::post_json(join_url(&cfg.base_url, "chat/completions"), json)
            .with_header("Authorization", format!("Bearer {}", cfg.api_key)),
    )
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
