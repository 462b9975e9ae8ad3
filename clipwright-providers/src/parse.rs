use anyhow::{Context, anyhow};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCompletion {
    pub content: String,
    /// Model reported by the server, if any.
    pub model: Option<String>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<Value>,
}

// Some gateways return content as a list of typed parts instead of a string.
fn content_text(content: Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s),
        Value::Array(parts) => {
            let text: String = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect();
            Some(text)
        }
        _ => None,
    }
}

pub fn parse_chat_completion(body: &[u8]) -> anyhow::Result<ChatCompletion> {
    let resp: ChatResponse = serde_json::from_slice(body).context("decode chat JSON")?;
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("chat completion response has no choices"))?;
    let content = choice
        .message
        .content
        .and_then(content_text)
        .ok_or_else(|| anyhow!("no content in chat completion response"))?;

    Ok(ChatCompletion {
        content,
        model: resp.model,
        finish_reason: choice.finish_reason,
    })
}

/// `error.message` from an OpenAI-style error body (also accepts a bare
/// list of such objects, which some endpoints send).
pub fn parse_api_error(body: &[u8]) -> Option<String> {
    let v: Value = serde_json::from_slice(body).ok()?;
    let obj = match &v {
        Value::Array(items) => items.first()?,
        other => other,
    };
    obj.get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}
