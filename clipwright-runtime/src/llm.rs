use anyhow::Context;
use clipwright_core::config::ProviderSettings;
use clipwright_core::text::build_collection_prompt;
use clipwright_core::types::BufferItem;
use clipwright_engine::traits::{GeneratedResponse, ResponseProvider};
use clipwright_providers::openai_compatible::{
    ChatCompletionConfig, build_chat_completions_request, chat_messages,
};
use clipwright_providers::parse::parse_chat_completion;
use clipwright_providers::runtime::{HttpClient, HttpTimeouts};

const PROVIDER_NAME: &str = "openai-compatible";

/// Sends a collected batch to an OpenAI-compatible chat endpoint.
#[derive(Clone)]
pub struct ChatResponseProvider {
    client: HttpClient,
    chat: ChatCompletionConfig,
    system_prompt: Option<String>,
}

impl std::fmt::Debug for ChatResponseProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatResponseProvider")
            .field("chat", &self.chat)
            .field("system_prompt", &self.system_prompt.is_some())
            .finish()
    }
}

impl ChatResponseProvider {
    pub fn new(settings: &ProviderSettings, api_key: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: HttpClient::new(HttpTimeouts::default())?,
            chat: ChatCompletionConfig {
                base_url: settings.base_url.clone(),
                api_key: api_key.into(),
                model: settings.model.clone(),
                temperature: settings.temperature,
            },
            system_prompt: settings.system_prompt.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.chat.model
    }
}

#[async_trait::async_trait]
impl ResponseProvider for ChatResponseProvider {
    async fn submit(&self, items: &[BufferItem]) -> anyhow::Result<GeneratedResponse> {
        if self.chat.api_key.trim().is_empty() {
            anyhow::bail!(
                "no API key configured; set CLIPWRIGHT_API_KEY or store one in the keyring"
            );
        }

        let prompt = build_collection_prompt(items);
        let messages = chat_messages(self.system_prompt.as_deref(), prompt);
        let req = build_chat_completions_request(&self.chat, &messages)?;

        log::info!("requesting response for {} items from {}", items.len(), self.chat.model);
        let body = self
            .client
            .execute(&req)
            .await?
            .into_success_body()
            .with_context(|| format!("{PROVIDER_NAME} ({})", self.chat.model))?;
        let reply = parse_chat_completion(&body)?;

        if let Some(reason) = reply.finish_reason.as_deref().filter(|r| *r != "stop") {
            log::warn!("response finished early: {reason}");
        }

        Ok(GeneratedResponse {
            text: reply.content,
            provider: PROVIDER_NAME.into(),
            model: reply.model.unwrap_or_else(|| self.chat.model.clone()),
        })
    }
}
