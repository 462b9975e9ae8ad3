use std::sync::Arc;

use clipwright_core::config::AppConfig;
use clipwright_engine::controller::{ControllerConfig, SessionController};
use clipwright_engine::traits::{InputDriver, NotificationSink, ResponseProvider};

use crate::llm::ChatResponseProvider;
use crate::secrets::resolve_api_key;

/// Build a runnable session from config + platform collaborators.
///
/// A missing API key is not fatal here: the session still collects, and the
/// request fails with a clear reason when the batch is sent.
pub fn build_controller_from_config(
    cfg: &AppConfig,
    driver: Arc<dyn InputDriver>,
    notifier: Arc<dyn NotificationSink>,
) -> anyhow::Result<SessionController> {
    let api_key = resolve_api_key();
    if api_key.is_none() {
        log::warn!("no API key found; responses will fail until one is configured");
    }
    build_controller_with_key(cfg, api_key.unwrap_or_default(), driver, notifier)
}

pub fn build_controller_with_key(
    cfg: &AppConfig,
    api_key: String,
    driver: Arc<dyn InputDriver>,
    notifier: Arc<dyn NotificationSink>,
) -> anyhow::Result<SessionController> {
    let provider: Arc<dyn ResponseProvider> =
        Arc::new(ChatResponseProvider::new(&cfg.provider, api_key)?);
    log::info!(
        "session configured: {} at {}",
        cfg.provider.model,
        cfg.provider.base_url
    );
    Ok(SessionController::new(
        ControllerConfig::from(cfg),
        driver,
        provider,
        notifier,
    ))
}
