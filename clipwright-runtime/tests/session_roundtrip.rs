use std::sync::Arc;
use std::time::Duration;

use clipwright_core::config::{AppConfig, TimingSettings};
use clipwright_core::types::{BufferItem, SessionState};
use clipwright_engine::traits::ResponseProvider;
use clipwright_platform::test::{MemoryDriver, RecordingNotifier};
use clipwright_runtime::llm::ChatResponseProvider;
use clipwright_runtime::runtime_controller::build_controller_with_key;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.provider.base_url = format!("{}/v1beta/openai", server.uri());
    cfg.provider.model = "mock-flash".into();
    cfg.provider.system_prompt = Some("You are concise.".into());
    cfg.timing = TimingSettings::immediate();
    cfg
}

#[tokio::test]
async fn provider_sends_numbered_items_and_strips_reasoning() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/openai/chat/completions"))
        .and(header("authorization", "Bearer k-123"))
        .and(body_string_contains("--- Item 1 ---\\nfirst"))
        .and(body_string_contains("--- Item 2 ---\\nsecond"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "done"}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = config_for(&server);
    let provider = ChatResponseProvider::new(&cfg.provider, "k-123").unwrap();
    let items = [
        BufferItem::new("first").unwrap(),
        BufferItem::new("second").unwrap(),
    ];
    let reply = provider.submit(&items).await.unwrap();
    assert_eq!(reply.text, "done");
    assert_eq!(reply.model, "mock-flash");
}

#[tokio::test]
async fn missing_key_fails_without_network() {
    let server = MockServer::start().await;
    let cfg = config_for(&server);
    let provider = ChatResponseProvider::new(&cfg.provider, "").unwrap();

    let err = provider
        .submit(&[BufferItem::new("x").unwrap()])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no API key"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn controller_round_trip_against_mock_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/openai/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "mock-flash-001",
            "choices": [{"message": {"content": "<think>hmm</think>The summary."}}]
        })))
        .mount(&server)
        .await;

    let driver = Arc::new(MemoryDriver::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = build_controller_with_key(
        &config_for(&server),
        "k".into(),
        driver.clone(),
        notifier.clone(),
    )
    .unwrap();

    controller.start_collecting().await.unwrap();
    driver.set_clipboard("notes to summarize");
    controller.add_to_buffer().await.ok();
    controller.finish_collecting().await.unwrap();

    let mut status = controller.status().await;
    for _ in 0..300 {
        if status.state == SessionState::ResponseReady {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        status = controller.status().await;
    }
    assert_eq!(status.state, SessionState::ResponseReady);
    assert_eq!(status.response_preview.as_deref(), Some("The summary."));

    controller.paste_response().await.unwrap();
    assert_eq!(driver.pastes(), vec!["The summary.".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn http_error_lands_in_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "error": {"message": "quota exhausted"}
        })))
        .mount(&server)
        .await;

    let driver = Arc::new(MemoryDriver::new());
    let controller = build_controller_with_key(
        &config_for(&server),
        "k".into(),
        driver.clone(),
        Arc::new(RecordingNotifier::default()),
    )
    .unwrap();

    controller.start_collecting().await.unwrap();
    driver.set_clipboard("anything");
    controller.add_to_buffer().await.ok();
    controller.finish_collecting().await.unwrap();

    let mut status = controller.status().await;
    for _ in 0..300 {
        if status.last_error.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        status = controller.status().await;
    }
    let err = status.last_error.expect("request should fail");
    assert!(err.contains("429") && err.contains("quota exhausted"), "{err}");
    assert_eq!(status.state, SessionState::Collecting);
}
