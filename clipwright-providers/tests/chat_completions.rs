use clipwright_providers::openai_compatible::{
    ChatCompletionConfig, build_chat_completions_request, chat_messages,
};
use clipwright_providers::parse::parse_chat_completion;
use clipwright_providers::runtime::{HttpClient, HttpTimeouts};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cfg(server: &MockServer) -> ChatCompletionConfig {
    ChatCompletionConfig {
        base_url: format!("{}/v1", server.uri()),
        api_key: "test-key".into(),
        model: "test-model".into(),
        temperature: 0.3,
    }
}

#[tokio::test]
async fn posts_chat_completion_and_parses_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "messages": [
                {"role": "system", "content": "Answer briefly."},
                {"role": "user", "content": "What is 2+2?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "test-model-001",
            "choices": [{"message": {"role": "assistant", "content": "4"}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let req = build_chat_completions_request(
        &cfg(&server),
        &chat_messages(Some("Answer briefly."), "What is 2+2?".into()),
    )
    .unwrap();

    let client = HttpClient::new(HttpTimeouts::default()).unwrap();
    let body = client.execute(&req).await.unwrap().into_success_body().unwrap();
    let reply = parse_chat_completion(&body).unwrap();
    assert_eq!(reply.content, "4");
    assert_eq!(reply.model.as_deref(), Some("test-model-001"));
}

#[tokio::test]
async fn non_success_status_surfaces_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"message": "invalid api key", "type": "auth"}
        })))
        .mount(&server)
        .await;

    let req =
        build_chat_completions_request(&cfg(&server), &chat_messages(None, "hi".into())).unwrap();
    let client = HttpClient::new(HttpTimeouts::default()).unwrap();
    let resp = client.execute(&req).await.unwrap();
    assert_eq!(resp.status, 401);

    let err = resp.into_success_body().unwrap_err().to_string();
    assert!(err.contains("401") && err.contains("invalid api key"), "{err}");
}
