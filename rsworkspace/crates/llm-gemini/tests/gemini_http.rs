use httpmock::prelude::*;
use llm_gemini::{GeminiClient, GeminiConfig, GeminiError, KeyKind};
use llm_types::{ConversationThread, PromptRequest, Turn};
use serde_json::json;

fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::new(
        GeminiConfig::default()
            .with_api_base(server.base_url())
            .with_prodia_base(server.base_url()),
    )
    .expect("client should build")
}

fn sse(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|e| format!("data: {}\r\n\r\n", e))
        .collect()
}

#[tokio::test]
async fn generate_streams_and_accumulates_text() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/gemini-1.5-pro-latest:streamGenerateContent")
                .query_param("alt", "sse")
                .header("x-goog-api-key", "test-key")
                .json_body_includes(
                    json!({"generationConfig": {"maxOutputTokens": 750}}).to_string(),
                );
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(sse(&[
                    json!({"candidates":[{"content":{"role":"model","parts":[{"text":"Hello, "}]}}]}),
                    json!({"candidates":[{"content":{"role":"model","parts":[{"text":"friend."}]},"finishReason":"STOP"}]}),
                ]));
        })
        .await;

    let history = ConversationThread::from(vec![Turn::user("hi"), Turn::model("hey")]);
    let req = PromptRequest::new(history, "greet me").with_system_instruction("You are Taurus");
    let text = client_for(&server)
        .generate("test-key", "gemini-1.5-pro-latest", &req)
        .await
        .expect("generation should succeed");

    assert_eq!(text, "Hello, friend.");
    mock.assert_async().await;
}

#[tokio::test]
async fn generate_maps_http_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/gemini-1.5-pro-latest:streamGenerateContent");
            then.status(429).json_body(json!({
                "error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}
            }));
        })
        .await;

    let req = PromptRequest::new(ConversationThread::new(), "hello");
    let err = client_for(&server)
        .generate("k", "gemini-1.5-pro-latest", &req)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(429));
    assert!(err.to_string().contains("Resource has been exhausted"));
}

#[tokio::test]
async fn generate_reports_safety_block() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/m:streamGenerateContent");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(sse(&[json!({"candidates":[{"finishReason":"SAFETY"}]})]));
        })
        .await;

    let req = PromptRequest::new(ConversationThread::new(), "something nasty");
    let err = client_for(&server).generate("k", "m", &req).await.unwrap_err();
    assert!(matches!(err, GeminiError::SafetyBlocked));
    assert_eq!(err.to_string(), "safety-blocked");
}

#[tokio::test]
async fn generate_reports_empty_response() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/m:streamGenerateContent");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(sse(&[json!({"candidates":[{"content":{"parts":[]},"finishReason":"MAX_TOKENS"}]})]));
        })
        .await;

    let req = PromptRequest::new(ConversationThread::new(), "hello");
    let err = client_for(&server).generate("k", "m", &req).await.unwrap_err();
    assert!(matches!(err, GeminiError::EmptyResponse));
}

#[tokio::test]
async fn gemini_key_probe() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/models").header("x-goog-api-key", "good");
            then.status(200).json_body(json!({"models": []}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/models").header("x-goog-api-key", "bad");
            then.status(400).json_body(json!({"error": {"code": 400, "message": "API key not valid"}}));
        })
        .await;

    let client = client_for(&server);
    assert!(client.check_api_key(KeyKind::Gemini, "good").await);
    assert!(!client.check_api_key(KeyKind::Gemini, "bad").await);
}

#[tokio::test]
async fn api_key_never_appears_in_urls_or_errors() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/m:streamGenerateContent")
                .query_param_missing("key")
                .header("x-goog-api-key", "SECRET-KEY-123");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(sse(&[json!({"candidates":[{"content":{"parts":[{"text":"ok"}]}}]})]));
        })
        .await;

    let req = PromptRequest::new(ConversationThread::new(), "hello");
    let text = client_for(&server)
        .generate("SECRET-KEY-123", "m", &req)
        .await
        .expect("generation should succeed");
    assert_eq!(text, "ok");
    mock.assert_async().await;

    // Nothing listens on the discard port; the transport error must not leak the key.
    let unreachable = GeminiClient::new(GeminiConfig::default().with_api_base("http://127.0.0.1:9"))
        .expect("client should build");
    let err = unreachable
        .generate("SECRET-KEY-123", "m", &req)
        .await
        .unwrap_err();
    assert!(matches!(err, GeminiError::Http(_)));
    assert!(!err.to_string().contains("SECRET-KEY-123"));
}

#[tokio::test]
async fn prodia_key_probe_sends_header() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/sd/loras")
                .header("X-Prodia-Key", "prodia-key");
            then.status(200).json_body(json!([]));
        })
        .await;

    assert!(client_for(&server).check_api_key(KeyKind::Prodia, "prodia-key").await);
    mock.assert_async().await;
}
