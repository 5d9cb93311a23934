//! Tests for autotelos-llm: generation client against a mock HTTP server,
//! wire types, and the scripted generator.

use autotelos_llm::*;
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, min_interval_secs: f64) -> GenerationConfig {
    GenerationConfig {
        base_url: format!("{}/v1", server.uri()),
        model: "test-model".into(),
        min_interval_secs,
        timeout_secs: 5,
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
}

// ===========================================================================
// Construction
// ===========================================================================

#[test]
fn client_rejects_empty_api_key() {
    let err = GenerationClient::new("  ", &GenerationConfig::default()).err().unwrap();
    assert!(matches!(err, LlmError::Config(_)));
}

#[test]
fn client_rejects_negative_interval() {
    let config = GenerationConfig {
        min_interval_secs: -1.0,
        ..Default::default()
    };
    assert!(matches!(GenerationClient::new("k", &config), Err(LlmError::Config(_))));
}

#[test]
fn client_builds_endpoint_from_base_url() {
    let config = GenerationConfig {
        base_url: "http://localhost:9999/v1/".into(),
        ..Default::default()
    };
    let client = GenerationClient::new("k", &config).unwrap();
    assert_eq!(client.endpoint(), "http://localhost:9999/v1/chat/completions");
}

#[test]
fn generation_config_defaults() {
    let config = GenerationConfig::default();
    assert_eq!(config.min_interval_secs, 8.0);
    assert!(config.base_url.starts_with("https://"));
}

// ===========================================================================
// Generate
// ===========================================================================

#[tokio::test]
async fn generate_sends_request_and_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "temperature": 0.5,
            "max_tokens": 64,
            "messages": [ { "role": "user", "content": "hello" } ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("world")))
        .expect(1)
        .mount(&server)
        .await;

    let client = GenerationClient::new("secret", &config_for(&server, 0.0)).unwrap();
    let text = client
        .generate("hello", GenerateOptions::with_temperature(0.5).max_tokens(64))
        .await
        .unwrap();
    assert_eq!(text, "world");
}

#[tokio::test]
async fn generate_uses_model_override() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "model": "other-model" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let client = GenerationClient::new("k", &config_for(&server, 0.0)).unwrap();
    let text = client
        .generate("x", GenerateOptions::default().model("other-model"))
        .await
        .unwrap();
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn generate_empty_choices_is_typed_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let client = GenerationClient::new("k", &config_for(&server, 0.0)).unwrap();
    let err = client.generate("x", GenerateOptions::default()).await.unwrap_err();
    assert!(matches!(err, LlmError::EmptyResponse));
}

#[tokio::test]
async fn generate_maps_http_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "model": "auth" })))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "model": "busy" })))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "model": "broken" })))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream"))
        .mount(&server)
        .await;

    let client = GenerationClient::new("k", &config_for(&server, 0.0)).unwrap();

    let err = client.generate("x", GenerateOptions::default().model("auth")).await.unwrap_err();
    assert!(matches!(err, LlmError::Auth(ref body) if body == "bad key"));

    let err = client.generate("x", GenerateOptions::default().model("busy")).await.unwrap_err();
    assert!(matches!(err, LlmError::RateLimited(_)));

    let err = client.generate("x", GenerateOptions::default().model("broken")).await.unwrap_err();
    assert!(matches!(err, LlmError::Http { status: 502, .. }));
}

#[tokio::test]
async fn generate_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = GenerationClient::new("k", &config_for(&server, 0.0)).unwrap();
    let err = client.generate("x", GenerateOptions::default()).await.unwrap_err();
    assert!(matches!(err, LlmError::InvalidResponse(_)));
}

#[tokio::test]
async fn generate_unreachable_host_is_transport_error() {
    let config = GenerationConfig {
        base_url: "http://127.0.0.1:1".into(),
        min_interval_secs: 0.0,
        timeout_secs: 2,
        ..Default::default()
    };
    let client = GenerationClient::new("k", &config).unwrap();
    let err = client.generate("x", GenerateOptions::default()).await.unwrap_err();
    assert!(matches!(err, LlmError::Transport(_)));
}

#[tokio::test]
async fn generate_blocks_early_calls_instead_of_rejecting() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .expect(2)
        .mount(&server)
        .await;

    let client = GenerationClient::new("k", &config_for(&server, 0.3)).unwrap();
    let start = Instant::now();
    client.generate("a", GenerateOptions::default()).await.unwrap();
    client.generate("b", GenerateOptions::default()).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(300));
}

// ===========================================================================
// Wire types
// ===========================================================================

#[test]
fn chat_request_serializes_expected_shape() {
    let req = ChatRequest {
        model: "m".into(),
        messages: vec![ChatMessage::user("hi")],
        temperature: 0.5,
        max_tokens: 10,
    };
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["messages"][0]["role"], "user");
    assert_eq!(json["max_tokens"], 10);
}

#[test]
fn chat_response_tolerates_missing_choices() {
    let resp: ChatResponse = serde_json::from_str("{}").unwrap();
    assert!(resp.first_content().is_none());
}

// ===========================================================================
// ScriptedGenerator
// ===========================================================================

#[tokio::test]
async fn scripted_generator_replays_in_order_then_fails() {
    let gen = ScriptedGenerator::sequence(["one", "two"]);
    assert_eq!(gen.generate("p1", GenerateOptions::default()).await.unwrap(), "one");
    assert_eq!(gen.generate("p2", GenerateOptions::default()).await.unwrap(), "two");
    assert!(matches!(
        gen.generate("p3", GenerateOptions::default()).await,
        Err(LlmError::EmptyResponse)
    ));
    let calls = gen.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1].prompt, "p2");
}

#[tokio::test]
async fn scripted_generator_failures_and_responder() {
    let gen = ScriptedGenerator::replies(vec![Reply::Fail("down".into())]);
    assert!(matches!(
        gen.generate("x", GenerateOptions::default()).await,
        Err(LlmError::Http { status: 500, .. })
    ));

    let echo = ScriptedGenerator::responder(|prompt| Ok(prompt.to_uppercase()));
    assert_eq!(echo.generate("abc", GenerateOptions::default()).await.unwrap(), "ABC");
    assert_eq!(echo.call_count(), 1);
}
