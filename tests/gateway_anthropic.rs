use std::time::Duration;

use headline_tournament::gateway::{
    AnthropicAdapter, Attribution, ChatProvider, ChatRequest, FinishReason, Message, ModelRoute,
    ProviderError, ProviderId, RateLimitSource,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter(server: &MockServer) -> AnthropicAdapter {
    AnthropicAdapter::with_config("sk-ant-test", server.uri(), Duration::from_secs(5)).unwrap()
}

fn request(messages: Vec<Message>) -> ChatRequest {
    ChatRequest::new(
        ModelRoute::new(ProviderId::Anthropic, "claude-sonnet-4-5"),
        messages,
        Attribution::new("test"),
    )
}

#[tokio::test]
async fn anthropic_hoists_system_prompt_and_joins_text_blocks() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-sonnet-4-5",
            "system": "You write headlines.",
            "max_tokens": 256,
            "messages": [{ "role": "user", "content": "Give me one." }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                { "type": "text", "text": "Mayor Declares " },
                { "type": "text", "text": "War On Llamas" }
            ],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 40, "output_tokens": 7 }
        })))
        .mount(&server)
        .await;

    let req = request(vec![
        Message::system("You write headlines."),
        Message::user("Give me one."),
    ])
    .max_tokens(256);

    let resp = adapter(&server).chat(&req).await.unwrap();
    assert_eq!(resp.content, "Mayor Declares War On Llamas");
    assert_eq!(resp.finish_reason, FinishReason::Stop);
    assert_eq!(resp.input_tokens, 40);
    assert_eq!(resp.output_tokens, 7);
}

#[tokio::test]
async fn anthropic_clamps_temperature_to_its_range() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({ "temperature": 1.0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "ok" }],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 1, "output_tokens": 1 }
        })))
        .mount(&server)
        .await;

    let req = request(vec![Message::user("hi")]).temperature(1.1);
    let resp = adapter(&server).chat(&req).await.unwrap();
    assert_eq!(resp.content, "ok");
}

#[tokio::test]
async fn anthropic_rate_limit_honors_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .insert_header("request-id", "req_42")
                .set_body_json(json!({
                    "type": "error",
                    "error": { "type": "rate_limit_error", "message": "slow down" }
                })),
        )
        .mount(&server)
        .await;

    let err = adapter(&server)
        .chat(&request(vec![Message::user("hi")]))
        .await
        .unwrap_err();
    match err {
        ProviderError::RateLimited {
            retry_after,
            limit_source,
            context,
        } => {
            assert_eq!(retry_after, Duration::from_secs(7));
            assert_eq!(limit_source, RateLimitSource::Remote);
            let ctx = context.expect("expected error context");
            assert_eq!(ctx.provider_code.as_deref(), Some("rate_limit_error"));
            assert_eq!(ctx.request_id.as_deref(), Some("req_42"));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn anthropic_overload_is_transient_and_bad_request_is_not() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({ "messages": [{ "content": "overload" }] })))
        .respond_with(ResponseTemplate::new(529).set_body_json(json!({
            "type": "error",
            "error": { "type": "overloaded_error", "message": "Overloaded" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({ "messages": [{ "content": "bad" }] })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "type": "error",
            "error": { "type": "invalid_request_error", "message": "nope" }
        })))
        .mount(&server)
        .await;

    let adapter = adapter(&server);

    let err = adapter
        .chat(&request(vec![Message::user("overload")]))
        .await
        .unwrap_err();
    assert!(err.is_retryable(), "{err:?}");

    let err = adapter
        .chat(&request(vec![Message::user("bad")]))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidRequest { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn anthropic_refusal_stop_reason_is_refused() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [],
            "stop_reason": "refusal",
            "usage": { "input_tokens": 3, "output_tokens": 0 }
        })))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .chat(&request(vec![Message::user("hi")]))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Refused { .. }));
}

#[tokio::test]
async fn anthropic_requires_a_non_system_message() {
    let server = MockServer::start().await;
    let err = adapter(&server)
        .chat(&request(vec![Message::system("only instructions")]))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidRequest { .. }));
}
