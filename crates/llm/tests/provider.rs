//! HTTP-level tests for `OpenAiProvider` against a mock server.

use std::time::Duration;

use futures::StreamExt;
use llm::{ApiFlavor, BackoffPolicy, OpenAiProvider, ProviderConfig};
use pipeline::{
    ApiKey, ApiVersion, CallOptions, ChatMessage, ChatRequest, Credentials, EmbeddingProvider,
    EmbeddingRequest, EmbeddingSpec, LlmError, LlmProvider, ModelName,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHAT_PATH: &str = "/openai/deployments/gpt-4o/chat/completions";
const EMBED_PATH: &str = "/openai/deployments/text-embedding-3-small/embeddings";
const API_VERSION: &str = "2024-08-01-preview";

fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        max_attempts: 3,
        multiplier: Duration::from_millis(1),
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

fn direct_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

fn azure(server: &MockServer) -> OpenAiProvider {
    let config = ProviderConfig::new(ApiFlavor::Azure)
        .with_endpoint(server.uri())
        .with_api_key(ApiKey::new("test-key").unwrap())
        .with_api_version(ApiVersion::new(API_VERSION).unwrap())
        .with_embedding(EmbeddingSpec {
            model: ModelName::default_embedding(),
            dimension: 4,
            max_token_size: 8191,
        });
    OpenAiProvider::with_client(direct_client(), config).with_backoff(fast_backoff())
}

fn completion(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }]
    }))
}

fn sse(fragments: &[&str]) -> ResponseTemplate {
    let mut body = String::from("data: {\"choices\":[],\"prompt_filter_results\":[]}\n\n");
    body.push_str("data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n");
    for fragment in fragments {
        let chunk = json!({ "choices": [{ "index": 0, "delta": { "content": fragment } }] });
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str("data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n");
    body.push_str("data: [DONE]\n\n");
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

#[tokio::test]
async fn complete_sends_ordered_messages_and_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(query_param("api-version", API_VERSION))
        .and(header("api-key", "test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "temperature": 0.1,
            "messages": [
                { "role": "system", "content": "be brief" },
                { "role": "user", "content": "hi" },
                { "role": "assistant", "content": "hello" },
                { "role": "user", "content": "what is iTravel?" }
            ]
        })))
        .respond_with(completion("A travel app."))
        .expect(1)
        .mount(&server)
        .await;

    let mut options = CallOptions::default();
    options.extra.insert("temperature".into(), json!(0.1));
    let request = ChatRequest::new("what is iTravel?")
        .with_system_prompt("be brief")
        .with_history(vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")])
        .with_options(options);

    let text = azure(&server).complete(&request).await.unwrap();
    assert_eq!(text, "A travel app.");
}

#[tokio::test]
async fn keyword_extraction_returns_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(completion(
            r#"Here are the terms: {"high_level_keywords": ["a"], "low_level_keywords": ["b"]}"#,
        ))
        .mount(&server)
        .await;

    let request = ChatRequest::new("extract").with_options(CallOptions {
        keyword_extraction: true,
        ..CallOptions::default()
    });
    let text = azure(&server).complete(&request).await.unwrap();
    assert_eq!(
        text,
        r#"{"high_level_keywords": ["a"], "low_level_keywords": ["b"]}"#
    );
}

#[tokio::test]
async fn rate_limit_is_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "0")
                .set_body_json(json!({ "error": { "code": "429", "message": "Rate limit" } })),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(completion("finally"))
        .expect(1)
        .mount(&server)
        .await;

    let text = azure(&server)
        .complete(&ChatRequest::new("q"))
        .await
        .unwrap();
    assert_eq!(text, "finally");
}

#[tokio::test]
async fn rate_limit_surfaces_after_three_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let err = azure(&server)
        .complete(&ChatRequest::new("q"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::RateLimited { .. }), "{err:?}");
}

#[tokio::test]
async fn authentication_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "code": "401", "message": "Access denied due to invalid subscription key." }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = azure(&server)
        .complete(&ChatRequest::new("q"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Authentication { .. }), "{err:?}");
    assert!(err.to_string().contains("invalid subscription key"));
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = azure(&server)
        .complete(&ChatRequest::new("q"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Provider { status: 500, .. }), "{err:?}");
}

#[tokio::test]
async fn per_call_credentials_apply_to_that_call_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("api-key", "call-key"))
        .and(query_param("api-version", "2025-01-01"))
        .respond_with(completion("override"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("api-key", "test-key"))
        .respond_with(completion("default"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = azure(&server);
    let overridden = ChatRequest::new("q").with_options(CallOptions {
        credentials: Credentials {
            endpoint: None,
            api_key: ApiKey::new("call-key"),
            api_version: ApiVersion::new("2025-01-01"),
        },
        ..CallOptions::default()
    });

    assert_eq!(provider.complete(&overridden).await.unwrap(), "override");
    assert_eq!(
        provider.complete(&ChatRequest::new("q")).await.unwrap(),
        "default"
    );
}

#[tokio::test]
async fn stream_yields_fragments_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(sse(&["Hel", "lo", " world"]))
        .expect(1)
        .mount(&server)
        .await;

    let stream = azure(&server)
        .stream(&ChatRequest::new("greet"))
        .await
        .unwrap();
    let fragments: Vec<String> = stream.map(Result::unwrap).collect().await;

    assert_eq!(fragments, ["Hel", "lo", " world"]);
    assert_eq!(fragments.concat(), "Hello world");
}

#[tokio::test]
async fn stream_connection_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(sse(&["ok"]))
        .expect(1)
        .mount(&server)
        .await;

    let stream = azure(&server)
        .stream(&ChatRequest::new("q"))
        .await
        .unwrap();
    let text: String = stream.map(Result::unwrap).collect().await;
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn embed_returns_one_row_per_text_in_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(query_param("api-version", API_VERSION))
        .and(body_partial_json(json!({
            "input": ["a", "b", "c"],
            "encoding_format": "float"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                { "object": "embedding", "index": 2, "embedding": [2.0, 2.0, 2.0, 2.0] },
                { "object": "embedding", "index": 0, "embedding": [0.0, 0.0, 0.0, 0.0] },
                { "object": "embedding", "index": 1, "embedding": [1.0, 1.0, 1.0, 1.0] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = azure(&server);
    let request = EmbeddingRequest::new(vec!["a".into(), "b".into(), "c".into()]);
    let matrix = provider.embed(&request).await.unwrap();

    assert_eq!(matrix.len(), 3);
    assert_eq!(matrix.dimension(), provider.dimension());
    assert!(matrix.rows().iter().all(|row| row.len() == 4));
    assert_eq!(matrix.rows()[1], [1.0, 1.0, 1.0, 1.0]);
}

#[tokio::test]
async fn embed_rejects_wrong_row_width() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [0.5, 0.5] }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = azure(&server)
        .embed(&EmbeddingRequest::new(vec!["a".into()]))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::MalformedResponse { .. }), "{err:?}");
}

fn embeddings(indices: &[usize]) -> ResponseTemplate {
    let data: Vec<_> = indices
        .iter()
        .map(|&i| {
            let row = vec![i as f32; 4];
            json!({ "object": "embedding", "index": i, "embedding": row })
        })
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({ "object": "list", "data": data }))
}

#[tokio::test]
async fn embed_is_retried_on_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after-ms", "1"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(embeddings(&[0, 1]))
        .expect(1)
        .mount(&server)
        .await;

    let matrix = azure(&server)
        .embed(&EmbeddingRequest::new(vec!["a".into(), "b".into()]))
        .await
        .unwrap();
    assert_eq!(matrix.len(), 2);
}

#[tokio::test]
async fn embed_authentication_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = azure(&server)
        .embed(&EmbeddingRequest::new(vec!["a".into()]))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Authentication { .. }), "{err:?}");
}

#[tokio::test]
async fn embed_server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = azure(&server)
        .embed(&EmbeddingRequest::new(vec!["a".into()]))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Provider { status: 503, .. }), "{err:?}");
}

#[tokio::test]
async fn embed_rejects_duplicate_or_missing_indices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(embeddings(&[0, 0, 2]))
        .expect(1)
        .mount(&server)
        .await;

    let texts = vec!["a".into(), "b".into(), "c".into()];
    let err = azure(&server)
        .embed(&EmbeddingRequest::new(texts))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::MalformedResponse { .. }), "{err:?}");
}

#[tokio::test]
async fn redirect_loop_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&server)
        .await;

    let err = azure(&server)
        .complete(&ChatRequest::new("q"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::InvalidRequest { .. }), "{err:?}");
}

#[tokio::test]
async fn embed_of_nothing_makes_no_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let matrix = azure(&server)
        .embed(&EmbeddingRequest::new(Vec::new()))
        .await
        .unwrap();
    assert!(matrix.is_empty());
}

#[tokio::test]
async fn openai_flavour_uses_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
        .respond_with(completion("plain"))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(ApiFlavor::OpenAi)
        .with_endpoint(format!("{}/v1", server.uri()))
        .with_api_key(ApiKey::new("sk-test").unwrap())
        .with_chat_model(ModelName::new("gpt-4o-mini").unwrap());
    let provider = OpenAiProvider::with_client(direct_client(), config);

    let text = provider.complete(&ChatRequest::new("q")).await.unwrap();
    assert_eq!(text, "plain");
}

#[tokio::test]
async fn unreachable_endpoint_is_a_connection_failure() {
    let config = ProviderConfig::new(ApiFlavor::OpenAi)
        .with_endpoint("http://127.0.0.1:9")
        .with_api_key(ApiKey::new("sk").unwrap());
    let provider = OpenAiProvider::with_client(direct_client(), config).with_backoff(fast_backoff());

    let err = provider.complete(&ChatRequest::new("q")).await.unwrap_err();
    assert!(err.is_transient(), "{err:?}");
    assert!(std::error::Error::source(&err).is_some());
}

#[tokio::test]
async fn empty_request_fails_before_any_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let err = azure(&server)
        .complete(&ChatRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::InvalidRequest { .. }));
}
