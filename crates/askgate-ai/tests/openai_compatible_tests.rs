use askgate_ai::{
    Embedder, GenerationConfig, LLMProvider, Message, OpenAICompatibleConfig,
    OpenAICompatibleEmbedder, OpenAICompatibleProvider, ProviderError, RetryPolicy,
};
use axum::{http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn config(base_url: String) -> OpenAICompatibleConfig {
    OpenAICompatibleConfig {
        base_url,
        model: "test-chat".into(),
        embedding_model: "test-embed".into(),
        timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn completion(text: &str) -> Value {
    json!({
        "id": "cmpl-1",
        "model": "test-chat",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

#[tokio::test]
async fn chat_completion_roundtrip() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["model"], "test-chat");
            assert_eq!(body["messages"][0]["role"], "system");
            Json(completion("The refund window is 30 days."))
        }),
    );
    let base = spawn_server(app).await;
    let provider = OpenAICompatibleProvider::new(config(format!("{base}/v1"))).unwrap();

    let response = provider
        .generate_chat(
            &[Message::system("be terse"), Message::user("refund window?")],
            &GenerationConfig::default(),
        )
        .await
        .unwrap();
    assert_eq!(response.content, "The refund window is 30 days.");
    assert_eq!(response.total_tokens, Some(15));
}

#[tokio::test]
async fn rate_limit_is_transient_and_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    (StatusCode::TOO_MANY_REQUESTS, Json(json!({"error": "slow down"})))
                } else {
                    (StatusCode::OK, Json(completion("ok")))
                }
            }
        }),
    );
    let base = spawn_server(app).await;
    let provider = OpenAICompatibleProvider::new(config(format!("{base}/v1"))).unwrap();

    let generation = GenerationConfig::default();
    let response = RetryPolicy::no_delay(3)
        .run("chat", |_| provider.generate("q", &generation))
        .await
        .unwrap();
    assert_eq!(response.content, "ok");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unauthorized_is_fatal() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
    );
    let base = spawn_server(app).await;
    let provider = OpenAICompatibleProvider::new(config(format!("{base}/v1"))).unwrap();

    let err = provider
        .generate("q", &GenerationConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Fatal(ref m) if m.contains("401")));
}

#[tokio::test]
async fn malformed_body_is_fatal() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async { Json(json!({"unexpected": true})) }),
    );
    let base = spawn_server(app).await;
    let provider = OpenAICompatibleProvider::new(config(format!("{base}/v1"))).unwrap();

    let err = provider
        .generate("q", &GenerationConfig::default())
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn unreachable_endpoint_is_transient() {
    // bind then drop so the port is closed
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let provider = OpenAICompatibleProvider::new(config(format!("http://{addr}/v1"))).unwrap();

    let err = provider
        .generate("q", &GenerationConfig::default())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn embeddings_check_dimension() {
    let app = Router::new().route(
        "/v1/embeddings",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["model"], "test-embed");
            Json(json!({"data": [{"index": 0, "embedding": [0.1, 0.2, 0.3]}]}))
        }),
    );
    let base = spawn_server(app).await;

    let embedder = OpenAICompatibleEmbedder::new(config(format!("{base}/v1")), 3).unwrap();
    assert_eq!(embedder.embed("hello").await.unwrap().len(), 3);

    let mismatched = OpenAICompatibleEmbedder::new(config(format!("{base}/v1")), 4).unwrap();
    assert!(matches!(
        mismatched.embed("hello").await.unwrap_err(),
        ProviderError::Fatal(_)
    ));
}
