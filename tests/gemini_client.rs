//! Runs `GeminiChatClient` against a local stand-in for the generateContent endpoint.

use axum::extract::{ Path, State };
use axum::http::{ HeaderMap, StatusCode };
use axum::routing::post;
use axum::{ Json, Router };
use gemini_chat_api::llm::chat::gemini::GeminiChatClient;
use gemini_chat_api::llm::chat::{ ChatClient, ProviderError };
use serde_json::{ json, Value };
use std::sync::{ Arc, Mutex };
use std::time::Duration;

#[derive(Clone)]
struct Upstream {
    status: StatusCode,
    reply: Value,
    delay: Duration,
    seen: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
}

async fn generate(
    State(upstream): State<Upstream>,
    Path(model_call): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>
) -> (StatusCode, Json<Value>) {
    let key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    upstream.seen.lock().unwrap().push((model_call, key, body));
    tokio::time::sleep(upstream.delay).await;
    (upstream.status, Json(upstream.reply.clone()))
}

async fn spawn_upstream(status: StatusCode, reply: Value, delay: Duration) -> (String, Upstream) {
    let upstream = Upstream { status, reply, delay, seen: Arc::default() };
    let app = Router::new()
        .route("/v1beta/models/{model_call}", post(generate))
        .with_state(upstream.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/v1beta", addr), upstream)
}

fn client(base_url: String, timeout: Duration) -> GeminiChatClient {
    GeminiChatClient::new("test-key".into(), None, Some(base_url), timeout).unwrap()
}

#[tokio::test]
async fn sends_fragments_as_parts_of_one_user_turn() {
    let reply = json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": "hello" }] } }]
    });
    let (base_url, upstream) = spawn_upstream(StatusCode::OK, reply, Duration::ZERO).await;

    let contents = vec!["instruction".to_string(), "message_history: []".into(), "user_message: hi".into()];
    let resp = client(base_url, Duration::from_secs(5)).complete(&contents).await.unwrap();

    assert_eq!(resp.text.as_deref(), Some("hello"));
    let seen = upstream.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    let (model_call, key, body) = &seen[0];
    assert_eq!(model_call, "gemini-2.0-flash:generateContent");
    assert_eq!(key.as_deref(), Some("test-key"));
    assert_eq!(
        body,
        &json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": "instruction" },
                    { "text": "message_history: []" },
                    { "text": "user_message: hi" }
                ]
            }]
        })
    );
}

#[tokio::test]
async fn region_error_body_becomes_region_restricted() {
    let reply = json!({
        "error": {
            "code": 400,
            "message": "User location is not supported for the API use.",
            "status": "FAILED_PRECONDITION"
        }
    });
    let (base_url, _) = spawn_upstream(StatusCode::BAD_REQUEST, reply, Duration::ZERO).await;

    let err = client(base_url, Duration::from_secs(5)).complete(&["hi".to_string()]).await.unwrap_err();
    assert!(matches!(err, ProviderError::RegionRestricted(_)));
}

#[tokio::test]
async fn unavailable_upstream_is_transient() {
    let reply = json!({ "error": { "code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE" } });
    let (base_url, _) = spawn_upstream(StatusCode::SERVICE_UNAVAILABLE, reply, Duration::ZERO).await;

    let err = client(base_url, Duration::from_secs(5)).complete(&["hi".to_string()]).await.unwrap_err();
    assert_eq!(err, ProviderError::Server { status: 503, message: "The model is overloaded.".into() });
    assert!(err.is_transient());
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let reply = json!({ "candidates": [] });
    let (base_url, _) = spawn_upstream(StatusCode::OK, reply, Duration::from_secs(2)).await;

    let err = client(base_url, Duration::from_millis(100)).complete(&["hi".to_string()]).await.unwrap_err();
    assert!(matches!(err, ProviderError::Timeout(_)), "unexpected error: {:?}", err);
}

#[tokio::test]
async fn blocked_prompt_yields_no_text() {
    let reply = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
    let (base_url, _) = spawn_upstream(StatusCode::OK, reply, Duration::ZERO).await;

    let resp = client(base_url, Duration::from_secs(5)).complete(&["hi".to_string()]).await.unwrap();
    assert_eq!(resp.text, None);
}
