use crate::agent::AIAgent;
use crate::cli::Args;
use crate::error::ChatError;
use crate::models::api::{ ErrorResponse, StatusResponse };
use crate::models::chat::{ ChatRequest, ChatResponse };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Json,
    Router,
    extract::{ State, rejection::JsonRejection },
    response::{ IntoResponse, Response },
    http::{ HeaderValue, StatusCode },
};
use tower_http::cors::{ AllowHeaders, AllowMethods, AllowOrigin, CorsLayer };
use log::{ info, warn };

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<AIAgent>,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = match &self {
            ChatError::Validation(_) | ChatError::Precondition(_) => StatusCode::BAD_REQUEST,
            ChatError::RegionRestricted(_) => StatusCode::FORBIDDEN,
            ChatError::Generation | ChatError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorResponse { detail: self.detail() })).into_response()
    }
}

/// Credentialed CORS for a fixed set of origins. Methods and headers asked
/// for in the preflight are mirrored back.
pub fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, Box<dyn Error + Send + Sync>> {
    let origins = allowed_origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .map(|o| {
            if o == "*" {
                return Err("Wildcard CORS origin cannot be combined with credentials".to_string());
            }
            HeaderValue::from_str(o).map_err(|e| format!("Invalid CORS origin '{}': {}", o, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if origins.is_empty() {
        warn!("No CORS origins configured. Browsers on other origins will be refused.");
    }

    Ok(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
    )
}

pub fn app_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(read_root))
        .route("/api/chat", post(chat_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    addr: &str,
    agent: Arc<AIAgent>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;
    let cors = cors_layer(&args.allowed_origins)?;
    info!("CORS allowed origins: {:?}", args.allowed_origins);

    let app = app_router(AppState { agent }, cors);

    if args.enable_tls {
        let (cert_path, key_path) = match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert), Some(key)) => (cert, key),
            _ => {
                return Err("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.".into());
            }
        };
        info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;

        info!("Starting HTTPS API server on: https://{}", addr);
        axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e)
        })?;
        info!("Starting HTTP API server on: http://{}", addr);
        axum::serve(listener, app.into_make_service()).await?;
    }

    Ok(())
}

async fn read_root() -> Json<StatusResponse> {
    Json(StatusResponse::running())
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Result<Json<ChatResponse>, Response> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected chat request body: {}", rejection.body_text());
        (rejection.status(), Json(ErrorResponse { detail: rejection.body_text() })).into_response()
    })?;

    state.agent
        .process_chat(request).await
        .map(Json)
        .map_err(IntoResponse::into_response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::InMemoryHistoryStore;
    use crate::llm::chat::{ ChatClient, CompletionResponse, ProviderError, RetryPolicy };
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{ header, Method, Request };
    use tower::ServiceExt;

    struct Unreachable;

    #[async_trait]
    impl ChatClient for Unreachable {
        async fn complete(&self, _: &[String]) -> Result<CompletionResponse, ProviderError> {
            Err(ProviderError::Connection("offline".into()))
        }

        fn get_model(&self) -> String {
            "offline".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    fn router() -> Router {
        let agent = AIAgent::with_clients(
            Arc::new(Unreachable),
            Arc::new(InMemoryHistoryStore::unbounded()),
            RetryPolicy::no_retry()
        );
        let cors = cors_layer(&["http://localhost:5173".to_string()]).unwrap();
        app_router(AppState { agent: Arc::new(agent) }, cors)
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/chat")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn preflight_from_allowed_origin_is_credentialed() {
        let response = router().oneshot(preflight("http://localhost:5173")).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:5173");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "content-type");
    }

    #[tokio::test]
    async fn preflight_from_unknown_origin_gets_no_grant() {
        let response = router().oneshot(preflight("https://evil.example")).await.unwrap();
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[test]
    fn invalid_origin_is_a_startup_error() {
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
        assert!(cors_layer(&["*".to_string()]).is_err());
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_with_detail() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"messages": "nope"}"#))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["detail"].as_str().unwrap().contains("messages"));
    }
}
