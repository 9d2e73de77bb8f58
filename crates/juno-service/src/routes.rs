//! HTTP routes.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{Method, header},
    routing::{get, post},
};
use chrono::Utc;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use juno_datalog::DatalogError;

use crate::ServiceError;
use crate::config::ServiceConfig;
use crate::eval::{EvalRequest, EvalResponse, evaluate_request};
use crate::registry::{ProgramRegistry, RulesInfo};

/// Shared state for the HTTP server.
pub struct AppState {
    pub registry: Arc<ProgramRegistry>,
    pub config: ServiceConfig,
    started_at: Instant,
}

impl AppState {
    pub fn new(registry: Arc<ProgramRegistry>, config: ServiceConfig) -> Self {
        Self {
            registry,
            config,
            started_at: Instant::now(),
        }
    }
}

/// Create the service router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handle_health))
        .route("/version", get(handle_version))
        .route("/info", get(handle_info))
        .route("/eval", post(handle_eval))
        .route("/reload", post(handle_reload))
        .layer(cors)
        .with_state(state)
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "engine": "juno-datalog",
        "version": state.config.version,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn handle_version(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "version": state.config.version,
        "rules_hash": state.registry.info().hash,
    }))
}

async fn handle_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "service": "juno",
        "version": state.config.version,
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "rules": state.registry.info(),
    }))
}

async fn handle_eval(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EvalRequest>, JsonRejection>,
) -> Result<Json<EvalResponse>, ServiceError> {
    let Json(request) =
        payload.map_err(|rejection| DatalogError::Parse(rejection.body_text()))?;

    let response = evaluate_request(
        &state.registry,
        state.config.limits,
        state.config.default_timeout,
        request,
    )
    .await?;
    Ok(Json(response))
}

async fn handle_reload(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RulesInfo>, ServiceError> {
    let registry = Arc::clone(&state.registry);
    let rules = tokio::task::spawn_blocking(move || registry.reload()).await??;
    info!(count = rules.count, hash = %rules.hash, "reload requested over HTTP");
    Ok(Json(rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn create_test_router() -> Router {
        let state = AppState::new(
            Arc::new(ProgramRegistry::empty()),
            ServiceConfig {
                version: "1.2.3".to_string(),
                ..ServiceConfig::default()
            },
        );
        create_router(Arc::new(state))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = create_test_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["engine"], "juno-datalog");
        assert_eq!(json["version"], "1.2.3");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_version_endpoint() {
        let response = create_test_router()
            .oneshot(Request::builder().uri("/version").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["version"], "1.2.3");
        assert_eq!(json["rules_hash"], "e3b0c44298fc1c14");
    }

    #[tokio::test]
    async fn test_eval_endpoint() {
        let request = json!({
            "rules": [{
                "head": {"pred": "allow", "args": ["_U", "_M"]},
                "body": [
                    {"pred": "userXP", "args": ["_U", "_X"]},
                    {"pred": "moduleReq", "args": ["_M", "_R"]},
                    {"pred": "geq", "args": ["_X", "_R"]}
                ]
            }],
            "facts": [
                {"pred": "userXP", "args": ["u1", 120]},
                {"pred": "moduleReq", "args": ["mA", 100]}
            ],
            "query": {"pred": "allow", "args": ["u1", "_M"]}
        });

        let response = create_test_router()
            .oneshot(post_json("/eval", &request))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["ok"], true);
        assert_eq!(json["columns"], json!(["M"]));
        assert_eq!(json["rows"], json!([{"M": "mA"}]));
        assert!(json["stats"]["rounds"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_eval_malformed_body_is_bad_request() {
        let response = create_test_router()
            .oneshot(post_json("/eval", &json!({"facts": []})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["ok"], false);
        assert!(json["error"].as_str().unwrap().starts_with("parse error"));
    }

    #[tokio::test]
    async fn test_eval_unsafe_rule_is_unprocessable() {
        let request = json!({
            "rules": [{"head": {"pred": "p", "args": ["_X", "_Y"]},
                       "body": [{"pred": "q", "args": ["_X"]}]}],
            "query": {"pred": "p", "args": ["_X", "_Y"]}
        });
        let response = create_test_router()
            .oneshot(post_json("/eval", &request))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("variable Y"));
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let response = create_test_router()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/eval")
                    .header("origin", "http://example.com")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_reload_without_directory_reports_rules() {
        let response = create_test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/reload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["count"], 0);
    }
}
