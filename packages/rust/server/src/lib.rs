//! HTTP server for the funnel matcher.
//!
//! Stateless: every request carries the full answer history, and the only
//! shared data is the read-only catalog inside [`FunnelService`].
//!
//! Routes (also mounted under `/chat`):
//! - `POST /start`  `{ categoryId }` → `{ question, options }`
//! - `POST /answer` `{ categoryId, answers }` → `{ question, options }` or
//!   `{ message, serviceId }`
//! - `GET /health`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use servicefunnel_core::{FunnelBackend, FunnelService};
use servicefunnel_shared::{
    AnswerRequest, ErrorBody, Result, ServiceFunnelError, StartRequest, StepReply,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

// ---------------------------------------------------------------------------
// State & errors
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct AppState {
    service: Arc<FunnelService>,
}

/// Error response: a status plus `{ "error": message }`.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<ServiceFunnelError> for ApiError {
    fn from(err: ServiceFunnelError) -> Self {
        if err.is_not_found() {
            warn!(error = %err, "lookup failed");
            Self {
                status: StatusCode::NOT_FOUND,
                message: err.to_string(),
            }
        } else {
            error!(error = %err, "request failed");
            Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: err.to_string(),
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the router over a loaded funnel service.
pub fn router(service: Arc<FunnelService>) -> Router {
    let funnel = Router::new()
        .route("/start", post(start))
        .route("/answer", post(answer));

    Router::new()
        .route("/health", get(health))
        .merge(funnel.clone())
        .nest("/chat", funnel)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(AppState { service })
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, service: Arc<FunnelService>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceFunnelError::Network(format!("failed to bind {addr}: {e}")))?;
    let local = listener
        .local_addr()
        .map_err(|e| ServiceFunnelError::Network(format!("failed to read local address: {e}")))?;

    info!(
        %local,
        records = service.catalog().len(),
        rephrasing = service.rephrasing_enabled(),
        "funnel server listening"
    );

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServiceFunnelError::Network(format!("server error: {e}")))?;

    info!("funnel server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for Ctrl-C; serve until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    records: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "servicefunnel",
        version: env!("CARGO_PKG_VERSION"),
        records: state.service.catalog().len(),
    })
}

#[instrument(skip_all)]
async fn start(
    State(state): State<AppState>,
    payload: std::result::Result<Json<StartRequest>, JsonRejection>,
) -> std::result::Result<Json<StepReply>, ApiError> {
    let Json(request) = payload?;
    let step = state.service.start(&request.category_id).await?;
    Ok(Json(step.into()))
}

#[instrument(skip_all)]
async fn answer(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AnswerRequest>, JsonRejection>,
) -> std::result::Result<Json<StepReply>, ApiError> {
    let Json(request) = payload?;
    let reply = state
        .service
        .answer(&request.category_id, &request.answers)
        .await?;
    Ok(Json(reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use servicefunnel_core::Catalog;
    use servicefunnel_dataset::LoadOptions;
    use tower::ServiceExt;

    fn app() -> Router {
        let catalog = Catalog::load(
            Path::new("../../../fixtures/datasets/services.csv"),
            &LoadOptions::default(),
        )
        .expect("load fixture");
        router(Arc::new(FunnelService::new(Arc::new(catalog))))
    }

    async fn call(uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("build request");

        let response = app().oneshot(request).await.expect("router request");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("read body");
        let json = serde_json::from_slice(&bytes).expect("JSON body");
        (status, json)
    }

    #[tokio::test]
    async fn start_returns_first_question() {
        let (status, body) = call("/start", r#"{"categoryId":"1"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"question": "Type", "options": ["Repair", "Install"]})
        );
    }

    #[tokio::test]
    async fn start_accepts_numeric_category() {
        let (status, body) = call("/start", r#"{"categoryId":2}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["question"], "Area");
    }

    #[tokio::test]
    async fn start_unknown_category_is_404() {
        let (status, body) = call("/start", r#"{"categoryId":"77"}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({"error": "Category ID not found"}));
    }

    #[tokio::test]
    async fn answer_returns_next_question() {
        let (status, body) =
            call("/answer", r#"{"categoryId":"1","answers":["Repair"]}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"question": "Material", "options": ["Wood", "Vinyl"]})
        );
    }

    #[tokio::test]
    async fn answer_returns_service_when_complete() {
        let (status, body) =
            call("/answer", r#"{"categoryId":"1","answers":["Repair","Vinyl"]}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"message": "All questions answered.", "serviceId": "S-101"})
        );
    }

    #[tokio::test]
    async fn answer_without_match_is_404() {
        let (status, body) = call("/answer", r#"{"categoryId":"1","answers":["Paint"]}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            serde_json::json!({"error": "Service not found for the selected answers."})
        );
    }

    #[tokio::test]
    async fn chat_prefixed_routes_are_mounted() {
        let (status, body) = call("/chat/start", r#"{"categoryId":"1"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["question"], "Type");

        let (status, _) =
            call("/chat/answer", r#"{"categoryId":"1","answers":["Install","Small"]}"#).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let (status, body) = call("/start", r#"{"category":"1"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    }

    #[tokio::test]
    async fn health_reports_record_count() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("build request");
        let response = app().oneshot(request).await.expect("router request");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("read body");
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("JSON body");
        assert_eq!(json["status"], "ok");
        assert_eq!(json["records"], 6);
    }
}
