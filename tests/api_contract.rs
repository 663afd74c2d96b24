use std::sync::Arc;

use axum::{
    body::{Body, Bytes, to_bytes},
    http::{Request, StatusCode, header},
    response::IntoResponse,
};
use tower::ServiceExt;

use rembg_relay::config::PngCompression;
use rembg_relay::features::background::{BackgroundRemover, RemovalError};
use rembg_relay::features::health::handler::HealthResponse;
use rembg_relay::{AppConfig, AppState, build_router};

struct Unused;

#[async_trait::async_trait]
impl BackgroundRemover for Unused {
    async fn remove(&self, input: Bytes) -> Result<Bytes, RemovalError> {
        Ok(input)
    }

    fn name(&self) -> &'static str {
        "unused"
    }
}

fn app() -> axum::Router {
    let state = AppState::new(Arc::new(Unused), 1, PngCompression::Default);
    build_router(state, &AppConfig::default())
}

#[tokio::test]
async fn health_reports_service_and_version() {
    let resp = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .expect("request /health");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let health: HealthResponse = serde_json::from_slice(&bytes).expect("parse json");
    assert_eq!(health.status, "healthy");
    assert_eq!(health.service, "rembg-relay");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

/// 错误响应的契约：application/json，且只有 error 一个键。
#[tokio::test]
async fn error_body_is_plain_json_with_single_key() {
    let resp = rembg_relay::AppError::EmptyFilename.into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .expect("missing Content-Type")
        .to_str()
        .expect("invalid Content-Type");
    assert_eq!(content_type, "application/json");

    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let v: serde_json::Value = serde_json::from_slice(&bytes).expect("parse json");
    assert_eq!(v, serde_json::json!({ "error": "No file selected" }));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request openapi");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let doc: serde_json::Value = serde_json::from_slice(&bytes).expect("parse json");
    assert!(doc["paths"]["/remove-bg"]["post"].is_object());
}
