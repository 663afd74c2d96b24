use axum::Router;
use tower_http::compression::CompressionLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::cors::build_cors_layer;
use crate::features::{background, health};
use crate::openapi::ApiDoc;
use crate::request_id::request_id_middleware;
use crate::state::AppState;

/// 压缩策略：只压缩 JSON/文本类响应。
///
/// PNG 结果本身已压缩，再做 gzip/brotli 只会浪费 CPU 并拖慢大图返回。
pub fn compression_predicate() -> impl tower_http::compression::predicate::Predicate {
    use tower_http::compression::predicate::{NotForContentType, Predicate, SizeAbove};

    SizeAbove::default()
        .and(NotForContentType::GRPC)
        .and(NotForContentType::IMAGES)
        .and(NotForContentType::SSE)
        .and(NotForContentType::const_new("application/octet-stream"))
}

/// 组装完整路由：业务接口 + 健康检查 + API 文档，外加 CORS/压缩/request_id 中间件。
pub fn build_router(state: AppState, config: &AppConfig) -> Router {
    let mut app = Router::<AppState>::new()
        .merge(health::create_health_router())
        .merge(background::create_background_router(
            config.upload.max_body_bytes,
        ))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state);

    if let Some(cors) = build_cors_layer(&config.cors) {
        app = app.layer(cors);
    }

    app.layer(CompressionLayer::new().compress_when(compression_predicate()))
        .layer(axum::middleware::from_fn(request_id_middleware))
}
