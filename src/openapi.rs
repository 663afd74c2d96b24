use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::health::handler::health_check,
        crate::features::background::handler::remove_bg,
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            crate::features::health::handler::HealthResponse,
            crate::features::background::RemoveBgUpload,
        )
    ),
    tags(
        (
            name = "Background",
            description = "去背景：上传图片，返回带 alpha 通道的 PNG。"
        ),
        (name = "Health", description = "健康检查：服务探活。"),
    ),
    info(
        title = "rembg-relay API",
        version = env!("CARGO_PKG_VERSION"),
        description = "图片去背景中转服务（Axum + utoipa）。错误统一返回 `{\"error\": \"...\"}`。"
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::ApiDoc;
    use utoipa::OpenApi;

    #[test]
    fn openapi_lists_both_endpoints() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/remove-bg"));
        assert!(doc.paths.paths.contains_key("/health"));
    }
}
