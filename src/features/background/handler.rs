use std::time::Instant;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};

use super::codec::{self, CodecError};
use super::types::RemoveBgUpload;
use crate::{
    error::{AppError, ErrorResponse},
    request_id::current_request_id,
    state::AppState,
};

/// 上传文件所在的 multipart 字段名
pub const FILE_FIELD: &str = "file";

#[utoipa::path(
    post,
    path = "/remove-bg",
    summary = "移除图片背景",
    description = "上传一张图片（multipart 字段 `file`），调用去背景实现后统一转换为 RGBA 并以 PNG 返回。",
    request_body(content = RemoveBgUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "RGBA PNG bytes（Content-Type: image/png）"),
        (status = 400, description = "缺少 file 字段或未选择文件", body = ErrorResponse),
        (status = 500, description = "读取/去背景/解码/编码失败", body = ErrorResponse)
    ),
    tag = "Background"
)]
pub async fn remove_bg(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let t_total = Instant::now();
    let result = match multipart {
        Ok(mut multipart) => process_upload(&state, &mut multipart).await,
        Err(rejection) => {
            tracing::debug!("请求体不是合法的 multipart: {}", rejection);
            Err(AppError::MissingFilePart)
        }
    };

    let request_id = current_request_id().unwrap_or_else(|| "-".to_string());
    match result {
        Ok((png, input_len)) => {
            tracing::info!(
                target: "remove_bg",
                request_id = %request_id,
                remover = state.remover.name(),
                "处理完成: 输入 {} bytes, 输出 {} bytes, 耗时 {}ms",
                input_len,
                png.len(),
                t_total.elapsed().as_millis()
            );
            Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
        }
        Err(e) => {
            if matches!(e, AppError::ProcessingFailure(_)) {
                tracing::warn!(target: "remove_bg", request_id = %request_id, "处理失败: {}", e);
            } else {
                tracing::debug!(target: "remove_bg", request_id = %request_id, "请求被拒绝: {}", e);
            }
            Err(e)
        }
    }
}

/// 读取上传 → 去背景 → RGBA → PNG；返回 PNG 字节与输入大小
async fn process_upload(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<(Vec<u8>, usize), AppError> {
    let input = read_file_field(multipart).await?;
    let input_len = input.len();

    let _permit = state.process_semaphore.clone().acquire_owned().await?;

    let output = state.remover.remove(input).await?;

    let compression = state.png_compression;
    // 解码/编码是 CPU 密集型操作，必须移出 tokio worker。
    let png = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, CodecError> {
        let rgba = codec::decode_to_rgba(&output)?;
        codec::encode_png(&rgba, compression)
    })
    .await??;

    Ok((png, input_len))
}

/// 找到名为 `file` 的文件字段并完整读入内存。
///
/// - 没有 filename 属性的同名字段是普通表单字段，跳过继续查找
/// - filename 为空视为未选择文件
/// - 超出请求体上限属于读取失败；其余解析错误与缺少该字段同等对待
async fn read_file_field(multipart: &mut Multipart) -> Result<Bytes, AppError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(AppError::MissingFilePart),
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(AppError::ProcessingFailure(e.body_text()));
            }
            Err(e) => {
                tracing::debug!("multipart 字段解析失败: {}", e);
                return Err(AppError::MissingFilePart);
            }
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        match field.file_name().map(str::is_empty) {
            None => continue,
            Some(true) => return Err(AppError::EmptyFilename),
            Some(false) => return Ok(field.bytes().await?),
        }
    }
}

pub fn create_background_router(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/remove-bg", post(remove_bg))
        .route_layer(DefaultBodyLimit::max(max_body_bytes))
}
