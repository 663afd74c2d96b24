use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::background::{CodecError, RemovalError};

/// 应用统一错误类型
///
/// `Display` 文本即响应体中 `error` 字段的内容，调用方依赖其字面值。
#[derive(Error, Debug)]
pub enum AppError {
    /// 请求中没有 `file` 字段
    #[error("No file part in the request")]
    MissingFilePart,

    /// `file` 字段存在但未携带文件名
    #[error("No file selected")]
    EmptyFilename,

    /// 读取、去背景、解码或编码任一环节失败
    #[error("Failed to process the image: {0}")]
    ProcessingFailure(String),
}

/// 错误响应体：仅包含 `error` 一个键
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// 人类可读的错误信息
    #[schema(example = "No file part in the request")]
    pub error: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingFilePart | AppError::EmptyFilename => StatusCode::BAD_REQUEST,
            AppError::ProcessingFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// =============== 处理链路错误统一折叠为 ProcessingFailure ===============

impl From<RemovalError> for AppError {
    fn from(err: RemovalError) -> Self {
        AppError::ProcessingFailure(err.to_string())
    }
}

impl From<CodecError> for AppError {
    fn from(err: CodecError) -> Self {
        AppError::ProcessingFailure(err.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::ProcessingFailure(err.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::ProcessingFailure(format!("worker task failed: {err}"))
    }
}

impl From<tokio::sync::AcquireError> for AppError {
    fn from(err: tokio::sync::AcquireError) -> Self {
        AppError::ProcessingFailure(format!("processing slot unavailable: {err}"))
    }
}
