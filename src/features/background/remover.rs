use std::sync::Arc;

use axum::body::Bytes;
use thiserror::Error;

use super::codec::CodecError;
use super::local::BorderKeyRemover;
use super::upstream::HttpRemover;
use crate::config::{PngCompression, RemoverBackend, RemoverConfig};

/// 去背景能力：输入编码后的图片字节，输出背景透明化后的图片字节。
///
/// 实现需保证多次调用之间互不影响，服务端对每个请求共享同一实例。
#[async_trait::async_trait]
pub trait BackgroundRemover: Send + Sync {
    async fn remove(&self, input: Bytes) -> Result<Bytes, RemovalError>;

    /// 用于日志与健康信息的实现名称
    fn name(&self) -> &'static str;
}

/// 去背景失败原因
#[derive(Debug, Error)]
pub enum RemovalError {
    /// 上游请求超时
    #[error("background remover timed out")]
    Timeout,

    /// 上游不可达或传输中断
    #[error("background remover unreachable: {0}")]
    Network(String),

    /// 上游返回非 2xx
    #[error("background remover returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// 本地实现解码/编码失败
    #[error("{0}")]
    Codec(#[from] CodecError),

    /// 阻塞任务异常退出
    #[error("background removal task failed: {0}")]
    Task(String),
}

impl From<reqwest::Error> for RemovalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemovalError::Timeout
        } else {
            RemovalError::Network(err.to_string())
        }
    }
}

/// 按配置构建去背景实现
pub fn build_remover(
    cfg: &RemoverConfig,
    png_compression: PngCompression,
) -> Result<Arc<dyn BackgroundRemover>, RemovalError> {
    let remover: Arc<dyn BackgroundRemover> = match cfg.backend {
        RemoverBackend::Http => Arc::new(HttpRemover::new(&cfg.http)?),
        RemoverBackend::Local => Arc::new(BorderKeyRemover::new(&cfg.local, png_compression)),
    };
    tracing::info!(
        "去背景实现: {} (并发许可 {})",
        remover.name(),
        cfg.effective_parallelism()
    );
    Ok(remover)
}
