use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::{AppConfig, PngCompression};
use crate::features::background::{BackgroundRemover, RemovalError, build_remover};

/// 聚合的应用共享状态（均为只读或自带同步，请求之间不共享可变数据）
#[derive(Clone)]
pub struct AppState {
    /// 去背景实现
    pub remover: Arc<dyn BackgroundRemover>,
    /// 控制并发处理的信号量（限制 CPU 密集型任务数量）
    pub process_semaphore: Arc<Semaphore>,
    /// 输出 PNG 压缩档位
    pub png_compression: PngCompression,
}

impl AppState {
    pub fn new(
        remover: Arc<dyn BackgroundRemover>,
        max_parallel: usize,
        png_compression: PngCompression,
    ) -> Self {
        Self {
            remover,
            process_semaphore: Arc::new(Semaphore::new(max_parallel.max(1))),
            png_compression,
        }
    }

    /// 按配置构建完整状态
    pub fn from_config(config: &AppConfig) -> Result<Self, RemovalError> {
        let png_compression = config.image.png_compression;
        let remover = build_remover(&config.remover, png_compression)?;
        Ok(Self::new(
            remover,
            config.remover.effective_parallelism(),
            png_compression,
        ))
    }
}
