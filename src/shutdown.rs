//! 优雅退出管理模块
//!
//! 监听 SIGINT/SIGTERM（Windows 下为 Ctrl+C），并把退出事件广播给所有等待者

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::{debug, info};

/// 优雅退出管理器
#[derive(Debug, Clone)]
pub struct ShutdownManager {
    inner: Arc<ShutdownInner>,
}

#[derive(Debug)]
struct ShutdownInner {
    /// 退出信号通知器
    notify: Notify,
    /// 首次退出原因（先触发后等待的场景直接读取）
    reason: std::sync::Mutex<Option<ShutdownReason>>,
    /// 是否已经开始优雅退出
    shutting_down: AtomicBool,
}

/// 退出原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// 用户中断信号 (Ctrl+C)
    Interrupt,
    /// 终止信号 (SIGTERM)
    Terminate,
    /// 应用请求退出
    Application,
}

/// 优雅退出错误类型
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("信号设置失败: {0}")]
    SignalSetup(String),
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ShutdownInner {
                notify: Notify::new(),
                reason: std::sync::Mutex::new(None),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    /// 等待退出信号，返回首次触发时的原因
    pub async fn wait_for_shutdown(&self) -> ShutdownReason {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // 先登记再检查标志位，避免触发恰好发生在两者之间时丢失通知
        notified.as_mut().enable();
        if !self.is_shutting_down() {
            debug!("等待退出信号...");
            notified.await;
        }
        self.current_reason()
    }

    /// 触发优雅退出；只有第一次调用生效
    pub fn trigger_shutdown(&self, reason: ShutdownReason) {
        let first = self
            .inner
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();

        if !first {
            debug!("重复的退出信号被忽略");
            return;
        }

        info!("触发优雅退出: {:?}", reason);
        if let Ok(mut guard) = self.inner.reason.lock() {
            *guard = Some(reason);
        }
        self.inner.notify.notify_waiters();
    }

    /// 检查是否正在关闭
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    fn current_reason(&self) -> ShutdownReason {
        self.inner
            .reason
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .unwrap_or(ShutdownReason::Application)
    }

    /// 启动信号处理器
    ///
    /// 在Linux/macOS上监听SIGINT和SIGTERM，在Windows上监听Ctrl+C
    pub fn start_signal_handler(&self) -> Result<(), ShutdownError> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigint = signal(SignalKind::interrupt())
                .map_err(|e| ShutdownError::SignalSetup(e.to_string()))?;
            let mut sigterm = signal(SignalKind::terminate())
                .map_err(|e| ShutdownError::SignalSetup(e.to_string()))?;

            let manager = self.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = sigint.recv() => {
                        info!("接收到SIGINT信号 (Ctrl+C)");
                        manager.trigger_shutdown(ShutdownReason::Interrupt);
                    }
                    _ = sigterm.recv() => {
                        info!("接收到SIGTERM信号");
                        manager.trigger_shutdown(ShutdownReason::Terminate);
                    }
                }
            });
        }

        #[cfg(windows)]
        {
            let manager = self.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("监听Ctrl+C信号失败: {}", e);
                    return;
                }
                info!("接收到Ctrl+C信号");
                manager.trigger_shutdown(ShutdownReason::Interrupt);
            });
        }

        Ok(())
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_before_wait_returns_immediately() {
        let manager = ShutdownManager::new();
        assert!(!manager.is_shutting_down());

        manager.trigger_shutdown(ShutdownReason::Application);
        assert!(manager.is_shutting_down());
        assert_eq!(manager.wait_for_shutdown().await, ShutdownReason::Application);
    }

    #[tokio::test]
    async fn only_first_trigger_counts() {
        let manager = ShutdownManager::new();
        manager.trigger_shutdown(ShutdownReason::Interrupt);
        manager.trigger_shutdown(ShutdownReason::Terminate);

        assert_eq!(manager.wait_for_shutdown().await, ShutdownReason::Interrupt);
    }

    #[tokio::test]
    async fn waiters_are_woken_by_later_trigger() {
        let manager = ShutdownManager::new();
        let waiter = {
            let m = manager.clone();
            tokio::spawn(async move { m.wait_for_shutdown().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.trigger_shutdown(ShutdownReason::Terminate);

        let reason = waiter.await.expect("join waiter");
        assert_eq!(reason, ShutdownReason::Terminate);
    }
}
