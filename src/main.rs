use std::future::IntoFuture;

use rembg_relay::config::DEFAULT_LOG_FILTER;
use rembg_relay::{AppConfig, AppState, ShutdownManager, build_router};

#[tokio::main]
async fn main() {
    // 先加载配置，日志默认级别取自配置（RUST_LOG 优先）
    let loaded = AppConfig::init_global();
    let default_filter = AppConfig::try_global()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    if let Err(e) = loaded {
        tracing::error!("Config init failed: {}", e);
        std::process::exit(1);
    }
    let config = AppConfig::global();
    tracing::info!("配置加载完成: {:?}", AppConfig::get_config_path());

    let shutdown_manager = ShutdownManager::new();
    if let Err(e) = shutdown_manager.start_signal_handler() {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    let state = match AppState::from_config(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("去背景实现初始化失败: {}", e);
            std::process::exit(1);
        }
    };
    let app = build_router(state, config);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Remove background: POST http://{}/remove-bg", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("Health: http://{}/health", addr);

    let manager_for_server = shutdown_manager.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let reason = manager_for_server.wait_for_shutdown().await;
            tracing::info!("接收到退出信号: {:?}，开始优雅关闭HTTP服务器...", reason);
        })
        .into_future();

    // 收到信号后最多再等待 timeout_secs，让在途请求处理完
    let shutdown_timeout = config.shutdown.timeout_duration();
    let drain_deadline = async move {
        shutdown_manager.wait_for_shutdown().await;
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        res = server => {
            if let Err(e) = res {
                tracing::error!("服务器运行错误: {}", e);
                std::process::exit(1);
            }
            tracing::info!("服务器已优雅关闭");
        }
        _ = drain_deadline => {
            tracing::warn!(
                "优雅退出超时（{}秒），强制退出",
                config.shutdown.timeout_secs
            );
        }
    }
}
