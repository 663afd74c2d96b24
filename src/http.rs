use once_cell::sync::OnceCell;
use reqwest::Client;
use std::time::Duration;

/// 访问上游去背景服务的全局 HTTP Client（统一连接池/Keep-Alive）。
///
/// 说明：
/// - 进程内只构建一个远程去背景实现，首次调用时传入的 timeout 即为最终生效值。
/// - `Client` 本身是线程安全的，适合全局复用。
static UPSTREAM_CLIENT: OnceCell<Client> = OnceCell::new();

pub fn upstream_client(timeout: Duration) -> Result<&'static Client, reqwest::Error> {
    UPSTREAM_CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rembg-relay/", env!("CARGO_PKG_VERSION")))
            .build()
    })
}
