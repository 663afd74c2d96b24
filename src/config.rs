use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 默认日志过滤规则（`RUST_LOG` 优先）
pub const DEFAULT_LOG_FILTER: &str = "rembg_relay=info,tower_http=info";

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址（默认监听所有网卡）
    pub host: String,
    /// 监听端口
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 默认过滤规则，语法同 `RUST_LOG`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 请求体上限（字节，包含 multipart 开销）
    #[serde(default = "UploadConfig::default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl UploadConfig {
    fn default_max_body_bytes() -> usize {
        20 * 1024 * 1024
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: Self::default_max_body_bytes(),
        }
    }
}

/// 去背景实现选择
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoverBackend {
    /// 转发到外部去背景服务（如 `rembg s`）
    #[default]
    Http,
    /// 进程内基于边缘取色的抠图
    Local,
}

/// 外部去背景服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRemoverConfig {
    /// 上游端点，以 multipart `file` 字段提交原图
    #[serde(default = "HttpRemoverConfig::default_endpoint")]
    pub endpoint: String,
    /// 单次请求超时（秒）
    #[serde(default = "HttpRemoverConfig::default_timeout")]
    pub timeout_secs: u64,
}

impl HttpRemoverConfig {
    fn default_endpoint() -> String {
        "http://127.0.0.1:7000/api/remove".to_string()
    }
    fn default_timeout() -> u64 {
        60
    }

    pub fn timeout_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpRemoverConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            timeout_secs: Self::default_timeout(),
        }
    }
}

/// 本地抠图配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalRemoverConfig {
    /// 与背景色的 RGB 欧氏距离不超过该值的像素视为背景
    #[serde(default = "LocalRemoverConfig::default_tolerance")]
    pub tolerance: f32,
    /// 容差之外的过渡带宽度，带内像素按距离线性保留透明度
    #[serde(default = "LocalRemoverConfig::default_feather")]
    pub feather: f32,
}

impl LocalRemoverConfig {
    fn default_tolerance() -> f32 {
        30.0
    }
    fn default_feather() -> f32 {
        10.0
    }
}

impl Default for LocalRemoverConfig {
    fn default() -> Self {
        Self {
            tolerance: Self::default_tolerance(),
            feather: Self::default_feather(),
        }
    }
}

/// 去背景配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoverConfig {
    #[serde(default)]
    pub backend: RemoverBackend,
    /// 并发处理许可数（0=自动，取 CPU 核心数）
    #[serde(default)]
    pub max_parallel: u32,
    #[serde(default)]
    pub http: HttpRemoverConfig,
    #[serde(default)]
    pub local: LocalRemoverConfig,
}

impl RemoverConfig {
    /// 实际生效的并发许可数
    pub fn effective_parallelism(&self) -> usize {
        if self.max_parallel == 0 {
            num_cpus::get()
        } else {
            self.max_parallel as usize
        }
    }
}

impl Default for RemoverConfig {
    fn default() -> Self {
        Self {
            backend: RemoverBackend::default(),
            max_parallel: 0,
            http: HttpRemoverConfig::default(),
            local: LocalRemoverConfig::default(),
        }
    }
}

/// PNG 压缩档位
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    Fast,
    #[default]
    Default,
    Best,
}

/// 输出图片配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImageConfig {
    #[serde(default)]
    pub png_compression: PngCompression,
}

/// CORS 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// 是否启用 CORS
    #[serde(default = "CorsConfig::default_enabled")]
    pub enabled: bool,
    /// 允许的 Origin 列表（支持 "*" 表示任意）
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// 允许的方法列表（支持 "*" 表示任意）
    #[serde(default)]
    pub allowed_methods: Vec<String>,
    /// 允许的请求头列表（支持 "*" 表示任意）
    #[serde(default)]
    pub allowed_headers: Vec<String>,
    /// 暴露的响应头列表（支持 "*" 表示任意）
    #[serde(default)]
    pub expose_headers: Vec<String>,
    /// 是否允许携带凭证（Cookie/Authorization）
    #[serde(default = "CorsConfig::default_allow_credentials")]
    pub allow_credentials: bool,
    /// 预检缓存时间（秒）
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl CorsConfig {
    fn default_enabled() -> bool {
        false
    }

    fn default_allow_credentials() -> bool {
        false
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            allowed_origins: Vec::new(),
            allowed_methods: Vec::new(),
            allowed_headers: Vec::new(),
            expose_headers: Vec::new(),
            allow_credentials: Self::default_allow_credentials(),
            max_age_secs: None,
        }
    }
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 收到退出信号后等待在途请求完成的最长时间（秒）
    #[serde(default = "ShutdownConfig::default_timeout")]
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    fn default_timeout() -> u64 {
        30
    }

    /// 获取优雅退出超时时间
    pub fn timeout_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub remover: RemoverConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// 加载配置：内置默认值 < 配置文件（可缺省） < 环境变量
    ///
    /// 环境变量以 `APP_` 为前缀、`__` 分隔层级，例如 `APP_SERVER__PORT=8080`、
    /// `APP_REMOVER__BACKEND=local`。
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::get_config_path();
        Self::assemble(File::from(path.as_path()).required(false))
    }

    /// 以给定 TOML 文本代替配置文件加载（环境变量仍然生效）
    pub fn load_from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::assemble(File::from_str(toml, FileFormat::Toml))
    }

    fn assemble<S>(file: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        ConfigBuilder::builder()
            .add_source(ConfigBuilder::try_from(&AppConfig::default())?)
            .add_source(file)
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// 获取全局配置单例
    pub fn global() -> &'static AppConfig {
        CONFIG.get().expect("配置未初始化，请先调用 init_global()")
    }

    /// 尝试获取全局配置（未初始化时返回 None）
    pub fn try_global() -> Option<&'static AppConfig> {
        CONFIG.get()
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<(), ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(())
    }

    /// 获取配置文件路径（`APP_CONFIG` 可覆盖，默认 `config.toml`）
    pub fn get_config_path() -> PathBuf {
        std::env::var_os("APP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_all_interfaces_on_5000() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server_addr(), "0.0.0.0:5000");
        assert_eq!(cfg.remover.backend, RemoverBackend::Http);
        assert_eq!(cfg.image.png_compression, PngCompression::Default);
        assert!(!cfg.cors.enabled);
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_keys() {
        let cfg = AppConfig::load_from_toml(
            r#"
            [server]
            port = 8081

            [remover]
            backend = "local"

            [remover.local]
            tolerance = 12.5
            "#,
        )
        .expect("load config");

        assert_eq!(cfg.server.port, 8081);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.remover.backend, RemoverBackend::Local);
        assert_eq!(cfg.remover.local.tolerance, 12.5);
        assert_eq!(cfg.remover.local.feather, 10.0);
        assert_eq!(cfg.remover.http.timeout_secs, 60);
        assert_eq!(cfg.upload.max_body_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = AppConfig::load_from_toml(
            r#"
            [remover]
            backend = "magic"
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn zero_parallelism_means_cpu_count() {
        let cfg = RemoverConfig::default();
        assert_eq!(cfg.effective_parallelism(), num_cpus::get());

        let fixed = RemoverConfig {
            max_parallel: 3,
            ..RemoverConfig::default()
        };
        assert_eq!(fixed.effective_parallelism(), 3);
    }
}
