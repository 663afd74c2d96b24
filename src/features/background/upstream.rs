use axum::body::Bytes;
use reqwest::{Client, multipart};

use super::remover::{BackgroundRemover, RemovalError};
use crate::config::HttpRemoverConfig;

/// 上游错误信息最多保留的字符数，避免把整页 HTML 塞进错误响应
const UPSTREAM_MESSAGE_LIMIT: usize = 200;

/// 通过 HTTP 调用外部去背景服务（兼容 `rembg s` 的 `POST /api/remove`）
pub struct HttpRemover {
    client: Client,
    endpoint: String,
}

impl HttpRemover {
    pub fn new(cfg: &HttpRemoverConfig) -> Result<Self, RemovalError> {
        let client = crate::http::upstream_client(cfg.timeout_duration())?;
        Ok(Self::with_client(client.clone(), cfg.endpoint.clone()))
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait::async_trait]
impl BackgroundRemover for HttpRemover {
    async fn remove(&self, input: Bytes) -> Result<Bytes, RemovalError> {
        let len = input.len() as u64;
        let part = multipart::Part::stream_with_length(input, len)
            .file_name("upload")
            .mime_str("application/octet-stream")?;
        let form = multipart::Form::new().part("file", part);

        let resp = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = match resp.text().await {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!("读取上游错误响应体失败: {}", e);
                    String::new()
                }
            };
            tracing::warn!(
                "上游去背景服务返回异常状态: {} ({})",
                status,
                self.endpoint
            );
            return Err(RemovalError::Upstream {
                status: status.as_u16(),
                message: truncate_message(text.trim()),
            });
        }

        Ok(resp.bytes().await?)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn truncate_message(text: &str) -> String {
    if text.chars().count() <= UPSTREAM_MESSAGE_LIMIT {
        return text.to_string();
    }
    let mut out: String = text.chars().take(UPSTREAM_MESSAGE_LIMIT).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::truncate_message;

    #[test]
    fn truncate_message_keeps_short_text() {
        assert_eq!(truncate_message("bad gateway"), "bad gateway");
    }

    #[test]
    fn truncate_message_cuts_on_char_boundary() {
        let long = "图".repeat(300);
        let out = truncate_message(&long);
        assert_eq!(out.chars().count(), 201);
        assert!(out.ends_with('…'));
    }
}
