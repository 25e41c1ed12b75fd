//! HTTP 执行器 - 基础设施层
//!
//! 持有唯一的 HTTP 客户端，只暴露"发请求"的能力

use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{ApiError, AppError, AppResult, ConfigError};
use crate::utils::logging::truncate_text;

/// 非 2xx 响应体
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// HTTP 执行器
///
/// 职责：
/// - 持有唯一的 reqwest Client（连接池复用）
/// - 负责拼接地址、检查状态码、解析错误体
/// - 不认识任务 / 工具
pub struct HttpExecutor {
    client: Client,
    base: Url,
}

impl HttpExecutor {
    /// 创建新的 HTTP 执行器，`base_url` 必须是可以追加路径的 http(s) 地址
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let invalid = |reason: &str| {
            AppError::Config(ConfigError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: reason.to_string(),
            })
        };
        let base = Url::parse(base_url.trim()).map_err(|e| invalid(&e.to_string()))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(invalid("需要 http(s) 地址"));
        }

        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self { client, base })
    }

    /// 在 base url 后追加路径段，每一段都会做百分号编码
    ///
    /// `endpoint(&["api", "download", "a b.gif"])` → `<base>/api/download/a%20b.gif`
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// POST JSON 并反序列化响应
    pub async fn post_json<T: DeserializeOwned>(&self, url: Url, body: &JsonValue) -> AppResult<T> {
        let endpoint = url.path().to_string();
        debug!("POST {} (json)", endpoint);
        let request = self.client.post(url).json(body);
        let response = self.send(request, &endpoint).await?;
        parse_json(response).await
    }

    /// POST multipart 表单并反序列化响应
    pub async fn post_multipart<T: DeserializeOwned>(&self, url: Url, form: Form) -> AppResult<T> {
        let endpoint = url.path().to_string();
        debug!("POST {} (multipart)", endpoint);
        let request = self.client.post(url).multipart(form);
        let response = self.send(request, &endpoint).await?;
        parse_json(response).await
    }

    /// GET 并反序列化 JSON 响应
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> AppResult<T> {
        let endpoint = url.path().to_string();
        let request = self.client.get(url);
        let response = self.send(request, &endpoint).await?;
        parse_json(response).await
    }

    /// GET 原始二进制内容
    pub async fn get_bytes(&self, url: Url) -> AppResult<Vec<u8>> {
        let endpoint = url.path().to_string();
        debug!("GET {} (binary)", endpoint);
        let request = self.client.get(url);
        let response = self.send(request, &endpoint).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::api_request_failed(&endpoint, e))?;
        Ok(bytes.to_vec())
    }

    /// 发送请求，非 2xx 时把 `{ error }` 响应体转成 `ApiError::BadResponse`
    async fn send(&self, request: RequestBuilder, endpoint: &str) -> AppResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.error)
            .or_else(|| {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| truncate_text(trimmed, 300))
            });

        Err(AppError::Api(ApiError::BadResponse {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message,
        }))
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> AppResult<T> {
    let text = response.text().await?;
    let value = serde_json::from_str(&text)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor(base: &str) -> HttpExecutor {
        HttpExecutor::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn segments_are_percent_encoded() {
        let url = executor("http://localhost:5000").endpoint(&["api", "download", "a#b c/d.gif"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/api/download/a%23b%20c%2Fd.gif"
        );
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let url = executor("https://tools.example.com/gif/").endpoint(&["api", "crop"]);
        assert_eq!(url.as_str(), "https://tools.example.com/gif/api/crop");
    }

    #[test]
    fn unusable_base_urls_are_rejected() {
        for base in ["localhost:5000", "mailto:ops@example.com", "not a url"] {
            assert!(matches!(
                HttpExecutor::new(base, Duration::from_secs(5)),
                Err(AppError::Config(ConfigError::InvalidBaseUrl { .. }))
            ));
        }
    }
}
