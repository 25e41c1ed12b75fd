/// 媒体处理后端 API 客户端
///
/// 封装所有与后端任务接口相关的调用逻辑
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::HttpExecutor;
use crate::models::{FileField, JobPayload, JobRequest, SubmitResponse, TaskStatus};

/// 后端任务接口
///
/// 工作流只依赖这个 trait，测试中可以替换成脚本化的实现
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// `POST /api/<job-kind>`
    async fn start_job(&self, request: &JobRequest) -> AppResult<SubmitResponse>;

    /// `GET /api/task-status/<task_id>`
    async fn task_status(&self, task_id: &str) -> AppResult<TaskStatus>;

    /// `GET /api/download/<result_key>`
    async fn download(&self, key: &str) -> AppResult<Vec<u8>>;

    /// 面向用户的下载地址
    fn download_url(&self, key: &str) -> String;
}

/// 后端 API 客户端
pub struct BackendClient {
    executor: HttpExecutor,
    download_via_proxy: bool,
}

impl BackendClient {
    /// 创建新的后端客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        let executor = HttpExecutor::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self {
            executor,
            download_via_proxy: config.download_via_proxy,
        })
    }

    /// 构建 multipart 表单：文本字段 + 文件
    async fn build_form(
        fields: &BTreeMap<String, String>,
        file: Option<&FileField>,
    ) -> AppResult<Form> {
        let mut form = Form::new();
        for (name, value) in fields {
            form = form.text(name.clone(), value.clone());
        }

        if let Some(file) = file {
            let path_str = file.path.display().to_string();
            let bytes = tokio::fs::read(&file.path)
                .await
                .map_err(|e| AppError::file_read_failed(&path_str, e))?;

            debug!("上传文件 {} ({} 字节)", path_str, bytes.len());

            let file_name = file
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "upload".to_string());
            let part = Part::bytes(bytes)
                .file_name(file_name)
                .mime_str(guess_mime(&file.path))?;
            form = form.part(file.field_name.clone(), part);
        }

        Ok(form)
    }

    /// `api/download/<key>`，开启代理时带上 `proxy=true`
    fn download_endpoint(&self, key: &str) -> Url {
        let mut url = self.executor.endpoint(&["api", "download", key]);
        if self.download_via_proxy {
            url.query_pairs_mut().append_pair("proxy", "true");
        }
        url
    }
}

#[async_trait]
impl TaskBackend for BackendClient {
    async fn start_job(&self, request: &JobRequest) -> AppResult<SubmitResponse> {
        let url = self.executor.endpoint(&["api", request.tool.endpoint()]);
        match &request.payload {
            JobPayload::Json(body) => self.executor.post_json(url, body).await,
            JobPayload::Multipart { fields, file } => {
                let form = Self::build_form(fields, file.as_ref()).await?;
                self.executor.post_multipart(url, form).await
            }
        }
    }

    async fn task_status(&self, task_id: &str) -> AppResult<TaskStatus> {
        let url = self.executor.endpoint(&["api", "task-status", task_id]);
        self.executor.get_json(url).await
    }

    async fn download(&self, key: &str) -> AppResult<Vec<u8>> {
        self.executor.get_bytes(self.download_endpoint(key)).await
    }

    fn download_url(&self, key: &str) -> String {
        self.download_endpoint(key).to_string()
    }
}

/// 根据扩展名推断上传文件的 MIME 类型
fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "gif" => "image/gif",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}
