//! 任务请求模型
//!
//! 源文件 / 链接 → `JobRequest`，请求体的具体形态由工具参数决定

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::{AppError, AppResult};
use crate::models::ToolKind;

/// 待处理的源：本地文件或远程链接
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMedia {
    File(PathBuf),
    Url(String),
}

impl SourceMedia {
    /// 以 http(s):// 开头的视为链接，其余视为文件路径
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            SourceMedia::Url(trimmed.to_string())
        } else {
            SourceMedia::File(PathBuf::from(trimmed))
        }
    }

    /// 本地校验：不发起任何网络请求
    ///
    /// - 文件必须存在、非空、不超过 `max_bytes`，扩展名在工具接受范围内
    /// - 链接必须是带主机名的 http(s) 地址
    pub async fn validate(&self, tool: ToolKind, max_bytes: u64) -> AppResult<()> {
        match self {
            SourceMedia::File(path) => {
                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(str::to_ascii_lowercase)
                    .unwrap_or_default();
                if !tool.accepted_extensions().contains(&ext.as_str()) {
                    return Err(AppError::invalid_source(format!(
                        "{} 不支持 .{} 文件 (支持: {})",
                        tool,
                        ext,
                        tool.accepted_extensions().join(", ")
                    )));
                }

                let meta = tokio::fs::metadata(path).await.map_err(|_| {
                    AppError::invalid_source(format!("文件不存在: {}", path.display()))
                })?;
                if !meta.is_file() {
                    return Err(AppError::invalid_source(format!(
                        "不是文件: {}",
                        path.display()
                    )));
                }
                if meta.len() == 0 {
                    return Err(AppError::invalid_source(format!(
                        "文件为空: {}",
                        path.display()
                    )));
                }
                if meta.len() > max_bytes {
                    return Err(AppError::invalid_source(format!(
                        "文件过大: {} 字节 (上限 {} 字节)",
                        meta.len(),
                        max_bytes
                    )));
                }
                Ok(())
            }
            SourceMedia::Url(url) => {
                let invalid = || AppError::invalid_source(format!("链接无效: {}", url));
                let parsed = Url::parse(url).map_err(|_| invalid())?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(invalid());
                }
                if parsed.host_str().map_or(true, str::is_empty) {
                    return Err(invalid());
                }
                // 解析器会吞掉多余的斜杠，"https:///x.gif" 视为没有主机
                let authority = url.split_once("://").map_or("", |(_, rest)| rest);
                if authority.starts_with(['/', '\\']) {
                    return Err(invalid());
                }
                Ok(())
            }
        }
    }

    /// 用于日志和输出文件名的简短名称
    pub fn display_name(&self) -> String {
        match self {
            SourceMedia::File(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "source".to_string()),
            SourceMedia::Url(url) => url
                .rsplit('/')
                .find(|seg| !seg.is_empty())
                .and_then(|seg| seg.split(['.', '?']).next())
                .filter(|s| !s.is_empty())
                .unwrap_or("source")
                .to_string(),
        }
    }
}

/// 随请求上传的文件字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileField {
    pub field_name: String,
    pub path: PathBuf,
}

/// 请求体
#[derive(Debug, Clone, PartialEq)]
pub enum JobPayload {
    /// multipart 表单：文本字段 + 可选文件
    Multipart {
        fields: BTreeMap<String, String>,
        file: Option<FileField>,
    },
    /// JSON 请求体
    Json(JsonValue),
}

/// 一次任务提交所需的全部信息
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub tool: ToolKind,
    pub payload: JobPayload,
}

impl JobRequest {
    /// 根据源类型构建请求：文件走 multipart，链接走 JSON
    pub fn from_source(
        tool: ToolKind,
        source: &SourceMedia,
        params: &Map<String, JsonValue>,
    ) -> Self {
        let payload = match source {
            SourceMedia::File(path) => {
                let fields = params
                    .iter()
                    .map(|(k, v)| (k.clone(), form_value(v)))
                    .collect();
                JobPayload::Multipart {
                    fields,
                    file: Some(FileField {
                        field_name: "file".to_string(),
                        path: path.clone(),
                    }),
                }
            }
            SourceMedia::Url(url) => {
                let mut body = params.clone();
                body.insert("url".to_string(), JsonValue::String(url.clone()));
                JobPayload::Json(JsonValue::Object(body))
            }
        };

        Self { tool, payload }
    }
}

fn form_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 批处理用的任务描述文件（TOML）
///
/// ```toml
/// tool = "crop"
/// source = "inputs/cat.gif"
///
/// [params]
/// x = 10
/// y = 20
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct JobDescriptor {
    pub tool: ToolKind,
    pub source: String,
    /// 输出文件名前缀，缺省时使用源文件名
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub params: Map<String, JsonValue>,
    /// 描述文件自身路径（加载时设置）
    #[serde(skip)]
    pub file_path: Option<String>,
}

impl JobDescriptor {
    /// 解析源；相对路径以描述文件所在目录为基准
    pub fn source_media(&self) -> SourceMedia {
        match SourceMedia::parse(&self.source) {
            SourceMedia::File(path) if path.is_relative() => {
                let base = self
                    .file_path
                    .as_deref()
                    .and_then(|p| Path::new(p).parent())
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                SourceMedia::File(base.join(path))
            }
            other => other,
        }
    }

    pub fn output_stem(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.source_media().display_name(), self.tool))
    }

    pub fn request(&self) -> JobRequest {
        JobRequest::from_source(self.tool, &self.source_media(), &self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_sources_become_multipart() {
        let params = json!({"width": 320, "keep_ratio": true, "mode": "fit"});
        let request = JobRequest::from_source(
            ToolKind::Resize,
            &SourceMedia::parse("cat.gif"),
            params.as_object().unwrap(),
        );
        match request.payload {
            JobPayload::Multipart { fields, file } => {
                assert_eq!(fields["width"], "320");
                assert_eq!(fields["keep_ratio"], "true");
                assert_eq!(fields["mode"], "fit");
                assert_eq!(file.unwrap().field_name, "file");
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn url_sources_become_json() {
        let request = JobRequest::from_source(
            ToolKind::Reverse,
            &SourceMedia::parse("https://cdn.example.com/a/cat.gif"),
            &Map::new(),
        );
        assert_eq!(
            request.payload,
            JobPayload::Json(json!({"url": "https://cdn.example.com/a/cat.gif"}))
        );
    }

    #[test]
    fn display_name_from_url() {
        assert_eq!(
            SourceMedia::parse("https://cdn.example.com/a/cat.gif?x=1").display_name(),
            "cat"
        );
    }

    #[test]
    fn descriptor_resolves_relative_source() {
        let mut descriptor: JobDescriptor = toml::from_str(
            r#"
            tool = "add-text"
            source = "inputs/cat.gif"

            [params]
            text = "hello"
            font_size = 24
            "#,
        )
        .unwrap();
        descriptor.file_path = Some("jobs/cat.toml".to_string());

        assert_eq!(descriptor.tool, ToolKind::AddText);
        assert_eq!(
            descriptor.source_media(),
            SourceMedia::File(PathBuf::from("jobs/inputs/cat.gif"))
        );
        assert_eq!(descriptor.output_stem(), "cat-add-text");
        assert_eq!(descriptor.params["font_size"], json!(24));
    }
}
