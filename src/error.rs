use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 后端 API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 任务生命周期错误（提交 / 轮询 / 下载）
    #[error("任务错误: {0}")]
    Job(#[from] JobError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 工作流状态错误
    #[error("工作流错误: {0}")]
    Workflow(#[from] WorkflowError),
}

/// 后端 API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 后端返回非 2xx 响应
    #[error("API返回错误响应 ({endpoint}): status={status}, error={message:?}")]
    BadResponse {
        endpoint: String,
        status: u16,
        message: Option<String>,
    },
    /// JSON 解析失败
    #[error("JSON解析失败: {source}")]
    JsonParseFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApiError {
    /// 后端在响应体里给出的原始错误文本（若有）
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            ApiError::BadResponse {
                message: Some(msg), ..
            } => Some(msg.as_str()),
            _ => None,
        }
    }
}

/// 任务生命周期错误
///
/// 在工作流边界统一转换为一条面向用户的提示
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobError {
    /// 任务未能启动（参数校验或网络问题），不存在可轮询的任务
    #[error("任务提交失败: {0}")]
    Submission(String),
    /// 轮询观察到后端明确的失败状态
    #[error("后端任务失败: {0}")]
    BackendFailure(String),
    /// 轮询次数耗尽仍未到达终态
    #[error("轮询超时: 已尝试 {attempts} 次, 耗时 {elapsed:?}")]
    PollTimeout { attempts: u32, elapsed: Duration },
    /// 任务成功但结果下载失败
    #[error("结果下载失败 ({key}): {message}")]
    Resolution { key: String, message: String },
    /// 工作流被重置，任务被放弃
    #[error("任务已取消")]
    Cancelled,
}

impl JobError {
    /// 后端给出的原始错误文本，交给 ErrorMapper 处理
    pub fn raw_message(&self) -> Option<&str> {
        match self {
            JobError::Submission(msg) | JobError::BackendFailure(msg) => Some(msg.as_str()),
            JobError::Resolution { message, .. } => Some(message.as_str()),
            JobError::PollTimeout { .. } | JobError::Cancelled => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, JobError::PollTimeout { .. })
    }
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 轮询参数不合法
    #[error("轮询配置不合法: {reason}")]
    InvalidPollConfig { reason: String },
    /// 后端地址无法作为 base url
    #[error("后端地址不合法 {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// 工作流状态错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    /// 当前状态不允许该操作
    #[error("状态 {from} 下不允许操作 {action}")]
    InvalidTransition { from: String, action: String },
    /// 源文件 / 链接未通过本地校验
    #[error("源文件无效: {reason}")]
    InvalidSource { reason: String },
}

// ========== 从常见错误类型转换 ==========

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        AppError::Api(ApiError::RequestFailed {
            endpoint,
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建非法状态转换错误
    pub fn invalid_transition(from: impl Into<String>, action: impl Into<String>) -> Self {
        AppError::Workflow(WorkflowError::InvalidTransition {
            from: from.into(),
            action: action.into(),
        })
    }

    /// 创建源文件校验错误
    pub fn invalid_source(reason: impl Into<String>) -> Self {
        AppError::Workflow(WorkflowError::InvalidSource {
            reason: reason.into(),
        })
    }

    /// 后端给出的原始错误文本
    ///
    /// 传输层错误、本地错误没有后端文本，返回 `None`；
    /// 内部描述只进日志，不会出现在用户提示里
    pub fn backend_message(&self) -> Option<String> {
        match self {
            AppError::Api(api) => api.backend_message().map(str::to_string),
            AppError::Job(job) => job.raw_message().map(str::to_string),
            _ => None,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
