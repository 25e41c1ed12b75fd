use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{AppError, AppResult, FileError};
use crate::models::ToolKind;
use crate::services::polling_engine::DEFAULT_COMPLETION_SENTINEL;
use crate::services::PollConfig;

/// 指定配置文件路径的环境变量
pub const CONFIG_FILE_ENV: &str = "GIF_TOOLS_CONFIG";

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- 后端 API 配置 ---
    pub api_base_url: String,
    /// 单个 HTTP 请求超时（秒）
    pub request_timeout_secs: u64,
    /// 下载结果时是否带上 `proxy=true`
    pub download_via_proxy: bool,
    /// `status` 字段中表示完成的文本
    pub completion_sentinel: String,
    /// 本地上传文件大小上限
    pub max_upload_bytes: u64,
    // --- 轮询配置 ---
    /// 全局轮询覆盖，逐项叠加在各工具默认值之上
    pub poll: PollOverrides,
    /// 按工具覆盖，叠加在全局覆盖之上
    pub tool_poll: HashMap<ToolKind, PollOverrides>,
    // --- 批处理配置 ---
    /// 任务描述文件目录
    pub jobs_folder: String,
    /// 产物输出目录
    pub output_folder: String,
    /// 同时处理的任务数量
    pub max_concurrent_jobs: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".to_string(),
            request_timeout_secs: 120,
            download_via_proxy: false,
            completion_sentinel: DEFAULT_COMPLETION_SENTINEL.to_string(),
            max_upload_bytes: 50 * 1024 * 1024,
            poll: PollOverrides::default(),
            tool_poll: HashMap::new(),
            jobs_folder: "jobs".to_string(),
            output_folder: "output".to_string(),
            max_concurrent_jobs: 4,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

/// 轮询参数的部分覆盖，只替换设置了的字段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOverrides {
    pub initial_delay: Option<Duration>,
    pub delay_step: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub max_attempts: Option<u32>,
}

impl PollOverrides {
    /// 把已设置的字段叠加到 `base` 上
    pub fn apply(&self, mut base: PollConfig) -> PollConfig {
        if let Some(delay) = self.initial_delay {
            base = base.with_initial_delay(delay);
        }
        if let Some(step) = self.delay_step {
            base = base.with_delay_step(step);
        }
        if let Some(delay) = self.max_delay {
            base = base.with_max_delay(delay);
        }
        if let Some(n) = self.max_attempts {
            base = base.with_max_attempts(n);
        }
        base
    }

    /// `later` 中设置了的字段优先
    pub fn merge(self, later: PollOverrides) -> Self {
        Self {
            initial_delay: later.initial_delay.or(self.initial_delay),
            delay_step: later.delay_step.or(self.delay_step),
            max_delay: later.max_delay.or(self.max_delay),
            max_attempts: later.max_attempts.or(self.max_attempts),
        }
    }
}

/// 完整的轮询配置：覆盖所有字段
impl From<PollConfig> for PollOverrides {
    fn from(config: PollConfig) -> Self {
        Self {
            initial_delay: Some(config.initial_delay),
            delay_step: Some(config.delay_step),
            max_delay: Some(config.max_delay),
            max_attempts: Some(config.max_attempts),
        }
    }
}

/// 配置文件 / 环境变量中的轮询段，单位毫秒
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
struct PollSection {
    initial_delay_ms: Option<u64>,
    delay_step_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    max_attempts: Option<u32>,
}

impl From<PollSection> for PollOverrides {
    fn from(section: PollSection) -> Self {
        Self {
            initial_delay: section.initial_delay_ms.map(Duration::from_millis),
            delay_step: section.delay_step_ms.map(Duration::from_millis),
            max_delay: section.max_delay_ms.map(Duration::from_millis),
            max_attempts: section.max_attempts,
        }
    }
}

/// 配置文件结构（TOML），所有字段可选
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    download_via_proxy: Option<bool>,
    completion_sentinel: Option<String>,
    max_upload_bytes: Option<u64>,
    poll: Option<PollSection>,
    /// 键为工具接口名，例如 `[tool_poll.video-to-gif]`
    tool_poll: HashMap<String, PollSection>,
    jobs_folder: Option<String>,
    output_folder: Option<String>,
    max_concurrent_jobs: Option<usize>,
    verbose_logging: Option<bool>,
    output_log_file: Option<String>,
}

impl Config {
    /// 默认值 + 环境变量覆盖
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// 完整加载：配置文件（若 `GIF_TOOLS_CONFIG` 指定）→ 环境变量覆盖 → 校验
    pub fn load() -> AppResult<Self> {
        let base = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_toml_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        let config = base.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载，未出现的字段保持默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let path_str = path.display().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(&path_str, e))?;
        Self::from_toml_str(&content).map_err(|e| match e {
            AppError::File(FileError::TomlParseFailed { source, .. }) => {
                AppError::File(FileError::TomlParseFailed {
                    path: path_str,
                    source,
                })
            }
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let default = Self::default();

        let mut tool_poll = HashMap::new();
        for (name, section) in file.tool_poll {
            match ToolKind::from_endpoint(&name) {
                Some(tool) => {
                    tool_poll.insert(tool, section.into());
                }
                None => warn!("⚠️ 配置中存在未知工具 `{}`，已忽略", name),
            }
        }

        Ok(Self {
            api_base_url: file.api_base_url.unwrap_or(default.api_base_url),
            request_timeout_secs: file
                .request_timeout_secs
                .unwrap_or(default.request_timeout_secs),
            download_via_proxy: file.download_via_proxy.unwrap_or(default.download_via_proxy),
            completion_sentinel: file
                .completion_sentinel
                .unwrap_or(default.completion_sentinel),
            max_upload_bytes: file.max_upload_bytes.unwrap_or(default.max_upload_bytes),
            poll: file.poll.map(PollOverrides::from).unwrap_or_default(),
            tool_poll,
            jobs_folder: file.jobs_folder.unwrap_or(default.jobs_folder),
            output_folder: file.output_folder.unwrap_or(default.output_folder),
            max_concurrent_jobs: file
                .max_concurrent_jobs
                .unwrap_or(default.max_concurrent_jobs),
            verbose_logging: file.verbose_logging.unwrap_or(default.verbose_logging),
            output_log_file: file.output_log_file.unwrap_or(default.output_log_file),
        })
    }

    /// 环境变量覆盖；解析失败时保留原值并记录警告
    pub fn apply_env(self) -> Self {
        let poll = self.poll.merge(
            PollSection {
                initial_delay_ms: env_parse("POLL_INITIAL_DELAY_MS"),
                delay_step_ms: env_parse("POLL_DELAY_STEP_MS"),
                max_delay_ms: env_parse("POLL_MAX_DELAY_MS"),
                max_attempts: env_parse("POLL_MAX_ATTEMPTS"),
            }
            .into(),
        );

        Self {
            api_base_url: std::env::var("GIF_API_BASE_URL").unwrap_or(self.api_base_url),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS")
                .unwrap_or(self.request_timeout_secs),
            download_via_proxy: env_parse("DOWNLOAD_VIA_PROXY").unwrap_or(self.download_via_proxy),
            completion_sentinel: std::env::var("COMPLETION_SENTINEL")
                .unwrap_or(self.completion_sentinel),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES").unwrap_or(self.max_upload_bytes),
            poll,
            tool_poll: self.tool_poll,
            jobs_folder: std::env::var("JOBS_FOLDER").unwrap_or(self.jobs_folder),
            output_folder: std::env::var("OUTPUT_FOLDER").unwrap_or(self.output_folder),
            max_concurrent_jobs: env_parse("MAX_CONCURRENT_JOBS")
                .unwrap_or(self.max_concurrent_jobs),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
        }
    }

    /// 某个工具实际使用的轮询配置：工具默认 ← 全局覆盖 ← 工具覆盖，逐项叠加
    pub fn poll_config_for(&self, tool: ToolKind) -> PollConfig {
        let base = self.poll.apply(tool.default_poll_config());
        match self.tool_poll.get(&tool) {
            Some(overrides) => overrides.apply(base),
            None => base,
        }
    }

    /// 校验所有工具的轮询配置
    pub fn validate(&self) -> AppResult<()> {
        for tool in ToolKind::ALL {
            self.poll_config_for(tool).validate()?;
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(var_name: &str) -> Option<T> {
    let value = std::env::var(var_name).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("⚠️ 环境变量 {} 的值 '{}' 无法解析，已忽略", var_name, value);
            None
        }
    }
}
