//! 后端任务模型
//!
//! `Task` 由 TaskSubmitter 创建，只由 PollingEngine 修改

use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::models::ResultRef;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Success,
    Failure,
}

/// 一个由后端追踪的异步任务
#[derive(Debug, Clone)]
pub struct Task {
    /// 后端返回的任务ID
    pub id: String,
    pub state: TaskState,
    pub result: Option<ResultRef>,
    pub error: Option<String>,
    /// 已消耗的轮询次数
    pub attempts: u32,
    pub submitted_at: DateTime<Local>,
}

impl Task {
    /// 创建新的待处理任务
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: TaskState::Pending,
            result: None,
            error: None,
            attempts: 0,
            submitted_at: Local::now(),
        }
    }
}

/// `POST /api/<job-kind>` 成功响应
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
}

/// `GET /api/task-status/<task_id>` 响应
///
/// 两套状态词汇并存：`state` 使用 SUCCESS / FAILURE / PENDING，
/// `status` 是自由文本的完成标记
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Option<JsonValue>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TaskStatus {
    pub fn pending() -> Self {
        Self {
            state: Some("PENDING".to_string()),
            ..Default::default()
        }
    }

    pub fn success(result: JsonValue) -> Self {
        Self {
            state: Some("SUCCESS".to_string()),
            result: Some(result),
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            state: Some("FAILURE".to_string()),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}
