//! 工作流状态

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::JobError;
use crate::models::ResourceHandle;

/// 界面工作流的四个状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    /// 等待选择源文件
    Upload,
    /// 已载入源文件，调整参数中
    Editing,
    /// 任务提交 / 轮询 / 下载中
    Processing,
    /// 展示结果
    Result,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Upload => "upload",
            WorkflowState::Editing => "editing",
            WorkflowState::Processing => "processing",
            WorkflowState::Result => "result",
        };
        f.write_str(name)
    }
}

/// 处理计时器
///
/// 进入 processing 时创建，离开 processing 的每条路径上都会丢弃
#[derive(Debug, Clone, Copy)]
pub struct ProcessingTimer {
    started_at: Instant,
}

impl ProcessingTimer {
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// 工作流的只读快照，供界面渲染
#[derive(Debug, Clone)]
pub struct WorkflowSnapshot {
    pub state: WorkflowState,
    pub error_message: Option<String>,
    /// 当前存活任务的ID（仅 processing 状态）
    pub task_id: Option<String>,
    /// 当前任务已查询次数
    pub attempt: u32,
    /// processing 已持续时间
    pub elapsed: Option<Duration>,
    /// 上一次处理耗时
    pub last_duration: Option<Duration>,
    pub handles: Vec<ResourceHandle>,
}

/// 一次 `run` 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    /// 进入 result 状态
    Completed(Vec<ResourceHandle>),
    /// 回到 editing 状态，`message` 是展示给用户的提示
    Failed { error: JobError, message: String },
    /// 运行期间被重置，结果已丢弃
    Cancelled,
}

impl WorkflowOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, WorkflowOutcome::Completed(_))
    }
}
