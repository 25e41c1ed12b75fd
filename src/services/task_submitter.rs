//! 任务提交 - 业务能力层
//!
//! 只负责把"启动任务"的请求发出去并拿回任务ID。
//! 请求体由调用方决定，这里不重试：提交失败意味着没有任务可以轮询。

use std::future::Future;

use tracing::{info, warn};

use crate::error::{AppResult, JobError};
use crate::models::{SubmitResponse, Task};

/// 任务提交器
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskSubmitter;

impl TaskSubmitter {
    pub fn new() -> Self {
        Self
    }

    /// 执行一次提交
    ///
    /// # 参数
    /// - `start`: 发起启动请求的闭包，返回后端的 `{ task_id }`
    ///
    /// # 返回
    /// 返回新建的待处理任务；闭包出错或任务ID为空时返回 `JobError::Submission`
    pub async fn submit<F, Fut>(&self, start: F) -> Result<Task, JobError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<SubmitResponse>>,
    {
        let response = start().await.map_err(|e| {
            warn!("⚠️ 任务提交失败: {}", e);
            JobError::Submission(e.backend_message().unwrap_or_default())
        })?;

        let task_id = response.task_id.trim();
        if task_id.is_empty() {
            warn!("⚠️ 后端返回了空的任务ID");
            return Err(JobError::Submission(
                "Server did not return a task id".to_string(),
            ));
        }

        info!("📤 任务已提交: {}", task_id);
        Ok(Task::new(task_id))
    }
}
