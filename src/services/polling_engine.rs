//! 轮询引擎 - 业务能力层
//!
//! 只负责"等一个任务到终态"，不关心任务是怎么提交的、结果怎么下载。
//!
//! 节奏：首次立即查询；每次非终态查询后休眠当前间隔，然后间隔按固定步长
//! 增长直到上限（线性退避，不是指数退避）。查询次数到达上限即超时。

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AppResult, ConfigError, JobError};
use crate::models::{ResultRef, Task, TaskState, TaskStatus};

/// 默认的完成标记（`status` 字段词汇）
pub const DEFAULT_COMPLETION_SENTINEL: &str = "Task completed!";

/// 轮询参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// 首个休眠间隔
    pub initial_delay: Duration,
    /// 每次增长的步长
    pub delay_step: Duration,
    /// 间隔上限
    pub max_delay: Duration,
    /// 最多查询次数
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1500),
            delay_step: Duration::from_millis(250),
            max_delay: Duration::from_millis(3000),
            max_attempts: 60,
        }
    }
}

impl PollConfig {
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_delay_step(mut self, step: Duration) -> Self {
        self.delay_step = step;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// 校验参数组合
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidPollConfig {
                reason: "max_attempts 必须大于 0".to_string(),
            });
        }
        if self.initial_delay > self.max_delay {
            return Err(ConfigError::InvalidPollConfig {
                reason: format!(
                    "initial_delay ({:?}) 不能大于 max_delay ({:?})",
                    self.initial_delay, self.max_delay
                ),
            });
        }
        Ok(())
    }

    /// 最坏情况下的总等待时间
    pub fn worst_case_wait(&self) -> Duration {
        let mut schedule = PollSchedule::new(self);
        (1..self.max_attempts).map(|_| schedule.backoff()).sum()
    }
}

/// 单个任务的轮询进度，每个新任务重新创建
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSchedule {
    pub attempt: u32,
    pub delay: Duration,
    pub max_attempts: u32,
    pub max_delay: Duration,
    pub step: Duration,
}

impl PollSchedule {
    pub fn new(config: &PollConfig) -> Self {
        Self {
            attempt: 0,
            delay: config.initial_delay,
            max_attempts: config.max_attempts,
            max_delay: config.max_delay,
            step: config.delay_step,
        }
    }

    /// 记录一次查询，返回当前是第几次
    pub fn record_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// 取出本次要休眠的间隔，并把下一次间隔增长一个步长（不超过上限）
    pub fn backoff(&mut self) -> Duration {
        let current = self.delay;
        self.delay = (self.delay + self.step).min(self.max_delay);
        current
    }
}

/// 归一化后的单次查询结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Pending,
    Succeeded(ResultRef),
    Failed(String),
}

/// 状态解释策略
///
/// 把后端各种状态词汇翻译成 `PollOutcome`，上层不再比较字符串
pub trait StatusInterpreter: Send + Sync {
    fn is_success(&self, status: &TaskStatus) -> bool;

    fn is_failure(&self, status: &TaskStatus) -> bool;

    fn extract_result(&self, status: &TaskStatus) -> Option<ResultRef> {
        status.result.as_ref().and_then(ResultRef::from_value)
    }

    fn failure_message(&self, status: &TaskStatus) -> String {
        status
            .error
            .iter()
            .chain(status.status.iter())
            .find(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| "Unknown error".to_string())
    }

    /// 失败优先；成功必须带非空结果，否则仍视为处理中
    fn classify(&self, status: &TaskStatus) -> PollOutcome {
        if self.is_failure(status) {
            return PollOutcome::Failed(self.failure_message(status));
        }
        if self.is_success(status) {
            if let Some(result) = self.extract_result(status) {
                return PollOutcome::Succeeded(result);
            }
        }
        PollOutcome::Pending
    }
}

/// 默认解释器：同时接受 `state` 与 `status` 两套词汇
#[derive(Debug, Clone)]
pub struct StandardStatus {
    completion_sentinel: String,
}

impl StandardStatus {
    pub fn new(completion_sentinel: impl Into<String>) -> Self {
        Self {
            completion_sentinel: completion_sentinel.into(),
        }
    }
}

impl Default for StandardStatus {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETION_SENTINEL)
    }
}

impl StatusInterpreter for StandardStatus {
    fn is_success(&self, status: &TaskStatus) -> bool {
        let signalled = status.state.as_deref() == Some("SUCCESS")
            || status.status.as_deref() == Some(self.completion_sentinel.as_str());
        signalled && self.extract_result(status).is_some()
    }

    fn is_failure(&self, status: &TaskStatus) -> bool {
        status.state.as_deref() == Some("FAILURE")
    }
}

/// 轮询引擎
pub struct PollingEngine<I = StandardStatus> {
    config: PollConfig,
    interpreter: I,
}

impl PollingEngine<StandardStatus> {
    pub fn new(config: PollConfig) -> Self {
        Self::with_interpreter(config, StandardStatus::default())
    }
}

impl<I: StatusInterpreter> PollingEngine<I> {
    pub fn with_interpreter(config: PollConfig, interpreter: I) -> Self {
        Self {
            config,
            interpreter,
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// 轮询直到终态、超时或取消
    ///
    /// `poll` 每次调用只发一个请求，上一个响应处理完之前不会发出下一个。
    /// 取消令牌在每次查询前检查，并与查询、休眠同时竞争，取消后不再调用 `poll`。
    pub async fn run<P, Fut>(
        &self,
        task: &mut Task,
        mut poll: P,
        cancel: &CancellationToken,
    ) -> Result<ResultRef, JobError>
    where
        P: FnMut(String) -> Fut,
        Fut: Future<Output = AppResult<TaskStatus>>,
    {
        let mut schedule = PollSchedule::new(&self.config);
        let started = Instant::now();
        debug!(
            "任务 {} 开始轮询: 最多 {} 次, 最长等待 {:?}",
            task.id,
            self.config.max_attempts,
            self.config.worst_case_wait()
        );

        loop {
            if cancel.is_cancelled() {
                debug!("任务 {} 轮询已取消 (第 {} 次之前)", task.id, schedule.attempt + 1);
                return Err(JobError::Cancelled);
            }

            let attempt = schedule.record_attempt();
            task.attempts = attempt;

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(JobError::Cancelled),
                res = poll(task.id.clone()) => res.map_err(|e| {
                    warn!("⚠️ 任务 {} 状态查询失败: {}", task.id, e);
                    JobError::BackendFailure(e.backend_message().unwrap_or_default())
                })?,
            };

            debug!(
                "任务 {} 第 {}/{} 次查询: state={:?} status={:?}",
                task.id, attempt, schedule.max_attempts, status.state, status.status
            );

            match self.interpreter.classify(&status) {
                PollOutcome::Succeeded(result) => {
                    info!("✓ 任务 {} 完成 (第 {} 次查询)", task.id, attempt);
                    task.state = TaskState::Success;
                    task.result = Some(result.clone());
                    return Ok(result);
                }
                PollOutcome::Failed(message) => {
                    warn!("⚠️ 任务 {} 失败: {}", task.id, message);
                    task.state = TaskState::Failure;
                    task.error = Some(message.clone());
                    return Err(JobError::BackendFailure(message));
                }
                PollOutcome::Pending => {}
            }

            if schedule.exhausted() {
                let elapsed = started.elapsed();
                warn!(
                    "⚠️ 任务 {} 轮询超时: {} 次查询, 耗时 {:?}",
                    task.id, attempt, elapsed
                );
                return Err(JobError::PollTimeout {
                    attempts: attempt,
                    elapsed,
                });
            }

            let delay = schedule.backoff();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(JobError::Cancelled),
                _ = sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn backoff_grows_linearly_up_to_ceiling() {
        let mut schedule = PollSchedule::new(&PollConfig::default());
        let delays: Vec<u64> = (0..10).map(|_| schedule.backoff().as_millis() as u64).collect();
        assert_eq!(
            delays,
            vec![1500, 1750, 2000, 2250, 2500, 2750, 3000, 3000, 3000, 3000]
        );
    }

    #[test]
    fn worst_case_wait_sums_sleeps_between_attempts() {
        let config = PollConfig::default().with_max_attempts(5);
        assert_eq!(config.worst_case_wait(), Duration::from_millis(7500));
        assert_eq!(
            PollConfig::default().with_max_attempts(1).worst_case_wait(),
            Duration::ZERO
        );
    }

    #[test]
    fn both_vocabularies_signal_success() {
        let interpreter = StandardStatus::default();
        let by_state = TaskStatus::success(json!("x"));
        let by_status = TaskStatus {
            status: Some("Task completed!".to_string()),
            result: Some(json!("x")),
            ..Default::default()
        };
        let expected = PollOutcome::Succeeded(ResultRef::Key("x".to_string()));
        assert_eq!(interpreter.classify(&by_state), expected);
        assert_eq!(interpreter.classify(&by_status), expected);
    }

    #[test]
    fn success_without_result_is_still_pending() {
        let interpreter = StandardStatus::default();
        let status = TaskStatus {
            state: Some("SUCCESS".to_string()),
            result: Some(serde_json::Value::Null),
            ..Default::default()
        };
        assert!(!interpreter.is_success(&status));
        assert_eq!(interpreter.classify(&status), PollOutcome::Pending);
    }

    #[test]
    fn failure_message_falls_back() {
        let interpreter = StandardStatus::default();
        let bare = TaskStatus {
            state: Some("FAILURE".to_string()),
            ..Default::default()
        };
        assert_eq!(
            interpreter.classify(&bare),
            PollOutcome::Failed("Unknown error".to_string())
        );
    }

    #[test]
    fn rejects_bad_config() {
        assert!(PollConfig::default().with_max_attempts(0).validate().is_err());
        assert!(PollConfig::default()
            .with_initial_delay(Duration::from_secs(10))
            .validate()
            .is_err());
        assert!(PollConfig::default().validate().is_ok());
    }
}
