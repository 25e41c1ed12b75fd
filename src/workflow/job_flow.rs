//! 任务处理流程 - 流程层
//!
//! 核心职责：驱动一个工具的界面状态机
//!
//! ```text
//! upload ──load_source──▶ editing ──run──▶ processing ──成功──▶ result
//!                            ▲                 │                 │
//!                            └──────失败────────┘                 │
//!                            └──────────────edit_again───────────┘
//! 任意状态 ──reset──▶ upload（取消存活任务、释放资源句柄）
//! ```
//!
//! 流程顺序：提交 → 轮询 → 下载，三者同一时刻只有一个在进行。
//! 每次进入 processing 都会递增 generation；重置之后旧的运行即使恢复执行，
//! 也会因为 generation 不匹配而丢弃自己的结果。

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value as JsonValue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clients::TaskBackend;
use crate::config::Config;
use crate::error::{AppError, AppResult, JobError, WorkflowError};
use crate::models::{JobRequest, ResourceHandle, ResourceRegistry, SourceMedia, Task};
use crate::services::{
    ErrorMapper, PollConfig, PollingEngine, ResultResolver, StandardStatus, TaskSubmitter,
};
use crate::workflow::job_ctx::JobCtx;
use crate::workflow::job_state::{
    ProcessingTimer, WorkflowOutcome, WorkflowSnapshot, WorkflowState,
};

/// 状态转换观察者，在持有内部锁时调用，不能回调工作流
pub type TransitionObserver = Arc<dyn Fn(WorkflowState, WorkflowState) + Send + Sync>;

/// 工作流行为参数
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub poll: PollConfig,
    pub completion_sentinel: String,
    pub max_upload_bytes: u64,
}

impl WorkflowSettings {
    pub fn from_config(config: &Config, ctx: &JobCtx) -> Self {
        Self {
            poll: config.poll_config_for(ctx.tool),
            completion_sentinel: config.completion_sentinel.clone(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// generation、本次运行的取消令牌、待提交的请求
type Started = (u64, CancellationToken, JobRequest);

struct Inner {
    state: WorkflowState,
    error_message: Option<String>,
    source: Option<SourceMedia>,
    /// 只在 processing 期间存在
    task: Option<Task>,
    handles: Vec<ResourceHandle>,
    timer: Option<ProcessingTimer>,
    last_duration: Option<std::time::Duration>,
    generation: u64,
    cancel: CancellationToken,
}

struct Shared {
    inner: Mutex<Inner>,
    attempts: AtomicU32,
    registry: Arc<ResourceRegistry>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.cancel.cancel();
        self.registry.revoke_all(&inner.handles);
    }
}

/// 单个工具的工作流
///
/// - 克隆得到的是同一个工作流的句柄，可以在另一个任务里调用 `reset`
/// - 同一时刻最多一个存活任务
/// - 所有失败都在这里转换成 `error_message`，不会停留在 processing
#[derive(Clone)]
pub struct JobWorkflow {
    ctx: JobCtx,
    backend: Arc<dyn TaskBackend>,
    settings: WorkflowSettings,
    shared: Arc<Shared>,
    observer: Option<TransitionObserver>,
}

impl JobWorkflow {
    /// 创建新的工作流，初始状态为 upload
    pub fn new(
        ctx: JobCtx,
        backend: Arc<dyn TaskBackend>,
        registry: Arc<ResourceRegistry>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            ctx,
            backend,
            settings,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: WorkflowState::Upload,
                    error_message: None,
                    source: None,
                    task: None,
                    handles: Vec::new(),
                    timer: None,
                    last_duration: None,
                    generation: 0,
                    cancel: CancellationToken::new(),
                }),
                attempts: AtomicU32::new(0),
                registry,
            }),
            observer: None,
        }
    }

    /// 注册状态转换观察者
    pub fn with_observer(mut self, observer: TransitionObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn ctx(&self) -> &JobCtx {
        &self.ctx
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.shared.registry
    }

    pub fn state(&self) -> WorkflowState {
        self.lock().state
    }

    pub fn handles(&self) -> Vec<ResourceHandle> {
        self.lock().handles.clone()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let inner = self.lock();
        WorkflowSnapshot {
            state: inner.state,
            error_message: inner.error_message.clone(),
            task_id: inner.task.as_ref().map(|t| t.id.clone()),
            attempt: self.shared.attempts.load(Ordering::Relaxed),
            elapsed: inner.timer.map(|t| t.elapsed()),
            last_duration: inner.last_duration,
            handles: inner.handles.clone(),
        }
    }

    /// upload → editing：本地校验源文件 / 链接，不发起网络任务
    pub async fn load_source(&self, source: SourceMedia) -> AppResult<()> {
        self.ensure_state(WorkflowState::Upload, "load_source")?;

        if let Err(e) = source
            .validate(self.ctx.tool, self.settings.max_upload_bytes)
            .await
        {
            warn!("{} ⚠️ 源文件校验失败: {}", self.ctx, e);
            let message = match &e {
                AppError::Workflow(WorkflowError::InvalidSource { reason }) => reason.clone(),
                other => other.to_string(),
            };
            self.lock().error_message = Some(message);
            return Err(e);
        }

        let mut inner = self.lock();
        if inner.state != WorkflowState::Upload {
            return Err(AppError::invalid_transition(
                inner.state.to_string(),
                "load_source",
            ));
        }
        info!("{} 📁 已载入源: {}", self.ctx, source.display_name());
        inner.source = Some(source);
        inner.error_message = None;
        self.transition(&mut inner, WorkflowState::Editing);
        Ok(())
    }

    /// result → editing：保留源文件继续调整参数，旧结果在下一次 run 时释放
    pub fn edit_again(&self) -> AppResult<()> {
        let mut inner = self.lock();
        if inner.state != WorkflowState::Result {
            return Err(AppError::invalid_transition(
                inner.state.to_string(),
                "edit_again",
            ));
        }
        self.transition(&mut inner, WorkflowState::Editing);
        Ok(())
    }

    /// 任意状态 → upload：取消存活任务、释放资源句柄
    ///
    /// 可以在运行中的 `run` 之外的任何地方调用（包括界面销毁时）
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.cancel.cancel();
        inner.generation += 1;

        let handles = std::mem::take(&mut inner.handles);
        self.shared.registry.revoke_all(&handles);

        if let Some(task) = inner.task.take() {
            info!("{} 🛑 放弃任务 {}", self.ctx, task.id);
        }
        inner.source = None;
        inner.error_message = None;
        inner.timer = None;
        inner.last_duration = None;
        self.shared.attempts.store(0, Ordering::Relaxed);

        if inner.state != WorkflowState::Upload {
            self.transition(&mut inner, WorkflowState::Upload);
        }
    }

    /// editing → processing：用已载入的源和给定参数运行一次任务
    pub async fn run(&self, params: &Map<String, JsonValue>) -> AppResult<WorkflowOutcome> {
        let tool = self.ctx.tool;
        let started = self.begin_processing(|source| {
            source.map(|source| JobRequest::from_source(tool, source, params))
        })?;
        Ok(self.drive(started).await)
    }

    /// editing → processing：运行调用方构建好的请求
    pub async fn run_request(&self, request: JobRequest) -> AppResult<WorkflowOutcome> {
        let started = self.begin_processing(|_| Some(request))?;
        Ok(self.drive(started).await)
    }

    async fn drive(&self, (generation, cancel, request): Started) -> WorkflowOutcome {
        match self.execute(&request, generation, &cancel).await {
            Ok(handles) => self.complete(generation, &cancel, handles),
            Err(error) => self.fail(generation, &cancel, error),
        }
    }

    /// 提交 → 轮询 → 下载
    async fn execute(
        &self,
        request: &JobRequest,
        generation: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResourceHandle>, JobError> {
        // ========== 1. 提交 ==========
        info!("{} 📤 正在提交任务...", self.ctx);
        let backend = Arc::clone(&self.backend);
        let submitter = TaskSubmitter::new();
        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            res = submitter.submit(|| backend.start_job(request)) => res,
        };
        let mut task = submitted?;
        self.attach_task(generation, &task)?;

        // ========== 2. 轮询 ==========
        info!("{} ⏳ 等待任务 {} 完成...", self.ctx, task.id);
        let engine = PollingEngine::with_interpreter(
            self.settings.poll,
            StandardStatus::new(self.settings.completion_sentinel.clone()),
        );
        let shared = Arc::clone(&self.shared);
        let result = engine
            .run(
                &mut task,
                |task_id| {
                    let backend = Arc::clone(&backend);
                    shared.attempts.fetch_add(1, Ordering::Relaxed);
                    async move { backend.task_status(&task_id).await }
                },
                cancel,
            )
            .await?;

        // ========== 3. 下载 ==========
        info!("{} 📥 正在下载结果...", self.ctx);
        let resolver = ResultResolver::new(Arc::clone(&self.shared.registry));
        resolver
            .resolve(&result, self.backend.as_ref(), cancel)
            .await
    }

    /// 状态检查、取源、构建请求和进入 processing 在同一次加锁内完成
    fn begin_processing<F>(&self, build: F) -> AppResult<Started>
    where
        F: FnOnce(Option<&SourceMedia>) -> Option<JobRequest>,
    {
        let mut inner = self.lock();
        if inner.state != WorkflowState::Editing {
            return Err(AppError::invalid_transition(inner.state.to_string(), "run"));
        }
        let request = build(inner.source.as_ref())
            .ok_or_else(|| AppError::invalid_transition(inner.state.to_string(), "run"))?;

        // 上一次的结果在这里作废
        let stale = std::mem::take(&mut inner.handles);
        if !stale.is_empty() {
            debug!("{} 释放 {} 个旧资源句柄", self.ctx, stale.len());
            self.shared.registry.revoke_all(&stale);
        }

        inner.generation += 1;
        inner.cancel = CancellationToken::new();
        inner.task = None;
        inner.error_message = None;
        inner.timer = Some(ProcessingTimer::start());
        self.shared.attempts.store(0, Ordering::Relaxed);
        self.transition(&mut inner, WorkflowState::Processing);

        Ok((inner.generation, inner.cancel.clone(), request))
    }

    fn attach_task(&self, generation: u64, task: &Task) -> Result<(), JobError> {
        let mut inner = self.lock();
        if inner.generation != generation {
            return Err(JobError::Cancelled);
        }
        inner.task = Some(task.clone());
        Ok(())
    }

    fn is_current(inner: &Inner, generation: u64, cancel: &CancellationToken) -> bool {
        inner.generation == generation && !cancel.is_cancelled()
    }

    fn complete(
        &self,
        generation: u64,
        cancel: &CancellationToken,
        handles: Vec<ResourceHandle>,
    ) -> WorkflowOutcome {
        let mut inner = self.lock();
        if !Self::is_current(&inner, generation, cancel) {
            debug!("{} 丢弃过期结果 ({} 个句柄)", self.ctx, handles.len());
            self.shared.registry.revoke_all(&handles);
            return WorkflowOutcome::Cancelled;
        }

        inner.last_duration = inner.timer.take().map(|t| t.elapsed());
        inner.task = None;
        inner.handles = handles.clone();
        info!(
            "{} ✅ 处理完成，耗时 {:?}",
            self.ctx,
            inner.last_duration.unwrap_or_default()
        );
        self.transition(&mut inner, WorkflowState::Result);
        WorkflowOutcome::Completed(handles)
    }

    fn fail(&self, generation: u64, cancel: &CancellationToken, error: JobError) -> WorkflowOutcome {
        let mut inner = self.lock();
        if !Self::is_current(&inner, generation, cancel) {
            debug!("{} 运行已被重置，忽略错误: {}", self.ctx, error);
            return WorkflowOutcome::Cancelled;
        }

        let Some(message) = ErrorMapper::user_message(&error) else {
            return WorkflowOutcome::Cancelled;
        };

        warn!("{} ❌ 处理失败: {} → {}", self.ctx, error, message);
        inner.last_duration = inner.timer.take().map(|t| t.elapsed());
        inner.task = None;
        inner.error_message = Some(message.clone());
        self.transition(&mut inner, WorkflowState::Editing);
        WorkflowOutcome::Failed { error, message }
    }

    fn ensure_state(&self, expected: WorkflowState, action: &str) -> AppResult<()> {
        let state = self.state();
        if state != expected {
            return Err(AppError::invalid_transition(state.to_string(), action));
        }
        Ok(())
    }

    fn transition(&self, inner: &mut Inner, to: WorkflowState) {
        let from = inner.state;
        if from == WorkflowState::Processing && to != WorkflowState::Processing {
            inner.timer = None;
        }
        inner.state = to;
        debug!("{} 状态: {} → {}", self.ctx, from, to);
        if let Some(observer) = &self.observer {
            observer(from, to);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
