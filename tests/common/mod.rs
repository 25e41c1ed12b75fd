//! 测试用的脚本化后端
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gif_tools_client::clients::TaskBackend;
use gif_tools_client::error::{ApiError, AppError, AppResult};
use gif_tools_client::models::{JobRequest, ResourceRegistry, SubmitResponse, TaskStatus, ToolKind};
use gif_tools_client::services::PollConfig;
use gif_tools_client::workflow::{JobCtx, JobWorkflow, WorkflowSettings};

pub type Hook = Arc<dyn Fn(usize) + Send + Sync>;

/// 按脚本返回响应的后端
///
/// - 状态队列用完后重复最后一个状态（默认 PENDING）
/// - `on_poll` / `on_download` 在第 n 次调用时触发，n 从 1 开始
#[derive(Default)]
pub struct MockBackend {
    submit_results: Mutex<VecDeque<Result<String, String>>>,
    statuses: Mutex<VecDeque<TaskStatus>>,
    last_status: Mutex<Option<TaskStatus>>,
    downloads: Mutex<HashMap<String, Result<Vec<u8>, String>>>,
    on_poll: Mutex<Option<Hook>>,
    on_download: Mutex<Option<Hook>>,
    pub starts: AtomicUsize,
    pub polls: AtomicUsize,
    pub download_calls: AtomicUsize,
    /// 为 true 时提交请求在传输层失败，没有后端消息
    pub transport_down: AtomicBool,
    pub requests: Mutex<Vec<JobRequest>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn submit_ok(&self, task_id: &str) {
        self.submit_results
            .lock()
            .unwrap()
            .push_back(Ok(task_id.to_string()));
    }

    pub fn submit_err(&self, message: &str) {
        self.submit_results
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn push_status(&self, status: TaskStatus) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn blob(&self, key: &str, bytes: Vec<u8>) {
        self.downloads
            .lock()
            .unwrap()
            .insert(key.to_string(), Ok(bytes));
    }

    pub fn broken_blob(&self, key: &str, message: &str) {
        self.downloads
            .lock()
            .unwrap()
            .insert(key.to_string(), Err(message.to_string()));
    }

    pub fn on_poll(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.on_poll.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn on_download(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.on_download.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn go_offline(&self) {
        self.transport_down.store(true, Ordering::SeqCst);
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }
}

fn bad_response(endpoint: &str, message: String) -> AppError {
    AppError::Api(ApiError::BadResponse {
        endpoint: endpoint.to_string(),
        status: 400,
        message: Some(message),
    })
}

#[async_trait]
impl TaskBackend for MockBackend {
    async fn start_job(&self, request: &JobRequest) -> AppResult<SubmitResponse> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.transport_down.load(Ordering::SeqCst) {
            return Err(AppError::api_request_failed(
                request.tool.endpoint(),
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
            ));
        }
        let next = self
            .submit_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("task".to_string()));
        match next {
            Ok(task_id) => Ok(SubmitResponse { task_id }),
            Err(message) => Err(bad_response(request.tool.endpoint(), message)),
        }
    }

    async fn task_status(&self, _task_id: &str) -> AppResult<TaskStatus> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        let hook = self.on_poll.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(n);
        }

        let next = self.statuses.lock().unwrap().pop_front();
        let mut last = self.last_status.lock().unwrap();
        let status = match next {
            Some(status) => {
                *last = Some(status.clone());
                status
            }
            None => last.clone().unwrap_or_else(TaskStatus::pending),
        };
        Ok(status)
    }

    async fn download(&self, key: &str) -> AppResult<Vec<u8>> {
        let n = self.download_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let hook = self.on_download.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(n);
        }

        match self.downloads.lock().unwrap().get(key) {
            Some(Ok(bytes)) => Ok(bytes.clone()),
            Some(Err(message)) => Err(bad_response("download", message.clone())),
            None => Err(bad_response("download", format!("Result {} not found", key))),
        }
    }

    fn download_url(&self, key: &str) -> String {
        format!("http://mock.local/api/download/{}", key)
    }
}

/// 测试用的快节奏轮询参数
pub fn fast_poll(max_attempts: u32) -> PollConfig {
    PollConfig::default()
        .with_initial_delay(Duration::from_millis(100))
        .with_delay_step(Duration::from_millis(50))
        .with_max_delay(Duration::from_millis(200))
        .with_max_attempts(max_attempts)
}

pub fn settings(max_attempts: u32) -> WorkflowSettings {
    WorkflowSettings {
        poll: fast_poll(max_attempts),
        completion_sentinel: "Task completed!".to_string(),
        max_upload_bytes: 1024 * 1024,
    }
}

/// 创建一个工作流及其资源表
pub fn workflow(
    backend: &Arc<MockBackend>,
    max_attempts: u32,
) -> (JobWorkflow, Arc<ResourceRegistry>) {
    let registry = Arc::new(ResourceRegistry::new());
    let workflow = JobWorkflow::new(
        JobCtx::new(ToolKind::Crop, 1, "test"),
        backend.clone(),
        Arc::clone(&registry),
        settings(max_attempts),
    );
    (workflow, registry)
}
