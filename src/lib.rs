//! # GIF Tools Client
//!
//! GIF 处理工具的客户端任务编排：提交任务、带退避的轮询、下载结果，
//! 并用一个状态机驱动每个工具的界面流程。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有 HTTP 客户端，只暴露能力
//! - `HttpExecutor` - 唯一的 reqwest::Client owner，统一处理错误响应
//! - `clients/` - `TaskBackend` 接口与基于 HTTP 的实现 `BackendClient`
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个任务
//! - `TaskSubmitter` - 提交任务，拿回任务ID
//! - `PollingEngine` - 线性退避轮询直到终态 / 超时 / 取消
//! - `ResultResolver` - 下载产物并登记为资源句柄
//! - `ErrorMapper` - 把后端错误文本翻译成用户可读的提示
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个工具"的完整界面流程
//! - `JobCtx` - 上下文封装（tool + job_index）
//! - `JobWorkflow` - 状态机（upload → editing → processing → result）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量任务处理器，管理资源和并发
//! - `orchestrator/job_processor` - 单个任务处理器，保存产物
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{BackendClient, TaskBackend};
pub use config::{Config, PollOverrides};
pub use error::{AppError, AppResult, JobError};
pub use infrastructure::HttpExecutor;
pub use models::{JobDescriptor, JobRequest, ResourceHandle, ResourceRegistry, SourceMedia, ToolKind};
pub use orchestrator::{process_job, App};
pub use services::{ErrorMapper, PollConfig, PollingEngine, ResultResolver, TaskSubmitter};
pub use workflow::{JobCtx, JobWorkflow, WorkflowOutcome, WorkflowState};
