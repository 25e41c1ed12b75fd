//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量任务处理器
//! - 管理应用生命周期（初始化、运行）
//! - 批量加载任务描述文件
//! - 控制并发数量（Semaphore）
//! - 输出全局统计信息
//!
//! ### `job_processor` - 单个任务处理器
//! - 驱动一个 `JobWorkflow` 走完整个状态机
//! - 把产物写到输出目录
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<JobDescriptor>)
//!     ↓
//! job_processor (处理单个任务)
//!     ↓
//! workflow::JobWorkflow (状态机)
//!     ↓
//! services (能力层：submit / poll / resolve / error mapping)
//!     ↓
//! clients + infrastructure (后端接口：HttpExecutor)
//! ```

pub mod batch_processor;
pub mod job_processor;

// 重新导出主要类型
pub use batch_processor::{App, ProcessingStats};
pub use job_processor::{process_job, JobReport};
