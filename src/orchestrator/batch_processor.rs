//! 批量任务处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量任务的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：创建日志文件、后端客户端和资源表
//! 2. **批量加载**：扫描并加载所有任务描述文件（`Vec<JobDescriptor>`）
//! 3. **并发控制**：使用 Semaphore 限制同时处理的任务数量
//! 4. **全局统计**：汇总所有任务的处理结果

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::clients::{BackendClient, TaskBackend};
use crate::config::Config;
use crate::models::{JobDescriptor, ResourceRegistry};
use crate::orchestrator::job_processor::{self, JobReport};
use crate::utils::logging::{init_log_file, log_jobs_loaded, log_startup, print_final_stats};

/// 应用主结构
pub struct App {
    config: Config,
    backend: Arc<dyn TaskBackend>,
    registry: Arc<ResourceRegistry>,
}

/// 处理统计
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
    pub reports: Vec<JobReport>,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        let backend: Arc<dyn TaskBackend> = Arc::new(BackendClient::new(&config)?);
        Self::with_backend(config, backend)
    }

    /// 使用指定的后端初始化
    pub fn with_backend(config: Config, backend: Arc<dyn TaskBackend>) -> Result<Self> {
        init_log_file(&config.output_log_file)?;
        log_startup(&config.api_base_url, config.max_concurrent_jobs);

        Ok(Self {
            config,
            backend,
            registry: Arc::new(ResourceRegistry::new()),
        })
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<ProcessingStats> {
        info!("\n📁 正在扫描待处理的任务...");
        let jobs = crate::models::load_all_job_files(&self.config.jobs_folder).await?;

        if jobs.is_empty() {
            warn!("⚠️ 没有找到待处理的TOML文件，程序结束");
            return Ok(ProcessingStats::default());
        }

        log_jobs_loaded(jobs.len(), self.config.max_concurrent_jobs);

        let stats = self.process_all_jobs(jobs).await?;

        print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            &self.config.output_log_file,
        );

        Ok(stats)
    }

    /// 并发处理所有任务
    async fn process_all_jobs(&self, jobs: Vec<JobDescriptor>) -> Result<ProcessingStats> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_jobs.max(1)));
        let mut stats = ProcessingStats {
            total: jobs.len(),
            ..Default::default()
        };

        let mut handles = Vec::with_capacity(jobs.len());
        for (idx, descriptor) in jobs.into_iter().enumerate() {
            let job_index = idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;

            let backend = Arc::clone(&self.backend);
            let registry = Arc::clone(&self.registry);
            let config = self.config.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                match job_processor::process_job(backend, registry, descriptor, job_index, &config)
                    .await
                {
                    Ok(report) => Ok(report),
                    Err(e) => {
                        error!("[任务 #{}] ❌ 处理过程中发生错误: {:#}", job_index, e);
                        Err(e)
                    }
                }
            });
            handles.push((job_index, handle));
        }

        for (job_index, handle) in handles {
            match handle.await {
                Ok(Ok(report)) => {
                    if report.succeeded() {
                        stats.success += 1;
                    } else {
                        stats.failed += 1;
                    }
                    stats.reports.push(report);
                }
                Ok(Err(_)) => stats.failed += 1,
                Err(e) => {
                    error!("[任务 #{}] 任务执行失败: {}", job_index, e);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }
}
