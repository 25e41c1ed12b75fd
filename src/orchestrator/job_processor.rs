//! 单个任务处理器 - 编排层
//!
//! ## 职责
//!
//! 为一个任务描述文件创建 `JobWorkflow`，跑完 upload → editing → processing → result，
//! 把产物写到输出目录，最后重置工作流释放资源句柄。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::clients::TaskBackend;
use crate::config::Config;
use crate::models::{JobDescriptor, ResourceHandle, ResourceRegistry};
use crate::utils::logging::append_log_line;
use crate::workflow::{JobCtx, JobWorkflow, WorkflowOutcome, WorkflowSettings};

/// 单个任务的处理结果
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_index: usize,
    pub label: String,
    /// 写出的产物文件
    pub outputs: Vec<PathBuf>,
    /// 失败时展示给用户的提示
    pub message: Option<String>,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        self.message.is_none() && !self.outputs.is_empty()
    }
}

/// 处理单个任务
///
/// # 返回
/// 工作流层面的失败（参数错误、超时等）记录在 `JobReport::message` 中；
/// 只有源文件校验、写文件这类本地错误才返回 `Err`
pub async fn process_job(
    backend: Arc<dyn TaskBackend>,
    registry: Arc<ResourceRegistry>,
    descriptor: JobDescriptor,
    job_index: usize,
    config: &Config,
) -> Result<JobReport> {
    let label = descriptor.output_stem();
    let ctx = JobCtx::new(descriptor.tool, job_index, label.clone());
    let settings = WorkflowSettings::from_config(config, &ctx);
    let workflow = JobWorkflow::new(ctx.clone(), backend, registry, settings);

    info!("{} 开始处理", ctx);

    workflow
        .load_source(descriptor.source_media())
        .await
        .with_context(|| format!("{} 源文件无效", ctx))?;

    let outcome = workflow.run(&descriptor.params).await?;

    let report = match outcome {
        WorkflowOutcome::Completed(handles) => {
            let outputs = save_outputs(&workflow, &handles, &config.output_folder, &label).await;
            // 无论写文件是否成功，都要释放句柄
            workflow.reset();
            let outputs = outputs?;
            let _ = append_log_line(
                &config.output_log_file,
                &format!("{} ✅ 输出 {} 个文件", ctx, outputs.len()),
            );
            JobReport {
                job_index,
                label,
                outputs,
                message: None,
            }
        }
        WorkflowOutcome::Failed { message, .. } => {
            error!("{} ❌ {}", ctx, message);
            let _ = append_log_line(&config.output_log_file, &format!("{} ❌ {}", ctx, message));
            workflow.reset();
            JobReport {
                job_index,
                label,
                outputs: Vec::new(),
                message: Some(message),
            }
        }
        WorkflowOutcome::Cancelled => {
            warn!("{} ⚠️ 任务被取消", ctx);
            JobReport {
                job_index,
                label,
                outputs: Vec::new(),
                message: Some("Cancelled".to_string()),
            }
        }
    };

    Ok(report)
}

/// 把所有句柄写到 `{output_folder}/{stem}.{ext}`，同类型产物追加序号
async fn save_outputs(
    workflow: &JobWorkflow,
    handles: &[ResourceHandle],
    output_folder: &str,
    stem: &str,
) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(output_folder)
        .await
        .with_context(|| format!("无法创建输出目录: {}", output_folder))?;

    let mut outputs: Vec<PathBuf> = Vec::with_capacity(handles.len());
    for (idx, handle) in handles.iter().enumerate() {
        let bytes = workflow
            .registry()
            .bytes(handle)
            .with_context(|| format!("资源句柄已失效: {}", handle.preview_url))?;

        let ext = handle.kind.extension();
        let mut path = Path::new(output_folder).join(format!("{}.{}", stem, ext));
        if outputs.contains(&path) {
            path = Path::new(output_folder).join(format!("{}-{}.{}", stem, idx + 1, ext));
        }
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("无法写入文件: {}", path.display()))?;

        info!(
            "{} 💾 已保存: {} ({} 字节)",
            workflow.ctx(),
            path.display(),
            bytes.len()
        );
        outputs.push(path);
    }
    Ok(outputs)
}
