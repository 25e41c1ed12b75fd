//! 结果解析 - 业务能力层
//!
//! 任务成功后下载产物并登记为资源句柄。
//! 主产物下载失败即整体失败；次要产物失败只记录警告并跳过。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clients::TaskBackend;
use crate::error::{AppResult, JobError};
use crate::models::{ArtifactRef, ResourceHandle, ResourceRegistry, ResultRef};

/// 结果解析器
pub struct ResultResolver {
    registry: Arc<ResourceRegistry>,
}

impl ResultResolver {
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        Self { registry }
    }

    /// 下载结果引用指向的所有产物
    ///
    /// # 返回
    /// 第一个句柄总是主产物
    pub async fn resolve<B>(
        &self,
        result: &ResultRef,
        backend: &B,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResourceHandle>, JobError>
    where
        B: TaskBackend + ?Sized,
    {
        let primary = result.primary();
        let bytes = match fetch(backend, &primary, cancel).await? {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                return Err(JobError::Resolution {
                    key: primary.key.clone(),
                    message: "Downloaded file is empty".to_string(),
                })
            }
            Err(e) => {
                warn!("⚠️ 主产物 {} 下载失败: {}", primary.key, e);
                return Err(JobError::Resolution {
                    key: primary.key.clone(),
                    message: e.backend_message().unwrap_or_default(),
                });
            }
        };

        let mut handles = vec![self.register(backend, &primary, bytes)];

        for artifact in result.secondaries() {
            match fetch(backend, &artifact, cancel).await {
                Ok(Ok(bytes)) if !bytes.is_empty() => {
                    handles.push(self.register(backend, &artifact, bytes));
                }
                Ok(Ok(_)) => warn!("⚠️ 次要产物 {} 为空，已跳过", artifact.key),
                Ok(Err(e)) => warn!("⚠️ 次要产物 {} 下载失败，已跳过: {}", artifact.key, e),
                Err(cancelled) => {
                    self.registry.revoke_all(&handles);
                    return Err(cancelled);
                }
            }
        }

        info!("✓ 已获取 {} 个产物", handles.len());
        Ok(handles)
    }

    fn register<B>(&self, backend: &B, artifact: &ArtifactRef, bytes: Vec<u8>) -> ResourceHandle
    where
        B: TaskBackend + ?Sized,
    {
        debug!("登记产物 {} ({} 字节)", artifact.key, bytes.len());
        self.registry.create(
            artifact.kind,
            &artifact.key,
            bytes,
            backend.download_url(&artifact.key),
        )
    }
}

/// 外层 Err 表示被取消，内层 Err 表示下载失败
async fn fetch<B>(
    backend: &B,
    artifact: &ArtifactRef,
    cancel: &CancellationToken,
) -> Result<AppResult<Vec<u8>>, JobError>
where
    B: TaskBackend + ?Sized,
{
    if cancel.is_cancelled() {
        return Err(JobError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(JobError::Cancelled),
        res = backend.download(&artifact.key) => Ok(res),
    }
}
