//! 资源句柄与对象 URL 表
//!
//! 下载得到的二进制产物登记在 `ResourceRegistry` 中，对外只暴露
//! `blob:` 形式的预览地址。被替换或重置的句柄需要及时释放。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::models::ArtifactKind;

/// 面向界面的预览 / 下载引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    pub kind: ArtifactKind,
    /// 后端结果 key
    pub key: String,
    /// 本地对象 URL
    pub preview_url: String,
    /// 后端下载地址
    pub download_url: String,
    pub size_bytes: usize,
}

#[derive(Debug)]
struct StoredBlob {
    kind: ArtifactKind,
    bytes: Vec<u8>,
}

/// 对象 URL 表
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    blobs: Mutex<HashMap<String, StoredBlob>>,
    next_id: AtomicU64,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一份产物并返回句柄
    pub fn create(
        &self,
        kind: ArtifactKind,
        key: &str,
        bytes: Vec<u8>,
        download_url: String,
    ) -> ResourceHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let preview_url = format!("blob:gif-tools/{}", id);
        let size_bytes = bytes.len();

        self.lock()
            .insert(preview_url.clone(), StoredBlob { kind, bytes });

        ResourceHandle {
            kind,
            key: key.to_string(),
            preview_url,
            download_url,
            size_bytes,
        }
    }

    /// 读取句柄对应的二进制内容
    pub fn bytes(&self, handle: &ResourceHandle) -> Option<Vec<u8>> {
        self.lock()
            .get(&handle.preview_url)
            .map(|blob| blob.bytes.clone())
    }

    /// 查询对象 URL 的 MIME 类型
    pub fn mime_type(&self, preview_url: &str) -> Option<&'static str> {
        self.lock()
            .get(preview_url)
            .map(|blob| blob.kind.mime_type())
    }

    /// 释放句柄，返回是否确实释放了内容
    pub fn revoke(&self, handle: &ResourceHandle) -> bool {
        self.lock().remove(&handle.preview_url).is_some()
    }

    pub fn revoke_all(&self, handles: &[ResourceHandle]) {
        let mut blobs = self.lock();
        for handle in handles {
            blobs.remove(&handle.preview_url);
        }
    }

    pub fn contains(&self, handle: &ResourceHandle) -> bool {
        self.lock().contains_key(&handle.preview_url)
    }

    /// 当前存活的对象 URL 数量
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredBlob>> {
        // 表里只有字节数据，锁中毒时沿用内部状态即可
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
