use crate::error::{AppError, AppResult, FileError};
use crate::models::job::JobDescriptor;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载任务描述
pub async fn load_job_descriptor(toml_file_path: &Path) -> AppResult<JobDescriptor> {
    let path_str = toml_file_path.display().to_string();

    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|e| AppError::file_read_failed(&path_str, e))?;

    let mut descriptor: JobDescriptor = toml::from_str(&content).map_err(|e| {
        AppError::File(FileError::TomlParseFailed {
            path: path_str.clone(),
            source: Box::new(e),
        })
    })?;

    // 设置文件路径
    descriptor.file_path = Some(path_str);

    Ok(descriptor)
}

/// 从文件夹中加载所有任务描述文件
///
/// 单个文件解析失败只记录警告，不影响其他文件；结果按文件名排序
pub async fn load_all_job_files(folder_path: &str) -> AppResult<Vec<JobDescriptor>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        return Err(AppError::File(FileError::DirectoryNotFound {
            path: folder_path.to_string(),
        }));
    }

    let mut toml_files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(path);
        }
    }
    toml_files.sort();

    let mut descriptors = Vec::new();
    for path in toml_files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_job_descriptor(&path).await {
            Ok(descriptor) => {
                tracing::info!("成功加载任务: {} ({})", descriptor.output_stem(), descriptor.tool);
                descriptors.push(descriptor);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(descriptors)
}
