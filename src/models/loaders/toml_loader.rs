use crate::models::job::Job;
use crate::models::scoring::CategoryRegistry;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载单个任务请求
pub async fn load_job_request(toml_file_path: &Path) -> Result<Job> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let job: Job = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    Ok(job)
}

/// 从文件夹中加载所有任务请求（按文件名排序，保证提交顺序稳定）
///
/// 无法解析的文件记录警告后跳过
pub async fn load_all_job_requests(folder_path: &str) -> Result<Vec<Job>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut toml_files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(path);
        }
    }
    toml_files.sort();

    let mut jobs = Vec::with_capacity(toml_files.len());
    for path in toml_files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_job_request(&path).await {
            Ok(job) => {
                tracing::info!("成功加载任务 {}", job);
                jobs.push(job);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(jobs)
}

/// 加载类别权重覆盖文件
pub async fn load_category_overrides(toml_file_path: &Path) -> Result<CategoryRegistry> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取类别文件: {}", toml_file_path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("无法解析类别文件: {}", toml_file_path.display()))
}
