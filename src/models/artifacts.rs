use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

/// 一次 (url, device) 审计生成的标注图片：审计 id → 图片路径
///
/// 文档生成后（或失败时）整体删除
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportArtifactSet {
    images: BTreeMap<String, PathBuf>,
}

impl ReportArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, audit_id: impl Into<String>, path: PathBuf) {
        self.images.insert(audit_id.into(), path);
    }

    pub fn get(&self, audit_id: &str) -> Option<&Path> {
        self.images.get(audit_id).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.images.iter().map(|(id, p)| (id.as_str(), p.as_path()))
    }

    /// 删除所有图片文件，返回实际删除的数量
    ///
    /// 删除失败只记录日志
    pub async fn cleanup(&self) -> usize {
        let mut removed = 0;
        for (id, path) in &self.images {
            match remove_artifact(path).await {
                Ok(true) => {
                    debug!("🗑️  已删除标注图片 [{}]: {}", id, path.display());
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!("[{}] {}", id, e),
            }
        }
        removed
    }
}

/// 删除单个文件；文件本来就不存在时返回 `Ok(false)`
async fn remove_artifact(path: &Path) -> AppResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(AppError::file_delete_failed(path.display().to_string(), e)),
    }
}
