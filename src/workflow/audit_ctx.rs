//! 审计上下文
//!
//! 封装"我正在为谁审计哪个页面的哪种设备"这一信息

use std::fmt::Display;
use std::path::PathBuf;

use crate::models::job::Device;
use crate::services::lighthouse::AuditProfile;

/// 单次 (url, device) 审计的上下文
#[derive(Debug, Clone)]
pub struct AuditCtx {
    /// 客户邮箱（报告目录名）
    pub email: String,

    pub url: String,

    pub device: Device,

    pub profile: AuditProfile,

    /// 本任务的临时目录（JSON 报告和标注图片）
    pub scratch_dir: PathBuf,

    /// 最终文档的根目录
    pub output_root: PathBuf,
}

impl AuditCtx {
    pub fn new(
        email: impl Into<String>,
        url: impl Into<String>,
        device: Device,
        profile: AuditProfile,
        scratch_dir: PathBuf,
        output_root: PathBuf,
    ) -> Self {
        Self {
            email: email.into(),
            url: url.into(),
            device,
            profile,
            scratch_dir,
            output_root,
        }
    }
}

impl Display for AuditCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {}]", self.url, self.device)
    }
}
