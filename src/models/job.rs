use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// 完整多页审计（后台执行，结果通过完成信号通知）
    Full,
    /// 单页快速扫描（调用方等待结果）
    Quick,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Full => "full",
            JobKind::Quick => "quick",
        }
    }
}

/// 审计任务
///
/// 创建后不可变；入队后归队列所有，出队后归正在运行的流程所有
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub email: String,
    pub url: String,
    pub kind: JobKind,
}

impl Job {
    pub fn full(email: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            url: url.into(),
            kind: JobKind::Full,
        }
    }

    pub fn quick(email: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            url: url.into(),
            kind: JobKind::Quick,
        }
    }

    /// 校验必填字段（邮箱和 URL 都不能为空）
    pub fn validate(&self) -> AppResult<()> {
        if self.email.trim().is_empty() || self.url.trim().is_empty() {
            return Err(AppError::invalid_job("Email and URL are required."));
        }
        Ok(())
    }

    /// 用于目录名的邮箱：非字母数字字符替换为 `_`
    pub fn sanitized_email(&self) -> String {
        self.email
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {} → {}]", self.kind.as_str(), self.email, self.url)
    }
}

/// 模拟设备
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Desktop,
    Mobile,
}

impl Device {
    /// 完整审计依次覆盖的设备
    pub const ALL: [Device; 2] = [Device::Desktop, Device::Mobile];

    pub fn as_str(self) -> &'static str {
        match self {
            Device::Desktop => "desktop",
            Device::Mobile => "mobile",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 快速扫描结果（返回给等待中的调用方）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickScanOutcome {
    pub report_path: PathBuf,
    pub score: f64,
}

/// 完成信号状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Completed,
    Failed,
}

/// 发给外部状态服务的完成信号
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSignal {
    pub status: JobStatus,
    pub client_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompletionSignal {
    pub fn completed(client_email: impl Into<String>, folder_path: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            client_email: client_email.into(),
            folder_path: Some(folder_path.into()),
            error: None,
        }
    }

    pub fn failed(client_email: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            client_email: client_email.into(),
            folder_path: None,
            error: Some(error.into()),
        }
    }
}
