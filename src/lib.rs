//! # Senior Audit
//!
//! 面向老年用户的网站可访问性审计工具
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 启动 headless Chrome，管理会话生命周期
//! - `infrastructure/` - `JsExecutor`，页面内脚本执行能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个页面或单份报告
//! - `LighthouseRunner` - 外部审计（含 403/超时的进阶重试）
//! - `score_aggregator` - 加权评分
//! - `box_filter` / `annotator` - 截图标注
//! - `report_compiler` / `ChromePdfRenderer` - 报告文档
//! - `LinkCollector` - 站内链接收集
//! - `HttpStatusNotifier` - 完成信号
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个页面 × 一种设备"的完整处理流程
//! - `AuditCtx` - 上下文封装（email + url + device）
//! - `AuditPipeline` - 流程编排（audit → score → annotate → document → cleanup）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/scheduler` - 双队列 + 浏览器锁
//! - `orchestrator/full_audit` / `quick_scan` - 单个任务
//! - `orchestrator/batch_processor` - 应用入口
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{CompletionSignal, Device, Job, JobKind, QuickScanOutcome};
pub use orchestrator::{App, Scheduler, SchedulerError};
pub use workflow::{AuditCtx, AuditPipeline, AuditRecord};
