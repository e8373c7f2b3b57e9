//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责任务调度和资源互斥，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `scheduler` - 双队列调度器
//! - 完整审计队列 / 快速扫描队列，各自严格 FIFO
//! - 两条队列共享一把浏览器锁（同一时刻最多一个任务）
//! - 任务结束后先探测兄弟队列，再探测自己
//! - 在调度边界捕获错误、panic 和超时，保证锁一定被释放
//!
//! ### `full_audit` - 完整审计任务
//! - 收集站内链接
//! - 每个链接 × 每种设备跑一次审计流程
//! - 单页失败跳过，种子不可达则整个任务失败
//!
//! ### `quick_scan` - 快速扫描任务
//! - 单页、桌面端、精简配置
//!
//! ### `batch_processor` - 应用入口
//! - 装配各层能力，加载任务请求，提交调度，输出统计
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (加载 Vec<Job>)
//!     ↓
//! scheduler (两条队列 + 浏览器锁)
//!     ↓
//! full_audit / quick_scan (处理单个 Job)
//!     ↓
//! workflow::AuditPipeline (处理单个页面 × 设备)
//!     ↓
//! services (能力层：lighthouse / score / annotate / report / links)
//!     ↓
//! infrastructure / browser (基础设施：JsExecutor、headless Chrome)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：scheduler 只管排队和互斥，不认识审计细节
//! 2. **资源隔离**：浏览器锁只存在于调度器中
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure

pub mod batch_processor;
pub mod full_audit;
pub mod quick_scan;
pub mod scheduler;

// 重新导出主要类型
pub use batch_processor::App;
pub use full_audit::{FullAuditJob, FullAuditStats};
pub use quick_scan::QuickScanJob;
pub use scheduler::{BrowserLock, JobQueue, PendingJobs, Scheduler, SchedulerError};
