//! 任务调度器 - 编排层
//!
//! 两条独立的 FIFO 队列（完整审计 / 快速扫描）共享一把浏览器锁：
//! 任意时刻全系统最多只有一个任务在使用浏览器。
//!
//! - 入队后立即尝试调度；锁被占用或队列为空时什么都不做
//! - 任务结束（无论成功、出错、panic 还是超时）都会释放锁，
//!   然后先探测兄弟队列、再探测自己，避免某条队列被持续饿死
//! - 同一队列内严格 FIFO；两条队列之间谁先在锁空闲时触发调度谁先执行

use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{oneshot, Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info};

use crate::models::job::{CompletionSignal, Job, QuickScanOutcome};
use crate::services::status_notifier::StatusNotifier;

/// 队列处理函数：接收任务，返回结果
pub type Processor<O> = Arc<dyn Fn(Job) -> BoxFuture<'static, anyhow::Result<O>> + Send + Sync>;

/// 后台任务结束时的回调
pub type CompletionHook<O> =
    Box<dyn FnOnce(Job, Result<O, SchedulerError>) -> BoxFuture<'static, ()> + Send>;

/// 把普通的 async 函数包装成 [`Processor`]
pub fn processor<O, F, Fut>(f: F) -> Processor<O>
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
{
    Arc::new(move |job| f(job).boxed())
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulerError {
    #[error("rejected job request: {0}")]
    Rejected(String),

    #[error("job for {email} failed: {message}")]
    JobFailed { email: String, message: String },

    #[error("job for {email} panicked: {message}")]
    Panicked { email: String, message: String },

    #[error("job for {email} exceeded the {seconds}s ceiling")]
    TimedOut { email: String, seconds: u64 },

    #[error("job was dropped before it finished")]
    Dropped,
}

// ============================================================================
// 浏览器锁
// ============================================================================

/// 全局唯一的浏览器锁（容量为 1 的信号量）
///
/// 许可随 [`BrowserPermit`] 的 drop 释放，任何退出路径都不会泄漏
#[derive(Debug, Clone)]
pub struct BrowserLock {
    semaphore: Arc<Semaphore>,
}

/// 持有期间浏览器归当前任务独占
#[derive(Debug)]
pub struct BrowserPermit {
    _permit: OwnedSemaphorePermit,
}

impl BrowserLock {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// 非阻塞获取；已被占用时返回 `None`
    pub fn try_acquire(&self) -> Option<BrowserPermit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| BrowserPermit { _permit: permit })
    }

    pub fn is_held(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

impl Default for BrowserLock {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// 通用队列
// ============================================================================

enum Delivery<O> {
    Background(CompletionHook<O>),
    Awaited(oneshot::Sender<Result<O, SchedulerError>>),
}

struct QueueEntry<O> {
    job: Job,
    delivery: Delivery<O>,
}

/// 正在执行（含结果投递）的任务数，归零时唤醒等待者
#[derive(Debug, Default)]
struct Activity {
    in_flight: AtomicUsize,
    settled: Notify,
}

impl Activity {
    fn begin(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    fn end(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.settled.notify_waiters();
    }

    fn is_quiet(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0
    }
}

/// 可被兄弟队列触发调度的对象
trait Dispatch: Send + Sync {
    fn try_dispatch(self: Arc<Self>) -> bool;
}

/// 带处理函数的 FIFO 队列，与兄弟队列共享一把 [`BrowserLock`]
pub struct JobQueue<O> {
    name: &'static str,
    entries: Mutex<VecDeque<QueueEntry<O>>>,
    processor: Processor<O>,
    lock: BrowserLock,
    job_timeout: Option<Duration>,
    sibling: OnceLock<Weak<dyn Dispatch>>,
    activity: Arc<Activity>,
}

impl<O: Send + 'static> JobQueue<O> {
    pub fn new(
        name: &'static str,
        processor: Processor<O>,
        lock: BrowserLock,
        job_timeout: Option<Duration>,
    ) -> Arc<Self> {
        Self::with_activity(name, processor, lock, job_timeout, Arc::default())
    }

    fn with_activity(
        name: &'static str,
        processor: Processor<O>,
        lock: BrowserLock,
        job_timeout: Option<Duration>,
        activity: Arc<Activity>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            entries: Mutex::new(VecDeque::new()),
            processor,
            lock,
            job_timeout,
            sibling: OnceLock::new(),
            activity,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// 队首任务（不出队）
    pub fn head(&self) -> Option<Job> {
        self.entries().front().map(|entry| entry.job.clone())
    }

    /// 入队后立即返回，任务结束时调用 `hook`
    pub fn enqueue_background_with(self: &Arc<Self>, job: Job, hook: CompletionHook<O>) {
        self.push(job, Delivery::Background(hook));
    }

    /// 入队（同步完成），返回等待结果的 future
    pub fn enqueue_awaited(
        self: &Arc<Self>,
        job: Job,
    ) -> impl Future<Output = Result<O, SchedulerError>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        self.push(job, Delivery::Awaited(tx));
        async move { rx.await.unwrap_or(Err(SchedulerError::Dropped)) }
    }

    fn push(self: &Arc<Self>, job: Job, delivery: Delivery<O>) {
        debug!("[{}] 入队: {}", self.name, job);
        self.entries().push_back(QueueEntry { job, delivery });
        self.clone().try_dispatch();
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<QueueEntry<O>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 执行一个任务，结束后释放锁并重新调度
    async fn execute(self: Arc<Self>, entry: QueueEntry<O>, permit: BrowserPermit) {
        let QueueEntry { job, delivery } = entry;
        let email = job.email.clone();

        let result = self.guarded_run(job.clone()).await;

        if let Err(e) = &result {
            error!("[{}] ❌ {}", self.name, e);
        }

        info!(
            "[{}] finished job for {}. Releasing browser lock.",
            self.name, email
        );
        drop(permit);

        // 先探测兄弟队列，再探测自己
        if let Some(sibling) = self.sibling.get().and_then(Weak::upgrade) {
            sibling.try_dispatch();
        }
        self.clone().try_dispatch();

        // 投递结果时浏览器已经交给下一个任务
        match delivery {
            Delivery::Awaited(tx) => {
                if tx.send(result).is_err() {
                    debug!("[{}] 调用方已不再等待 {} 的结果", self.name, email);
                }
            }
            Delivery::Background(hook) => hook(job, result).await,
        }
        self.activity.end();
    }

    /// 在调度边界捕获错误、panic 和超时
    async fn guarded_run(&self, job: Job) -> Result<O, SchedulerError> {
        let email = job.email.clone();
        let processor = self.processor.clone();
        let work = AssertUnwindSafe(async move { processor(job).await }).catch_unwind();

        let outcome = match self.job_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(SchedulerError::TimedOut {
                        email,
                        seconds: limit.as_secs(),
                    })
                }
            },
            None => work.await,
        };

        match outcome {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(SchedulerError::JobFailed {
                email,
                message: format!("{:#}", e),
            }),
            Err(payload) => Err(SchedulerError::Panicked {
                email,
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

impl<O: Send + 'static> Dispatch for JobQueue<O> {
    fn try_dispatch(self: Arc<Self>) -> bool {
        let (entry, permit) = {
            let mut entries = self.entries();
            if entries.is_empty() {
                return false;
            }
            let Some(permit) = self.lock.try_acquire() else {
                return false;
            };
            // 出队前计数，持锁期间任务始终可见（排队或执行中）
            self.activity.begin();
            match entries.pop_front() {
                Some(entry) => (entry, permit),
                None => {
                    self.activity.end();
                    return false;
                }
            }
        };

        info!(
            "[{}] picked up job for {}. Browser is now locked.",
            self.name, entry.job.email
        );
        tokio::spawn(self.execute(entry, permit));
        true
    }
}

/// 互相登记为兄弟队列
fn link<A, B>(a: &Arc<JobQueue<A>>, b: &Arc<JobQueue<B>>)
where
    A: Send + 'static,
    B: Send + 'static,
{
    let dyn_a: Arc<dyn Dispatch> = a.clone();
    let dyn_b: Arc<dyn Dispatch> = b.clone();
    let _ = a.sibling.set(Arc::downgrade(&dyn_b));
    let _ = b.sibling.set(Arc::downgrade(&dyn_a));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// 调度器
// ============================================================================

/// 两条队列的长度和锁状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingJobs {
    pub full: usize,
    pub quick: usize,
    pub browser_locked: bool,
}

/// 双队列调度器
///
/// 完整审计的处理函数返回报告目录，快速扫描返回报告路径和分数
pub struct Scheduler {
    lock: BrowserLock,
    full: Arc<JobQueue<PathBuf>>,
    quick: Arc<JobQueue<QuickScanOutcome>>,
    notifier: Arc<dyn StatusNotifier>,
    activity: Arc<Activity>,
}

impl Scheduler {
    pub const FULL_QUEUE: &'static str = "FullAuditQueue";
    pub const QUICK_QUEUE: &'static str = "QuickScanQueue";

    pub fn new(
        full_processor: Processor<PathBuf>,
        quick_processor: Processor<QuickScanOutcome>,
        notifier: Arc<dyn StatusNotifier>,
        job_timeout: Option<Duration>,
    ) -> Self {
        let lock = BrowserLock::new();
        let activity: Arc<Activity> = Arc::default();
        let full = JobQueue::with_activity(
            Self::FULL_QUEUE,
            full_processor,
            lock.clone(),
            job_timeout,
            activity.clone(),
        );
        let quick = JobQueue::with_activity(
            Self::QUICK_QUEUE,
            quick_processor,
            lock.clone(),
            job_timeout,
            activity.clone(),
        );
        link(&full, &quick);

        Self {
            lock,
            full,
            quick,
            notifier,
            activity,
        }
    }

    /// 提交完整审计（立即返回）
    ///
    /// 结果只通过完成信号对外可见
    pub fn submit_full_audit(&self, job: Job) -> Result<(), SchedulerError> {
        job.validate()
            .map_err(|e| SchedulerError::Rejected(e.to_string()))?;

        let notifier = self.notifier.clone();
        let hook: CompletionHook<PathBuf> = Box::new(move |job, result| {
            async move {
                let signal = match result {
                    Ok(folder) => {
                        CompletionSignal::completed(&job.email, folder.display().to_string())
                    }
                    Err(SchedulerError::JobFailed { message, .. }) => {
                        CompletionSignal::failed(&job.email, message)
                    }
                    Err(e) => CompletionSignal::failed(&job.email, e.to_string()),
                };
                notifier.notify(&signal).await;
            }
            .boxed()
        });

        info!("📥 收到完整审计请求: {}", job);
        self.full.enqueue_background_with(job, hook);
        Ok(())
    }

    /// 提交快速扫描，等待结果
    pub fn submit_quick_scan(
        &self,
        job: Job,
    ) -> BoxFuture<'static, Result<QuickScanOutcome, SchedulerError>> {
        if let Err(e) = job.validate() {
            return futures::future::ready(Err(SchedulerError::Rejected(e.to_string()))).boxed();
        }
        info!("📥 收到快速扫描请求: {}", job);
        self.quick.enqueue_awaited(job).boxed()
    }

    pub fn full_queue(&self) -> &Arc<JobQueue<PathBuf>> {
        &self.full
    }

    pub fn quick_queue(&self) -> &Arc<JobQueue<QuickScanOutcome>> {
        &self.quick
    }

    pub fn pending(&self) -> PendingJobs {
        PendingJobs {
            full: self.full.len(),
            quick: self.quick.len(),
            browser_locked: self.lock.is_held(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.full.is_empty() && self.quick.is_empty() && self.activity.is_quiet()
    }

    /// 等到两条队列都为空且没有任务在执行或投递结果
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.activity.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}
