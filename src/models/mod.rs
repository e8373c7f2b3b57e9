pub mod annotated_audit;
pub mod artifacts;
pub mod audit_info;
pub mod geometry;
pub mod job;
pub mod loaders;
pub mod report;
pub mod scoring;

pub use annotated_audit::{AnnotatedAudit, RectSource, RenderStyle};
pub use artifacts::ReportArtifactSet;
pub use geometry::{BoundingBox, BoxMetadata, Rect};
pub use job::{CompletionSignal, Device, Job, JobKind, JobStatus, QuickScanOutcome};
pub use loaders::{load_all_job_requests, load_category_overrides, load_job_request};
pub use report::{AuditItem, AuditResult, LighthouseReport};
pub use scoring::{AuditRef, CategoryDefinition, CategoryRegistry, ScoreData};
