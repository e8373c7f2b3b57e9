pub mod annotator;
pub mod box_filter;
pub mod document_renderer;
pub mod lighthouse;
pub mod link_collector;
pub mod report_compiler;
pub mod score_aggregator;
pub mod status_notifier;

pub use document_renderer::{ChromePdfRenderer, DocumentRenderer};
pub use lighthouse::{AuditProfile, AuditReport, AuditRequest, AuditRunner, LighthouseRunner};
pub use link_collector::{CollectedLinks, LinkCollectError, LinkCollector, LinkSource};
pub use status_notifier::{HttpStatusNotifier, StatusNotifier};
