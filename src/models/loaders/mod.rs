pub mod toml_loader;

pub use toml_loader::{load_all_job_requests, load_category_overrides, load_job_request};
