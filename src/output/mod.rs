//! Output module for job reports and record export
//!
//! This module handles:
//! - Loading and printing the status of crawl jobs
//! - Exporting stored course records as JSON

mod export;
pub mod stats;

pub use export::{export_records, write_records};
pub use stats::{format_job_status, load_statistics, print_statistics, JobStatistics};
