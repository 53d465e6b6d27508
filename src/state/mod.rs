//! State module for tracking crawl jobs
//!
//! # Components
//!
//! - `JobStatus`: The per-institution crawl state machine
//! - `CrawlJob`: One institution's crawl, as stored by the job tracker
//! - `CrawlRequest`: The inputs of a new crawl, validated into a `CrawlJob`

mod crawl_job;
mod job_status;

// Re-export main types
pub use crawl_job::{CrawlJob, CrawlRequest};
pub use job_status::JobStatus;
