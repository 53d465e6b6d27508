//! Job statistics from the course database
//!
//! This module provides functionality for extracting and displaying the
//! status of crawl jobs from the storage layer.

use crate::state::{CrawlJob, JobStatus};
use crate::storage::Storage;
use crate::ScoutError;

/// Status of one institution's crawl job
#[derive(Debug, Clone)]
pub struct JobStatistics {
    pub job: CrawlJob,

    /// Records currently stored for the institution
    ///
    /// Can exceed `job.records_found`, which only counts the latest job.
    pub stored_records: u64,

    /// Wall-clock duration of a finished job (seconds)
    pub duration_seconds: Option<i64>,
}

/// Loads job statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `institution_id` - Restrict to one institution, or None for all
///
/// # Returns
///
/// * `Ok(Vec<JobStatistics>)` - Statistics ordered by institution
/// * `Err(ScoutError)` - Failed to query storage, or the institution has no job
pub fn load_statistics(
    storage: &dyn Storage,
    institution_id: Option<&str>,
) -> Result<Vec<JobStatistics>, ScoutError> {
    let jobs = match institution_id {
        Some(id) => vec![storage
            .get_job(id)?
            .ok_or_else(|| ScoutError::JobNotFound {
                institution_id: id.to_string(),
            })?],
        None => storage.list_jobs()?,
    };

    jobs.into_iter()
        .map(|job| {
            let stored_records = storage.count_records(&job.institution_id)?;
            let duration_seconds = job
                .completed_at
                .map(|completed| (completed - job.created_at).num_seconds());
            Ok(JobStatistics {
                job,
                stored_records,
                duration_seconds,
            })
        })
        .collect()
}

/// One-line description of a job's status
pub fn format_job_status(job: &CrawlJob) -> String {
    let mut line = format!(
        "{}: {} ({}/{} records)",
        job.institution_id, job.status, job.records_found, job.max_records
    );
    if let Some(message) = &job.message {
        line.push_str(" - ");
        line.push_str(message);
    }
    line
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &[JobStatistics]) {
    println!("=== Crawl Jobs ===\n");

    if stats.is_empty() {
        println!("No crawl jobs recorded.");
        return;
    }

    for entry in stats {
        let job = &entry.job;
        println!("{}", job.institution_id);
        println!("  Status: {}", job.status);
        println!("  Start URL: {}", job.start_url);
        println!("  Domain: {}", job.domain);
        println!("  Records: {} / {}", job.records_found, job.max_records);
        println!("  Stored records: {}", entry.stored_records);
        println!("  Created: {}", job.created_at.to_rfc3339());
        if let Some(completed) = job.completed_at {
            println!("  Completed: {}", completed.to_rfc3339());
        }
        if let Some(seconds) = entry.duration_seconds {
            println!("  Duration: {}s", seconds);
        }
        if let Some(message) = &job.message {
            println!("  Message: {}", message);
        }
        println!();
    }

    let active = stats.iter().filter(|s| s.job.status.is_active()).count();
    let failed = stats
        .iter()
        .filter(|s| s.job.status == JobStatus::Failed)
        .count();
    println!(
        "{} institutions, {} active, {} failed",
        stats.len(),
        active,
        failed
    );
}
