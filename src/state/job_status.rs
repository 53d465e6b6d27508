/// Crawl job status definitions
///
/// This module defines the per-institution crawl job state machine.
use serde::Serialize;
use std::fmt;

/// Represents the current status of an institution's crawl job
///
/// Jobs move along `NotStarted → Queued → InProgress → {Completed, Failed, Cancelled}`.
/// A queued job may also fail or be cancelled before it starts. Terminal
/// statuses are never changed in place; a new crawl request replaces the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    // ===== Initial State =====
    /// Institution is known but has never been crawled
    NotStarted,

    // ===== Active States =====
    /// Crawl has been accepted and is waiting for its run to begin
    Queued,

    /// Crawl workers are running
    InProgress,

    // ===== Terminal States =====
    /// Crawl finished by frontier exhaustion, record cap or time budget
    Completed,

    /// Crawl aborted by a job-level fatal error
    Failed,

    /// Crawl was abandoned by an external decision
    Cancelled,
}

impl JobStatus {
    /// Returns true if a crawl for this institution is currently active
    ///
    /// Active jobs block new crawl requests for the same institution.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }

    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if a new crawl may claim the institution from this status
    pub fn is_claimable(&self) -> bool {
        !self.is_active()
    }

    /// Statuses from which a job may move into `self`
    ///
    /// `Queued` is reached through a claim, which is checked with
    /// [`JobStatus::is_claimable`] instead.
    pub fn allowed_predecessors(&self) -> &'static [JobStatus] {
        match self {
            Self::NotStarted => &[],
            Self::Queued => &[Self::NotStarted],
            Self::InProgress => &[Self::Queued],
            Self::Completed => &[Self::InProgress],
            Self::Failed | Self::Cancelled => &[Self::Queued, Self::InProgress],
        }
    }

    /// Returns true if the job may move from `self` to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        next.allowed_predecessors().contains(self)
    }

    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a status from a database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(Self::NotStarted),
            "queued" => Some(Self::Queued),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::NotStarted,
            Self::Queued,
            Self::InProgress,
            Self::Completed,
            Self::Failed,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
