use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::utils::id::JobId;

/// Remote status of an export job.
///
/// Platforms report a few more fine-grained states than the five tracked here;
/// queued states fold into `Pending`, cancel-in-progress folds into `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    #[serde(alias = "READY", alias = "SUBMITTED", alias = "UNSUBMITTED")]
    Pending,
    #[serde(alias = "CANCEL_REQUESTED", alias = "CANCELLING")]
    Running,
    #[serde(alias = "SUCCEEDED")]
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Pending or running: the job may still write to its destination.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{}", name)
    }
}

/// A job as observed through [`crate::domain::remote::remote_store::RemoteStore::list_jobs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusInfo {
    pub id: JobId,
    pub description: String,
    pub status: JobStatus,
}
