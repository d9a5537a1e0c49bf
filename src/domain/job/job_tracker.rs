use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::job::job_description::{JobDescription, JobTarget};
use crate::domain::job::job_status::{JobStatus, JobStatusInfo};
use crate::domain::utils::id::DatasetUuid;

/// Maps a dataset to the remote jobs that belong to it.
///
/// Correlation is a substring match of the dataset uuid against the job description.
#[derive(Debug, Clone)]
pub struct JobTracker {
    uuid: DatasetUuid,

    /// Every job whose description mentions the uuid, whatever its status.
    linked_jobs: Vec<JobStatusInfo>,
}

impl JobTracker {
    pub fn new(uuid: DatasetUuid) -> Self {
        JobTracker { uuid, linked_jobs: Vec::new() }
    }

    pub fn correlates(&self, job: &JobStatusInfo) -> bool {
        job.description.contains(self.uuid.as_str())
    }

    /// Replaces the tracked jobs with the correlated subset of `jobs`.
    pub fn update(&mut self, jobs: Vec<JobStatusInfo>) {
        self.linked_jobs = jobs.into_iter().filter(|job| self.correlates(job)).collect();
    }

    pub fn clear(&mut self) {
        self.linked_jobs.clear();
    }

    pub fn linked_jobs(&self) -> &[JobStatusInfo] {
        &self.linked_jobs
    }

    /// Jobs that have not completed successfully: active ones plus failed and cancelled ones.
    pub fn outstanding_jobs(&self) -> Vec<&JobStatusInfo> {
        self.linked_jobs.iter().filter(|job| job.status != JobStatus::Completed).collect()
    }

    pub fn active_jobs(&self) -> Vec<&JobStatusInfo> {
        self.linked_jobs.iter().filter(|job| job.status.is_active()).collect()
    }

    /// Shard ids that an active job is currently writing.
    pub fn active_shards(&self) -> BTreeSet<i64> {
        self.active_jobs()
            .into_iter()
            .filter_map(|job| JobDescription::parse(&job.description))
            .filter_map(|description| match description.target {
                JobTarget::Shard(fid) => Some(fid),
                JobTarget::Config => None,
            })
            .collect()
    }

    /// Whether an active job is writing the configuration object.
    pub fn config_in_progress(&self) -> bool {
        self.active_jobs()
            .into_iter()
            .filter_map(|job| JobDescription::parse(&job.description))
            .any(|description| description.target == JobTarget::Config)
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary::from_jobs(&self.linked_jobs)
    }
}

/// Job counts bucketed by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl TaskSummary {
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a JobStatusInfo>) -> Self {
        let mut summary = TaskSummary::default();
        for job in jobs {
            match job.status {
                JobStatus::Pending => summary.pending += 1,
                JobStatus::Running => summary.running += 1,
                JobStatus::Completed => summary.completed += 1,
                JobStatus::Failed => summary.failed += 1,
                JobStatus::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed + self.cancelled
    }

    /// Reduces the job statuses of a run to the state kept in the metadata store.
    ///
    /// All completed wins, then any failure (cancellations count as failures since
    /// the run can no longer complete), then running, then pending.
    pub fn run_state(&self) -> RunState {
        if self.total() > 0 && self.completed == self.total() {
            RunState::Completed
        } else if self.failed > 0 || self.cancelled > 0 {
            RunState::Failed
        } else if self.running > 0 {
            RunState::Running
        } else if self.pending > 0 {
            RunState::Pending
        } else {
            RunState::Submitted
        }
    }
}

impl fmt::Display for TaskSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tasks completed, {} running, {} pending, {} failed, {} cancelled",
            self.completed, self.running, self.pending, self.failed, self.cancelled
        )
    }
}

/// Lifecycle state of a run record in the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    Submitted,
    Pending,
    Running,
    Failed,
    Completed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Submitted => "SUBMITTED",
            RunState::Pending => "PENDING",
            RunState::Running => "RUNNING",
            RunState::Failed => "FAILED",
            RunState::Completed => "COMPLETED",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::utils::id::JobId;

    fn job(id: &str, description: &str, status: JobStatus) -> JobStatusInfo {
        JobStatusInfo { id: JobId::new(id), description: description.to_string(), status }
    }

    #[test]
    fn keeps_only_correlated_jobs() {
        let mut tracker = JobTracker::new(DatasetUuid::new("aaa"));
        tracker.update(vec![
            job("1", "upload aaa config", JobStatus::Completed),
            job("2", "upload aaa fid 0001", JobStatus::Running),
            job("3", "upload bbb fid 0001", JobStatus::Running),
            job("4", "upload aaa fid 0002", JobStatus::Failed),
        ]);

        assert_eq!(tracker.linked_jobs().len(), 3);
        assert_eq!(tracker.outstanding_jobs().len(), 2);
        assert_eq!(tracker.active_jobs().len(), 1);
        assert_eq!(tracker.active_shards(), BTreeSet::from([1]));
        assert!(!tracker.config_in_progress());
    }

    #[test]
    fn run_state_reduction() {
        let summary = |pending, running, completed, failed, cancelled| TaskSummary { pending, running, completed, failed, cancelled };

        assert_eq!(summary(0, 0, 0, 0, 0).run_state(), RunState::Submitted);
        assert_eq!(summary(0, 0, 4, 0, 0).run_state(), RunState::Completed);
        assert_eq!(summary(1, 1, 2, 1, 0).run_state(), RunState::Failed);
        assert_eq!(summary(0, 0, 2, 0, 1).run_state(), RunState::Failed);
        assert_eq!(summary(2, 1, 1, 0, 0).run_state(), RunState::Running);
        assert_eq!(summary(2, 0, 1, 0, 0).run_state(), RunState::Pending);
    }
}
