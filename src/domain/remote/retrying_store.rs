use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::geometry::feature::FeatureCollection;
use crate::domain::job::job_status::JobStatusInfo;
use crate::domain::remote::remote_error::RemoteError;
use crate::domain::remote::remote_store::{ExportSource, RemoteEntry, RemoteStore, TableRow};
use crate::domain::utils::id::JobId;

/// Bounded exponential backoff applied to transient remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_times: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// Factor 2, no jitter, 1s up to 60s, at most 3 retries.
    fn default() -> Self {
        RetryPolicy { max_times: 3, min_delay: Duration::from_secs(1), max_delay: Duration::from_secs(60) }
    }
}

impl RetryPolicy {
    fn builder(&self) -> ExponentialBuilder {
        ExponentialBuilder::default().with_min_delay(self.min_delay).with_max_delay(self.max_delay).with_max_times(self.max_times)
    }
}

/// Wraps a [`RemoteStore`] and retries connectivity and quota failures.
///
/// Export destinations are deterministic per shard, so resubmitting after an
/// ambiguous failure overwrites in place instead of duplicating.
#[derive(Debug, Clone)]
pub struct RetryingRemoteStore {
    inner: Arc<dyn RemoteStore>,
    policy: RetryPolicy,
}

impl RetryingRemoteStore {
    pub fn new(inner: Arc<dyn RemoteStore>, policy: RetryPolicy) -> Self {
        RetryingRemoteStore { inner, policy }
    }
}

fn notify(operation: &'static str, subject: &str) -> impl Fn(&RemoteError, Duration) {
    let subject = subject.to_string();
    move |err, dur| {
        tracing::warn!(
            operation,
            subject = %subject,
            error = %err,
            "Transient remote store error. Retrying in {:.1}s",
            dur.as_secs_f32()
        );
    }
}

#[async_trait]
impl RemoteStore for RetryingRemoteStore {
    async fn list_children(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        (|| self.inner.list_children(path))
            .retry(self.policy.builder())
            .when(RemoteError::is_transient)
            .notify(notify("list_children", path))
            .await
    }

    async fn create_container(&self, path: &str) -> Result<(), RemoteError> {
        (|| self.inner.create_container(path))
            .retry(self.policy.builder())
            .when(RemoteError::is_transient)
            .notify(notify("create_container", path))
            .await
    }

    async fn delete_object(&self, path: &str) -> Result<(), RemoteError> {
        (|| self.inner.delete_object(path))
            .retry(self.policy.builder())
            .when(RemoteError::is_transient)
            .notify(notify("delete_object", path))
            .await
    }

    async fn submit_export_job(&self, source: &ExportSource, destination_path: &str, description: &str) -> Result<JobId, RemoteError> {
        (|| self.inner.submit_export_job(source, destination_path, description))
            .retry(self.policy.builder())
            .when(RemoteError::is_transient)
            .notify(notify("submit_export_job", destination_path))
            .await
    }

    async fn list_jobs(&self) -> Result<Vec<JobStatusInfo>, RemoteError> {
        (|| self.inner.list_jobs()).retry(self.policy.builder()).when(RemoteError::is_transient).notify(notify("list_jobs", "jobs")).await
    }

    async fn cancel_job(&self, id: &JobId) -> Result<(), RemoteError> {
        (|| self.inner.cancel_job(id)).retry(self.policy.builder()).when(RemoteError::is_transient).notify(notify("cancel_job", id.as_str())).await
    }

    async fn fetch_object_as_table(&self, path: &str) -> Result<Vec<TableRow>, RemoteError> {
        (|| self.inner.fetch_object_as_table(path))
            .retry(self.policy.builder())
            .when(RemoteError::is_transient)
            .notify(notify("fetch_object_as_table", path))
            .await
    }

    async fn fetch_object_info(&self, path: &str) -> Result<FeatureCollection, RemoteError> {
        (|| self.inner.fetch_object_info(path))
            .retry(self.policy.builder())
            .when(RemoteError::is_transient)
            .notify(notify("fetch_object_info", path))
            .await
    }
}
