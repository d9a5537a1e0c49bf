use async_trait::async_trait;

use crate::domain::dataset::core::DatasetCore;
use crate::domain::dataset::state::{DatasetState, WaitOptions, WaitOutcome};
use crate::domain::job::job_status::JobStatusInfo;
use crate::domain::job::job_tracker::TaskSummary;
use crate::domain::remote::remote_store::RemoteEntry;
use crate::domain::utils::id::{DatasetUuid, JobId};
use crate::error::Result;

/// Lifecycle controls shared by zone sets and computation runs.
///
/// Implementors only expose their [`DatasetCore`]; every control delegates to it.
#[async_trait]
pub trait Dataset: std::fmt::Debug + Send + Sync {
    fn get_base(&self) -> &DatasetCore;

    fn get_base_mut(&mut self) -> &mut DatasetCore;

    /// Human readable name, used as prefix of every shard object.
    fn name(&self) -> &str;

    fn get_uuid(&self) -> &DatasetUuid {
        self.get_base().uuid()
    }

    fn get_root_path(&self) -> &str {
        self.get_base().root_path()
    }

    fn get_state(&self) -> DatasetState {
        self.get_base().state()
    }

    fn get_cardinality(&self) -> usize {
        self.get_base().cardinality()
    }

    fn present_shards(&self) -> &[RemoteEntry] {
        self.get_base().present_shards()
    }

    fn outstanding_jobs(&self) -> Vec<&JobStatusInfo> {
        self.get_base().outstanding_jobs()
    }

    fn task_summary(&self) -> TaskSummary {
        self.get_base().jobs().summary()
    }

    async fn refresh_state(&mut self) -> Result<DatasetState> {
        self.get_base_mut().refresh_state().await
    }

    async fn wait_until_settled(&mut self, options: &WaitOptions) -> Result<WaitOutcome> {
        self.get_base_mut().wait_until_settled(options).await
    }

    async fn cancel_outstanding(&mut self) -> Result<Vec<JobId>> {
        self.get_base_mut().cancel_outstanding().await
    }

    async fn delete(&mut self) -> Result<()> {
        self.get_base_mut().delete().await
    }
}
