use std::sync::Arc;

use crate::domain::dataset::computation_run::ComputationRun;
use crate::domain::dataset::dataset::Dataset;
use crate::domain::dataset::zone_set::ZoneSet;
use crate::domain::job::job_tracker::TaskSummary;
use crate::domain::utils::id::JobId;
use crate::domain::workflow::computation::{ShardComputation, ShardRef};
use crate::domain::workflow::parameters::ComputationParameters;
use crate::error::{Error, Result};

/// Binds a per-shard computation to the runs it feeds.
#[derive(Debug, Clone)]
pub struct Workflow {
    computation: Arc<dyn ShardComputation>,
}

impl Workflow {
    pub fn new(computation: Arc<dyn ShardComputation>) -> Self {
        Workflow { computation }
    }

    pub fn computation(&self) -> &Arc<dyn ShardComputation> {
        &self.computation
    }

    /// Starts a computation run over every zone of `zone_set`, in fid order.
    ///
    /// Returns as soon as one export job per zone is submitted.
    pub async fn run(&self, zone_set: &mut ZoneSet, parameters: &ComputationParameters) -> Result<ComputationRun> {
        parameters.validate()?;

        // Phase 0: the zone set must be complete as observed now, not when it was last refreshed
        let state = zone_set.refresh_state().await?;
        if !state.is_complete() {
            return Err(Error::IncompleteZoneSet { uuid: zone_set.get_uuid().to_string(), state: state.to_string() });
        }

        // Phase 1: create the run container
        let mut run = ComputationRun::create(zone_set, self.computation.result_level()).await?;

        // Phase 2: one graph and one export job per zone
        let shards = zone_set.shard_refs();
        for (i, shard) in shards.iter().enumerate() {
            if let Err(e) = self.queue_shard(&mut run, shard, parameters).await {
                log::error!("Run {} stopped after queueing {}/{} zones, resume it by uuid: {}", run.get_uuid(), i, shards.len(), e);
                return Err(e);
            }

            log::info!("Zone {}/{} metrics queued for run {}.", i + 1, shards.len(), run.get_uuid());
        }

        Ok(run)
    }

    async fn queue_shard(&self, run: &mut ComputationRun, shard: &ShardRef, parameters: &ComputationParameters) -> Result<()> {
        let graph = self.computation.build(shard, parameters)?;
        run.compute_shard_result(shard.fid, graph, parameters).await
    }

    pub async fn cancel(&self, run: &mut ComputationRun) -> Result<Vec<JobId>> {
        let cancelled = run.cancel_outstanding().await?;
        log::info!("Cancelled {} tasks of run {}.", cancelled.len(), run.get_uuid());
        Ok(cancelled)
    }

    /// Job counts of the run, refreshed from the remote platform.
    pub async fn task_summary(&self, run: &mut ComputationRun) -> Result<TaskSummary> {
        run.refresh_state().await?;

        let summary = run.task_summary();
        log::info!("Run {}: {}.", run.get_uuid(), summary);
        Ok(summary)
    }
}
