use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;

use crate::domain::dataset::state::{DatasetState, WaitOptions, WaitOutcome};
use crate::domain::job::job_description::format_shard_id;
use crate::domain::job::job_status::JobStatusInfo;
use crate::domain::job::job_tracker::JobTracker;
use crate::domain::remote::remote_store::{EntryType, RemoteEntry, RemoteStore};
use crate::domain::utils::id::{DatasetUuid, JobId};
use crate::error::{Error, Result};

/// Name of the configuration object stored next to the shards.
pub const CONFIG_OBJECT: &str = "config";

/// State machine shared by every dataset kind.
///
/// Holds the identity of a sharded remote dataset and the last observed view of it:
/// which shards are materialised, which child containers exist, whether the
/// configuration object is written and which jobs are linked to it.
#[derive(Debug)]
pub struct DatasetCore {
    store: Arc<dyn RemoteStore>,
    uuid: DatasetUuid,
    root_path: String,

    /// Expected shard count, frozen when the dataset is created.
    cardinality: usize,

    present_shards: Vec<RemoteEntry>,
    child_containers: Vec<RemoteEntry>,
    config_present: bool,
    state: DatasetState,
    jobs: JobTracker,
}

impl DatasetCore {
    pub fn new(store: Arc<dyn RemoteStore>, uuid: DatasetUuid, root_path: String, cardinality: usize) -> Self {
        DatasetCore {
            store,
            jobs: JobTracker::new(uuid.clone()),
            uuid,
            root_path,
            cardinality,
            present_shards: Vec::new(),
            child_containers: Vec::new(),
            config_present: false,
            state: DatasetState::None,
        }
    }

    pub fn store(&self) -> Arc<dyn RemoteStore> {
        self.store.clone()
    }

    pub fn uuid(&self) -> &DatasetUuid {
        &self.uuid
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    pub fn state(&self) -> DatasetState {
        self.state
    }

    /// Shards sorted by shard id.
    pub fn present_shards(&self) -> &[RemoteEntry] {
        &self.present_shards
    }

    pub fn present_fids(&self) -> BTreeSet<i64> {
        self.present_shards.iter().filter_map(shard_fid).collect()
    }

    pub fn child_containers(&self) -> &[RemoteEntry] {
        &self.child_containers
    }

    pub fn config_present(&self) -> bool {
        self.config_present
    }

    pub fn jobs(&self) -> &JobTracker {
        &self.jobs
    }

    pub fn outstanding_jobs(&self) -> Vec<&JobStatusInfo> {
        self.jobs.outstanding_jobs()
    }

    pub fn config_path(&self) -> String {
        format!("{}/{}", self.root_path, CONFIG_OBJECT)
    }

    /// Destination of a shard. Deterministic, so resubmitting a shard overwrites it.
    pub fn shard_path(&self, dataset_name: &str, fid: i64) -> String {
        format!("{}/{}_{}", self.root_path, dataset_name, format_shard_id(fid))
    }

    fn clear_caches(&mut self) {
        self.present_shards.clear();
        self.child_containers.clear();
        self.config_present = false;
        self.jobs.clear();
    }

    fn partition(&mut self, children: Vec<RemoteEntry>) {
        self.clear_caches();

        for child in children {
            match child.typ {
                EntryType::Container => self.child_containers.push(child),
                EntryType::Object if child.basename() == CONFIG_OBJECT => self.config_present = true,
                EntryType::Object => self.present_shards.push(child),
            }
        }

        self.present_shards.sort_by(|a, b| (shard_fid(a), &a.name).cmp(&(shard_fid(b), &b.name)));
    }

    /// Lists the dataset's container and the remote jobs, then recomputes the state.
    ///
    /// An absent container is created on the spot and yields `DatasetState::None`.
    pub async fn refresh_state(&mut self) -> Result<DatasetState> {
        match self.store.list_children(&self.root_path).await {
            Ok(children) => self.partition(children),
            Err(e) if e.is_not_found() => {
                log::info!("Container {} does not exist yet, creating it.", self.root_path);
                self.store.create_container(&self.root_path).await?;
                self.clear_caches();
            }
            Err(e) => return Err(e.into()),
        }

        if self.present_shards.len() > self.cardinality && self.cardinality > 0 {
            log::warn!(
                "Dataset {} holds {} shards but expects {}. Unexpected objects under {}.",
                self.uuid,
                self.present_shards.len(),
                self.cardinality,
                self.root_path
            );
        }
        self.state = DatasetState::from_counts(self.present_shards.len(), self.cardinality);

        let jobs = self.store.list_jobs().await?;
        self.jobs.update(jobs);

        log::debug!("Dataset {} is {} with {} outstanding jobs.", self.uuid, self.state, self.jobs.outstanding_jobs().len());
        Ok(self.state)
    }

    /// Polls until no linked job is pending or running.
    pub async fn wait_until_settled(&mut self, options: &WaitOptions) -> Result<WaitOutcome> {
        let started = Instant::now();
        self.refresh_state().await?;

        loop {
            let active = self.jobs.active_jobs().len();
            if active == 0 {
                return Ok(WaitOutcome::Settled);
            }

            let mut pause = options.poll_interval;
            if let Some(max_wait) = options.max_wait {
                let elapsed = started.elapsed();
                if elapsed >= max_wait {
                    log::warn!("Gave up waiting for {} tasks of dataset {} after {:?}.", active, self.uuid, elapsed);
                    return Ok(WaitOutcome::TimedOut);
                }
                pause = pause.min(max_wait - elapsed);
            }

            log::info!("Waiting for {} tasks of dataset {} to finish.", active, self.uuid);

            match &options.cancel {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => {
                            log::info!("Stopped waiting for dataset {}, cancellation requested.", self.uuid);
                            return Ok(WaitOutcome::Cancelled);
                        }
                        _ = sleep(pause) => {}
                    }
                }
                None => sleep(pause).await,
            }

            self.refresh_state().await?;
        }
    }

    /// Requests cancellation of every pending or running linked job. Does not wait for confirmation.
    pub async fn cancel_outstanding(&mut self) -> Result<Vec<JobId>> {
        self.refresh_state().await?;

        let to_cancel: Vec<JobId> = self.jobs.active_jobs().into_iter().map(|job| job.id.clone()).collect();
        for (i, id) in to_cancel.iter().enumerate() {
            self.store.cancel_job(id).await?;
            log::info!("Task {}/{} of dataset {} cancelled ({}).", i + 1, to_cancel.len(), self.uuid, id);
        }

        Ok(to_cancel)
    }

    /// Deletes the dataset container and everything below it, children first.
    pub async fn delete(&mut self) -> Result<()> {
        log::info!("Deleting dataset {} at {}.", self.uuid, self.root_path);

        delete_recursive(self.store.as_ref(), &self.root_path).await?;

        self.clear_caches();
        self.state = DatasetState::None;
        Ok(())
    }
}

/// Depth-first cascade: the store refuses to delete a non-empty container.
///
/// A path that vanished in the meantime counts as deleted. Any other listing
/// failure stops this branch before anything below it is touched.
fn delete_recursive<'a>(store: &'a dyn RemoteStore, path: &'a str) -> BoxFuture<'a, Result<()>> {
    async move {
        let children = match store.list_children(path).await {
            Ok(children) => children,
            Err(e) if e.is_not_found() => {
                log::debug!("{} already removed.", path);
                return Ok(());
            }
            Err(e) => return Err(Error::from(e)),
        };

        for child in &children {
            if child.is_container() {
                delete_recursive(store, &child.name).await?;
            } else {
                store.delete_object(&child.name).await?;
            }
        }

        store.delete_object(path).await?;
        log::debug!("Deleted {} ({} children).", path, children.len());
        Ok(())
    }
    .boxed()
}

/// Shard id encoded in the trailing `_<fid>` of an object name.
pub fn shard_fid(entry: &RemoteEntry) -> Option<i64> {
    entry.basename().rsplit_once('_').and_then(|(_, fid)| fid.parse().ok())
}
