use async_trait::async_trait;
use serde_json::{Map, Value};
use slotmap::{SlotMap, new_key_type};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::geometry::feature::{Feature, FeatureCollection};
use crate::domain::job::job_status::{JobStatus, JobStatusInfo};
use crate::domain::remote::remote_error::RemoteError;
use crate::domain::remote::remote_store::{EntryType, ExportSource, RemoteEntry, RemoteStore, TableRow};
use crate::domain::utils::id::JobId;

new_key_type! {
    struct JobKey;
}

#[derive(Debug, Clone)]
enum SimEntry {
    Container,
    Object(FeatureCollection),
}

#[derive(Debug, Clone)]
struct SimJob {
    id: JobId,
    description: String,
    destination: String,
    payload: FeatureCollection,
    status: JobStatus,
}

#[derive(Debug, Default)]
struct StoreState {
    /// Full path to entry. Ancestors of a path always exist.
    entries: BTreeMap<String, SimEntry>,

    /// Job storage, in submission order.
    jobs: SlotMap<JobKey, SimJob>,

    /// Index lookup from the remote job id.
    job_index: HashMap<JobId, JobKey>,

    /// Description substrings of jobs that fail instead of completing.
    failing_patterns: Vec<String>,

    /// Remaining calls that fail with a connectivity error.
    injected_failures: usize,

    auto_advance: bool,
}

/// In-memory stand-in for the remote platform.
///
/// Jobs start `Pending` and only progress when [`SimulatedRemoteStore::advance`] is called,
/// or on every `list_jobs` when auto-advance is enabled. A job materialises its destination
/// when it completes and fails if the destination's container no longer exists.
#[derive(Debug, Clone, Default)]
pub struct SimulatedRemoteStore {
    state: Arc<Mutex<StoreState>>,
}

impl SimulatedRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_advance(auto_advance: bool) -> Self {
        let store = Self::new();
        store.set_auto_advance(auto_advance);
        store
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().expect("SimulatedRemoteStore mutex poisoned")
    }

    pub fn set_auto_advance(&self, auto_advance: bool) {
        self.lock().auto_advance = auto_advance;
    }

    /// Jobs whose description contains `pattern` fail when they would otherwise complete.
    pub fn fail_jobs_matching(&self, pattern: impl Into<String>) {
        self.lock().failing_patterns.push(pattern.into());
    }

    /// The next `count` store calls fail with [`RemoteError::Connectivity`].
    pub fn inject_connectivity_failures(&self, count: usize) {
        self.lock().injected_failures = count;
    }

    /// Moves every active job one step forward. Returns how many jobs changed status.
    pub fn advance(&self) -> usize {
        let mut state = self.lock();
        state.advance()
    }

    /// Advances until no job is pending or running.
    pub fn settle_all(&self) {
        let mut state = self.lock();
        while state.jobs.values().any(|job| job.status.is_active()) {
            state.advance();
        }
    }

    /// Removes an object behind the datasets' back, as another actor would.
    pub fn remove_object(&self, path: &str) -> bool {
        self.lock().entries.remove(path).is_some()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.lock().entries.contains_key(path)
    }

    /// Every path strictly below `prefix`.
    pub fn paths_under(&self, prefix: &str) -> Vec<String> {
        let nested = format!("{}/", prefix);
        self.lock().entries.keys().filter(|path| path.starts_with(&nested)).cloned().collect()
    }

    pub fn job_count(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn job_status(&self, id: &JobId) -> Option<JobStatus> {
        let state = self.lock();
        state.job_index.get(id).and_then(|key| state.jobs.get(*key)).map(|job| job.status)
    }
}

impl StoreState {
    fn check_injected_failure(&mut self) -> Result<(), RemoteError> {
        if self.injected_failures > 0 {
            self.injected_failures -= 1;
            return Err(RemoteError::Connectivity("simulated connection reset".to_string()));
        }
        Ok(())
    }

    fn is_container(&self, path: &str) -> bool {
        matches!(self.entries.get(path), Some(SimEntry::Container))
    }

    fn advance(&mut self) -> usize {
        let mut changed = 0;
        let keys: Vec<JobKey> = self.jobs.keys().collect();

        for key in keys {
            let Some(job) = self.jobs.get(key).cloned() else { continue };

            let next = match job.status {
                JobStatus::Pending => JobStatus::Running,
                JobStatus::Running => {
                    let parent_exists = parent_path(&job.destination).map(|parent| self.is_container(parent)).unwrap_or(false);

                    if self.failing_patterns.iter().any(|pattern| job.description.contains(pattern.as_str())) {
                        JobStatus::Failed
                    } else if !parent_exists || self.is_container(&job.destination) {
                        log::debug!("Simulated job {} failed, destination {} cannot be written.", job.id, job.destination);
                        JobStatus::Failed
                    } else {
                        self.entries.insert(job.destination.clone(), SimEntry::Object(job.payload.clone()));
                        JobStatus::Completed
                    }
                }
                _ => continue,
            };

            if let Some(job) = self.jobs.get_mut(key) {
                job.status = next;
                changed += 1;
            }
        }
        changed
    }
}

fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

fn materialize(source: &ExportSource) -> FeatureCollection {
    match source {
        ExportSource::Features(features) => features.clone(),
        ExportSource::Collection(handle) => match serde_json::from_value::<FeatureCollection>(handle.0.clone()) {
            Ok(features) => features,
            Err(_) => {
                let mut properties = Map::new();
                properties.insert("graph".to_string(), Value::String(handle.0.to_string()));
                FeatureCollection::new(vec![Feature::new(properties, None)])
            }
        },
    }
}

#[async_trait]
impl RemoteStore for SimulatedRemoteStore {
    async fn list_children(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let mut state = self.lock();
        state.check_injected_failure()?;

        match state.entries.get(path) {
            None => return Err(RemoteError::NotFound(path.to_string())),
            Some(SimEntry::Object(_)) => return Err(RemoteError::Rejected(format!("{} is not a container", path))),
            Some(SimEntry::Container) => {}
        }

        let children = state
            .entries
            .iter()
            .filter(|(child, _)| parent_path(child) == Some(path))
            .map(|(child, entry)| RemoteEntry {
                name: child.clone(),
                typ: match entry {
                    SimEntry::Container => EntryType::Container,
                    SimEntry::Object(_) => EntryType::Object,
                },
            })
            .collect();

        Ok(children)
    }

    async fn create_container(&self, path: &str) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.check_injected_failure()?;

        if let Some(SimEntry::Object(_)) = state.entries.get(path) {
            return Err(RemoteError::Rejected(format!("an object already exists at {}", path)));
        }

        let mut current = String::new();
        for segment in path.split('/') {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);
            state.entries.entry(current.clone()).or_insert(SimEntry::Container);
        }
        Ok(())
    }

    async fn delete_object(&self, path: &str) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.check_injected_failure()?;

        if state.is_container(path) && state.entries.keys().any(|child| parent_path(child) == Some(path)) {
            return Err(RemoteError::ContainerNotEmpty(path.to_string()));
        }

        state.entries.remove(path);
        Ok(())
    }

    async fn submit_export_job(&self, source: &ExportSource, destination_path: &str, description: &str) -> Result<JobId, RemoteError> {
        let mut state = self.lock();
        state.check_injected_failure()?;

        let id = JobId::new(format!("SIM-{:06}", state.jobs.len() + 1));
        let job = SimJob {
            id: id.clone(),
            description: description.to_string(),
            destination: destination_path.to_string(),
            payload: materialize(source),
            status: JobStatus::Pending,
        };

        let key = state.jobs.insert(job);
        state.job_index.insert(id.clone(), key);

        Ok(id)
    }

    async fn list_jobs(&self) -> Result<Vec<JobStatusInfo>, RemoteError> {
        let mut state = self.lock();
        state.check_injected_failure()?;

        if state.auto_advance {
            state.advance();
        }

        Ok(state.jobs.values().map(|job| JobStatusInfo { id: job.id.clone(), description: job.description.clone(), status: job.status }).collect())
    }

    async fn cancel_job(&self, id: &JobId) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.check_injected_failure()?;

        let key = *state.job_index.get(id).ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        if let Some(job) = state.jobs.get_mut(key) {
            if job.status.is_active() {
                job.status = JobStatus::Cancelled;
            }
        }
        Ok(())
    }

    async fn fetch_object_as_table(&self, path: &str) -> Result<Vec<TableRow>, RemoteError> {
        let mut state = self.lock();
        state.check_injected_failure()?;

        let features = match state.entries.get(path) {
            Some(SimEntry::Object(features)) => features,
            Some(SimEntry::Container) => return Err(RemoteError::Rejected(format!("{} is a container", path))),
            None => return Err(RemoteError::NotFound(path.to_string())),
        };

        let rows = features
            .features
            .iter()
            .enumerate()
            .map(|(index, feature)| {
                let mut row = feature.properties.clone();
                row.insert("system:index".to_string(), Value::String(format!("{:020}", index)));
                let geo = feature.geometry.as_ref().and_then(|g| serde_json::to_string(g).ok()).unwrap_or_default();
                row.insert(".geo".to_string(), Value::String(geo));
                row
            })
            .collect();

        Ok(rows)
    }

    async fn fetch_object_info(&self, path: &str) -> Result<FeatureCollection, RemoteError> {
        let mut state = self.lock();
        state.check_injected_failure()?;

        match state.entries.get(path) {
            Some(SimEntry::Object(features)) => Ok(features.clone()),
            Some(SimEntry::Container) => Err(RemoteError::Rejected(format!("{} is a container", path))),
            None => Err(RemoteError::NotFound(path.to_string())),
        }
    }
}
