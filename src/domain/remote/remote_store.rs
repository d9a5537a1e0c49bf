use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::geometry::feature::FeatureCollection;
use crate::domain::job::job_status::JobStatusInfo;
use crate::domain::remote::remote_error::RemoteError;
use crate::domain::utils::id::JobId;

/// One row of an exported table, column name to value.
pub type TableRow = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryType {
    Object,
    Container,
}

/// A direct child returned by [`RemoteStore::list_children`]. `name` is the full path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: EntryType,
}

impl RemoteEntry {
    pub fn basename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn is_container(&self) -> bool {
        self.typ == EntryType::Container
    }
}

/// Opaque remote computation graph produced by the per-shard computation.
///
/// The core never looks inside; it is handed verbatim to [`RemoteStore::submit_export_job`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteCollectionHandle(pub Value);

/// What an export job writes to its destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ExportSource {
    /// Locally built features, used for zones and configuration objects.
    Features(FeatureCollection),
    /// A remotely evaluated collection.
    Collection(RemoteCollectionHandle),
}

/// Path-addressed hierarchical object store whose every write is an asynchronous job.
#[async_trait]
pub trait RemoteStore: std::fmt::Debug + Send + Sync {
    /// Direct children of a container. Fails with [`RemoteError::NotFound`] when `path` is absent.
    async fn list_children(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError>;

    async fn create_container(&self, path: &str) -> Result<(), RemoteError>;

    /// Deleting an absent path is not an error. Non-empty containers cannot be deleted.
    async fn delete_object(&self, path: &str) -> Result<(), RemoteError>;

    async fn submit_export_job(&self, source: &ExportSource, destination_path: &str, description: &str) -> Result<JobId, RemoteError>;

    async fn list_jobs(&self) -> Result<Vec<JobStatusInfo>, RemoteError>;

    async fn cancel_job(&self, id: &JobId) -> Result<(), RemoteError>;

    async fn fetch_object_as_table(&self, path: &str) -> Result<Vec<TableRow>, RemoteError>;

    async fn fetch_object_info(&self, path: &str) -> Result<FeatureCollection, RemoteError>;
}
