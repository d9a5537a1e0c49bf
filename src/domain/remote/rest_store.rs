use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::geometry::feature::FeatureCollection;
use crate::domain::job::job_status::JobStatusInfo;
use crate::domain::remote::remote_error::RemoteError;
use crate::domain::remote::remote_store::{ExportSource, RemoteEntry, RemoteStore, TableRow};
use crate::domain::utils::id::JobId;

/// Routes of the REST gateway in front of the compute platform.
#[derive(Debug, Clone)]
pub enum RestEndpoint {
    Children,
    Containers,
    Objects,
    Exports,
    Jobs,
    CancelJob(JobId),
    ObjectTable,
    ObjectInfo,
}

impl fmt::Display for RestEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestEndpoint::Children => write!(f, "/v1/children"),
            RestEndpoint::Containers => write!(f, "/v1/containers"),
            RestEndpoint::Objects => write!(f, "/v1/objects"),
            RestEndpoint::Exports => write!(f, "/v1/exports"),
            RestEndpoint::Jobs => write!(f, "/v1/jobs"),
            RestEndpoint::CancelJob(id) => write!(f, "/v1/jobs/{}/cancel", id),
            RestEndpoint::ObjectTable => write!(f, "/v1/objects/table"),
            RestEndpoint::ObjectInfo => write!(f, "/v1/objects/info"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChildrenResponse {
    children: Vec<RemoteEntry>,
}

#[derive(Debug, Deserialize)]
struct JobsResponse {
    jobs: Vec<JobStatusInfo>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: JobId,
}

#[derive(Debug, Deserialize)]
struct TableResponse {
    rows: Vec<TableRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportRequest<'a> {
    source: &'a ExportSource,
    destination_path: &'a str,
    description: &'a str,
}

/// [`RemoteStore`] backed by the platform's REST gateway.
#[derive(Debug, Clone)]
pub struct RestRemoteStore {
    base_url: String,
    client: reqwest::Client,
}

impl RestRemoteStore {
    pub fn new(base_url: impl Into<String>, token: &str) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| RemoteError::Unauthorized(format!("invalid token: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(RestRemoteStore { base_url: base_url.into().trim_end_matches('/').to_string(), client })
    }

    fn url(&self, endpoint: &RestEndpoint) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Maps non-success statuses onto the remote error taxonomy.
    async fn check(response: Response, subject: &str) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        log::debug!("Remote store answered {} for {}: {}", status, subject, body);

        Err(match status {
            StatusCode::NOT_FOUND => RemoteError::NotFound(subject.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(format!("{} ({})", subject, status)),
            StatusCode::TOO_MANY_REQUESTS => RemoteError::QuotaExceeded(format!("{}: {}", subject, body)),
            StatusCode::CONFLICT => RemoteError::ContainerNotEmpty(subject.to_string()),
            s if s.is_server_error() => RemoteError::Connectivity(format!("{} ({}): {}", subject, status, body)),
            _ => RemoteError::Rejected(format!("{} ({}): {}", subject, status, body)),
        })
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn list_children(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let response = self.client.get(self.url(&RestEndpoint::Children)).query(&[("parent", path)]).send().await?;
        let listing: ChildrenResponse = Self::check(response, path).await?.json().await?;
        Ok(listing.children)
    }

    async fn create_container(&self, path: &str) -> Result<(), RemoteError> {
        let response = self.client.post(self.url(&RestEndpoint::Containers)).json(&serde_json::json!({ "path": path })).send().await?;
        Self::check(response, path).await?;
        Ok(())
    }

    async fn delete_object(&self, path: &str) -> Result<(), RemoteError> {
        let response = self.client.delete(self.url(&RestEndpoint::Objects)).query(&[("path", path)]).send().await?;
        match Self::check(response, path).await {
            Ok(_) | Err(RemoteError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn submit_export_job(&self, source: &ExportSource, destination_path: &str, description: &str) -> Result<JobId, RemoteError> {
        let request = ExportRequest { source, destination_path, description };
        let response = self.client.post(self.url(&RestEndpoint::Exports)).json(&request).send().await?;
        let submitted: SubmitResponse = Self::check(response, destination_path).await?.json().await?;
        Ok(submitted.id)
    }

    async fn list_jobs(&self) -> Result<Vec<JobStatusInfo>, RemoteError> {
        let response = self.client.get(self.url(&RestEndpoint::Jobs)).send().await?;
        let jobs: JobsResponse = Self::check(response, "jobs").await?.json().await?;
        Ok(jobs.jobs)
    }

    async fn cancel_job(&self, id: &JobId) -> Result<(), RemoteError> {
        let response = self.client.post(self.url(&RestEndpoint::CancelJob(id.clone()))).send().await?;
        Self::check(response, id.as_str()).await?;
        Ok(())
    }

    async fn fetch_object_as_table(&self, path: &str) -> Result<Vec<TableRow>, RemoteError> {
        let response = self.client.get(self.url(&RestEndpoint::ObjectTable)).query(&[("path", path)]).send().await?;
        let table: TableResponse = Self::check(response, path).await?.json().await?;
        Ok(table.rows)
    }

    async fn fetch_object_info(&self, path: &str) -> Result<FeatureCollection, RemoteError> {
        let response = self.client.get(self.url(&RestEndpoint::ObjectInfo)).query(&[("path", path)]).send().await?;
        Ok(Self::check(response, path).await?.json().await?)
    }
}
