use thiserror::Error;

/// Failures reported by a remote store.
///
/// Every variant is surfaced to the caller unchanged; only
/// [`RemoteError::is_transient`] failures are eligible for retry.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote path not found: {0}")]
    NotFound(String),

    #[error("Not authorized to access the remote store: {0}")]
    Unauthorized(String),

    #[error("Connection to the remote store failed: {0}")]
    Connectivity(String),

    #[error("Remote quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Remote container is not empty and cannot be deleted: {0}")]
    ContainerNotEmpty(String),

    #[error("Remote store rejected the request: {0}")]
    Rejected(String),

    #[error("HTTP request to the remote store failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }

    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Connectivity(_) | RemoteError::QuotaExceeded(_) => true,
            RemoteError::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}
