use std::sync::Arc;
use std::time::Duration;

use crate::api::config_dto::{RemoteDto, SessionConfigDto};
use crate::domain::dataset::state::WaitOptions;
use crate::domain::remote::remote_store::RemoteStore;
use crate::domain::remote::rest_store::RestRemoteStore;
use crate::domain::remote::retrying_store::{RetryPolicy, RetryingRemoteStore};
use crate::domain::remote::simulated_store::SimulatedRemoteStore;
use crate::domain::utils::id::DatasetUuid;
use crate::error::Result;

/// Request-scoped context handed to every dataset constructor.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub store: Arc<dyn RemoteStore>,
    pub project_namespace: String,
    pub wait: WaitOptions,
}

impl SessionContext {
    pub fn new(store: Arc<dyn RemoteStore>, project_namespace: impl Into<String>) -> Self {
        SessionContext { store, project_namespace: project_namespace.into(), wait: WaitOptions::default() }
    }

    pub fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Builds the remote store described by the configuration, wrapped with retries.
    pub fn from_config(dto: &SessionConfigDto) -> Result<Self> {
        let inner: Arc<dyn RemoteStore> = match &dto.remote {
            RemoteDto::Rest(rest) => {
                log::info!("Using remote store at {}.", rest.base_url);
                Arc::new(RestRemoteStore::new(rest.base_url.clone(), &rest.token)?)
            }
            RemoteDto::Simulated(simulated) => {
                log::info!("Using in-memory simulated remote store (auto advance: {}).", simulated.auto_advance);
                Arc::new(SimulatedRemoteStore::with_auto_advance(simulated.auto_advance))
            }
        };

        let policy = RetryPolicy {
            max_times: dto.retry.max_times,
            min_delay: Duration::from_millis(dto.retry.min_delay_ms),
            max_delay: Duration::from_millis(dto.retry.max_delay_ms),
        };
        let store = Arc::new(RetryingRemoteStore::new(inner, policy));

        let mut wait = WaitOptions::with_poll_interval(Duration::from_secs(dto.poll_interval_s));
        if let Some(max_wait_s) = dto.max_wait_s {
            wait = wait.max_wait(Duration::from_secs(max_wait_s));
        }

        Ok(SessionContext { store, project_namespace: dto.project_namespace.clone(), wait })
    }

    /// Container holding every zone set of the project.
    pub fn zone_sets_root(&self) -> String {
        format!("projects/{}/assets/zone_sets", self.project_namespace)
    }

    pub fn zone_set_path(&self, uuid: &DatasetUuid) -> String {
        format!("{}/{}", self.zone_sets_root(), uuid)
    }
}
