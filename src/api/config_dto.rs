use serde::{Deserialize, Serialize};

fn default_poll_interval_s() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfigDto {
    pub project_namespace: String,
    #[serde(default = "default_poll_interval_s")]
    pub poll_interval_s: u64,
    #[serde(default)]
    pub max_wait_s: Option<u64>,
    #[serde(default)]
    pub retry: RetryDto,
    pub remote: RemoteDto,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryDto {
    pub max_times: usize,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryDto {
    fn default() -> Self {
        RetryDto { max_times: 3, min_delay_ms: 1_000, max_delay_ms: 60_000 }
    }
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestRemoteDto {
    pub base_url: String,
    pub token: String,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedRemoteDto {
    pub simulated: bool,
    #[serde(default)]
    pub auto_advance: bool,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(untagged)]
pub enum RemoteDto {
    Rest(RestRemoteDto),
    Simulated(SimulatedRemoteDto),
}
