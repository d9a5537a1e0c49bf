use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::dataset::computation_run::ComputationRun;
use crate::domain::dataset::dataset::Dataset;
use crate::domain::job::job_tracker::{RunState, TaskSummary};
use crate::domain::workflow::parameters::{ComputationParameters, SatelliteType};

/// Row of the run history table kept by the metadata store.
#[derive(Debug, Deserialize, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunRecordDto {
    pub run_id: String,
    pub zone_set_id: String,
    pub zone_set_path: String,
    pub run_name: String,
    pub run_by: String,
    pub run_date: DateTime<Utc>,
    pub state: RunState,
    pub satellite_type: SatelliteType,
    pub start: String,
    pub end: String,
    pub cloud_filter: f64,
    pub cloud_masking: bool,
    pub mosaic_same_day: bool,
}

impl RunRecordDto {
    /// The record inserted right after a run is submitted.
    pub fn submitted(run: &ComputationRun, parameters: &ComputationParameters, run_by: &str) -> Self {
        RunRecordDto {
            run_id: run.get_uuid().to_string(),
            zone_set_id: run.parent().uuid.to_string(),
            zone_set_path: run.parent().root_path.clone(),
            run_name: run.name().to_string(),
            run_by: run_by.to_string(),
            run_date: Utc::now(),
            state: RunState::Submitted,
            satellite_type: parameters.satellite_type,
            start: parameters.start.to_string(),
            end: parameters.end.to_string(),
            cloud_filter: parameters.cloud_filter,
            cloud_masking: parameters.cloud_masking,
            mosaic_same_day: parameters.mosaic_same_day,
        }
    }

    /// Applies one reconciliation pass. Returns whether the state changed.
    pub fn reconcile(&mut self, summary: &TaskSummary) -> bool {
        let state = summary.run_state();
        if state == self.state {
            return false;
        }

        log::info!("Run {} moves from {} to {} ({}).", self.run_id, self.state, state, summary);
        self.state = state;
        true
    }
}
