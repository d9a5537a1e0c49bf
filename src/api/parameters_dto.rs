use serde::{Deserialize, Serialize};

/// Computation parameters file. Everything but the satellite type falls back to its default.
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputationParametersDto {
    pub satellite_type: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub cloud_filter: Option<f64>,
    pub cloud_masking: Option<bool>,
    pub mosaic_same_day: Option<bool>,
    pub watermask_expression: Option<String>,
    pub activechannel_expression: Option<String>,
    pub vegetation_expression: Option<String>,
}
