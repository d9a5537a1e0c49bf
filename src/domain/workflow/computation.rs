use serde_json::json;

use crate::domain::dataset::table_export::ResultLevel;
use crate::domain::remote::remote_store::RemoteCollectionHandle;
use crate::domain::workflow::parameters::ComputationParameters;
use crate::error::Result;

/// A materialised zone of a zone set, as handed to the per-shard computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardRef {
    pub fid: i64,

    /// Remote path of the zone object.
    pub path: String,
}

/// Builds the remote computation graph of one shard.
///
/// The graph is evaluated by the remote platform when the export job runs, so
/// building it is cheap and local.
pub trait ShardComputation: std::fmt::Debug + Send + Sync {
    fn build(&self, shard: &ShardRef, parameters: &ComputationParameters) -> Result<RemoteCollectionHandle>;

    /// Granularity of the rows the graph produces.
    fn result_level(&self) -> ResultLevel {
        ResultLevel::Zone
    }
}

/// Default graph: classify every image of the time window with the three
/// expressions, then reduce water, active channel and vegetation metrics per zone and per image.
#[derive(Debug, Clone, Default)]
pub struct ExpressionComputation;

impl ShardComputation for ExpressionComputation {
    fn build(&self, shard: &ShardRef, parameters: &ComputationParameters) -> Result<RemoteCollectionHandle> {
        parameters.validate()?;
        let satellite = parameters.satellite_type;

        let graph = json!({
            "operation": "zoneMetrics",
            "zones": { "asset": shard.path, "fid": shard.fid },
            "imagery": {
                "collections": satellite.collections(),
                "start": parameters.start.to_string(),
                "end": parameters.end.to_string(),
                "cloudProperty": satellite.cloud_property(),
                "cloudFilter": parameters.cloud_filter,
                "cloudMasking": parameters.cloud_masking,
                "mosaicSameDay": parameters.mosaic_same_day,
            },
            "indicators": ["MNDWI", "NDVI", "NDWI", "BSI"],
            "classes": {
                "WATER": parameters.watermask_expression,
                "AC": parameters.activechannel_expression,
                "VEGETATION": parameters.vegetation_expression,
            },
            "metrics": [
                "CLOUD_SCORE", "COVERAGE",
                "WATER_AREA", "WATER_PERIMETER", "WATER_POLYGONS", "MEAN_WATER_MNDWI", "MEAN_MNDWI", "MEAN_BSI",
                "AC_AREA", "MEAN_AC_NDVI", "MEAN_AC_MNDWI",
                "VEGETATION_AREA", "VEGETATION_PERIMETER", "VEGETATION_POLYGONS", "MEAN_VEGETATION_NDVI", "MEAN_VEGETATION_MNDWI", "MEAN_NDVI",
            ],
            "scale": satellite.scale(),
        });

        Ok(RemoteCollectionHandle(graph))
    }
}
