use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::domain::dataset::table_export::ResultLevel;
use crate::domain::geometry::feature::{Feature, FeatureCollection, Geometry};
use crate::domain::workflow::parameters::ComputationParameters;
use crate::error::Result;

/// Descriptive metadata of a zone set, copied into every run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneMetadata {
    pub name: String,
    pub fid_field: String,

    /// Frozen shard count of the source at creation time.
    #[serde(rename = "len")]
    pub cardinality: usize,

    #[serde(rename = "type")]
    pub zone_type: String,

    /// Older configuration objects spell these `descritpion` and `zones_author`.
    #[serde(default, alias = "descritpion")]
    pub description: String,

    #[serde(default, alias = "zones_author")]
    pub author: String,
}

/// Content of the `config` object written next to the shards of a dataset.
///
/// Stored as a one-feature collection: the properties carry the metadata (and the
/// run parameters for computation runs), the geometry carries the aggregate extent.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetConfiguration {
    pub metadata: ZoneMetadata,
    pub parameters: Option<ComputationParameters>,
    pub run_name: Option<String>,

    /// Granularity of the rows a run exports. Absent on zone sets.
    pub result_level: Option<ResultLevel>,
    pub extent: Option<Geometry>,
}

const RUN_NAME_PROPERTY: &str = "run_name";
const PARAMETERS_MARKER: &str = "satellite_type";
const RESULT_LEVEL_PROPERTY: &str = "result_level";

fn column_type(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "Boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "Integer",
        Value::Number(_) => "Float",
        _ => "String",
    }
}

fn as_properties<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(properties) => Ok(properties),
        other => Err(serde_json::Error::custom(format!("expected an object, got {}", other)).into()),
    }
}

impl DatasetConfiguration {
    pub fn for_zones(metadata: ZoneMetadata, extent: Option<Geometry>) -> Self {
        DatasetConfiguration { metadata, parameters: None, run_name: None, result_level: None, extent }
    }

    /// Parent metadata merged with the parameters of a run.
    pub fn for_run(parent: &DatasetConfiguration, run_name: &str, parameters: ComputationParameters, result_level: ResultLevel) -> Self {
        DatasetConfiguration {
            metadata: parent.metadata.clone(),
            parameters: Some(parameters),
            run_name: Some(run_name.to_string()),
            result_level: Some(result_level),
            extent: parent.extent.clone(),
        }
    }

    pub fn to_feature_collection(&self) -> Result<FeatureCollection> {
        let mut properties = as_properties(&self.metadata)?;

        if let Some(parameters) = &self.parameters {
            properties.extend(as_properties(parameters)?);
        }
        if let Some(run_name) = &self.run_name {
            properties.insert(RUN_NAME_PROPERTY.to_string(), Value::String(run_name.clone()));
        }
        if let Some(result_level) = &self.result_level {
            properties.insert(RESULT_LEVEL_PROPERTY.to_string(), serde_json::to_value(result_level)?);
        }

        let columns: BTreeMap<String, String> = properties.iter().map(|(name, value)| (name.clone(), column_type(value).to_string())).collect();

        let mut collection = FeatureCollection::new(vec![Feature::new(properties, self.extent.clone())]);
        collection.columns = Some(columns);
        Ok(collection)
    }

    pub fn from_feature_collection(collection: FeatureCollection) -> Result<Self> {
        let feature = collection.features.into_iter().next().ok_or_else(|| serde_json::Error::custom("configuration object holds no feature"))?;

        let properties = Value::Object(feature.properties);
        let metadata: ZoneMetadata = serde_json::from_value(properties.clone())?;

        let parameters = match properties.get(PARAMETERS_MARKER) {
            Some(_) => Some(serde_json::from_value::<ComputationParameters>(properties.clone())?),
            None => None,
        };
        let run_name = properties.get(RUN_NAME_PROPERTY).and_then(Value::as_str).map(str::to_string);
        let result_level = match properties.get(RESULT_LEVEL_PROPERTY) {
            Some(level) => Some(serde_json::from_value::<ResultLevel>(level.clone())?),
            None => None,
        };

        Ok(DatasetConfiguration { metadata, parameters, run_name, result_level, extent: feature.geometry })
    }
}
