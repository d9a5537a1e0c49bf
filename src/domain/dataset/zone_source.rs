use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::geometry::feature::{Crs, Feature, FeatureCollection};
use crate::domain::geometry::ops;
use crate::error::{Error, Result};
use crate::loader::parser::parse_json_file;

/// Local input of a zone set: a GeoJSON feature collection, one feature per zone.
#[derive(Debug, Clone)]
pub struct ZoneSource {
    pub path: Option<PathBuf>,

    /// Default dataset name, the file stem for file sources.
    pub name: String,

    pub features: FeatureCollection,
    pub crs: Crs,
}

impl ZoneSource {
    pub fn from_geojson_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let features: FeatureCollection = parse_json_file(path)?;
        let name = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_else(|| "zones".to_string());

        let mut source = Self::from_features(name, features)?;
        source.path = Some(path.to_path_buf());
        Ok(source)
    }

    pub fn from_features(name: impl Into<String>, features: FeatureCollection) -> Result<Self> {
        let crs = features.source_crs()?;
        Ok(ZoneSource { path: None, name: name.into(), features, crs })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => self.name.clone(),
        }
    }

    /// Checks that `fid_field` is a unique integer key of every zone and returns the fids in source order.
    pub fn validate_fid_field(&self, fid_field: &str) -> Result<Vec<i64>> {
        if self.is_empty() {
            return Err(Error::EmptySource(self.describe()));
        }

        if !self.features.features.iter().any(|feature| feature.property(fid_field).is_some()) {
            return Err(Error::MissingFidField(fid_field.to_string()));
        }

        let mut seen = BTreeMap::new();
        let mut fids = Vec::with_capacity(self.len());

        for (index, feature) in self.features.features.iter().enumerate() {
            let fid = integer_fid(feature.property(fid_field)).ok_or_else(|| Error::NonIntegerFid {
                field: fid_field.to_string(),
                index,
                value: feature.property(fid_field).map(Value::to_string).unwrap_or_else(|| "null".to_string()),
            })?;

            if seen.insert(fid, index).is_some() {
                return Err(Error::DuplicateFid { field: fid_field.to_string(), value: fid });
            }
            fids.push(fid);
        }

        Ok(fids)
    }

    /// Zones keyed by fid, sorted, with simplified geometries reprojected to EPSG:4326.
    pub fn normalized_zones(&self, fid_field: &str, tolerance_m: f64) -> Result<Vec<(i64, Feature)>> {
        let fids = self.validate_fid_field(fid_field)?;

        let mut zones: Vec<(i64, Feature)> = fids
            .into_iter()
            .zip(&self.features.features)
            .map(|(fid, feature)| {
                let mut zone = feature.clone();
                zone.geometry = feature.geometry.as_ref().map(|geometry| ops::normalize(geometry, tolerance_m, self.crs));
                (fid, zone)
            })
            .collect();

        zones.sort_by_key(|(fid, _)| *fid);
        Ok(zones)
    }
}

/// Integer-like fid: an integral JSON number, or a float without fractional part as some exporters write.
fn integer_fid(value: Option<&Value>) -> Option<i64> {
    let Value::Number(number) = value? else { return None };

    number.as_i64().or_else(|| number.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64).map(|f| f as i64))
}
