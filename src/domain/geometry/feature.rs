use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// A planar (x, y) position. Longitude/latitude for EPSG:4326, metres for EPSG:3857.
pub type Position = [f64; 2];

/// The GeoJSON geometry kinds accepted as zone shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    /// Calls `f` for every position of the geometry.
    pub fn for_each_position(&self, mut f: impl FnMut(&Position)) {
        match self {
            Geometry::Point(p) => f(p),
            Geometry::LineString(line) => line.iter().for_each(f),
            Geometry::Polygon(rings) => rings.iter().flatten().for_each(f),
            Geometry::MultiPolygon(polygons) => polygons.iter().flatten().flatten().for_each(f),
        }
    }

    pub fn map_positions(&self, f: impl Fn(&Position) -> Position) -> Geometry {
        let map_line = |line: &Vec<Position>| line.iter().map(&f).collect::<Vec<Position>>();
        match self {
            Geometry::Point(p) => Geometry::Point(f(p)),
            Geometry::LineString(line) => Geometry::LineString(map_line(line)),
            Geometry::Polygon(rings) => Geometry::Polygon(rings.iter().map(map_line).collect()),
            Geometry::MultiPolygon(polygons) => Geometry::MultiPolygon(polygons.iter().map(|rings| rings.iter().map(map_line).collect()).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(default)]
    pub properties: Map<String, Value>,

    pub geometry: Option<Geometry>,
}

impl Feature {
    pub fn new(properties: Map<String, Value>, geometry: Option<Geometry>) -> Self {
        Feature { id: None, properties, geometry }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    /// Declared column types, only carried by configuration objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<Value>,

    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        FeatureCollection { columns: None, crs: None, features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// The source reference system named by the legacy GeoJSON `crs` member.
    pub fn source_crs(&self) -> Result<Crs> {
        match self.crs.as_ref().and_then(|crs| crs.pointer("/properties/name")).and_then(Value::as_str) {
            None => Ok(Crs::Wgs84),
            Some(name) => Crs::from_name(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// EPSG:4326, the canonical system every shard is written in.
    Wgs84,
    /// EPSG:3857
    WebMercator,
}

impl Crs {
    pub fn from_name(name: &str) -> Result<Crs> {
        if name.ends_with("CRS84") || name.ends_with("4326") {
            Ok(Crs::Wgs84)
        } else if name.ends_with("3857") || name.ends_with("900913") {
            Ok(Crs::WebMercator)
        } else {
            Err(Error::UnsupportedCrs(name.to_string()))
        }
    }
}
