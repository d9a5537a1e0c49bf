#![allow(dead_code)]

use serde_json::{Map, json};
use std::sync::Arc;
use std::time::Duration;

use zoneset_workflow::domain::dataset::dataset::Dataset;
use zoneset_workflow::domain::dataset::state::WaitOptions;
use zoneset_workflow::domain::dataset::table_export::ResultLevel;
use zoneset_workflow::domain::dataset::zone_set::{UploadMode, ZoneSet, ZoneSetOptions};
use zoneset_workflow::domain::dataset::zone_source::ZoneSource;
use zoneset_workflow::domain::geometry::feature::{Feature, FeatureCollection, Geometry};
use zoneset_workflow::domain::remote::remote_store::RemoteCollectionHandle;
use zoneset_workflow::domain::remote::simulated_store::SimulatedRemoteStore;
use zoneset_workflow::domain::session::SessionContext;
use zoneset_workflow::domain::workflow::computation::{ShardComputation, ShardRef};
use zoneset_workflow::domain::workflow::parameters::ComputationParameters;
use zoneset_workflow::error::Result;

pub const NAMESPACE: &str = "hydro-lab";
pub const SOURCE_NAME: &str = "lhasa_zones";

pub fn fast_wait() -> WaitOptions {
    WaitOptions::with_poll_interval(Duration::from_millis(5))
}

/// A session over a fresh simulated store, plus a handle on the store to drive it.
pub fn session(auto_advance: bool) -> (SimulatedRemoteStore, SessionContext) {
    let store = SimulatedRemoteStore::with_auto_advance(auto_advance);
    let ctx = SessionContext::new(Arc::new(store.clone()), NAMESPACE).with_wait(fast_wait());
    (store, ctx)
}

pub fn zones(fids: &[i64]) -> FeatureCollection {
    let features = fids
        .iter()
        .map(|fid| {
            let x = *fid as f64 * 0.01;
            let mut properties = Map::new();
            properties.insert("ZONE_FID".to_string(), json!(fid));
            properties.insert("NAME".to_string(), json!(format!("segment {}", fid)));

            let ring = vec![[91.0 + x, 29.6], [91.01 + x, 29.6], [91.01 + x, 29.61], [91.0 + x, 29.61], [91.0 + x, 29.6]];
            Feature::new(properties, Some(Geometry::Polygon(vec![ring])))
        })
        .collect();
    FeatureCollection::new(features)
}

pub fn three_zone_source() -> ZoneSource {
    ZoneSource::from_features(SOURCE_NAME, zones(&[1, 2, 3])).unwrap()
}

/// Creates and uploads the three zone fixture, then lets every job complete.
pub async fn complete_zone_set(store: &SimulatedRemoteStore, ctx: &SessionContext) -> ZoneSet {
    let mut zone_set = ZoneSet::create(ctx, three_zone_source(), ZoneSetOptions::default()).await.unwrap();
    zone_set.upload_shards(15.0, UploadMode::FailIfExists).await.unwrap();

    store.settle_all();
    zone_set.refresh_state().await.unwrap();
    assert!(zone_set.get_state().is_complete());
    zone_set
}

/// Produces a literal two-row table per shard instead of a remote graph, one point per row.
#[derive(Debug, Default)]
pub struct TableComputation;

impl ShardComputation for TableComputation {
    fn build(&self, shard: &ShardRef, parameters: &ComputationParameters) -> Result<RemoteCollectionHandle> {
        let rows: Vec<Feature> = (1..=2)
            .map(|month| {
                let mut properties = Map::new();
                properties.insert("DATE".to_string(), json!(format!("2020-0{}-01", month)));
                properties.insert("WATER_AREA".to_string(), json!(shard.fid as f64 * 10.0 + month as f64));
                properties.insert("SCALE".to_string(), json!(parameters.satellite_type.scale()));
                Feature::new(properties, Some(Geometry::Point([shard.fid as f64, month as f64])))
            })
            .collect();

        Ok(RemoteCollectionHandle(serde_json::to_value(FeatureCollection::new(rows))?))
    }
}

/// Same tables, declared as one row per traced point.
#[derive(Debug, Default)]
pub struct PointTableComputation;

impl ShardComputation for PointTableComputation {
    fn build(&self, shard: &ShardRef, parameters: &ComputationParameters) -> Result<RemoteCollectionHandle> {
        TableComputation.build(shard, parameters)
    }

    fn result_level(&self) -> ResultLevel {
        ResultLevel::Point
    }
}
