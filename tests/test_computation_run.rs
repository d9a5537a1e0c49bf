mod common;

use common::{PointTableComputation, TableComputation, complete_zone_set, session, three_zone_source};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use zoneset_workflow::domain::dataset::computation_run::{ComputationRun, DownloadOptions};
use zoneset_workflow::domain::dataset::dataset::Dataset;
use zoneset_workflow::domain::dataset::state::DatasetState;
use zoneset_workflow::domain::dataset::table_export::ResultLevel;
use zoneset_workflow::domain::dataset::zone_set::{UploadMode, ZoneSet, ZoneSetOptions};
use zoneset_workflow::domain::remote::simulated_store::SimulatedRemoteStore;
use zoneset_workflow::domain::session::SessionContext;
use zoneset_workflow::domain::workflow::computation::ShardComputation;
use zoneset_workflow::domain::workflow::parameters::{ComputationParameters, SatelliteType};
use zoneset_workflow::domain::workflow::workflow::Workflow;
use zoneset_workflow::error::Error;

const EXPECTED_CSV: &str = "ID,DATE,SCALE,WATER_AREA,geometry\n\
1,2020-01-01,30,11.0,POINT (1 1)\n\
1,2020-02-01,30,12.0,POINT (1 2)\n\
2,2020-01-01,30,21.0,POINT (2 1)\n\
2,2020-02-01,30,22.0,POINT (2 2)\n\
3,2020-01-01,30,31.0,POINT (3 1)\n\
3,2020-02-01,30,32.0,POINT (3 2)\n";

async fn settled_run(store: &SimulatedRemoteStore, ctx: &SessionContext) -> (ZoneSet, ComputationRun) {
    let mut zone_set = complete_zone_set(store, ctx).await;
    let mut run = Workflow::new(Arc::new(TableComputation)).run(&mut zone_set, &ComputationParameters::new(SatelliteType::Landsat)).await.unwrap();

    store.settle_all();
    assert_eq!(run.refresh_state().await.unwrap(), DatasetState::Complete);
    (zone_set, run)
}

fn part_of(dir: &PathBuf, fid_suffix: &str) -> PathBuf {
    fs::read_dir(dir).unwrap().map(|entry| entry.unwrap().path()).find(|path| path.to_string_lossy().ends_with(fid_suffix)).unwrap()
}

#[tokio::test]
async fn create_refuses_an_incomplete_zone_set() {
    let (_store, ctx) = session(false);
    let mut zone_set = ZoneSet::create(&ctx, three_zone_source(), ZoneSetOptions::default()).await.unwrap();
    zone_set.upload_shards(15.0, UploadMode::FailIfExists).await.unwrap();

    let err = ComputationRun::create(&zone_set, ResultLevel::Zone).await.unwrap_err();

    assert!(matches!(err, Error::IncompleteZoneSet { .. }));
    assert!(zone_set.run_uuids().is_empty());
}

#[tokio::test]
async fn configuration_is_written_once_per_run() {
    let (store, ctx) = session(false);
    let mut zone_set = complete_zone_set(&store, &ctx).await;
    let parameters = ComputationParameters::new(SatelliteType::Sentinel2);
    let shard = zone_set.shard_refs().remove(0);

    let mut run = ComputationRun::create(&zone_set, ResultLevel::Zone).await.unwrap();
    for _ in 0..2 {
        let graph = TableComputation.build(&shard, &parameters).unwrap();
        run.compute_shard_result(shard.fid, graph, &parameters).await.unwrap();
    }

    let uuid = run.get_uuid().to_string();
    let descriptions: Vec<String> = run.outstanding_jobs().iter().map(|job| job.description.clone()).collect();
    assert_eq!(descriptions, vec![format!("compute {} config", uuid), format!("compute {} fid 0001", uuid), format!("compute {} fid 0001", uuid)]);

    store.settle_all();
    assert_eq!(run.refresh_state().await.unwrap(), DatasetState::Partial { present: 1, expected: 3 });
    assert_eq!(run.parameters().unwrap().satellite_type, SatelliteType::Sentinel2);

    zone_set.refresh_state().await.unwrap();
    assert_eq!(zone_set.run_uuids(), vec![run.get_uuid().clone()]);
}

#[tokio::test]
async fn resume_reads_name_and_parameters_back() {
    let (store, ctx) = session(false);
    let (zone_set, run) = settled_run(&store, &ctx).await;

    let resumed = ComputationRun::resume(&zone_set, run.get_uuid().clone()).await.unwrap();

    assert_eq!(resumed.name(), run.name());
    assert_eq!(resumed.get_root_path(), run.get_root_path());
    assert_eq!(resumed.get_state(), DatasetState::Complete);
    assert_eq!(resumed.parameters().unwrap().satellite_type, SatelliteType::Landsat);
    assert_eq!(resumed.configuration().unwrap().metadata.fid_field, "ZONE_FID");
    assert_eq!(resumed.parent().uuid, *zone_set.get_uuid());
}

#[tokio::test]
async fn download_writes_one_csv_sorted_by_zone() {
    let (store, ctx) = session(false);
    let (_zone_set, mut run) = settled_run(&store, &ctx).await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("lhasa.csv");

    let written = run.download(&output, DownloadOptions::default()).await.unwrap();

    assert_eq!(written, output);
    assert_eq!(fs::read_to_string(&output).unwrap(), EXPECTED_CSV);
    assert_eq!(fs::read_dir(dir.path().join("lhasa.csv.parts")).unwrap().count(), 3);
}

#[tokio::test]
async fn download_reuses_parts_unless_overwritten() {
    let (store, ctx) = session(false);
    let (_zone_set, mut run) = settled_run(&store, &ctx).await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("lhasa.csv");
    let parts = dir.path().join("lhasa.csv.parts");

    run.download(&output, DownloadOptions::default()).await.unwrap();
    fs::write(part_of(&parts, "_0002.csv"), "ID,DATE,SCALE,WATER_AREA\n2,2020-01-01,30,0.0\n").unwrap();

    run.download(&output, DownloadOptions::default()).await.unwrap();
    assert_eq!(fs::read_to_string(&output).unwrap().lines().count(), 6);

    run.download(&output, DownloadOptions { overwrite: true, remove_parts: true, ..Default::default() }).await.unwrap();
    assert_eq!(fs::read_to_string(&output).unwrap(), EXPECTED_CSV);
    assert!(!parts.exists());
}

#[tokio::test]
async fn point_level_rows_get_composite_ids() {
    let (store, ctx) = session(false);
    let (_zone_set, mut run) = settled_run(&store, &ctx).await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("points.csv");

    run.download(&output, DownloadOptions { level: Some(ResultLevel::Point), ..Default::default() }).await.unwrap();

    let ids: Vec<String> = fs::read_to_string(&output).unwrap().lines().skip(1).map(|line| line.split(',').next().unwrap().to_string()).collect();
    assert_eq!(ids, vec!["0001-0000", "0001-0001", "0002-0000", "0002-0001", "0003-0000", "0003-0001"]);
}

#[tokio::test]
async fn download_defaults_to_the_recorded_level() {
    let (store, ctx) = session(false);
    let mut zone_set = complete_zone_set(&store, &ctx).await;
    let run = Workflow::new(Arc::new(PointTableComputation)).run(&mut zone_set, &ComputationParameters::new(SatelliteType::Landsat)).await.unwrap();
    assert_eq!(run.result_level(), ResultLevel::Point);
    store.settle_all();

    let mut resumed = ComputationRun::resume(&zone_set, run.get_uuid().clone()).await.unwrap();
    assert_eq!(resumed.result_level(), ResultLevel::Point);
    assert_eq!(resumed.configuration().unwrap().result_level, Some(ResultLevel::Point));

    let dir = tempfile::tempdir().unwrap();
    let points = dir.path().join("points.csv");
    resumed.download(&points, DownloadOptions::default()).await.unwrap();
    let first_id = fs::read_to_string(&points).unwrap().lines().nth(1).unwrap().split(',').next().unwrap().to_string();
    assert_eq!(first_id, "0001-0000");

    let zones = dir.path().join("zones.csv");
    resumed.download(&zones, DownloadOptions { level: Some(ResultLevel::Zone), ..Default::default() }).await.unwrap();
    assert_eq!(fs::read_to_string(&zones).unwrap(), EXPECTED_CSV);
}

#[tokio::test]
async fn download_preconditions() {
    let (store, ctx) = session(false);
    let zone_set = complete_zone_set(&store, &ctx).await;
    let mut run = ComputationRun::create(&zone_set, ResultLevel::Zone).await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = run.download(dir.path().join("out.txt"), DownloadOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedOutputFormat(_)));

    let err = run.download(dir.path().join("out.csv"), DownloadOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::NoShardsToDownload(ref uuid) if uuid == run.get_uuid().as_str()));
    assert!(!dir.path().join("out.csv").exists());
}
