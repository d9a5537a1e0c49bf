mod common;

use common::{NAMESPACE, SOURCE_NAME, complete_zone_set, session, three_zone_source, zones};

use zoneset_workflow::domain::dataset::dataset::Dataset;
use zoneset_workflow::domain::dataset::state::DatasetState;
use zoneset_workflow::domain::dataset::zone_set::{UploadMode, ZoneSet, ZoneSetOptions};
use zoneset_workflow::domain::dataset::zone_source::ZoneSource;
use zoneset_workflow::domain::job::job_description::JobDescription;
use zoneset_workflow::domain::job::job_status::JobStatus;
use zoneset_workflow::domain::utils::id::DatasetUuid;
use zoneset_workflow::error::Error;

#[tokio::test]
async fn upload_submits_config_and_one_job_per_zone() {
    let (store, ctx) = session(false);

    let mut zone_set = ZoneSet::create(&ctx, three_zone_source(), ZoneSetOptions::default()).await.unwrap();
    assert_eq!(zone_set.get_state(), DatasetState::None);
    assert_eq!(zone_set.get_cardinality(), 3);
    assert_eq!(zone_set.get_root_path(), format!("projects/{}/assets/zone_sets/{}", NAMESPACE, zone_set.get_uuid()));

    let jobs = zone_set.upload_shards(15.0, UploadMode::FailIfExists).await.unwrap();

    assert_eq!(jobs.len(), 4);
    assert_eq!(zone_set.outstanding_jobs().len(), 4);
    assert_eq!(zone_set.get_state(), DatasetState::None);

    let descriptions: Vec<String> = zone_set.outstanding_jobs().iter().map(|job| job.description.clone()).collect();
    let uuid = zone_set.get_uuid().to_string();
    assert_eq!(
        descriptions,
        vec![format!("upload {} config", uuid), format!("upload {} fid 0001", uuid), format!("upload {} fid 0002", uuid), format!("upload {} fid 0003", uuid)]
    );
    assert!(descriptions.iter().all(|description| JobDescription::parse(description).is_some()));

    store.settle_all();
    zone_set.refresh_state().await.unwrap();

    assert_eq!(zone_set.get_state(), DatasetState::Complete);
    assert_eq!(zone_set.present_shards().len(), 3);
    assert!(zone_set.config_present());
    assert!(zone_set.outstanding_jobs().is_empty());
    assert!(store.exists(&format!("{}/{}_0002", zone_set.get_root_path(), SOURCE_NAME)));
}

#[tokio::test]
async fn settled_upload_completes_for_any_zone_count() {
    for fids in [vec![7], vec![1, 2, 3, 4, 5]] {
        let (store, ctx) = session(false);
        let source = ZoneSource::from_features("zones", zones(&fids)).unwrap();
        let mut zone_set = ZoneSet::create(&ctx, source, ZoneSetOptions::default()).await.unwrap();

        let jobs = zone_set.upload_shards(15.0, UploadMode::FailIfExists).await.unwrap();
        assert_eq!(jobs.len(), fids.len() + 1);

        store.settle_all();
        assert_eq!(zone_set.refresh_state().await.unwrap(), DatasetState::Complete);
        assert_eq!(zone_set.present_shards().len(), fids.len());
    }
}

#[tokio::test]
async fn upload_refuses_an_initialised_zone_set() {
    let (store, ctx) = session(false);
    let mut zone_set = complete_zone_set(&store, &ctx).await;
    let jobs_before = store.job_count();

    let err = zone_set.upload_shards(15.0, UploadMode::FailIfExists).await.unwrap_err();

    assert!(matches!(err, Error::ConfigurationExists(ref uuid) if uuid == zone_set.get_uuid().as_str()));
    assert!(err.is_precondition());
    assert_eq!(store.job_count(), jobs_before);
}

#[tokio::test]
async fn upload_refuses_while_the_first_upload_is_in_flight() {
    let (store, ctx) = session(false);
    let mut zone_set = ZoneSet::create(&ctx, three_zone_source(), ZoneSetOptions::default()).await.unwrap();
    zone_set.upload_shards(15.0, UploadMode::FailIfExists).await.unwrap();

    let err = zone_set.upload_shards(15.0, UploadMode::FailIfExists).await.unwrap_err();
    assert!(matches!(err, Error::ConfigurationExists(_)));
    assert_eq!(store.job_count(), 4);

    // A second handle only sees the pending configuration task.
    let mut other = ZoneSet::resume(&ctx, zone_set.get_uuid().clone()).await.unwrap();
    other.attach_source(three_zone_source(), ZoneSetOptions::default()).await.unwrap();

    let err = other.upload_shards(15.0, UploadMode::FailIfExists).await.unwrap_err();
    assert!(matches!(err, Error::ConfigurationExists(_)));
    assert_eq!(store.job_count(), 4);
}

#[tokio::test]
async fn overwrite_cancels_an_upload_in_flight() {
    let (store, ctx) = session(false);
    let mut zone_set = ZoneSet::create(&ctx, three_zone_source(), ZoneSetOptions::default()).await.unwrap();
    let first = zone_set.upload_shards(15.0, UploadMode::FailIfExists).await.unwrap();

    let second = zone_set.upload_shards(15.0, UploadMode::Overwrite).await.unwrap();

    assert!(first.iter().all(|id| store.job_status(id) == Some(JobStatus::Cancelled)));
    assert_eq!(second.len(), 4);

    store.settle_all();
    assert_eq!(zone_set.refresh_state().await.unwrap(), DatasetState::Complete);
}

#[tokio::test]
async fn invalid_tolerance_submits_nothing() {
    let (store, ctx) = session(false);
    let mut zone_set = ZoneSet::create(&ctx, three_zone_source(), ZoneSetOptions::default()).await.unwrap();

    let err = zone_set.upload_shards(0.5, UploadMode::FailIfExists).await.unwrap_err();

    assert!(matches!(err, Error::InvalidSimplifyTolerance(t) if t == 0.5));
    assert_eq!(store.job_count(), 0);
}

#[tokio::test]
async fn missing_fid_field_is_fatal_before_anything_remote() {
    let (store, ctx) = session(false);
    let options = ZoneSetOptions { fid_field: "DGO_FID".to_string(), ..Default::default() };

    let err = ZoneSet::create(&ctx, three_zone_source(), options).await.unwrap_err();

    assert!(matches!(err, Error::MissingFidField(ref field) if field == "DGO_FID"));
    assert!(store.paths_under("projects").is_empty());
}

#[tokio::test]
async fn overwrite_replaces_zones_and_runs() {
    let (store, ctx) = session(false);
    let mut zone_set = complete_zone_set(&store, &ctx).await;

    let run_path = format!("{}/0123456789abcdef", zone_set.get_root_path());
    ctx.store.create_container(&run_path).await.unwrap();

    let jobs = zone_set.upload_shards(15.0, UploadMode::Overwrite).await.unwrap();

    assert_eq!(jobs.len(), 4);
    assert!(!store.exists(&run_path));
    assert_eq!(zone_set.get_state(), DatasetState::None);

    store.settle_all();
    assert_eq!(zone_set.refresh_state().await.unwrap(), DatasetState::Complete);
}

#[tokio::test]
async fn fill_missing_only_resubmits_absent_zones() {
    let (store, ctx) = session(false);
    let mut zone_set = complete_zone_set(&store, &ctx).await;

    let lost = format!("{}/{}_0002", zone_set.get_root_path(), SOURCE_NAME);
    assert!(store.remove_object(&lost));
    assert_eq!(zone_set.refresh_state().await.unwrap(), DatasetState::Partial { present: 2, expected: 3 });

    let jobs = zone_set.upload_shards(15.0, UploadMode::FillMissing).await.unwrap();
    assert_eq!(jobs.len(), 1);

    store.settle_all();
    assert_eq!(zone_set.refresh_state().await.unwrap(), DatasetState::Complete);
    assert!(store.exists(&lost));
}

#[tokio::test]
async fn fill_missing_skips_zones_being_written() {
    let (store, ctx) = session(false);
    let mut zone_set = ZoneSet::create(&ctx, three_zone_source(), ZoneSetOptions::default()).await.unwrap();
    zone_set.upload_shards(15.0, UploadMode::FailIfExists).await.unwrap();

    let jobs = zone_set.upload_shards(15.0, UploadMode::FillMissing).await.unwrap();

    assert!(jobs.is_empty());
    assert_eq!(store.job_count(), 4);
}

#[tokio::test]
async fn external_deletion_regresses_state() {
    let (store, ctx) = session(false);
    let mut zone_set = complete_zone_set(&store, &ctx).await;

    store.remove_object(&format!("{}/{}_0003", zone_set.get_root_path(), SOURCE_NAME));

    assert_eq!(zone_set.refresh_state().await.unwrap(), DatasetState::Partial { present: 2, expected: 3 });
    assert_eq!(zone_set.get_cardinality(), 3);
}

#[tokio::test]
async fn resume_rebuilds_metadata_from_configuration() {
    let (store, ctx) = session(false);
    let options = ZoneSetOptions { author: "hydro-team".to_string(), description: "Lhasa river".to_string(), ..Default::default() };
    let mut zone_set = ZoneSet::create(&ctx, three_zone_source(), options).await.unwrap();
    zone_set.upload_shards(15.0, UploadMode::FailIfExists).await.unwrap();
    store.settle_all();

    let resumed = ZoneSet::resume(&ctx, zone_set.get_uuid().clone()).await.unwrap();

    let metadata = resumed.metadata().unwrap();
    assert_eq!(metadata.name, SOURCE_NAME);
    assert_eq!(metadata.fid_field, "ZONE_FID");
    assert_eq!(metadata.cardinality, 3);
    assert_eq!(metadata.author, "hydro-team");
    assert_eq!(resumed.name(), SOURCE_NAME);
    assert_eq!(resumed.get_state(), DatasetState::Complete);
    assert!(resumed.configuration().unwrap().extent.is_some());
}

#[tokio::test]
async fn resume_without_configuration_is_not_initialised() {
    let (_store, ctx) = session(false);

    let mut zone_set = ZoneSet::resume(&ctx, DatasetUuid::new("feedbeef")).await.unwrap();

    assert!(zone_set.metadata().is_none());
    assert_eq!(zone_set.get_state(), DatasetState::None);
    assert!(matches!(zone_set.upload_shards(15.0, UploadMode::FillMissing).await.unwrap_err(), Error::MissingSource(_)));

    zone_set.attach_source(three_zone_source(), ZoneSetOptions::default()).await.unwrap();
    assert_eq!(zone_set.get_cardinality(), 3);
    assert_eq!(zone_set.upload_shards(15.0, UploadMode::FailIfExists).await.unwrap().len(), 4);
}

#[tokio::test]
async fn zones_are_uploaded_in_fid_order() {
    let (_store, ctx) = session(false);
    let source = ZoneSource::from_features("shuffled", zones(&[30, 10, 20])).unwrap();
    let mut zone_set = ZoneSet::create(&ctx, source, ZoneSetOptions::default()).await.unwrap();

    zone_set.upload_shards(15.0, UploadMode::FailIfExists).await.unwrap();

    let shards: Vec<String> = zone_set.outstanding_jobs().iter().skip(1).map(|job| job.description.rsplit(' ').next().unwrap().to_string()).collect();
    assert_eq!(shards, vec!["0010", "0020", "0030"]);
}
