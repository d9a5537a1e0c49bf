use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::domain::dataset::configuration::{DatasetConfiguration, ZoneMetadata};
use crate::domain::dataset::core::{CONFIG_OBJECT, DatasetCore, shard_fid};
use crate::domain::dataset::dataset::Dataset;
use crate::domain::dataset::state::DatasetState;
use crate::domain::dataset::zone_source::ZoneSource;
use crate::domain::geometry::feature::FeatureCollection;
use crate::domain::geometry::ops::bounding_extent;
use crate::domain::job::job_description::{JobDescription, JobPhase, JobTarget, format_shard_id};
use crate::domain::remote::remote_store::{ExportSource, RemoteStore};
use crate::domain::session::SessionContext;
use crate::domain::utils::id::{DatasetUuid, JobId};
use crate::domain::workflow::computation::ShardRef;
use crate::error::{Error, Result};

/// How `upload_shards` treats a zone set that already holds data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// Refuse to upload when the configuration object exists or is being written.
    #[default]
    FailIfExists,
    /// Cancel upload tasks in flight, cascade delete everything, computation runs included, then upload.
    Overwrite,
    /// Only submit the shards that are neither present nor being written.
    FillMissing,
}

#[derive(Debug, Clone)]
pub struct ZoneSetOptions {
    /// Defaults to the source name.
    pub name: Option<String>,
    pub fid_field: String,
    pub zone_type: String,
    pub description: String,
    pub author: String,
}

impl Default for ZoneSetOptions {
    fn default() -> Self {
        ZoneSetOptions {
            name: None,
            fid_field: "ZONE_FID".to_string(),
            zone_type: "DGOs".to_string(),
            description: String::new(),
            author: String::new(),
        }
    }
}

/// The root dataset: one remote object per zone of a local source.
#[derive(Debug)]
pub struct ZoneSet {
    base: DatasetCore,
    name: String,
    source: Option<ZoneSource>,

    /// Known from the source on creation, or read back from the configuration object on resume.
    metadata: Option<ZoneMetadata>,

    /// Last configuration written or read. `None` until the dataset is initialised.
    configuration: Option<DatasetConfiguration>,
}

/// Reads a configuration object. An absent object means "not initialised yet".
pub(crate) async fn read_configuration(store: &dyn RemoteStore, path: &str) -> Result<Option<DatasetConfiguration>> {
    match store.fetch_object_info(path).await {
        Ok(collection) => Ok(Some(DatasetConfiguration::from_feature_collection(collection)?)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl ZoneSet {
    /// Creates a fresh zone set. The cardinality is frozen to the zone count of `source`.
    pub async fn create(ctx: &SessionContext, source: ZoneSource, options: ZoneSetOptions) -> Result<ZoneSet> {
        let fids = source.validate_fid_field(&options.fid_field)?;

        let uuid = DatasetUuid::generate();
        let root_path = ctx.zone_set_path(&uuid);
        let name = options.name.clone().unwrap_or_else(|| source.name.clone());

        let metadata = ZoneMetadata {
            name: name.clone(),
            fid_field: options.fid_field,
            cardinality: fids.len(),
            zone_type: options.zone_type,
            description: options.description,
            author: options.author,
        };

        let mut zone_set = ZoneSet {
            base: DatasetCore::new(ctx.store.clone(), uuid, root_path, fids.len()),
            name,
            source: Some(source),
            metadata: Some(metadata),
            configuration: None,
        };
        zone_set.base.refresh_state().await?;

        log::info!("ZoneSet {} created at {} with {} zones.", zone_set.base.uuid(), zone_set.base.root_path(), fids.len());
        Ok(zone_set)
    }

    /// Reattaches to an existing zone set.
    ///
    /// Metadata is rebuilt from the configuration object. When that object is absent the
    /// dataset is not initialised: metadata stays unset unless a source is attached.
    pub async fn resume(ctx: &SessionContext, uuid: DatasetUuid) -> Result<ZoneSet> {
        let root_path = ctx.zone_set_path(&uuid);
        let configuration = read_configuration(ctx.store.as_ref(), &format!("{}/{}", root_path, CONFIG_OBJECT)).await?;

        let (name, metadata, cardinality) = match &configuration {
            Some(configuration) => (configuration.metadata.name.clone(), Some(configuration.metadata.clone()), configuration.metadata.cardinality),
            None => {
                log::warn!("ZoneSet {} has no configuration object, it is not initialised yet.", uuid);
                (uuid.to_string(), None, 0)
            }
        };

        let mut zone_set = ZoneSet { base: DatasetCore::new(ctx.store.clone(), uuid, root_path, cardinality), name, source: None, metadata, configuration };
        zone_set.base.refresh_state().await?;

        log::info!("ZoneSet {} resumed, state {}.", zone_set.base.uuid(), zone_set.base.state());
        Ok(zone_set)
    }

    /// Attaches a local source to a resumed zone set so that it can be (re)uploaded.
    ///
    /// An initialised zone set keeps its recorded fid field and cardinality, the source is
    /// only checked against them. Otherwise the source defines them.
    pub async fn attach_source(&mut self, source: ZoneSource, options: ZoneSetOptions) -> Result<()> {
        match self.metadata.clone() {
            Some(metadata) => {
                let fids = source.validate_fid_field(&metadata.fid_field)?;
                if fids.len() != metadata.cardinality {
                    log::warn!(
                        "Source {} holds {} zones but ZoneSet {} was created with {}. Keeping {}.",
                        source.name,
                        fids.len(),
                        self.base.uuid(),
                        metadata.cardinality,
                        metadata.cardinality
                    );
                }
            }
            None => {
                let fids = source.validate_fid_field(&options.fid_field)?;
                let name = options.name.unwrap_or_else(|| source.name.clone());

                self.base = DatasetCore::new(self.base.store(), self.base.uuid().clone(), self.base.root_path().to_string(), fids.len());
                self.metadata = Some(ZoneMetadata {
                    name: name.clone(),
                    fid_field: options.fid_field,
                    cardinality: fids.len(),
                    zone_type: options.zone_type,
                    description: options.description,
                    author: options.author,
                });
                self.name = name;
                self.base.refresh_state().await?;
            }
        }

        self.source = Some(source);
        Ok(())
    }

    pub fn metadata(&self) -> Option<&ZoneMetadata> {
        self.metadata.as_ref()
    }

    pub fn configuration(&self) -> Option<&DatasetConfiguration> {
        self.configuration.as_ref()
    }

    pub fn source(&self) -> Option<&ZoneSource> {
        self.source.as_ref()
    }

    pub fn config_present(&self) -> bool {
        self.base.config_present()
    }

    /// Run containers nested under this zone set.
    pub fn run_uuids(&self) -> Vec<DatasetUuid> {
        self.base.child_containers().iter().map(|entry| DatasetUuid::new(entry.basename())).collect()
    }

    /// Present zones, sorted by fid.
    pub fn shard_refs(&self) -> Vec<ShardRef> {
        self.base
            .present_shards()
            .iter()
            .filter_map(|entry| match shard_fid(entry) {
                Some(fid) => Some(ShardRef { fid, path: entry.name.clone() }),
                None => {
                    log::warn!("Ignoring object {} of ZoneSet {}, it has no shard id.", entry.name, self.base.uuid());
                    None
                }
            })
            .collect()
    }

    /// Fans the zones of the source out into one export job each.
    ///
    /// `tolerance_m` is the simplification tolerance in metres and must be at least 1.
    /// Returns the submitted job ids without waiting for them.
    pub async fn upload_shards(&mut self, tolerance_m: f64, mode: UploadMode) -> Result<Vec<JobId>> {
        if tolerance_m.is_nan() || tolerance_m < 1.0 {
            return Err(Error::InvalidSimplifyTolerance(tolerance_m));
        }

        let uuid = self.base.uuid().clone();
        let (Some(source), Some(metadata)) = (&self.source, &self.metadata) else {
            return Err(Error::MissingSource(uuid.to_string()));
        };
        let metadata = metadata.clone();

        // Phase 1: normalise everything locally, nothing is submitted on invalid input
        let zones = source.normalized_zones(&metadata.fid_field, tolerance_m)?;
        let extent = bounding_extent(zones.iter().filter_map(|(_, zone)| zone.geometry.as_ref()));
        let configuration = DatasetConfiguration::for_zones(metadata, extent);

        // Phase 2: check what already exists remotely
        self.base.refresh_state().await?;

        // A configuration being written counts as existing: the previous upload is still in flight
        let initialised = self.base.config_present() || self.configuration.is_some() || self.base.jobs().config_in_progress();

        match mode {
            UploadMode::FailIfExists if initialised => {
                return Err(Error::ConfigurationExists(uuid.to_string()));
            }
            UploadMode::Overwrite => {
                let cancelled = self.base.cancel_outstanding().await?;
                if !cancelled.is_empty() {
                    log::warn!("Cancelled {} upload tasks of ZoneSet {} still in flight.", cancelled.len(), uuid);
                }

                if self.base.config_present() || !self.base.present_shards().is_empty() || !self.base.child_containers().is_empty() {
                    log::warn!("Overwriting ZoneSet {}, its zones and computation runs are deleted.", uuid);
                    self.base.delete().await?;
                    self.base.refresh_state().await?;
                }
            }
            _ => {}
        }

        let mut skipped: BTreeSet<i64> = BTreeSet::new();
        if mode == UploadMode::FillMissing {
            skipped.extend(self.base.present_fids());
            skipped.extend(self.base.jobs().active_shards());
        }

        let store = self.base.store();
        let mut job_ids = Vec::new();

        // Phase 3: configuration object
        if mode == UploadMode::FillMissing && (self.base.config_present() || self.base.jobs().config_in_progress()) {
            log::debug!("Configuration of ZoneSet {} already present or in progress.", uuid);
        } else {
            let description = JobDescription::new(JobPhase::Upload, uuid.clone(), JobTarget::Config);
            let source = ExportSource::Features(configuration.to_feature_collection()?);
            job_ids.push(store.submit_export_job(&source, &self.base.config_path(), &description.to_string()).await?);
        }

        // Phase 4: one job per zone, destination derived from the fid
        for (fid, zone) in zones {
            if skipped.contains(&fid) {
                continue;
            }

            let description = JobDescription::new(JobPhase::Upload, uuid.clone(), JobTarget::Shard(fid));
            let source = ExportSource::Features(FeatureCollection::new(vec![zone]));
            job_ids.push(store.submit_export_job(&source, &self.base.shard_path(&self.name, fid), &description.to_string()).await?);

            log::info!("Upload zone {} started.", format_shard_id(fid));
        }

        if !skipped.is_empty() {
            log::info!("{} zones of ZoneSet {} already present or in progress, skipped.", skipped.len(), uuid);
        }

        self.configuration = Some(configuration);
        self.base.refresh_state().await?;

        Ok(job_ids)
    }

    /// Re-reads the configuration object, then refreshes the shard view.
    pub async fn reload(&mut self) -> Result<DatasetState> {
        if let Some(configuration) = read_configuration(self.base.store().as_ref(), &self.base.config_path()).await? {
            self.metadata = Some(configuration.metadata.clone());
            self.configuration = Some(configuration);
        }
        self.base.refresh_state().await
    }
}

#[async_trait]
impl Dataset for ZoneSet {
    fn get_base(&self) -> &DatasetCore {
        &self.base
    }

    fn get_base_mut(&mut self) -> &mut DatasetCore {
        &mut self.base
    }

    fn name(&self) -> &str {
        &self.name
    }
}
