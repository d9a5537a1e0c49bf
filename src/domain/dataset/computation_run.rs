use async_trait::async_trait;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::dataset::configuration::DatasetConfiguration;
use crate::domain::dataset::core::{DatasetCore, shard_fid};
use crate::domain::dataset::dataset::Dataset;
use crate::domain::dataset::table_export::{ResultLevel, clean_rows, concat_csv, write_rows};
use crate::domain::dataset::zone_set::{ZoneSet, read_configuration};
use crate::domain::job::job_description::{JobDescription, JobPhase, JobTarget};
use crate::domain::remote::remote_store::{ExportSource, RemoteCollectionHandle};
use crate::domain::utils::id::DatasetUuid;
use crate::domain::workflow::parameters::ComputationParameters;
use crate::error::{Error, Result};

/// What a run keeps of its zone set. A relation, the zone set lives on independently.
#[derive(Debug, Clone)]
pub struct ParentZoneSet {
    pub uuid: DatasetUuid,
    pub root_path: String,
    pub name: String,
    pub configuration: DatasetConfiguration,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadOptions {
    /// Fetch every shard again even when a local part exists.
    pub overwrite: bool,

    /// Overrides the level recorded when the run was created.
    pub level: Option<ResultLevel>,

    /// Remove the per-shard parts once the output is written.
    pub remove_parts: bool,
}

/// One computation over a complete zone set, one result object per zone.
#[derive(Debug)]
pub struct ComputationRun {
    base: DatasetCore,
    parent: ParentZoneSet,
    name: String,
    level: ResultLevel,
    configuration: Option<DatasetConfiguration>,
}

fn snapshot(zone_set: &ZoneSet) -> Result<ParentZoneSet> {
    let configuration = zone_set.configuration().cloned().ok_or_else(|| Error::IncompleteZoneSet {
        uuid: zone_set.get_uuid().to_string(),
        state: "configuration object missing".to_string(),
    })?;

    Ok(ParentZoneSet {
        uuid: zone_set.get_uuid().clone(),
        root_path: zone_set.get_root_path().to_string(),
        name: zone_set.name().to_string(),
        configuration,
    })
}

/// Computing over a partially uploaded zone set silently drops zones, so it is refused.
fn complete_parent_of(zone_set: &ZoneSet) -> Result<ParentZoneSet> {
    let state = zone_set.get_state();
    if !state.is_complete() {
        return Err(Error::IncompleteZoneSet { uuid: zone_set.get_uuid().to_string(), state: state.to_string() });
    }
    snapshot(zone_set)
}

impl ComputationRun {
    /// Starts a new run under `zone_set`, which must be complete. `level` is recorded in
    /// the run configuration and used by `download` unless overridden.
    pub async fn create(zone_set: &ZoneSet, level: ResultLevel) -> Result<ComputationRun> {
        let parent = complete_parent_of(zone_set)?;

        let uuid = DatasetUuid::generate();
        let root_path = format!("{}/{}", parent.root_path, uuid);
        let name = format!("{}_{}", parent.name, Local::now().format("%Y%m%d_%H%M%S"));

        let mut run = ComputationRun {
            base: DatasetCore::new(zone_set.get_base().store(), uuid, root_path, zone_set.get_cardinality()),
            parent,
            name,
            level,
            configuration: None,
        };
        run.base.refresh_state().await?;

        log::info!("ComputationRun {} ({}) created under ZoneSet {}.", run.base.uuid(), run.name, run.parent.uuid);
        Ok(run)
    }

    /// Reattaches to a run of `zone_set`. Its name and parameters come from its configuration object.
    pub async fn resume(zone_set: &ZoneSet, uuid: DatasetUuid) -> Result<ComputationRun> {
        let parent = snapshot(zone_set)?;
        let root_path = format!("{}/{}", parent.root_path, uuid);

        let mut run = ComputationRun {
            base: DatasetCore::new(zone_set.get_base().store(), uuid, root_path, zone_set.get_cardinality()),
            name: String::new(),
            parent,
            level: ResultLevel::default(),
            configuration: None,
        };

        run.configuration = read_configuration(run.base.store().as_ref(), &run.base.config_path()).await?;
        run.name = match run.configuration.as_ref().and_then(|configuration| configuration.run_name.clone()) {
            Some(name) => name,
            None => {
                log::warn!("ComputationRun {} has no configuration object yet.", run.base.uuid());
                format!("{}_{}", run.parent.name, run.base.uuid())
            }
        };
        if let Some(level) = run.configuration.as_ref().and_then(|configuration| configuration.result_level) {
            run.level = level;
        }
        run.base.refresh_state().await?;

        Ok(run)
    }

    pub fn parent(&self) -> &ParentZoneSet {
        &self.parent
    }

    pub fn configuration(&self) -> Option<&DatasetConfiguration> {
        self.configuration.as_ref()
    }

    pub fn result_level(&self) -> ResultLevel {
        self.level
    }

    pub fn parameters(&self) -> Option<&ComputationParameters> {
        self.configuration.as_ref().and_then(|configuration| configuration.parameters.as_ref())
    }

    /// Submits the export of one shard result.
    ///
    /// The first call also writes the run configuration, the parent metadata merged with
    /// `parameters`. Calling it again for the same shard overwrites the same object.
    pub async fn compute_shard_result(&mut self, fid: i64, result: RemoteCollectionHandle, parameters: &ComputationParameters) -> Result<()> {
        let store = self.base.store();
        let uuid = self.base.uuid().clone();

        if self.configuration.is_none() {
            let configuration = DatasetConfiguration::for_run(&self.parent.configuration, &self.name, parameters.clone(), self.level);
            let description = JobDescription::new(JobPhase::Compute, uuid.clone(), JobTarget::Config);

            store.submit_export_job(&ExportSource::Features(configuration.to_feature_collection()?), &self.base.config_path(), &description.to_string()).await?;
            self.configuration = Some(configuration);
        }

        let description = JobDescription::new(JobPhase::Compute, uuid, JobTarget::Shard(fid));
        store.submit_export_job(&ExportSource::Collection(result), &self.base.shard_path(&self.name, fid), &description.to_string()).await?;

        self.base.refresh_state().await?;
        Ok(())
    }

    /// Fetches every present shard as a table and writes them to one CSV, sorted by shard id.
    ///
    /// Shards are cached in `<destination>.parts/` so an interrupted download resumes
    /// where it stopped.
    pub async fn download(&mut self, destination: impl AsRef<Path>, options: DownloadOptions) -> Result<PathBuf> {
        let destination = destination.as_ref();
        if destination.extension().and_then(|ext| ext.to_str()) != Some("csv") {
            return Err(Error::UnsupportedOutputFormat(destination.display().to_string()));
        }

        self.base.refresh_state().await?;
        if self.base.present_shards().is_empty() {
            return Err(Error::NoShardsToDownload(self.base.uuid().to_string()));
        }

        let parts_dir = PathBuf::from(format!("{}.parts", destination.display()));
        fs::create_dir_all(&parts_dir)?;

        let store = self.base.store();
        let level = options.level.unwrap_or(self.level);
        let mut parts = Vec::new();

        for entry in self.base.present_shards() {
            let Some(fid) = shard_fid(entry) else {
                log::warn!("Skipping object {}, it has no shard id.", entry.name);
                continue;
            };

            let part = parts_dir.join(format!("{}.csv", entry.basename()));
            if part.exists() && !options.overwrite {
                log::debug!("{} already downloaded.", entry.name);
            } else {
                let rows = store.fetch_object_as_table(&entry.name).await?;
                write_rows(&part, &clean_rows(rows, fid, level))?;
                log::info!("Downloaded {}.", entry.name);
            }
            parts.push(part);
        }

        let written = concat_csv(&parts, destination)?;
        log::info!("Wrote {} rows from {} shards to {}.", written, parts.len(), destination.display());

        if options.remove_parts {
            fs::remove_dir_all(&parts_dir)?;
        }

        Ok(destination.to_path_buf())
    }
}

#[async_trait]
impl Dataset for ComputationRun {
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
