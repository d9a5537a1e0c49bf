//! `zoneset` - manage zone sets and computation runs on the remote compute platform.

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::{Map, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use zoneset_workflow::api::parameters_dto::ComputationParametersDto;
use zoneset_workflow::api::run_record_dto::RunRecordDto;
use zoneset_workflow::domain::dataset::computation_run::{ComputationRun, DownloadOptions};
use zoneset_workflow::domain::dataset::dataset::Dataset;
use zoneset_workflow::domain::dataset::state::{DatasetState, WaitOptions, WaitOutcome};
use zoneset_workflow::domain::dataset::table_export::ResultLevel;
use zoneset_workflow::domain::dataset::zone_set::{UploadMode, ZoneSet, ZoneSetOptions};
use zoneset_workflow::domain::dataset::zone_source::ZoneSource;
use zoneset_workflow::domain::geometry::feature::{Feature, FeatureCollection, Geometry};
use zoneset_workflow::domain::remote::simulated_store::SimulatedRemoteStore;
use zoneset_workflow::domain::session::SessionContext;
use zoneset_workflow::domain::utils::id::DatasetUuid;
use zoneset_workflow::domain::workflow::computation::ExpressionComputation;
use zoneset_workflow::domain::workflow::parameters::{ComputationParameters, SatelliteType};
use zoneset_workflow::domain::workflow::workflow::Workflow;
use zoneset_workflow::loader::parser::parse_json_file;
use zoneset_workflow::{init_session, logger};

#[derive(Parser)]
#[command(name = "zoneset")]
#[command(about = "Upload zone sets and run sharded computations on the remote platform", long_about = None)]
struct Cli {
    /// Session configuration file
    #[arg(long, global = true, default_value = "zoneset.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Refuse when the zone set is already initialised
    FailIfExists,
    /// Delete the zone set and its runs first
    Overwrite,
    /// Only upload zones that are missing
    FillMissing,
}

impl From<ModeArg> for UploadMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::FailIfExists => UploadMode::FailIfExists,
            ModeArg::Overwrite => UploadMode::Overwrite,
            ModeArg::FillMissing => UploadMode::FillMissing,
        }
    }
}

#[derive(Args, Debug)]
struct Target {
    /// ZoneSet uuid
    #[arg(long)]
    zone_set: String,

    /// ComputationRun uuid, the command applies to the zone set when omitted
    #[arg(long)]
    run: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Create (or resume) a zone set from a GeoJSON file and upload its zones
    Upload {
        /// GeoJSON feature collection, EPSG:4326 or EPSG:3857
        #[arg(long)]
        source: PathBuf,

        /// Resume this zone set instead of creating a new one
        #[arg(long)]
        uuid: Option<String>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, default_value = "ZONE_FID")]
        fid_field: String,

        #[arg(long, default_value = "DGOs")]
        zone_type: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, default_value = "")]
        author: String,

        /// Simplification tolerance in metres (>= 1)
        #[arg(long, default_value = "15")]
        tolerance: f64,

        #[arg(long, value_enum, default_value = "fail-if-exists")]
        mode: ModeArg,

        /// Block until every upload task has settled
        #[arg(long)]
        wait: bool,
    },
    /// Show the state and tasks of a zone set or run
    Status(Target),
    /// Block until no task of the dataset is pending or running
    Wait {
        #[command(flatten)]
        target: Target,

        /// Give up after this many seconds
        #[arg(long)]
        max_wait_s: Option<u64>,
    },
    /// Cancel every pending or running task of the dataset
    Cancel(Target),
    /// Delete the dataset and everything below it
    Delete(Target),
    /// Start a computation run over a complete zone set
    Run {
        #[arg(long)]
        zone_set: String,

        /// Computation parameters JSON file
        #[arg(long)]
        parameters: PathBuf,

        /// Recorded in the run record
        #[arg(long, default_value = "zoneset")]
        run_by: String,
    },
    /// Task counts and reconciled state of a run
    Summary {
        #[arg(long)]
        zone_set: String,

        #[arg(long)]
        run: String,
    },
    /// Download the results of a run as one CSV file
    Download {
        #[arg(long)]
        zone_set: String,

        #[arg(long)]
        run: String,

        #[arg(long)]
        output: PathBuf,

        #[arg(long)]
        overwrite: bool,

        /// Rows are traced points rather than zones. Defaults to the level the run recorded
        #[arg(long)]
        point_level: bool,

        #[arg(long)]
        remove_parts: bool,
    },
    /// Full scenario against an in-memory simulated platform
    Demo,
}

fn paint_state(state: DatasetState) -> String {
    match state {
        DatasetState::None => state.to_string().red().to_string(),
        DatasetState::Partial { .. } => state.to_string().yellow().to_string(),
        DatasetState::Complete => state.to_string().green().to_string(),
    }
}

fn print_dataset(kind: &str, dataset: &dyn Dataset) {
    println!("{} {} ({})", kind.bold(), dataset.get_uuid(), dataset.name());
    println!("  path:   {}", dataset.get_root_path());
    println!("  state:  {}", paint_state(dataset.get_state()));
    println!("  shards: {}/{}", dataset.present_shards().len(), dataset.get_cardinality());
    println!("  tasks:  {}", dataset.task_summary());
    for job in dataset.outstanding_jobs() {
        println!("    {} {} {}", job.id, job.status.to_string().yellow(), job.description);
    }
}

/// Cancellation token fired by Ctrl-C.
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

async fn open(ctx: &SessionContext, target: &Target) -> anyhow::Result<(ZoneSet, Option<ComputationRun>)> {
    let zone_set = ZoneSet::resume(ctx, DatasetUuid::new(target.zone_set.as_str())).await?;
    let run = match &target.run {
        Some(run) => Some(ComputationRun::resume(&zone_set, DatasetUuid::new(run.as_str())).await?),
        None => None,
    };
    Ok((zone_set, run))
}

fn selected<'a>(zone_set: &'a mut ZoneSet, run: &'a mut Option<ComputationRun>) -> &'a mut dyn Dataset {
    match run {
        Some(run) => run as &mut dyn Dataset,
        None => zone_set as &mut dyn Dataset,
    }
}

fn report_wait(outcome: WaitOutcome) {
    match outcome {
        WaitOutcome::Settled => println!("{}", "All tasks settled.".green()),
        WaitOutcome::TimedOut => println!("{}", "Gave up waiting, tasks are still active.".yellow()),
        WaitOutcome::Cancelled => println!("{}", "Stopped waiting.".yellow()),
    }
}

async fn execute(command: Command, ctx: SessionContext) -> anyhow::Result<()> {
    match command {
        Command::Upload { source, uuid, name, fid_field, zone_type, description, author, tolerance, mode, wait } => {
            let source = ZoneSource::from_geojson_file(&source)?;
            let options = ZoneSetOptions { name, fid_field, zone_type, description, author };

            let mut zone_set = match uuid {
                Some(uuid) => {
                    let mut zone_set = ZoneSet::resume(&ctx, DatasetUuid::new(uuid)).await?;
                    zone_set.attach_source(source, options).await?;
                    zone_set
                }
                None => ZoneSet::create(&ctx, source, options).await?,
            };

            let jobs = zone_set.upload_shards(tolerance, mode.into()).await?;
            println!("Submitted {} upload tasks for ZoneSet {}.", jobs.len(), zone_set.get_uuid().to_string().bold());

            if wait {
                let options = ctx.wait.clone().cancel_on(ctrl_c_token());
                report_wait(zone_set.wait_until_settled(&options).await?);
            }
            print_dataset("ZoneSet", &zone_set);
        }
        Command::Status(target) => {
            let (zone_set, run) = open(&ctx, &target).await?;
            print_dataset("ZoneSet", &zone_set);
            if let Some(run) = &run {
                print_dataset("ComputationRun", run);
            } else {
                for uuid in zone_set.run_uuids() {
                    println!("  run:    {}", uuid);
                }
            }
        }
        Command::Wait { target, max_wait_s } => {
            let (mut zone_set, mut run) = open(&ctx, &target).await?;
            let mut options = ctx.wait.clone().cancel_on(ctrl_c_token());
            if let Some(max_wait_s) = max_wait_s {
                options = options.max_wait(Duration::from_secs(max_wait_s));
            }

            let dataset = selected(&mut zone_set, &mut run);
            report_wait(dataset.wait_until_settled(&options).await?);
            print_dataset("Dataset", dataset);
        }
        Command::Cancel(target) => {
            let (mut zone_set, mut run) = open(&ctx, &target).await?;
            let dataset = selected(&mut zone_set, &mut run);
            let cancelled = dataset.cancel_outstanding().await?;
            println!("Requested cancellation of {} tasks.", cancelled.len());
        }
        Command::Delete(target) => {
            let (mut zone_set, mut run) = open(&ctx, &target).await?;
            let dataset = selected(&mut zone_set, &mut run);
            dataset.delete().await?;
            println!("Deleted {}.", dataset.get_root_path().red());
        }
        Command::Run { zone_set, parameters, run_by } => {
            let dto: ComputationParametersDto = parse_json_file(&parameters)?;
            let parameters = ComputationParameters::try_from(dto)?;

            let mut zone_set = ZoneSet::resume(&ctx, DatasetUuid::new(zone_set)).await?;
            let workflow = Workflow::new(Arc::new(ExpressionComputation));
            let run = workflow.run(&mut zone_set, &parameters).await?;

            let record = RunRecordDto::submitted(&run, &parameters, &run_by);
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Summary { zone_set, run } => {
            let target = Target { zone_set, run: Some(run) };
            let (_, run) = open(&ctx, &target).await?;
            let mut run = run.context("run not found")?;

            let summary = Workflow::new(Arc::new(ExpressionComputation)).task_summary(&mut run).await?;
            println!("{}", summary);
            println!("run state: {}", summary.run_state().to_string().bold());
        }
        Command::Download { zone_set, run, output, overwrite, point_level, remove_parts } => {
            let target = Target { zone_set, run: Some(run) };
            let (_, run) = open(&ctx, &target).await?;
            let mut run = run.context("run not found")?;

            let level = point_level.then_some(ResultLevel::Point);
            let written = run.download(&output, DownloadOptions { overwrite, level, remove_parts }).await?;
            println!("Results written to {}.", written.display().to_string().green());
        }
        Command::Demo => demo().await?,
    }
    Ok(())
}

fn demo_zones() -> FeatureCollection {
    let features = (1..=3)
        .map(|fid| {
            let x = fid as f64 * 0.01;
            let mut properties = Map::new();
            properties.insert("ZONE_FID".to_string(), json!(fid));
            let ring = vec![[91.0 + x, 29.6], [91.01 + x, 29.6], [91.01 + x, 29.61], [91.0 + x, 29.61], [91.0 + x, 29.6]];
            Feature::new(properties, Some(Geometry::Polygon(vec![ring])))
        })
        .collect();
    FeatureCollection::new(features)
}

/// Upload, compute, download and delete against the simulated platform.
async fn demo() -> anyhow::Result<()> {
    let store = SimulatedRemoteStore::with_auto_advance(true);
    let ctx = SessionContext::new(Arc::new(store), "demo").with_wait(WaitOptions::with_poll_interval(Duration::from_millis(50)));

    let source = ZoneSource::from_features("demo_zones", demo_zones())?;
    let mut zone_set = ZoneSet::create(&ctx, source, ZoneSetOptions::default()).await?;
    zone_set.upload_shards(15.0, UploadMode::FailIfExists).await?;
    zone_set.wait_until_settled(&ctx.wait).await?;
    print_dataset("ZoneSet", &zone_set);

    let parameters = ComputationParameters::new(SatelliteType::Landsat);
    let workflow = Workflow::new(Arc::new(ExpressionComputation));
    let mut run = workflow.run(&mut zone_set, &parameters).await?;
    run.wait_until_settled(&ctx.wait).await?;
    print_dataset("ComputationRun", &run);

    let mut record = RunRecordDto::submitted(&run, &parameters, "demo");
    record.reconcile(&workflow.task_summary(&mut run).await?);
    println!("{}", serde_json::to_string_pretty(&record)?);

    let output = std::env::temp_dir().join(format!("{}.csv", run.name()));
    run.download(&output, DownloadOptions { remove_parts: true, ..Default::default() }).await?;
    println!("Results written to {}.", output.display().to_string().green());

    zone_set.delete().await?;
    println!("Deleted {}.", zone_set.get_root_path().red());

    if zone_set.get_state() != DatasetState::None {
        bail!("zone set still holds shards after delete");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::Demo = cli.command {
        logger::init();
        return demo().await;
    }

    let ctx = init_session(&cli.config).with_context(|| format!("failed to load session configuration '{}'", cli.config.display()))?;
    execute(cli.command, ctx).await
}
