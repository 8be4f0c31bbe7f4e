pub mod config;

use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{ArgGroup, Args, Parser, Subcommand};
use limsfetcher::{derive_run_summary, FlowcellFetcher, FlowcellName};
use statusdb::{
    catalog::Catalog,
    merge::MergeUpdater,
    reconcile::{EnvironmentComparison, SubtreeUpload},
    resolver::{DirectIdResolver, KeyResolver, ViewResolver},
    store::DocumentStore,
    sync::{AgeWindow, BatchSummary, BatchSynchronizer, CancelFlag, SyncCandidate},
    BusinessKey, DocumentId, KeyPath, StatusDb,
};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{
    fmt::{
        self,
        writer::{BoxMakeWriter, MakeWriterExt},
    },
    EnvFilter,
};

use crate::config::ReconcilerConfig;

const FLOWCELL_DB: &str = "flowcells";
const PROJECT_DB: &str = "projects";
const RUN_SUMMARY_PATH: &str = "illumina.run_summary";

/// Runs the command line interface of the reconciler.
pub async fn run_cli() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv().ok();
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Flowcells(args)) => run_flowcells(args, dotenv.as_deref()).await?,
        Some(Command::ValidateProjects(args)) => {
            run_validate_projects(args, dotenv.as_deref()).await?
        }
        Some(Command::History(args)) => {
            init_tracing(None);
            run_history(args)?
        }
        None => {
            println!("No subcommand provided. Use --help to see available commands.");
        }
    }

    Ok(())
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Uploads LIMS run parameters into the flowcell documents
    Flowcells(FlowcellsArgs),
    /// Compares project documents between two StatusDB environments
    ValidateProjects(ValidateProjectsArgs),
    /// Lists recorded batch runs from the run catalog
    History(HistoryArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("selection").required(true).args(["flowcell", "all"])))]
pub struct FlowcellsArgs {
    /// Flowcell name, position letter included, e.g. AAD1TAPACXX
    #[arg(short, long)]
    pub flowcell: Option<String>,
    /// Upload every flowcell sequenced within --days
    #[arg(short, long, default_value_t = false)]
    pub all: bool,
    /// Age window for --all, in days
    #[arg(short, long, default_value_t = 30)]
    pub days: u32,
    /// Configuration file
    #[arg(short, long, env = "RECONCILER_CONF")]
    pub conf: Option<PathBuf>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("selection").required(true).args(["project", "all"])))]
pub struct ValidateProjectsArgs {
    /// Project name, e.g. J.Doe_13_01; may be repeated
    #[arg(short, long)]
    pub project: Vec<String>,
    /// Compare every project of the left environment
    #[arg(short, long, default_value_t = false)]
    pub all: bool,
    /// Configuration of the reference environment
    #[arg(long)]
    pub left_conf: PathBuf,
    /// Configuration of the environment under validation
    #[arg(long)]
    pub right_conf: PathBuf,
    #[arg(long, default_value = "left")]
    pub left_name: String,
    #[arg(long, default_value = "right")]
    pub right_name: String,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[arg(short, long, env = "RECONCILER_CONF")]
    pub conf: Option<PathBuf>,
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,
    /// Print the runs as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Logs to stdout, and also to `log_file` when one is given.
fn init_tracing(log_file: Option<File>) {
    let to_file = log_file.is_some();
    let writer = match log_file {
        Some(file) => BoxMakeWriter::new(std::io::stdout.and(Mutex::new(file))),
        None => BoxMakeWriter::new(std::io::stdout),
    };
    let _ = fmt::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(!to_file)
        .try_init();
}

/// Opens `<dir>/<command>.log` for appending, creating `dir` if needed.
pub fn open_log_file(dir: &Path, command: &str) -> anyhow::Result<File> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let path = dir.join(format!("{command}.log"));
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

fn start_logging(
    config: &ReconcilerConfig,
    command: &str,
    dotenv: Option<&Path>,
) -> anyhow::Result<()> {
    let log_file = config
        .log_dir
        .as_deref()
        .map(|dir| open_log_file(dir, command))
        .transpose()?;
    init_tracing(log_file);
    if let Some(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }
    Ok(())
}

/// Candidates for every project document, addressed by id and labelled with
/// the project name when the document has one.
pub fn project_candidates(index: Vec<(DocumentId, Option<String>)>) -> Vec<SyncCandidate<()>> {
    index
        .into_iter()
        .map(|(id, name)| {
            let candidate = SyncCandidate::new((), Some(BusinessKey::new(id.as_str())), None);
            match name {
                Some(name) => candidate.with_label(name),
                None => candidate,
            }
        })
        .collect()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Cancels the batch on Ctrl-C; the candidate in flight still finishes.
fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Shutdown signal received, stopping after the current candidate");
            flag.cancel();
        }
    });
    cancel
}

fn open_run(catalog: Option<&Arc<Catalog>>, batch: &str) -> anyhow::Result<Option<i64>> {
    catalog
        .map(|catalog| catalog.create_run(batch))
        .transpose()
        .context("failed to record batch run start")
}

fn close_run(
    catalog: Option<&Arc<Catalog>>,
    run_id: Option<i64>,
    summary: &BatchSummary,
) -> anyhow::Result<()> {
    if let (Some(catalog), Some(run_id)) = (catalog, run_id) {
        catalog
            .record_summary(run_id, summary)
            .context("failed to record batch run summary")?;
        info!("Batch run recorded as run {}", run_id);
    }
    Ok(())
}

async fn run_flowcells(args: FlowcellsArgs, dotenv: Option<&Path>) -> anyhow::Result<()> {
    let conf = args.conf.unwrap_or_else(ReconcilerConfig::default_path);
    let config = ReconcilerConfig::load(&conf)?;
    start_logging(&config, "flowcells", dotenv)?;
    let fetcher = FlowcellFetcher::with_default_client(config.lims()?)?;
    let statusdb = StatusDb::connect(config.statusdb.clone())
        .await
        .context("failed to connect to StatusDB")?;
    let store = statusdb.database(FLOWCELL_DB);

    let (candidates, window) = match &args.flowcell {
        Some(name) => {
            let name = FlowcellName::parse(name)?;
            let candidates = fetcher
                .single_candidate(&name)
                .await
                .with_context(|| format!("failed to fetch flowcell {name} from LIMS"))?;
            (candidates, AgeWindow::unbounded(today()))
        }
        None => {
            let candidates = fetcher
                .all_candidates()
                .await
                .context("failed to fetch sequencing runs from LIMS")?;
            (candidates, AgeWindow::days(i64::from(args.days), today()))
        }
    };

    let sync = BatchSynchronizer::new(FLOWCELL_DB, Arc::new(ViewResolver::new(store.clone(), "name")))
        .with_cancel_flag(cancel_on_ctrl_c());
    let upload = SubtreeUpload::new(
        MergeUpdater::new(store),
        KeyPath::parse(RUN_SUMMARY_PATH)?,
        derive_run_summary,
    );

    let run_id = open_run(statusdb.catalog.as_ref(), FLOWCELL_DB)?;
    let summary = sync.run_batch(candidates, &window, &upload).await;
    close_run(statusdb.catalog.as_ref(), run_id, &summary)
}

async fn run_validate_projects(
    args: ValidateProjectsArgs,
    dotenv: Option<&Path>,
) -> anyhow::Result<()> {
    let (left_config, right_config) =
        ReconcilerConfig::load_environments(&args.left_conf, &args.right_conf)?;
    start_logging(&left_config, "validate-projects", dotenv)?;
    let left_db = StatusDb::connect(left_config.statusdb)
        .await
        .with_context(|| format!("failed to connect to {}", args.left_name))?;
    let right_db = StatusDb::connect(right_config.statusdb)
        .await
        .with_context(|| format!("failed to connect to {}", args.right_name))?;
    let left = left_db.database(PROJECT_DB);
    let right = right_db.database(PROJECT_DB);

    let (candidates, resolver): (Vec<SyncCandidate<()>>, Arc<dyn KeyResolver>) = if args.all {
        let index = left
            .field_index("project_name")
            .await
            .with_context(|| format!("failed to list projects on {}", args.left_name))?;
        (project_candidates(index), Arc::new(DirectIdResolver))
    } else {
        let candidates = args
            .project
            .iter()
            .map(|name| SyncCandidate::new((), Some(BusinessKey::new(name)), None))
            .collect();
        (candidates, Arc::new(ViewResolver::new(left.clone(), "project_name")))
    };

    let sync = BatchSynchronizer::new(PROJECT_DB, resolver).with_cancel_flag(cancel_on_ctrl_c());
    let comparison = EnvironmentComparison::new(left, right, &args.left_name, &args.right_name);

    let run_id = open_run(left_db.catalog.as_ref(), PROJECT_DB)?;
    let summary = sync
        .run_batch(candidates, &AgeWindow::unbounded(today()), &comparison)
        .await;
    close_run(left_db.catalog.as_ref(), run_id, &summary)
}

fn run_history(args: HistoryArgs) -> anyhow::Result<()> {
    let conf = args.conf.unwrap_or_else(ReconcilerConfig::default_path);
    let config = ReconcilerConfig::load(&conf)?;
    let path = config
        .statusdb
        .catalog_path
        .context("no catalog_path configured")?;
    let catalog = Catalog::new(&path)
        .with_context(|| format!("failed to open run catalog {}", path.display()))?;
    catalog.initialize_schema()?;

    let runs = catalog.recent_runs(args.limit)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }
    for run in runs {
        println!(
            "#{} {} [{}] {} updated, {} compared ({} diverged), {} skipped, {} failed",
            run.run_id,
            run.batch_name,
            run.status,
            run.updated,
            run.compared,
            run.diverged,
            run.skipped,
            run.failed
        );
    }
    Ok(())
}
