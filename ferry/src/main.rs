// Standard library
use std::fs;
use std::process::ExitCode;
use std::time::Duration;

// External crates
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, info_span};
use uuid::Uuid;

// Internal imports
use ferry_config::{load_items, RegistryAuth};
use ferry_core::Interrupt;
use ferry_source::{HttpFetcher, SourceOptions, TagSource};
use ferry_sync::{DockerCli, TransferExecutor};

// Local modules
mod cli;
mod orchestrator;

use cli::Args;
use orchestrator::{Orchestrator, RunSettings, RunSummary};

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    let _log_guard = ferry_logging::init_subscriber(default_level);

    let run_id = Uuid::new_v4();
    let span = info_span!("run", run_id = %run_id);
    let _entered = span.enter();

    match run(args) {
        Ok(summary) if summary.succeeded() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<RunSummary> {
    let items = load_items(&args.config)
        .with_context(|| format!("Failed to load items file {}", args.config.display()))?;
    info!(
        config = %args.config.display(),
        repositories = items.len(),
        dry_run = args.dry_run,
        "Loaded items"
    );

    let executor = if args.dry_run {
        None
    } else {
        let auth = RegistryAuth::from_env()?;
        let docker = DockerCli::new();
        docker.ensure_available()?;
        Some(
            TransferExecutor::new(docker, auth)
                .with_retry(args.retry_policy())
                .with_cache_capacity(args.cache_capacity),
        )
    };

    fs::create_dir_all(&args.history_dir).with_context(|| {
        format!(
            "Failed to create history directory {}",
            args.history_dir.display()
        )
    })?;

    let interrupt = Interrupt::install().context("Failed to install signal handlers")?;
    let executor = executor.map(|executor| executor.with_interrupt(interrupt.clone()));
    debug!(history_dir = %args.history_dir.display(), "Ready");

    let fetcher = HttpFetcher::new(HTTP_TIMEOUT)?;
    let source =
        TagSource::new(fetcher, SourceOptions::default()).with_interrupt(interrupt.clone());

    let settings = RunSettings {
        history_dir: args.history_dir,
        only: args.only,
        fail_fast: args.fail_fast,
    };
    Ok(Orchestrator::new(source, executor, settings, interrupt).run(&items))
}
