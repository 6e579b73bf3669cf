//! CLI entrypoint for conclave
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod args;
mod output;
mod progress;

use anyhow::{Context, Result};
use args::{Cli, Command};
use clap::Parser;
use conclave_application::{
    ExportUseCase, NoProgress, ProgressNotifier, RunPipelineUseCase, StatusUseCase,
};
use conclave_infrastructure::{
    CommandTransport, ConfigLoader, FileConfig, FileEvidenceSink, PlaybookContextSource,
    SqliteRunStore,
};
use progress::ConsoleProgress;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())?
    };

    // Status and export are read-only and need no transport
    match &cli.command {
        Command::Status { spec_id, json } => {
            let store = Arc::new(SqliteRunStore::open(&config.store_path)?);
            let view = StatusUseCase::new(store)
                .latest(&conclave_domain::SpecId::from(spec_id.as_str()))?;
            if *json {
                println!("{}", output::format_status_json(&view)?);
            } else {
                print!("{}", output::format_status(&view));
            }
            return Ok(());
        }
        Command::Export { spec_id } => {
            let store = Arc::new(SqliteRunStore::open(&config.store_path)?);
            let evidence = Arc::new(FileEvidenceSink::new(&config.evidence_dir));
            let exported = ExportUseCase::new(store, evidence)
                .export_latest(&conclave_domain::SpecId::from(spec_id.as_str()))?;
            println!("Exported {exported} step(s) to {}", config.evidence_dir);
            return Ok(());
        }
        _ => {}
    }

    let pipeline = build_pipeline(&config)?;

    // Ctrl-C leaves the run in-progress so it can be continued
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling run");
                cancel.cancel();
            }
        });
    }

    let progress: Box<dyn ProgressNotifier> = if cli.quiet {
        Box::new(NoProgress)
    } else {
        Box::new(ConsoleProgress)
    };

    let run = match &cli.command {
        Command::Run { spec_id } => {
            let spec = conclave_domain::SpecId::from(spec_id.as_str());
            pipeline.start(&spec, &cancel, progress.as_ref()).await?
        }
        Command::Resume { spec_id, from } => {
            let spec = conclave_domain::SpecId::from(spec_id.as_str());
            pipeline
                .resume(&spec, *from, &cancel, progress.as_ref())
                .await?
        }
        Command::Continue { run_id } => {
            let id = conclave_domain::RunId(run_id.clone());
            pipeline
                .continue_run(&id, &cancel, progress.as_ref())
                .await?
        }
        Command::Status { .. } | Command::Export { .. } => unreachable!("handled above"),
    };

    if !cli.quiet {
        println!();
        println!("Run {} finished: {}", run.id, run.status.as_str());
    }
    Ok(())
}

fn build_pipeline(config: &FileConfig) -> Result<RunPipelineUseCase<CommandTransport>> {
    let params = config
        .execution_params()
        .context("invalid execution configuration")?;
    let plan = config.pipeline_plan().context("invalid pipeline plan")?;
    anyhow::ensure!(
        !plan.roster.is_empty(),
        "no agents configured; add [[agents]] entries to the config file"
    );

    let store = Arc::new(SqliteRunStore::open(&config.store_path)?);
    let evidence = Arc::new(FileEvidenceSink::new(&config.evidence_dir));
    let transport = Arc::new(CommandTransport::new(
        &config.transport.command,
        config.transport.args.clone(),
    ));

    Ok(match &config.playbook_dir {
        Some(dir) => RunPipelineUseCase::new(
            transport,
            store,
            evidence,
            Arc::new(PlaybookContextSource::new(dir)),
            params,
            plan,
        ),
        None => RunPipelineUseCase::new(
            transport,
            store,
            evidence,
            Arc::new(conclave_application::NoContext),
            params,
            plan,
        ),
    })
}
