//! copyrandom - copies a random sample of files from a folder tree.
//!
//! Main entry point for the command line tool.
//!
//! # Execution Flow
//!
//! 1. Parse arguments and initialize logging → logs/copyrandom.<date>
//! 2. Create the tokio runtime
//! 3. Load `copyrandom.yaml` (plus `COPYRANDOM__*` overrides)
//! 4. Start the run through [`RunController`] and print its feed
//! 5. Ctrl-C requests a stop; the current folder still gets its status block
//! 6. Shutdown the tokio runtime with a 5s timeout

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use copyrandom::{APP_NAME, ConfigManager, RunController, StateChange, StateManager, VERSION};
use std::sync::Arc;

/// Copy a random sample of files from a folder tree
#[derive(Parser, Debug)]
#[command(name = "copyrandom", version, about)]
struct Args {
    /// Run configuration file; defaults to "copyrandom Data/copyrandom.yaml"
    #[arg(short, long)]
    config: Option<Utf8PathBuf>,

    /// Override the search root
    #[arg(long)]
    root: Option<Utf8PathBuf>,

    /// Override the destination
    #[arg(long)]
    destination: Option<Utf8PathBuf>,

    /// Fixed RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Debug level logging
    #[arg(long)]
    debug: bool,

    /// Mirror the diagnostic log to stderr
    #[arg(long)]
    console: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Guard must live until exit or buffered log lines are lost
    let _guard =
        copyrandom::logging::setup_logging_with_console("logs", "copyrandom", args.debug, args.console)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("copyrandom-worker")
        .build()?;

    let config_manager = ConfigManager::new("copyrandom Data")?;
    let mut config = match &args.config {
        Some(path) => config_manager.load_run_config_from(path)?,
        None => config_manager.load_run_config()?,
    };
    if let Some(root) = args.root {
        config.root = root;
    }
    if let Some(destination) = args.destination {
        config.destination = destination;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let state_manager = Arc::new(StateManager::new());
    let controller = Arc::new(RunController::new(
        Arc::clone(&state_manager),
        runtime.handle().clone(),
    ));

    let result = runtime.block_on(async {
        let mut run = controller.start(config)?;

        let stopper = Arc::clone(&controller);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Stopping after the current file...");
                stopper.stop();
            }
        });

        while let Some(event) = run.next_event().await {
            print_event(&event);
        }

        run.wait().await
    });

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));

    match result {
        Ok(report) => {
            tracing::info!(
                "Run complete: {} files, {} bytes, {} folders",
                report.total_copied,
                report.total_bytes,
                report.statuses.len()
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run failed: {:#}", e);
            Err(e)
        }
    }
}

fn print_event(event: &StateChange) {
    match event {
        StateChange::FolderStarted {
            index,
            destination,
            quota,
        } => match destination {
            Some(path) => println!("[folder {}] {} (quota {})", index, path, quota),
            None => println!("[folder {}] quota {}", index, quota),
        },
        StateChange::FileCopied { line, .. } => println!("{line}"),
        StateChange::InvalidFile { line } => println!("{line}"),
        StateChange::FolderFinished { summary, .. } => println!("{summary}"),
        _ => {}
    }
}
