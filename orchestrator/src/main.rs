//! Main entry point for the suite runner binary
//!
//! Wires the real supervisor, phase runner and contract listing into the
//! pipeline, forwards operator signals to it, and maps the verdict to an
//! exit code.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tokio::sync::mpsc;

use orchestrator::{
    SuiteConfig, TestOrchestrator,
    services::{ContractDirectory, PhaseOutput, RealPhaseRunner, RealServerSupervisor},
};
use shared::{Component, SuiteResult, component_info, logging};

/// Exit code for problems before the pipeline could start
const EXIT_STARTUP_ERROR: u8 = 2;

/// Runs a contract test suite: consumer tests, provider servers, provider
/// verification, advanced scenarios
#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Runs consumer/provider contract test phases against managed servers")]
pub struct Args {
    /// Suite configuration file (JSON)
    #[arg(long, default_value = "suite.json")]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Print the suite result as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Write the suite result as JSON to this file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(long)]
    pub quiet: bool,

    /// Skip listing generated contract files
    #[arg(long)]
    pub no_artifacts: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Missing .env is fine
    let _ = dotenv::dotenv();

    logging::init_tracing(Some(&args.log_level), args.quiet);

    let config = match SuiteConfig::load(&args.config).await {
        Ok(config) => config,
        Err(e) => {
            logging::log_error(&Component::Orchestrator, "Loading configuration", &e);
            return ExitCode::from(EXIT_STARTUP_ERROR);
        }
    };

    let supervisor = RealServerSupervisor::new()
        .with_grace_period(config.shutdown_grace())
        .with_poll_interval(config.health_poll_interval());
    let runner = RealPhaseRunner::new().with_output(phase_output(&args));
    let artifacts_dir = config.artifacts_dir.clone();

    // Create orchestrator with dependency injection
    let mut orchestrator = TestOrchestrator::new(config, supervisor, runner);
    if let Some(dir) = artifacts_dir.filter(|_| !args.no_artifacts) {
        orchestrator = orchestrator.with_artifacts(ContractDirectory::new(dir));
    }

    // Set up graceful shutdown
    forward_signals(orchestrator.get_shutdown_sender());

    let result = orchestrator.run().await;

    if let Err(e) = emit_result(&result, &args) {
        logging::log_error(&Component::Orchestrator, "Writing suite result", &e);
        return ExitCode::from(EXIT_STARTUP_ERROR);
    }

    component_info!(Component::Orchestrator, "🏁 Suite finished: {}", result.overall);
    ExitCode::from(result.exit_code() as u8)
}

/// Keep our stdout clean when it carries the JSON result
fn phase_output(args: &Args) -> PhaseOutput {
    if args.json { PhaseOutput::Stderr } else { PhaseOutput::Inherit }
}

fn forward_signals(shutdown_sender: mpsc::Sender<()>) {
    let ctrl_c_sender = shutdown_sender.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                logging::log_shutdown(&Component::Orchestrator, "Received Ctrl+C signal");
                let _ = ctrl_c_sender.send(()).await;
            }
            Err(err) => {
                logging::log_error(&Component::Orchestrator, "Signal handling", &err);
            }
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal as unix_signal};

        match unix_signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                if terminate.recv().await.is_some() {
                    logging::log_shutdown(&Component::Orchestrator, "Received SIGTERM");
                    let _ = shutdown_sender.send(()).await;
                }
            }
            Err(err) => {
                logging::log_error(&Component::Orchestrator, "SIGTERM handling", &err);
            }
        }
    });

    #[cfg(not(unix))]
    drop(shutdown_sender);
}

fn emit_result(result: &SuiteResult, args: &Args) -> anyhow::Result<()> {
    if !args.json && args.output.is_none() {
        return Ok(());
    }

    let json = result.to_json_pretty().context("serializing suite result")?;

    if args.json {
        println!("{json}");
    }

    if let Some(ref path) = args.output {
        std::fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?;
        component_info!(Component::Orchestrator, "💾 Suite result written to {}", path.display());
    }

    Ok(())
}
