// ABOUTME: Main entry point for boxwatch
//
// Binary: boxwatch
// Usage: boxwatch [--unix-addr PATH | --tcp-addr ADDR] [--image REF] [-d]
// - resolves (or pulls) the image
// - creates, starts and waits for the container
// - prints a load snapshot every second until q is pressed
// - stops and removes the container

#![allow(missing_docs)]

use anyhow::Result;
use boxwatch::cli::Cli;
use boxwatch::docker::ContainerManager;
use boxwatch::session::{OutputSink, Session, TerminalInput};
use clap::Parser;
use crossterm::terminal::disable_raw_mode;
use std::sync::Arc;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let config = args.resolve_config()?;

    setup_logging(config.debug);
    setup_panic_handler();

    if config.debug {
        debug!(
            "Effective configuration: {}",
            serde_json::to_string(&config).unwrap_or_default()
        );
    }

    let output = OutputSink::stdout();
    if let Some(notice) = config.engine.transport_notice() {
        output.line(notice);
    }

    let engine = ContainerManager::connect(&config.engine)?;
    engine.ping().await?;
    let keys = TerminalInput::new(output.clone()).into_keys();

    let mut session = Session::new(Arc::new(engine), config.session, output);
    let result = session.run(keys).await;

    // Ensure terminal is restored on any path
    let _ = disable_raw_mode();

    match result {
        Ok(report) => {
            info!(
                session_id = %report.session_id,
                container = %report.container,
                launched = report.monitor.probes_launched,
                completed = report.monitor.probes_completed,
                failed = report.monitor.probe_failures,
                teardown_clean = report.teardown.is_clean(),
                "Session complete"
            );
            Ok(())
        }
        Err(e) => {
            error!(session_id = %session.id(), "Session ended with error: {}", e);
            Err(e.into())
        }
    }
}

fn setup_logging(debug: bool) {
    use std::fs::OpenOptions;
    use std::path::PathBuf;
    use tracing_subscriber::prelude::*;

    // Create log directory if it doesn't exist
    let log_dir = std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(".boxwatch").join("logs"))
        .unwrap_or_else(|_| PathBuf::from(".boxwatch/logs"));

    let _ = std::fs::create_dir_all(&log_dir);

    // Create JSONL log file with timestamp
    let log_file = log_dir.join(format!(
        "boxwatch-{}.jsonl",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));

    // Stdout carries the session output, so logs only ever go to the file
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_file) else {
        eprintln!("Could not open log file {}, logging disabled", log_file.display());
        return;
    };

    let default_filter = if debug { "boxwatch=debug" } else { "boxwatch=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()             // Output in JSON Lines format
                .with_target(true)  // Include target module in JSON
                .with_writer(file)
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        // Ensure terminal is restored before logging the panic
        let _ = disable_raw_mode();

        error!("Application panicked: {}", panic_info);
        eprintln!("Application panicked: {}", panic_info);
        eprintln!("Please check the logs for more details.");
    }));
}
