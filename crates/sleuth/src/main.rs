// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! sleuth: run tests, interpret their output, and triage failures

use std::process::ExitCode;

use clap::Parser;
use sleuth::config::Config;
use sleuth::orchestrator::EXIT_EXECUTION_ERROR;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = Config::parse();

    // Logs go to stderr; stdout carries only the report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(config.log_level().into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling run");
            on_interrupt.cancel();
        }
    });

    let code = match sleuth::app::dispatch(&config, cancel).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "sleuth failed");
            eprintln!("error: {err:#}");
            EXIT_EXECUTION_ERROR
        }
    };
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}
