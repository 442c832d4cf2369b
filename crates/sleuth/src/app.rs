// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Subcommand dispatch for the `sleuth` binary

use std::path::Path;

use anyhow::Context;
use sleuth_git::{ChangeSet, GitError, GitRepo};
use sleuth_tests::RawOutput;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{
    Command, CommonArgs, Config, OutputFormat, ParseArgs, RunArgs, Settings, load_file_config,
    write_example,
};
use crate::error::RunError;
use crate::hints::load_hints;
use crate::orchestrator::{
    EXIT_CANCELLED, EXIT_EXECUTION_ERROR, EXIT_SUCCESS, Orchestrator, RunContext, RunRequest,
    RunResult,
};
use crate::report::{render_error, render_json, render_text};

/// Label used for output read from stdin without `--command`
pub const STDIN_LABEL: &str = "<stdin>";

/// Run the selected subcommand and return the process exit code
///
/// # Errors
///
/// Returns an error for configuration problems and I/O failures outside
/// the test run itself. Execution errors and cancellation are reported and
/// mapped to exit codes instead.
pub async fn dispatch(config: &Config, cancel: CancellationToken) -> anyhow::Result<i32> {
    match config.command_or_default() {
        Command::Init { path, force } => {
            write_example(&path, force)?;
            println!("Wrote {}", path.display());
            Ok(EXIT_SUCCESS)
        }
        Command::Run(args) => run(config, &args, &cancel).await,
        Command::Parse(args) => parse(config, &args, &cancel).await,
    }
}

async fn run(config: &Config, args: &RunArgs, cancel: &CancellationToken) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir().context("failed to read the current directory")?;
    let settings = resolve_run_settings(config, args, &cwd)?;
    info!(command = %settings.command, cwd = %settings.cwd.display(), provider = %settings.provider, "starting run");

    let ctx = build_context(&settings, true).await?;
    let request = RunRequest::from_settings(&settings);
    let outcome = Orchestrator::run(&ctx, &request, cancel).await;
    Ok(emit(outcome, args.common.format))
}

async fn parse(config: &Config, args: &ParseArgs, cancel: &CancellationToken) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir().context("failed to read the current directory")?;
    let settings = resolve_parse_settings(config, &args.common, &cwd)?;

    let text = read_input(args.input.as_deref()).await?;
    let label = args.command.clone().unwrap_or_else(|| STDIN_LABEL.to_string());
    let raw = RawOutput::from_capture(label, text, "", args.exit_code);

    let ctx = build_context(&settings, args.analyze).await?;
    let outcome = Orchestrator::interpret(&ctx, raw, args.analyze, cancel).await;
    Ok(emit(outcome, args.common.format))
}

/// Assemble the immutable run context from settings
async fn build_context(settings: &Settings, with_changes: bool) -> anyhow::Result<RunContext> {
    let service = settings
        .text_service()
        .context("failed to configure the text-understanding provider")?;
    let hints = load_hints(&settings.hints_file);
    let changes = if with_changes && settings.git_enabled {
        collect_changes(settings).await
    } else {
        None
    };
    Ok(RunContext::from_settings(settings, service)
        .with_hints(hints)
        .with_changes(changes))
}

/// Collect the change-set, or `None` when git context is unavailable
async fn collect_changes(settings: &Settings) -> Option<ChangeSet> {
    let root = settings.project_root.clone();
    let options = settings.changeset_options.clone();
    let joined = tokio::task::spawn_blocking(move || -> Result<ChangeSet, GitError> {
        GitRepo::discover(&root)?.changeset(&options)
    })
    .await;

    match joined {
        Ok(Ok(changes)) => {
            info!(
                files = changes.files.len(),
                commits = changes.commits.len(),
                "collected change context"
            );
            Some(changes)
        }
        Ok(Err(err)) => {
            warn!(error = %err, "continuing without change context");
            None
        }
        Err(err) => {
            warn!(error = %err, "change collection task failed");
            None
        }
    }
}

async fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    let bytes = match path {
        Some(path) if path != Path::new("-") => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("failed to read stdin")?;
            buf
        }
    };
    debug!(bytes = bytes.len(), "read captured output");
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Print the outcome and map it to an exit code
fn emit(outcome: Result<RunResult, RunError>, format: OutputFormat) -> i32 {
    match outcome {
        Ok(result) => {
            match format {
                OutputFormat::Text => print!("{}", render_text(&result)),
                OutputFormat::Json => match render_json(&result) {
                    Ok(json) => println!("{json}"),
                    Err(err) => {
                        eprintln!("error: failed to serialize report: {err}");
                        return EXIT_EXECUTION_ERROR;
                    }
                },
            }
            result.exit_code()
        }
        Err(RunError::Cancelled) => {
            eprintln!("Run cancelled");
            EXIT_CANCELLED
        }
        Err(err) => {
            eprint!("{}", render_error(&err));
            EXIT_EXECUTION_ERROR
        }
    }
}

/// Resolve settings the way `sleuth run` would, for inspection
///
/// # Errors
///
/// Returns the configuration error `sleuth run` would report.
pub fn resolve_run_settings(
    config: &Config,
    args: &RunArgs,
    cwd: &Path,
) -> anyhow::Result<Settings> {
    let (mut file, root) = load_file_config(config.config.as_deref(), cwd)?;
    // --cwd is relative to the invocation directory, not the project root
    let mut args = args.clone();
    args.cwd = args.cwd.map(|dir| cwd.join(dir));
    file.apply_run(&args);
    Ok(Settings::resolve(&file, &root)?)
}

/// Resolve settings the way `sleuth parse` would, for inspection
///
/// # Errors
///
/// Returns the configuration error `sleuth parse` would report.
pub fn resolve_parse_settings(
    config: &Config,
    args: &CommonArgs,
    cwd: &Path,
) -> anyhow::Result<Settings> {
    let (mut file, root) = load_file_config(config.config.as_deref(), cwd)?;
    file.apply_common(args);
    Ok(Settings::resolve(&file, &root)?)
}
