// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Configuration for sleuth
//!
//! Two layers: the command line ([`Config`], parsed with clap) and an
//! optional project file (`sleuth.json` or `.sleuth.json`, found by walking
//! up from the working directory). Command-line flags win. The merged,
//! validated result is a [`Settings`] value that is passed explicitly into
//! every run.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use sleuth_git::ChangeSetOptions;
use sleuth_llm::{
    DisabledService, OllamaService, OpenRouterService, ProviderError, TextService,
};
use sleuth_llm::ollama::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};
use sleuth_llm::openrouter::{DEFAULT_API_KEY_ENV, DEFAULT_OPENROUTER_MODEL, DEFAULT_OPENROUTER_URL};

use crate::analyzer::{DEFAULT_MAX_ANALYZED, DEFAULT_MAX_CONCURRENCY};
use crate::prompts::{AnalysisLimits, PROMPT_FRAME_RESERVE, PromptLimits};

/// Project file names, in lookup order
pub const CONFIG_FILE_NAMES: [&str; 2] = ["sleuth.json", ".sleuth.json"];

/// Sleuth - interpret test output and triage failures
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "sleuth")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Subcommand to run (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to a project file
    ///
    /// Defaults to the nearest sleuth.json or .sleuth.json found by walking
    /// up from the current directory.
    #[arg(long, global = true, env = "SLEUTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    ///
    /// Logs are written to stderr so stdout carries only the report.
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Quiet mode - suppress info-level logs
    ///
    /// Only errors and warnings will be logged.
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Execute the test command, parse its output and analyze failures
    Run(RunArgs),

    /// Parse output captured elsewhere
    ///
    /// Example:
    ///   pytest -v 2>&1 | sleuth parse --exit-code $?
    Parse(ParseArgs),

    /// Write an example project file
    Init {
        /// Where to write the file
        #[arg(long, default_value = "sleuth.json")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long, default_value = "false")]
        force: bool,
    },
}

/// Report format
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
}

/// Flags shared by `run` and `parse`
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Never contact a text-understanding service
    #[arg(long, default_value = "false", env = "SLEUTH_NO_LLM")]
    pub no_llm: bool,

    /// Maximum failures sent for analysis
    #[arg(long)]
    pub max_analyzed: Option<usize>,

    /// Maximum outstanding analysis requests
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Git ref to compare against for change context
    #[arg(long)]
    pub since: Option<String>,

    /// Skip git change context
    #[arg(long, default_value = "false")]
    pub no_git: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Arguments for `sleuth run`
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Test command to execute (overrides the project file)
    #[arg(long, env = "SLEUTH_COMMAND")]
    pub command: Option<String>,

    /// Directory to run the command in
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Timeout in seconds
    #[arg(long, env = "SLEUTH_TIMEOUT")]
    pub timeout: Option<u64>,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Arguments for `sleuth parse`
#[derive(Args, Debug, Clone, Default)]
pub struct ParseArgs {
    /// File holding the captured output (reads stdin when absent or "-")
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Exit code the test command returned
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub exit_code: i32,

    /// Command label shown to the parser
    #[arg(long)]
    pub command: Option<String>,

    /// Also analyze failing tests
    #[arg(long, default_value = "false")]
    pub analyze: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl Config {
    /// Get the log level based on verbose/quiet flags
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }

    /// The subcommand, with `run` as the default
    #[must_use]
    pub fn command_or_default(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Run(RunArgs::default()))
    }
}

/// Text-understanding provider named in the project file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// Local Ollama server
    Ollama,
    /// OpenRouter chat completions
    OpenRouter,
    /// No provider; heuristics only
    None,
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LlmProvider::Ollama => "ollama",
            LlmProvider::OpenRouter => "openrouter",
            LlmProvider::None => "none",
        })
    }
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(LlmProvider::Ollama),
            "openrouter" => Ok(LlmProvider::OpenRouter),
            "none" | "" => Ok(LlmProvider::None),
            _ => Err(ConfigError::UnknownProvider(s.to_string())),
        }
    }
}

/// `project` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectSection {
    /// Project name
    pub name: String,
    /// Language or framework hint for the parser
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Short description
    pub description: String,
}

/// `test` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestSection {
    /// Shell command that runs the tests
    pub command: String,
    /// Directory to run in, relative to the project root
    pub working_directory: PathBuf,
    /// Wall-clock limit
    pub timeout_seconds: u64,
    /// Extra environment variables
    pub environment: BTreeMap<String, String>,
}

impl Default for TestSection {
    fn default() -> Self {
        Self {
            command: "pytest -v".to_string(),
            working_directory: PathBuf::from("."),
            timeout_seconds: 300,
            environment: BTreeMap::new(),
        }
    }
}

/// `llm` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmSection {
    /// `ollama`, `openrouter` or `none`
    pub provider: String,
    /// Model name; provider default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Endpoint; provider default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Per-request timeout
    pub timeout_seconds: u64,
    /// Variable holding the API key (OpenRouter)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Hard cap on parse prompt size
    pub max_prompt_chars: usize,
    /// Output characters kept from the start
    pub head_chars: usize,
    /// Output characters always kept from the end
    pub tail_chars: usize,
}

impl Default for LlmSection {
    fn default() -> Self {
        let limits = PromptLimits::default();
        Self {
            provider: "ollama".to_string(),
            model: None,
            base_url: None,
            timeout_seconds: 120,
            api_key_env: None,
            max_prompt_chars: limits.max_prompt_chars,
            head_chars: limits.head_chars,
            tail_chars: limits.tail_chars,
        }
    }
}

/// `analysis` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSection {
    /// Failures sent to the text service per run
    pub max_analyzed: usize,
    /// Outstanding analysis requests
    pub max_concurrency: usize,
    /// Changed files listed per failure
    pub max_files: usize,
    /// Diff characters per file
    pub per_file_diff_chars: usize,
    /// Diff characters across files
    pub total_diff_chars: usize,
    /// Commit subjects listed
    pub max_commits: usize,
    /// Error text characters shown
    pub error_chars: usize,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        let limits = AnalysisLimits::default();
        Self {
            max_analyzed: DEFAULT_MAX_ANALYZED,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_files: limits.max_files,
            per_file_diff_chars: limits.per_file_diff_chars,
            total_diff_chars: limits.total_diff_chars,
            max_commits: limits.max_commits,
            error_chars: limits.error_chars,
        }
    }
}

/// `git` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitSection {
    /// Collect change context
    pub enabled: bool,
    /// Ref to compare against; the last commit when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_ref: Option<String>,
    /// Include staged, unstaged and untracked changes
    pub include_uncommitted: bool,
}

impl Default for GitSection {
    fn default() -> Self {
        Self {
            enabled: true,
            compare_ref: None,
            include_uncommitted: true,
        }
    }
}

/// Contents of a project file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Project metadata
    pub project: ProjectSection,
    /// Test execution
    pub test: TestSection,
    /// Text-understanding provider
    pub llm: LlmSection,
    /// Failure analysis limits
    pub analysis: AnalysisSection,
    /// Change context
    pub git: GitSection,
    /// Hints file, relative to the project root
    pub hints_file: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            project: ProjectSection::default(),
            test: TestSection::default(),
            llm: LlmSection::default(),
            analysis: AnalysisSection::default(),
            git: GitSection::default(),
            hints_file: PathBuf::from("HINTS.md"),
        }
    }
}

impl FileConfig {
    /// Parse a project file's text
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON or unknown keys.
    pub fn from_json(text: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The example written by `sleuth init`
    #[must_use]
    pub fn example() -> Self {
        let mut config = Self::default();
        config.project.name = "my-project".to_string();
        config.project.language = Some("python".to_string());
        config.project.description = "Short description given to the parser as context".to_string();
        config.llm.model = Some(DEFAULT_OLLAMA_MODEL.to_string());
        config.llm.base_url = Some(DEFAULT_OLLAMA_URL.to_string());
        config
    }

    /// Apply command-line overrides shared by `run` and `parse`
    pub fn apply_common(&mut self, args: &CommonArgs) {
        if args.no_llm {
            self.llm.provider = LlmProvider::None.to_string();
        }
        if let Some(n) = args.max_analyzed {
            self.analysis.max_analyzed = n;
        }
        if let Some(n) = args.concurrency {
            self.analysis.max_concurrency = n;
        }
        if let Some(since) = &args.since {
            self.git.compare_ref = Some(since.clone());
        }
        if args.no_git {
            self.git.enabled = false;
        }
    }

    /// Apply `sleuth run` overrides
    pub fn apply_run(&mut self, args: &RunArgs) {
        if let Some(command) = &args.command {
            self.test.command.clone_from(command);
        }
        if let Some(cwd) = &args.cwd {
            self.test.working_directory.clone_from(cwd);
        }
        if let Some(timeout) = args.timeout {
            self.test.timeout_seconds = timeout;
        }
        self.apply_common(&args.common);
    }

    /// Validate the configuration against a project root
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The test command is empty
    /// - The test or LLM timeout is zero
    /// - The analysis concurrency is zero
    /// - The prompt cap cannot hold the head, the tail and the prompt frame
    /// - The provider is unknown
    /// - The working directory does not exist
    pub fn validate(&self, root: &Path) -> Result<(), ConfigError> {
        if self.test.command.trim().is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        if self.test.timeout_seconds == 0 {
            return Err(ConfigError::ZeroTimeout("test.timeout_seconds"));
        }
        if self.llm.timeout_seconds == 0 {
            return Err(ConfigError::ZeroTimeout("llm.timeout_seconds"));
        }
        if self.analysis.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        let limits = self.prompt_limits();
        if !limits.is_consistent() {
            return Err(ConfigError::PromptCapTooSmall {
                max_prompt_chars: limits.max_prompt_chars,
                needed: limits
                    .head_chars
                    .saturating_add(limits.tail_chars)
                    .saturating_add(PROMPT_FRAME_RESERVE),
            });
        }
        self.llm.provider.parse::<LlmProvider>()?;

        let cwd = root.join(&self.test.working_directory);
        if !cwd.is_dir() {
            return Err(ConfigError::WorkingDirectoryNotFound(cwd));
        }
        Ok(())
    }

    fn prompt_limits(&self) -> PromptLimits {
        PromptLimits {
            max_prompt_chars: self.llm.max_prompt_chars,
            head_chars: self.llm.head_chars,
            tail_chars: self.llm.tail_chars,
        }
    }
}

/// Locate the nearest project file at or above `start`
#[must_use]
pub fn discover_config_file(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Load the project file and its root directory
///
/// An explicit path must exist. Without one, the nearest discovered file is
/// used, or defaults rooted at `cwd` when there is none.
///
/// # Errors
///
/// Returns `ConfigError::Read` or `ConfigError::Parse` when the file cannot
/// be read or parsed.
pub fn load_file_config(
    explicit: Option<&Path>,
    cwd: &Path,
) -> Result<(FileConfig, PathBuf), ConfigError> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => discover_config_file(cwd),
    };
    let Some(path) = path else {
        tracing::debug!(cwd = %cwd.display(), "no project file found; using defaults");
        return Ok((FileConfig::default(), cwd.to_path_buf()));
    };

    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let config = FileConfig::from_json(&text, &path)?;
    let root = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| cwd.to_path_buf(), Path::to_path_buf);
    tracing::debug!(path = %path.display(), root = %root.display(), "loaded project file");
    Ok((config, root))
}

/// Write the example project file
///
/// # Errors
///
/// Returns `ConfigError::AlreadyExists` when the file exists and `force` is
/// false, or `ConfigError::Write` when it cannot be written.
pub fn write_example(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    let mut text = serde_json::to_string_pretty(&FileConfig::example()).map_err(|source| {
        ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })?;
    text.push('\n');
    std::fs::write(path, text).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Merged, validated settings for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Directory holding the project file (or the invocation directory)
    pub project_root: PathBuf,
    /// Language hint for the parser
    pub language: Option<String>,
    /// Test command line
    pub command: String,
    /// Absolute working directory
    pub cwd: PathBuf,
    /// Test timeout
    pub timeout: Duration,
    /// Extra environment variables
    pub environment: BTreeMap<String, String>,
    /// Text-understanding provider
    pub provider: LlmProvider,
    /// Model name
    pub model: String,
    /// Provider endpoint
    pub base_url: String,
    /// Per-request timeout
    pub llm_timeout: Duration,
    /// Variable holding the API key
    pub api_key_env: String,
    /// Parse prompt limits
    pub prompt_limits: PromptLimits,
    /// Analysis prompt limits
    pub analysis_limits: AnalysisLimits,
    /// Failures sent to the text service
    pub max_analyzed: usize,
    /// Outstanding analysis requests
    pub max_concurrency: usize,
    /// Collect change context
    pub git_enabled: bool,
    /// Change-set extraction options
    pub changeset_options: ChangeSetOptions,
    /// Absolute hints file path
    pub hints_file: PathBuf,
}

impl Settings {
    /// Validate `file` and resolve it against `root`
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn resolve(file: &FileConfig, root: &Path) -> Result<Self, ConfigError> {
        file.validate(root)?;
        let provider: LlmProvider = file.llm.provider.parse()?;

        let (default_model, default_url) = match provider {
            LlmProvider::OpenRouter => (DEFAULT_OPENROUTER_MODEL, DEFAULT_OPENROUTER_URL),
            LlmProvider::Ollama | LlmProvider::None => (DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL),
        };

        let mut changeset_options = match &file.git.compare_ref {
            Some(reference) => ChangeSetOptions::since(reference),
            None => ChangeSetOptions::default(),
        }
        .with_max_commits(file.analysis.max_commits);
        if file.git.include_uncommitted {
            changeset_options = changeset_options.with_uncommitted();
        }

        Ok(Self {
            project_root: root.to_path_buf(),
            language: file.project.language.clone(),
            command: file.test.command.clone(),
            cwd: root.join(&file.test.working_directory),
            timeout: Duration::from_secs(file.test.timeout_seconds),
            environment: file.test.environment.clone(),
            provider,
            model: file.llm.model.clone().unwrap_or_else(|| default_model.to_string()),
            base_url: file.llm.base_url.clone().unwrap_or_else(|| default_url.to_string()),
            llm_timeout: Duration::from_secs(file.llm.timeout_seconds),
            api_key_env: file
                .llm
                .api_key_env
                .clone()
                .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
            prompt_limits: file.prompt_limits(),
            analysis_limits: AnalysisLimits {
                max_files: file.analysis.max_files,
                per_file_diff_chars: file.analysis.per_file_diff_chars,
                total_diff_chars: file.analysis.total_diff_chars,
                max_commits: file.analysis.max_commits,
                error_chars: file.analysis.error_chars,
            },
            max_analyzed: file.analysis.max_analyzed,
            max_concurrency: file.analysis.max_concurrency,
            git_enabled: file.git.enabled,
            changeset_options,
            hints_file: root.join(&file.hints_file),
        })
    }

    /// Build the configured text service
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::MissingApiKey` when OpenRouter is selected and
    /// its key variable is unset, or `ProviderError::Client` if the HTTP
    /// client cannot be built.
    pub fn text_service(&self) -> Result<Arc<dyn TextService>, ProviderError> {
        let service: Arc<dyn TextService> = match self.provider {
            LlmProvider::None => Arc::new(DisabledService),
            LlmProvider::Ollama => Arc::new(OllamaService::from_env_or(
                &self.base_url,
                self.model.clone(),
                self.llm_timeout,
            )?),
            LlmProvider::OpenRouter => Arc::new(OpenRouterService::from_env(
                &self.api_key_env,
                &self.base_url,
                self.model.clone(),
                self.llm_timeout,
            )?),
        };
        Ok(service)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Project file could not be read
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Project file is not valid
    #[error("Invalid project file {}: {source}", .path.display())]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// Example file could not be written
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Refusing to overwrite a project file
    #[error("{} already exists (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),

    /// Test command is empty
    #[error("Test command cannot be empty")]
    EmptyCommand,

    /// A timeout of zero seconds
    #[error("{0} must be at least 1 second")]
    ZeroTimeout(&'static str),

    /// Analysis concurrency of zero
    #[error("analysis.max_concurrency must be at least 1")]
    ZeroConcurrency,

    /// Prompt cap smaller than head + tail + frame
    #[error("llm.max_prompt_chars is {max_prompt_chars} but must be at least {needed}")]
    PromptCapTooSmall {
        /// Configured cap
        max_prompt_chars: usize,
        /// Smallest accepted cap
        needed: usize,
    },

    /// Provider name not recognised
    #[error("Unknown LLM provider {0:?} (expected ollama, openrouter or none)")]
    UnknownProvider(String),

    /// Working directory missing
    #[error("Working directory not found: {}", .0.display())]
    WorkingDirectoryNotFound(PathBuf),
}
