use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration structure for the AZC fixer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Workspace layout
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// External compile/build commands
    #[serde(default)]
    pub toolchain: ToolchainConfig,

    /// Remote worker endpoint and polling behaviour
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Loop bounds
    #[serde(default)]
    pub convergence: ConvergenceConfig,

    /// Build output handling
    #[serde(default)]
    pub build: BuildConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Workspace layout. Relative paths resolve against `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkspaceConfig {
    /// Workspace root containing `src/`, `helper/`, `log/` and `backups/`
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,

    /// TypeSpec source directory (the mutable source tree)
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// File the worker rewrites, relative to `source_dir`
    #[serde(default = "default_target_file")]
    pub target_file: String,

    /// Read-only main specification, relative to `source_dir`
    #[serde(default = "default_main_file")]
    pub main_file: String,

    /// Directory with the fixed build templates
    #[serde(default = "default_helper_dir")]
    pub helper_dir: PathBuf,

    /// Generated SDK output directory
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Violation logs and build log
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Source tree snapshots
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Project template copied over the generated project file
    #[serde(default = "default_csproj_template")]
    pub csproj_template: String,

    /// Package feed configuration copied next to the generated project file
    #[serde(default = "default_nuget_config")]
    pub nuget_config: String,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("src")
}

fn default_target_file() -> String {
    "client.tsp".to_string()
}

fn default_main_file() -> String {
    "main.tsp".to_string()
}

fn default_helper_dir() -> PathBuf {
    PathBuf::from("helper")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("final-output")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("log")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_csproj_template() -> String {
    "Azure.ResourceManager.csproj".to_string()
}

fn default_nuget_config() -> String {
    "Nuget.config".to_string()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            source_dir: default_source_dir(),
            target_file: default_target_file(),
            main_file: default_main_file(),
            helper_dir: default_helper_dir(),
            output_dir: default_output_dir(),
            log_dir: default_log_dir(),
            backup_dir: default_backup_dir(),
            csproj_template: default_csproj_template(),
            nuget_config: default_nuget_config(),
        }
    }
}

impl WorkspaceConfig {
    /// Resolve a workspace-relative path against the root.
    pub fn resolve(&self, path: impl AsRef<std::path::Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn source_path(&self) -> PathBuf {
        self.resolve(&self.source_dir)
    }

    pub fn target_path(&self) -> PathBuf {
        self.source_path().join(&self.target_file)
    }

    pub fn main_path(&self) -> PathBuf {
        self.source_path().join(&self.main_file)
    }
}

/// External compile and build commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ToolchainConfig {
    #[serde(default = "default_compile_program")]
    pub compile_program: String,

    /// `{output_dir}` is replaced with the configured output directory
    #[serde(default = "default_compile_args")]
    pub compile_args: Vec<String>,

    #[serde(default = "default_build_program")]
    pub build_program: String,

    #[serde(default = "default_build_args")]
    pub build_args: Vec<String>,
}

fn default_compile_program() -> String {
    "npx".to_string()
}

fn default_compile_args() -> Vec<String> {
    ["tsp", "compile", "./src", "--output-dir", "{output_dir}"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_build_program() -> String {
    "dotnet".to_string()
}

fn default_build_args() -> Vec<String> {
    vec!["build".to_string(), "--no-incremental".to_string()]
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            compile_program: default_compile_program(),
            compile_args: default_compile_args(),
            build_program: default_build_program(),
            build_args: default_build_args(),
        }
    }
}

/// Remote worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Project endpoint, e.g. `https://<resource>.services.ai.azure.com/api/projects/<project>`
    #[serde(default)]
    pub endpoint: String,

    /// `api-version` query parameter
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Static bearer token (can also be set via AZC_FIXER_WORKER__API_KEY)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// How bearer tokens are obtained
    #[serde(default)]
    pub auth: AuthConfig,

    /// Model deployment name
    #[serde(default = "default_model")]
    pub model: String,

    /// Display name of the agent created per session
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    /// Seconds between job status polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Polls before a job is declared timed out
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Seconds to wait for indexing before polling the index
    #[serde(default = "default_index_delay_secs")]
    pub index_delay_secs: u64,

    /// Extra attempts at the full session setup sequence
    #[serde(default = "default_session_retries")]
    pub session_retries: u32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Delete leftover agents, threads, indexes and files at startup
    #[serde(default = "default_true")]
    pub purge_on_start: bool,

    /// Retry policy for transient HTTP failures
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_agent_name() -> String {
    "AZC Fixer".to_string()
}

const fn default_poll_interval_secs() -> u64 {
    5
}

const fn default_max_poll_attempts() -> u32 {
    60
}

const fn default_index_delay_secs() -> u64 {
    10
}

const fn default_session_retries() -> u32 {
    2
}

const fn default_timeout_secs() -> u64 {
    120
}

const fn default_true() -> bool {
    true
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_version: default_api_version(),
            api_key: None,
            auth: AuthConfig::default(),
            model: default_model(),
            agent_name: default_agent_name(),
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_attempts: default_max_poll_attempts(),
            index_delay_secs: default_index_delay_secs(),
            session_retries: default_session_retries(),
            timeout_secs: default_timeout_secs(),
            purge_on_start: default_true(),
            retry: RetryConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn index_delay(&self) -> Duration {
        Duration::from_secs(self.index_delay_secs)
    }
}

/// Source of the bearer token sent to the worker endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// `api_key` when set, otherwise the Azure CLI
    #[default]
    Auto,
    /// Always the static `api_key`
    ApiKey,
    /// Entra ID tokens from `az account get-access-token`, refreshed before expiry
    AzureCli,
}

/// Token acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuthConfig {
    #[serde(default)]
    pub method: AuthMethod,

    /// Azure CLI executable
    #[serde(default = "default_cli_program")]
    pub cli_program: String,

    /// Resource the token is requested for
    #[serde(default = "default_resource")]
    pub resource: String,

    /// Seconds before expiry at which a cached token is replaced
    #[serde(default = "default_refresh_margin_secs")]
    pub refresh_margin_secs: u32,
}

fn default_cli_program() -> String {
    "az".to_string()
}

fn default_resource() -> String {
    "https://ai.azure.com".to_string()
}

const fn default_refresh_margin_secs() -> u32 {
    300
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            method: AuthMethod::default(),
            cli_program: default_cli_program(),
            resource: default_resource(),
            refresh_margin_secs: default_refresh_margin_secs(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    2_000
}

const fn default_max_backoff_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Convergence loop bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConvergenceConfig {
    /// Outer remediation iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Compile-recovery rounds per outer iteration
    #[serde(default = "default_max_recovery_attempts")]
    pub max_recovery_attempts: u32,
}

const fn default_max_iterations() -> u32 {
    5
}

const fn default_max_recovery_attempts() -> u32 {
    3
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_recovery_attempts: default_max_recovery_attempts(),
        }
    }
}

/// Build output handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BuildConfig {
    /// Collapse repeated identical violation lines (first occurrence wins)
    #[serde(default = "default_true")]
    pub dedup_violations: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dedup_violations: default_true(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling JSON log files (stdout only when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Rotation for file logs: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
