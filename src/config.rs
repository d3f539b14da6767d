//! Configuration module for sentinel-bench.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values. The defaults
//! reproduce the reference schedule: SET 10000, GET 10000, then concurrent
//! SET with 10, 50 and 100 clients of 1000 operations each against
//! localhost:8080.

use crate::connection::ConnectOptions;
use crate::protocol::Framing;
use crate::workload::Target;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the benchmark
#[derive(Parser, Debug)]
#[command(name = "sentinel-bench")]
#[command(version = "0.1.0")]
#[command(about = "Throughput benchmark for line-protocol key-value servers", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Server host name or address
    #[arg(long)]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Operations in the sequential SET workload (0 skips it)
    #[arg(long)]
    pub set_ops: Option<usize>,

    /// Operations in the sequential GET workload (0 skips it)
    #[arg(long)]
    pub get_ops: Option<usize>,

    /// Client counts for the concurrent workloads, e.g. 10,50,100
    #[arg(long, value_delimiter = ',')]
    pub clients: Option<Vec<usize>>,

    /// Operations per client in the concurrent workloads
    #[arg(long)]
    pub ops_per_client: Option<usize>,

    /// Connect timeout in milliseconds
    #[arg(long)]
    pub connect_timeout_ms: Option<u64>,

    /// Maximum wait for one reply in milliseconds
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    /// How replies are delimited in the byte stream
    #[arg(long, value_enum)]
    pub framing: Option<Framing>,

    /// Fail a workload when the server answers with an error reply
    /// (`--check-responses=false` turns off a file setting)
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub check_responses: Option<bool>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub workloads: WorkloadsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server connection settings
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default)]
    pub framing: Framing,
    #[serde(default)]
    pub check_responses: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_timeout_ms(),
            read_timeout_ms: default_timeout_ms(),
            framing: Framing::default(),
            check_responses: false,
        }
    }
}

/// Workload schedule
#[derive(Debug, Deserialize)]
pub struct WorkloadsConfig {
    #[serde(default = "default_ops")]
    pub set_ops: usize,
    #[serde(default = "default_ops")]
    pub get_ops: usize,
    #[serde(default = "default_concurrent")]
    pub concurrent: Vec<ConcurrentRun>,
}

impl Default for WorkloadsConfig {
    fn default() -> Self {
        Self {
            set_ops: default_ops(),
            get_ops: default_ops(),
            concurrent: default_concurrent(),
        }
    }
}

/// One concurrent SET batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ConcurrentRun {
    pub clients: usize,
    #[serde(default = "default_ops_per_client")]
    pub ops_per_client: usize,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_ops() -> usize {
    10_000
}

fn default_ops_per_client() -> usize {
    1000
}

fn default_concurrent() -> Vec<ConcurrentRun> {
    [10, 50, 100]
        .into_iter()
        .map(|clients| ConcurrentRun {
            clients,
            ops_per_client: default_ops_per_client(),
        })
        .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub framing: Framing,
    pub check_responses: bool,
    pub set_ops: usize,
    pub get_ops: usize,
    pub concurrent: Vec<ConcurrentRun>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::merge(CliArgs::parse_from(["sentinel-bench"]), TomlConfig::default())
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(CliArgs::parse())
    }

    /// Read the TOML file named by `cli` (if any), merge and validate.
    pub fn resolve(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let config = Self::merge(cli, toml_config);
        config.validate()?;
        Ok(config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let target = toml_config.target;
        let workloads = toml_config.workloads;

        let concurrent = match (cli.clients, cli.ops_per_client) {
            (Some(clients), ops) => clients
                .into_iter()
                .map(|clients| ConcurrentRun {
                    clients,
                    ops_per_client: ops.unwrap_or_else(default_ops_per_client),
                })
                .collect(),
            (None, Some(ops)) => workloads
                .concurrent
                .into_iter()
                .map(|run| ConcurrentRun {
                    ops_per_client: ops,
                    ..run
                })
                .collect(),
            (None, None) => workloads.concurrent,
        };

        Config {
            host: cli.host.unwrap_or(target.host),
            port: cli.port.unwrap_or(target.port),
            connect_timeout: Duration::from_millis(
                cli.connect_timeout_ms.unwrap_or(target.connect_timeout_ms),
            ),
            read_timeout: Duration::from_millis(
                cli.read_timeout_ms.unwrap_or(target.read_timeout_ms),
            ),
            framing: cli.framing.unwrap_or(target.framing),
            check_responses: cli.check_responses.unwrap_or(target.check_responses),
            set_ops: cli.set_ops.unwrap_or(workloads.set_ops),
            get_ops: cli.get_ops.unwrap_or(workloads.get_ops),
            concurrent,
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.read_timeout.is_zero() {
            return Err(ConfigError::Invalid("read timeout must be non-zero".to_string()));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "connect timeout must be non-zero".to_string(),
            ));
        }
        if let Some(run) = self.concurrent.iter().find(|run| run.clients == 0) {
            return Err(ConfigError::Invalid(format!(
                "concurrent run with {} ops per client has no clients",
                run.ops_per_client
            )));
        }
        Ok(())
    }

    /// Connection target derived from this configuration.
    pub fn target(&self) -> Target {
        Target {
            host: self.host.clone(),
            port: self.port,
            options: ConnectOptions {
                connect_timeout: self.connect_timeout,
                read_timeout: self.read_timeout,
                framing: self.framing,
            },
            check_responses: self.check_responses,
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
