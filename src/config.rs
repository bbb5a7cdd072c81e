//! Configuration module for the stress service.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// What to do when the UDP memory probe receives anything but `memsize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MemsizePolicy {
    /// Log the violation and abort the process.
    Abort,
    /// Reply with an explicit protocol error and keep serving.
    ErrorReply,
}

/// Command-line arguments for the stress service
#[derive(Parser, Debug)]
#[command(name = "stress-service")]
#[command(author = "stress-service authors")]
#[command(version = "0.1.0")]
#[command(about = "HTTP, UDP echo and memory-probe stress service", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address every endpoint binds to (e.g., 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// TCP port serving the HTML page
    #[arg(long)]
    pub http_port: Option<u16>,

    /// UDP echo port
    #[arg(long)]
    pub echo_port: Option<u16>,

    /// TCP memory-probe port
    #[arg(long)]
    pub mem_tcp_port: Option<u16>,

    /// UDP memory-probe port
    #[arg(long)]
    pub mem_udp_port: Option<u16>,

    /// Maximum bytes taken from a connection in one read
    #[arg(long)]
    pub read_size: Option<usize>,

    /// Seconds between status reports
    #[arg(long)]
    pub status_interval: Option<u64>,

    /// Maximum number of open TCP connections
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Reaction to a UDP memory probe that is not `memsize`
    #[arg(long, value_enum)]
    pub memsize_policy: Option<MemsizePolicy>,

    /// Seed for the page colour generator (defaults to the boot clock)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ports: PortsConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub memprobe: MemprobeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Maximum number of open TCP connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Per-connection read chunk size
    #[serde(default = "default_read_size")]
    pub read_size: usize,
    /// Page colour generator seed
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            max_connections: default_max_connections(),
            read_size: default_read_size(),
            seed: None,
        }
    }
}

/// Port assignments. TCP and UDP port spaces are independent, so the
/// memory probe uses 4243 on both.
#[derive(Debug, Deserialize)]
pub struct PortsConfig {
    #[serde(default = "default_http_port")]
    pub http: u16,
    #[serde(default = "default_echo_port")]
    pub echo: u16,
    #[serde(default = "default_mem_port")]
    pub mem_tcp: u16,
    #[serde(default = "default_mem_port")]
    pub mem_udp: u16,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            http: default_http_port(),
            echo: default_echo_port(),
            mem_tcp: default_mem_port(),
            mem_udp: default_mem_port(),
        }
    }
}

/// Status reporter configuration
#[derive(Debug, Deserialize)]
pub struct StatusConfig {
    /// Seconds between reports
    #[serde(default = "default_status_interval")]
    pub interval: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            interval: default_status_interval(),
        }
    }
}

/// Memory probe configuration
#[derive(Debug, Deserialize)]
pub struct MemprobeConfig {
    #[serde(default = "default_memsize_policy")]
    pub policy: MemsizePolicy,
}

impl Default for MemprobeConfig {
    fn default() -> Self {
        Self {
            policy: default_memsize_policy(),
        }
    }
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
    "0.0.0.0".to_string()
}

fn default_max_connections() -> usize {
    1024
}

fn default_read_size() -> usize {
    1024
}

fn default_http_port() -> u16 {
    80
}

fn default_echo_port() -> u16 {
    4242
}

fn default_mem_port() -> u16 {
    4243
}

fn default_status_interval() -> u64 {
    10
}

fn default_memsize_policy() -> MemsizePolicy {
    MemsizePolicy::Abort
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub echo_port: u16,
    pub mem_tcp_port: u16,
    pub mem_udp_port: u16,
    pub read_size: usize,
    pub status_interval: Duration,
    pub max_connections: usize,
    pub memsize_policy: MemsizePolicy,
    pub seed: Option<u64>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config).validate()
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            http_port: cli.http_port.unwrap_or(toml_config.ports.http),
            echo_port: cli.echo_port.unwrap_or(toml_config.ports.echo),
            mem_tcp_port: cli.mem_tcp_port.unwrap_or(toml_config.ports.mem_tcp),
            mem_udp_port: cli.mem_udp_port.unwrap_or(toml_config.ports.mem_udp),
            read_size: cli.read_size.unwrap_or(toml_config.server.read_size),
            status_interval: Duration::from_secs(
                cli.status_interval.unwrap_or(toml_config.status.interval),
            ),
            max_connections: cli
                .max_connections
                .unwrap_or(toml_config.server.max_connections),
            memsize_policy: cli.memsize_policy.unwrap_or(toml_config.memprobe.policy),
            seed: cli.seed.or(toml_config.server.seed),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.read_size == 0 {
            return Err(ConfigError::Invalid("read_size must be greater than 0"));
        }
        if self.status_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "status interval must be at least one second",
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid("max_connections must be greater than 0"));
        }
        Ok(self)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(&'static str),
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
            ConfigError::Invalid(reason) => write!(f, "Invalid configuration: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
impl Config {
    /// Loopback configuration with ephemeral ports, for tests.
    pub fn for_tests() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            http_port: 0,
            echo_port: 0,
            mem_tcp_port: 0,
            mem_udp_port: 0,
            read_size: default_read_size(),
            status_interval: Duration::from_secs(default_status_interval()),
            max_connections: 64,
            memsize_policy: MemsizePolicy::ErrorReply,
            seed: Some(7),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.read_size, 1024);
        assert_eq!(config.ports.http, 80);
        assert_eq!(config.ports.echo, 4242);
        assert_eq!(config.ports.mem_tcp, 4243);
        assert_eq!(config.ports.mem_udp, 4243);
        assert_eq!(config.status.interval, 10);
        assert_eq!(config.memprobe.policy, MemsizePolicy::Abort);
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            host = "10.0.0.42"
            max_connections = 16
            read_size = 512
            seed = 99

            [ports]
            http = 8080
            mem_udp = 4244

            [status]
            interval = 2

            [memprobe]
            policy = "error-reply"

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.host, "10.0.0.42");
        assert_eq!(config.server.max_connections, 16);
        assert_eq!(config.server.read_size, 512);
        assert_eq!(config.server.seed, Some(99));
        assert_eq!(config.ports.http, 8080);
        assert_eq!(config.ports.echo, 4242);
        assert_eq!(config.ports.mem_tcp, 4243);
        assert_eq!(config.ports.mem_udp, 4244);
        assert_eq!(config.status.interval, 2);
        assert_eq!(config.memprobe.policy, MemsizePolicy::ErrorReply);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let cli = CliArgs::parse_from([
            "stress-service",
            "--http-port",
            "8000",
            "--memsize-policy",
            "error-reply",
            "--log-level",
            "trace",
        ]);
        let toml_config: TomlConfig = toml::from_str("[ports]\nhttp = 9000\necho = 5000").unwrap();

        let config = Config::merge(cli, toml_config);
        assert_eq!(config.http_port, 8000);
        assert_eq!(config.echo_port, 5000);
        assert_eq!(config.memsize_policy, MemsizePolicy::ErrorReply);
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.status_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = Config::for_tests();
        config.read_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::for_tests();
        config.status_interval = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        assert!(Config::for_tests().validate().is_ok());
    }
}
