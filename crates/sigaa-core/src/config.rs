//! Configuration types and loading for the application.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::paths::{expand_str_path, write_default_config};
use crate::portal::{DEFAULT_ALPHABET, Domain, ScanPolicy, SessionOptions};
use crate::{AppPaths, default_parallelism, env_prefix};

/// Portal queried when none is configured.
pub const DEFAULT_DOMAIN: &str = "sigaa.ufpi.br";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(
    title = "Application Configuration",
    description = "Main configuration for the application"
)]
pub struct AppConfig {
    /// JSON Schema reference for editor support.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub schema: Option<String>,

    /// Active configuration profile.
    #[schemars(default = "default_profile")]
    pub profile: String,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Portal instance and account.
    pub portal: PortalConfig,

    /// Runtime behavior configuration.
    pub runtime: RuntimeConfig,

    /// Directory enumeration settings.
    pub directory: DirectoryConfig,
}

fn default_profile() -> String {
    "default".to_string()
}

impl AppConfig {
    /// Override the profile if a value is provided.
    #[must_use]
    pub fn with_profile_override(mut self, profile: Option<String>) -> Self {
        if let Some(profile) = profile {
            self.profile = profile;
        }
        self
    }

    /// Load configuration from file and environment, creating defaults if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read, parsed, or written.
    pub fn load(paths: &AppPaths, dry_run: bool) -> Result<Self> {
        if !paths.config_file.exists() {
            if dry_run {
                log::info!(
                    "dry-run: would create default config at {}",
                    paths.config_file.display()
                );
            } else {
                write_default_config(&paths.config_file)?;
            }
        }

        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn load_from_path(config_file: &Path) -> Result<Self> {
        let env_prefix = env_prefix();
        let built = Config::builder()
            .set_default("profile", "default")?
            .set_default("logging.level", "info")?
            .set_default("portal.domain", DEFAULT_DOMAIN)?
            .set_default("portal.scheme", "https")?
            .set_default("runtime.parallelism", default_parallelism() as i64)?
            .set_default("directory.alphabet", DEFAULT_ALPHABET)?
            .set_default("directory.on_failure", "skip")?
            .add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix(env_prefix.as_str()).separator("__"))
            .build()?;

        let mut config: Self = built.try_deserialize()?;

        if let Some(ref file) = config.logging.file {
            let expanded = expand_str_path(file)?;
            config.logging.file = Some(expanded.display().to_string());
        }

        Ok(config)
    }

    /// Transport settings for portal sessions.
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            scheme: self.portal.scheme.clone(),
            user_agent: self.portal.user_agent.clone(),
            timeout: self.runtime.timeout.map(Duration::from_secs),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: None,
            profile: "default".to_string(),
            logging: LoggingConfig::default(),
            portal: PortalConfig::default(),
            runtime: RuntimeConfig::default(),
            directory: DirectoryConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Logging configuration")]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace).
    #[schemars(default = "default_log_level")]
    pub level: LogLevel,

    /// Optional path for log file output. Supports ~ and environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Log level enumeration for schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only emit error-level messages.
    Error,
    /// Emit warnings and errors.
    Warn,
    /// Emit informational messages and above (default).
    #[default]
    Info,
    /// Emit debug diagnostics and above.
    Debug,
    /// Emit all messages including fine-grained traces.
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

const fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
        }
    }
}

/// Portal instance and account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "SIGAA instance and account")]
pub struct PortalConfig {
    /// Host of the SIGAA instance, without scheme or path.
    pub domain: String,

    /// URL scheme (`https`; `http` only for local mirrors).
    pub scheme: String,

    /// Account used by commands that log in. The password is never read
    /// from this file; pass `--password` or set `SIGAA_PASSWORD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// `User-Agent` header override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl PortalConfig {
    /// The configured host, validated.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDomain`](crate::CoreError::InvalidDomain)
    /// if the value is not a bare host.
    pub fn domain(&self) -> crate::Result<Domain> {
        Domain::parse(&self.domain)
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            scheme: "https".to_string(),
            username: None,
            user_agent: None,
        }
    }
}

/// Runtime behavior configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Runtime behavior configuration")]
pub struct RuntimeConfig {
    /// Number of sessions used by a parallel directory scan. Defaults to
    /// logical CPU count when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub parallelism: Option<usize>,

    /// Per-request HTTP timeout in seconds. Unset means no timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub timeout: Option<u64>,
}

impl RuntimeConfig {
    /// Effective worker count, never zero.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.parallelism.unwrap_or_else(default_parallelism).max(1)
    }
}

/// Directory enumeration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Directory enumeration settings")]
pub struct DirectoryConfig {
    /// Symbols fed one at a time to the recipient search.
    pub alphabet: String,

    /// What to do when the search for one symbol fails.
    pub on_failure: ScanPolicy,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            alphabet: DEFAULT_ALPHABET.to_string(),
            on_failure: ScanPolicy::Skip,
        }
    }
}
