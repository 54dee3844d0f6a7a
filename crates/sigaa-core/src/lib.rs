//! Core library for sigaa - automation of the SIGAA academic portal.
//!
//! This crate provides:
//! - Configuration loading and management
//! - XDG-compliant path resolution
//! - Schema and example config generation
//! - Portal sessions, authentication and JSF token tracking
//! - The mailbox workflow: recipient search, directory enumeration, sending
//! - Common types and error handling

pub mod config;
pub mod error;
pub mod paths;
pub mod portal;
pub mod schema;

pub use config::{
    AppConfig, DEFAULT_DOMAIN, DirectoryConfig, LogLevel, LoggingConfig, PortalConfig,
    RuntimeConfig,
};
pub use error::{CoreError, Result};
pub use paths::{AppPaths, default_config_dir};
pub use portal::{
    AuthManager, AuthState, DirectoryScan, Domain, Draft, Mailbox, PageOutcome, PortalSession,
    Recipient, ScanPolicy, SessionOptions, TokenPair, WorkflowStage,
};
pub use schema::{generate_example_config, generate_schema};

/// Application name used for config directories and environment prefix.
pub const APP_NAME: &str = "sigaa";

/// Returns the environment variable prefix for this application.
#[must_use]
pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Returns the default parallelism based on available CPU cores.
#[must_use]
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map_or(1, std::num::NonZero::get)
}
