//! `load_config` module: loads the optional YAML run configuration and the
//! account secrets from the environment.
//!
//! # Responsibilities
//! - Parse a user-supplied YAML file into [`PublishConfig`]; every section is
//!   optional and falls back to built-in defaults
//! - Validate configured template overrides before any network traffic
//! - Read `ATP_HANDLE` / `ATP_PASSWORD` (a `.env` file is honoured by `main`)
//!
//! # Errors
//! All errors use `anyhow::Error` with context naming the file or variable,
//! and are surfaced at the CLI boundary as fatal setup failures.
use anyhow::{anyhow, Context, Result};
use spinglass_publish_core::config::PublishConfig;
use spinglass_publish_core::templates::TemplateRegistry;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const HANDLE_VAR: &str = "ATP_HANDLE";
pub const PASSWORD_VAR: &str = "ATP_PASSWORD";

/// Account secrets; never read from the config file.
#[derive(Clone)]
pub struct Credentials {
    pub handle: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("handle", &self.handle)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Load the run configuration. `None` yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<PublishConfig> {
    let config = match path {
        None => {
            info!("No config file given, using defaults");
            PublishConfig::default()
        }
        Some(path) => read_config_file(path)?,
    };

    TemplateRegistry::with_overrides(&config.announcement.templates)
        .context("Invalid announcement template in config")?;

    config.trace_loaded();
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<PublishConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => {
            info!(config_path = ?path, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path, e));
        }
    };

    // An empty file parses as YAML null; treat it as "all defaults".
    if content.trim().is_empty() {
        return Ok(PublishConfig::default());
    }

    match serde_yaml::from_str::<PublishConfig>(&content) {
        Ok(config) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(config)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow!("Failed to parse config YAML {:?}: {e}", path))
        }
    }
}

/// Read the account secrets from the environment.
pub fn load_credentials() -> Result<Credentials> {
    let handle = required_var(HANDLE_VAR)?;
    let password = required_var(PASSWORD_VAR)?;
    info!(handle = %handle, "Loaded credentials from environment");
    Ok(Credentials { handle, password })
}

fn required_var(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        Ok(_) => {
            error!(var = key, "Environment variable is empty");
            Err(anyhow!("{key} is set but empty"))
        }
        Err(e) => {
            error!(var = key, error = ?e, "Environment variable missing");
            Err(anyhow!("{key} must be set in the environment or .env"))
        }
    }
}
