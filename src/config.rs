//! Configuration management for Cohort.
//!
//! This module defines the structure of the `cohort.toml` configuration file
//! and provides functionality to load and parse it.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Top-level configuration structure corresponding to `cohort.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Environment variables shared by every service.
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Setup commands, run to completion in order before the services start.
    #[serde(default)]
    pub before: Vec<ServiceConfig>,
    /// The supervised group, run concurrently.
    #[serde(rename = "service", default)]
    pub services: Vec<ServiceConfig>,
    /// Teardown commands, run in order once the group has stopped.
    #[serde(default)]
    pub after: Vec<ServiceConfig>,
}

/// Configuration for a single service.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Display name of the service, used as its log prefix.
    pub name: String,
    /// Command to execute.
    pub command: String,
    /// Working directory for the process.
    pub work_dir: Option<String>,
    /// Environment variables overriding the shared table for this service.
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

/// Loads and parses the configuration from a file path.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.services.is_empty() {
        bail!("no services defined (add at least one [[service]])");
    }
    let mut seen = HashSet::new();
    let all = config
        .before
        .iter()
        .chain(&config.services)
        .chain(&config.after);
    for service in all {
        if service.name.is_empty() {
            bail!("a service is missing a name");
        }
        if !seen.insert(service.name.as_str()) {
            bail!("duplicate service name `{}`", service.name);
        }
    }
    Ok(())
}
