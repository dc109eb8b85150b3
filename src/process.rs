//! Building launchable command descriptors from service configuration.
//!
//! A `CommandSpec` is the fully resolved description of one service launch:
//! program, arguments, working directory, and composed environment. Building
//! performs no I/O; bad working directories and missing executables surface
//! later, when the runner spawns.

use std::collections::HashMap;

use crate::config::ServiceConfig;
use crate::env;
use crate::error::Error;

/// Fully resolved launch description for one service.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Service name, used as the log prefix and in diagnostics.
    pub name: String,
    /// The command executable.
    pub program: String,
    /// Arguments for the command.
    pub args: Vec<String>,
    /// Working directory, taken verbatim from the configuration.
    pub cwd: Option<String>,
    /// Composed environment: ambient, then shared table, then service table.
    pub env: HashMap<String, String>,
}

/// Builds one `CommandSpec` per service, in list order.
///
/// Fails on the first bad service, before anything in the batch is started.
pub fn build_specs(
    services: &[ServiceConfig],
    global_env: &HashMap<String, String>,
) -> Result<Vec<CommandSpec>, Error> {
    services
        .iter()
        .map(|service| build_spec(service, global_env))
        .collect()
}

fn build_spec(
    service: &ServiceConfig,
    global_env: &HashMap<String, String>,
) -> Result<CommandSpec, Error> {
    let mut parts = shell_words::split(&service.command).map_err(|source| Error::Command {
        name: service.name.clone(),
        source,
    })?;
    if parts.is_empty() {
        return Err(Error::EmptyCommand {
            name: service.name.clone(),
        });
    }
    let program = parts.remove(0);
    Ok(CommandSpec {
        name: service.name.clone(),
        program,
        args: parts,
        cwd: service.work_dir.clone(),
        env: env::compose(&[global_env, &service.environment]),
    })
}
