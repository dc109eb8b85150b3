//! Error types for building and running service batches.

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors produced while turning services into commands and running them.
#[derive(Debug, Error)]
pub enum Error {
    /// A service declared no command at all.
    #[error("service `{name}` has an empty command")]
    EmptyCommand { name: String },

    /// A service's command string could not be split into program + args.
    #[error("bad command for service `{name}`: {source}")]
    Command {
        name: String,
        #[source]
        source: shell_words::ParseError,
    },

    /// Spawning the process failed (missing executable, bad cwd, perms).
    #[error("failed to start service `{name}`: {source}")]
    Launch {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The OS wait on a running process failed.
    #[error("failed to wait on service `{name}`: {source}")]
    Wait {
        name: String,
        #[source]
        source: io::Error,
    },

    /// A process exited unsuccessfully.
    #[error("service `{name}` exited with {status}")]
    Failed { name: String, status: ExitStatus },

    /// A group run was requested with nothing to supervise.
    #[error("service group is empty")]
    EmptyGroup,
}
