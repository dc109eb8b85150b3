//! Cohort: a fail-fast multi-process supervisor.
//!
//! This is the entry point of the application. It parses command-line
//! arguments, loads configuration, and drives the three phases: the
//! `before` batch strictly in order, the service group concurrently until
//! the first exit brings everything down, and the `after` batch in order
//! regardless of how the group ended.

mod config;
mod env;
mod error;
mod logger;
mod process;
mod runner;

use std::path::PathBuf;

use anyhow::Result;
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::Parser;
use tracing::{error, info};

use crate::config::Config;
use crate::error::Error;
use crate::logger::LogSink;

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "cohort",
    version,
    about = "Fail-fast multi-process supervisor",
    styles = help_styles()
)]
struct Cli {
    /// Path to cohort.toml configuration file.
    #[arg(long, default_value = "cohort.toml")]
    config: PathBuf,
    /// Extra KEY=VALUE entries merged over the shared [environment] table.
    #[arg(long)]
    env: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(&cli.config)?;
    for entry in &cli.env {
        let (key, value) = env::parse_entry(entry)?;
        cfg.environment.insert(key, value);
    }

    run(&cfg, LogSink::stderr()).await
}

/// Runs the full lifecycle described by a configuration.
///
/// All three batches are built up front, so a bad service definition aborts
/// before anything starts. A `before` failure skips both the services and
/// `after`; once the group has been attempted, `after` always runs, and a
/// teardown failure never hides the group's own failure.
async fn run(cfg: &Config, sink: LogSink) -> Result<()> {
    let before = process::build_specs(&cfg.before, &cfg.environment)?;
    let services = process::build_specs(&cfg.services, &cfg.environment)?;
    let after = process::build_specs(&cfg.after, &cfg.environment)?;

    runner::run_sequence(&before, &sink).await?;

    let group = runner::run_group(&services, &sink).await;
    let teardown = runner::run_sequence(&after, &sink).await;

    let group = group.and_then(|outcome| {
        info!(service = %outcome.name, status = %outcome.status, "service group stopped");
        if outcome.success() {
            Ok(())
        } else {
            Err(Error::Failed {
                name: outcome.name,
                status: outcome.status,
            })
        }
    });

    match (group, teardown) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(teardown_err)) => Err(teardown_err.into()),
        (Err(group_err), Ok(())) => Err(group_err.into()),
        (Err(group_err), Err(teardown_err)) => {
            error!(error = %teardown_err, "teardown failed");
            Err(group_err.into())
        }
    }
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Magenta.into())))
        .valid(Style::new().fg_color(Some(AnsiColor::Green.into())))
        .invalid(
            Style::new()
                .fg_color(Some(AnsiColor::Red.into()))
                .effects(Effects::BOLD),
        )
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use std::collections::HashMap;
    use std::path::Path;

    fn service(name: &str, command: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            command: command.to_string(),
            work_dir: None,
            environment: HashMap::new(),
        }
    }

    fn touch(name: &str, path: &Path) -> ServiceConfig {
        service(name, &format!(r#"sh -c "touch {}""#, path.display()))
    }

    fn null_sink() -> LogSink {
        LogSink::new(Box::new(std::io::sink()))
    }

    #[test]
    fn cli_parses_config_and_env_flags() {
        let cli =
            Cli::try_parse_from(["cohort", "--config", "x.toml", "--env", "A=1", "--env", "B=2"])
                .unwrap();
        assert_eq!(cli.config, PathBuf::from("x.toml"));
        assert_eq!(cli.env, vec!["A=1", "B=2"]);
    }

    #[tokio::test]
    async fn after_runs_even_when_the_group_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cleanup = dir.path().join("cleanup");
        let cfg = Config {
            environment: HashMap::new(),
            before: vec![touch("setup", &dir.path().join("setup"))],
            services: vec![service("boom", r#"sh -c "exit 1""#)],
            after: vec![touch("cleanup", &cleanup)],
        };
        let err = run(&cfg, null_sink()).await.unwrap_err();
        assert!(err.to_string().contains("boom"), "got: {err}");
        assert!(dir.path().join("setup").exists());
        assert!(cleanup.exists());
    }

    #[tokio::test]
    async fn before_failure_skips_services_and_after() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            environment: HashMap::new(),
            before: vec![service("setup", "false")],
            services: vec![touch("svc", &dir.path().join("svc"))],
            after: vec![touch("cleanup", &dir.path().join("cleanup"))],
        };
        let err = run(&cfg, null_sink()).await.unwrap_err();
        assert!(err.to_string().contains("setup"), "got: {err}");
        assert!(!dir.path().join("svc").exists());
        assert!(!dir.path().join("cleanup").exists());
    }

    #[tokio::test]
    async fn teardown_failure_does_not_mask_the_group_failure() {
        let cfg = Config {
            environment: HashMap::new(),
            before: vec![],
            services: vec![service("boom", r#"sh -c "exit 5""#)],
            after: vec![service("cleanup", r#"sh -c "exit 9""#)],
        };
        let err = run(&cfg, null_sink()).await.unwrap_err();
        assert!(err.to_string().contains("boom"), "got: {err}");
    }

    #[tokio::test]
    async fn teardown_failure_alone_is_still_reported() {
        let cfg = Config {
            environment: HashMap::new(),
            before: vec![],
            services: vec![service("svc", "true")],
            after: vec![service("cleanup", r#"sh -c "exit 9""#)],
        };
        let err = run(&cfg, null_sink()).await.unwrap_err();
        assert!(err.to_string().contains("cleanup"), "got: {err}");
    }

    #[tokio::test]
    async fn empty_command_aborts_before_anything_starts() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            environment: HashMap::new(),
            before: vec![touch("setup", &dir.path().join("setup"))],
            services: vec![service("empty", "")],
            after: vec![],
        };
        let err = run(&cfg, null_sink()).await.unwrap_err();
        assert!(err.to_string().contains("empty command"), "got: {err}");
        assert!(!dir.path().join("setup").exists());
    }

    #[tokio::test]
    async fn shared_environment_reaches_every_service() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut environment = HashMap::new();
        environment.insert("TARGET".to_string(), out.display().to_string());
        let cfg = Config {
            environment,
            before: vec![],
            services: vec![service("writer", r#"sh -c "echo done > $TARGET""#)],
            after: vec![],
        };
        run(&cfg, null_sink()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap().trim(), "done");
    }
}
