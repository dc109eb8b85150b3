//! Process execution and supervision.
//!
//! This module contains the two execution strategies used by Cohort: running
//! a batch of commands strictly in order (`run_sequence`, for setup and
//! teardown phases) and running a group concurrently with fail-fast
//! semantics (`run_group`). The group supervisor starts every service in
//! list order, waits for the first one to exit for any reason, then stops
//! all the others and reports the triggering service's exit status.

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::logger::{LogSink, Prefixer};
use crate::process::CommandSpec;

/// How a supervised group ended: the service that exited first, and how.
#[derive(Debug)]
pub struct GroupOutcome {
    pub name: String,
    pub status: ExitStatus,
}

impl GroupOutcome {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// A started process, between spawn and observed termination.
struct Running {
    name: String,
    child: Child,
}

/// Completion report from a per-process monitor.
struct Exit {
    name: String,
    result: std::io::Result<ExitStatus>,
}

/// Runs each command to completion, strictly in list order.
///
/// The first launch failure or non-zero exit aborts the rest of the batch.
pub async fn run_sequence(specs: &[CommandSpec], sink: &LogSink) -> Result<(), Error> {
    for spec in specs {
        info!(service = %spec.name, "running");
        let mut running = spawn(spec, sink)?;
        let status = running.child.wait().await.map_err(|source| Error::Wait {
            name: running.name.clone(),
            source,
        })?;
        if !status.success() {
            return Err(Error::Failed {
                name: running.name,
                status,
            });
        }
    }
    Ok(())
}

/// Runs all commands concurrently and stops the whole group as soon as any
/// one of them exits.
///
/// Services start one at a time in list order; if a start fails, everything
/// already started is killed and the launch error is returned without
/// starting the remainder. Once all are running, the first exit (success or
/// failure) wins: every other service is force-killed and reaped, and the
/// triggering service's identity and exit status come back as the group
/// outcome.
pub async fn run_group(specs: &[CommandSpec], sink: &LogSink) -> Result<GroupOutcome, Error> {
    if specs.is_empty() {
        return Err(Error::EmptyGroup);
    }

    let mut started: Vec<Running> = Vec::with_capacity(specs.len());
    for spec in specs {
        match spawn(spec, sink) {
            Ok(running) => {
                info!(service = %running.name, pid = running.child.id().unwrap_or(0), "started");
                started.push(running);
            }
            Err(err) => {
                error!(error = %err, "start failed, stopping already-started services");
                for running in &mut started {
                    terminate(&running.name, &mut running.child);
                }
                for running in &mut started {
                    if let Err(wait_err) = running.child.wait().await {
                        warn!(service = %running.name, error = %wait_err, "failed to reap process");
                    }
                }
                return Err(err);
            }
        }
    }

    // Each monitor owns its child exclusively. The completion channel is
    // buffered to the group size so no monitor ever blocks on send, even
    // when several services exit at once.
    let total = started.len();
    let (exit_tx, mut exit_rx) = mpsc::channel::<Exit>(total);
    let (stop_tx, stop_rx) = watch::channel(false);
    for running in started {
        tokio::spawn(monitor(running, stop_rx.clone(), exit_tx.clone()));
    }
    drop(exit_tx);

    let Some(first) = exit_rx.recv().await else {
        return Err(Error::EmptyGroup);
    };
    match &first.result {
        Ok(status) => info!(service = %first.name, %status, "service exited, stopping the group"),
        Err(err) => warn!(service = %first.name, error = %err, "wait failed, stopping the group"),
    }

    // The stop order reaches every monitor still waiting; the triggering
    // service already exited and is never re-signaled. All remaining
    // completions are collected before returning, so no child outlives the
    // group.
    let _ = stop_tx.send(true);
    for _ in 1..total {
        match exit_rx.recv().await {
            Some(exit) => match exit.result {
                Ok(status) => debug!(service = %exit.name, %status, "stopped"),
                Err(err) => warn!(service = %exit.name, error = %err, "failed to reap process"),
            },
            None => break,
        }
    }

    match first.result {
        Ok(status) => Ok(GroupOutcome {
            name: first.name,
            status,
        }),
        Err(source) => Err(Error::Wait {
            name: first.name,
            source,
        }),
    }
}

/// Waits for one child and reports its exit, delivering the kill itself if
/// the stop order arrives first.
async fn monitor(mut running: Running, mut stop_rx: watch::Receiver<bool>, exit_tx: mpsc::Sender<Exit>) {
    let result = tokio::select! {
        result = running.child.wait() => result,
        _ = async { let _ = stop_rx.wait_for(|stop| *stop).await; } => {
            terminate(&running.name, &mut running.child);
            running.child.wait().await
        }
    };
    let _ = exit_tx.send(Exit {
        name: running.name,
        result,
    })
    .await;
}

// Termination is a forced stop. A graceful request-then-escalate protocol
// would slot in here without touching the group lifecycle above. A kill
// that fails (usually a process gone in the exit race) is logged and the
// drain carries on.
fn terminate(name: &str, child: &mut Child) {
    if let Err(err) = child.start_kill() {
        warn!(service = %name, error = %err, "failed to kill process");
    }
}

fn spawn(spec: &CommandSpec, sink: &LogSink) -> Result<Running, Error> {
    let mut command = Command::new(&spec.program);
    command.args(&spec.args);
    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }
    command.env_clear();
    command.envs(&spec.env);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command.kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| Error::Launch {
        name: spec.name.clone(),
        source,
    })?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, Prefixer::new(&spec.name, sink.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, Prefixer::new(&spec.name, sink.clone())));
    }

    Ok(Running {
        name: spec.name.clone(),
        child,
    })
}

async fn forward_lines<R>(reader: R, prefixer: Prefixer)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        prefixer.write_line(&line);
    }
}
