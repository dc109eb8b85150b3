//! Timestamped, prefixed output for service logs.
//!
//! All services share one destination stream. Each line is stamped with the
//! current wall-clock time and the service's `[name]` prefix, so output from
//! concurrently running processes stays attributable. Writes are serialized
//! per line behind a mutex; ordering across services is whatever the exit
//! races produce.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};

/// Cloneable handle to the shared output destination.
#[derive(Clone)]
pub struct LogSink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LogSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Sink writing to the supervisor's own standard error stream.
    pub fn stderr() -> Self {
        Self::new(Box::new(io::stderr()))
    }

    fn write_line(&self, line: &str) {
        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(writer, "{}", line);
    }
}

/// Write sink tagging every line with a timestamp and a fixed prefix.
pub struct Prefixer {
    prefix: String,
    sink: LogSink,
}

impl Prefixer {
    pub fn new(name: &str, sink: LogSink) -> Self {
        Self {
            prefix: format!("[{}]", name),
            sink,
        }
    }

    /// Forwards `line` to the destination as `<timestamp> <prefix> <line>`.
    pub fn write_line(&self, line: &str) {
        self.sink
            .write_line(&prefixed(&self.prefix, line, Utc::now()));
    }
}

fn prefixed(prefix: &str, line: &str, now: DateTime<Utc>) -> String {
    format!(
        "{} {} {}",
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
        prefix,
        line
    )
}
