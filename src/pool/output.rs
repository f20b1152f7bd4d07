//! # Child output fanout.
//!
//! Binds a child's stdout/stderr to a set of sinks:
//!
//! - the parent's stderr, every line tagged `[name] |ServiceOut ▶▶▶|`;
//! - the service log file (append mode, verbatim lines), when configured;
//! - the parent's stdout (verbatim), for stdout only and only in raw mode.
//!
//! One pump task per stream reads lines until EOF; both pumps share the log
//! file so stdout and stderr interleave in arrival order.

use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::pool::Executable;

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stream {
    Stdout,
    Stderr,
}

/// Sink set shared by the stdout and stderr pumps of one child run.
pub(crate) struct OutputSinks {
    name: String,
    log_file: Option<Mutex<File>>,
    raw_stdout: bool,
}

impl OutputSinks {
    /// Opens the sinks for one run of `exe`.
    ///
    /// A log file that cannot be opened is logged and omitted for this run.
    pub(crate) async fn open(exe: &Executable) -> Self {
        let log_file = match exe.resolved_log_file() {
            Some(path) => {
                match OpenOptions::new().append(true).create(true).open(&path).await {
                    Ok(file) => Some(Mutex::new(file)),
                    Err(err) => {
                        warn!(
                            service = %exe.name,
                            path = %path.display(),
                            "failed to open log file, skipping sink: {err}"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        Self {
            name: exe.name.clone(),
            log_file,
            raw_stdout: exe.raw_output,
        }
    }

    async fn write_line(&self, stream: Stream, line: &str) {
        let tagged = format!("[{}] |ServiceOut ▶▶▶| {line}\n", self.name);
        let _ = tokio::io::stderr().write_all(tagged.as_bytes()).await;

        if let Some(file) = &self.log_file {
            let mut file = file.lock().await;
            let _ = file.write_all(line.as_bytes()).await;
            let _ = file.write_all(b"\n").await;
        }

        if self.raw_stdout && stream == Stream::Stdout {
            let mut stdout = tokio::io::stdout();
            let _ = stdout.write_all(line.as_bytes()).await;
            let _ = stdout.write_all(b"\n").await;
            let _ = stdout.flush().await;
        }
    }

    async fn flush(&self) {
        if let Some(file) = &self.log_file {
            let _ = file.lock().await.flush().await;
        }
    }
}

/// Spawns the line pumps for the child's piped streams.
///
/// The returned handles complete on EOF; joining them guarantees the log
/// file has been flushed.
pub(crate) fn spawn_pumps(child: &mut Child, sinks: Arc<OutputSinks>) -> Vec<JoinHandle<()>> {
    let mut pumps = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        pumps.push(tokio::spawn(pump(stdout, Arc::clone(&sinks), Stream::Stdout)));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.push(tokio::spawn(pump(stderr, Arc::clone(&sinks), Stream::Stderr)));
    }
    pumps
}

async fn pump<R: AsyncRead + Unpin>(reader: R, sinks: Arc<OutputSinks>, stream: Stream) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        sinks.write_line(stream, &line).await;
    }
    sinks.flush().await;
}
