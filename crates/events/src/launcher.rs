//! Starting bake workers and draining their output.
//!
//! A [`WorkerLauncher`] turns an argument list into a stream of
//! [`WorkerOutput`]: one `Line` per line the worker prints on either stdout
//! or stderr, then exactly one `Exited`. [`ProcessLauncher`] does this with
//! a real child process.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::error::RegistryError;

/// Raw output of a running worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutput {
    /// One line without its terminator.
    Line(String),
    /// The worker is gone; `None` when it was killed by a signal.
    Exited(Option<i32>),
}

pub type OutputReceiver = mpsc::UnboundedReceiver<WorkerOutput>;

pub trait WorkerLauncher: Send + Sync {
    /// Start one worker with `args`.
    ///
    /// Must be called from within a tokio runtime.
    fn launch(&self, args: Vec<String>) -> Result<OutputReceiver, RegistryError>;
}

// ---------------------------------------------------------------------------
// ProcessLauncher
// ---------------------------------------------------------------------------

/// Launches the worker binary as a child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    /// Appended after the per-task arguments of every launch.
    extra_args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run workers from `dir` instead of the service's working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, args: Vec<String>) -> Result<OutputReceiver, RegistryError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .args(&self.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(RegistryError::Spawn)?;
        tracing::debug!(program = %self.program.display(), pid = child.id(), "Worker spawned");

        let (tx, rx) = mpsc::unbounded_channel();
        let stdout_task = tokio::spawn(forward_lines(child.stdout.take(), tx.clone()));
        let stderr_task = tokio::spawn(forward_lines(child.stderr.take(), tx.clone()));

        tokio::spawn(async move {
            // Every line is forwarded before the exit notice.
            let _ = stdout_task.await;
            let _ = stderr_task.await;
            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to wait for worker");
                    None
                }
            };
            let _ = tx.send(WorkerOutput::Exited(code));
        });

        Ok(rx)
    }
}

/// Forward `handle` line by line until EOF. Invalid UTF-8 is replaced.
async fn forward_lines<R: AsyncRead + Unpin>(
    handle: Option<R>,
    tx: mpsc::UnboundedSender<WorkerOutput>,
) {
    let Some(handle) = handle else {
        return;
    };
    let mut reader = BufReader::new(handle);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if tx.send(WorkerOutput::Line(line.to_string())).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Worker output stream failed");
                break;
            }
        }
    }
}
