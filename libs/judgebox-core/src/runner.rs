/// Process Runner - spawn, feed, time-limit and collect one child process
///
/// **Guarantees:**
/// - stdin is written from its own task and always closed, so programs that
///   read until EOF never hang on an empty input
/// - stdout and stderr are drained while the child runs, so a chatty program
///   cannot deadlock on a full pipe
/// - on timeout the child (and its process group on Unix) is killed and reaped;
///   output produced before the kill is kept
/// - once the child is gone the rest of its process group is killed too, so
///   background helpers never outlive the call or hold the pipes open
/// - `kill_on_drop` terminates the child if the caller's future is cancelled
///
/// There is no global lock here. Bounding concurrency is the executor's job.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ExecutionError;
use crate::types::ExecutionResult;

/// How long to keep reading pipes after the child is gone. Covers helpers that
/// inherited the pipes and outlive the direct child.
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Program plus arguments, built up by the toolchain adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(&mut self, a: impl Into<OsString>) -> &mut Self {
        self.args.push(a.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

impl fmt::Display for ProcessCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run `command` in `working_dir`, feeding it `stdin`, for at most `limit`.
    ///
    /// Only failures to start or wait on the process are errors; non-zero exits
    /// and timeouts are reported in the returned [`ExecutionResult`].
    pub async fn spawn(
        &self,
        command: &ProcessCommand,
        working_dir: &Path,
        stdin: &str,
        limit: Duration,
    ) -> Result<ExecutionResult, ExecutionError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so a timeout can take down compiler helpers too
        #[cfg(unix)]
        cmd.process_group(0);

        debug!(command = %command, cwd = %working_dir.display(), "Spawning process");

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            ExecutionError::InternalError(format!(
                "Failed to start '{}': {}",
                command.program_name(),
                e
            ))
        })?;

        let group = child.id();
        let writer = feed_stdin(&mut child, stdin.as_bytes().to_vec());
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let (status, timed_out) = match tokio::time::timeout(limit, child.wait()).await {
            Ok(Ok(status)) => (Some(status), false),
            Ok(Err(e)) => {
                terminate(&mut child, group).await;
                return Err(ExecutionError::InternalError(format!(
                    "Failed to wait for '{}': {}",
                    command.program_name(),
                    e
                )));
            }
            Err(_) => {
                warn!(
                    command = %command.program_name(),
                    limit_ms = limit.as_millis() as u64,
                    "Process exceeded time limit, killing"
                );
                (terminate(&mut child, group).await, true)
            }
        };
        let duration = start.elapsed();

        // Leftover group members would keep running and keep the pipes open
        kill_group(group);

        writer.abort();
        let stdout = collect(stdout_reader).await;
        let stderr = collect(stderr_reader).await;

        let (exit_code, signal) = match status {
            Some(status) => (status.code(), termination_signal(&status)),
            None => (None, None),
        };

        debug!(
            command = %command.program_name(),
            exit_code = ?exit_code,
            signal = ?signal,
            timed_out,
            duration_ms = duration.as_millis() as u64,
            "Process finished"
        );

        Ok(ExecutionResult {
            stdout,
            stderr,
            exit_code: if timed_out { None } else { exit_code },
            signal: if timed_out { None } else { signal },
            timed_out,
            duration,
        })
    }
}

fn feed_stdin(child: &mut Child, input: Vec<u8>) -> JoinHandle<()> {
    let pipe = child.stdin.take();
    tokio::spawn(async move {
        let Some(mut pipe) = pipe else { return };
        if !input.is_empty() {
            // The child may exit without reading everything; a broken pipe is not our failure
            if let Err(e) = pipe.write_all(&input).await {
                debug!(error = %e, "Child stopped reading stdin");
                return;
            }
        }
        let _ = pipe.shutdown().await;
        // dropping `pipe` closes it
    })
}

/// Output reader for one pipe. Chunks are forwarded as they arrive so that
/// whatever was read survives even if the reader has to be abandoned.
struct Drain {
    chunks: mpsc::UnboundedReceiver<Vec<u8>>,
    task: JoinHandle<()>,
}

fn drain<R>(pipe: Option<R>) -> Drain
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, chunks) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let Some(mut pipe) = pipe else { return };
        let mut buf = vec![0u8; 8192];
        loop {
            match pipe.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Error reading child output");
                    break;
                }
            }
        }
    });
    Drain { chunks, task }
}

async fn collect(mut drain: Drain) -> String {
    let mut bytes = Vec::new();
    let deadline = tokio::time::Instant::now() + PIPE_DRAIN_GRACE;

    loop {
        match tokio::time::timeout_at(deadline, drain.chunks.recv()).await {
            Ok(Some(chunk)) => bytes.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(_) => {
                drain.task.abort();
                while let Ok(chunk) = drain.chunks.try_recv() {
                    bytes.extend_from_slice(&chunk);
                }
                warn!("Output pipe still open after process exit, keeping what was read");
                break;
            }
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

/// SIGKILL the process group led by the child. A no-op once the group is empty.
#[cfg(unix)]
fn kill_group(group: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = group else { return };
    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => debug!(pgid, error = %e, "killpg failed"),
    }
}

#[cfg(not(unix))]
fn kill_group(_group: Option<u32>) {}

/// Kill the child and everything in its process group, then reap it.
async fn terminate(child: &mut Child, group: Option<u32>) -> Option<ExitStatus> {
    kill_group(group);

    if let Err(e) = child.start_kill() {
        debug!(error = %e, "Child already exited before kill");
    }
    match child.wait().await {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(error = %e, "Failed to reap killed process");
            None
        }
    }
}

#[cfg(unix)]
fn termination_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
