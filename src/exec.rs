//! Blocking-call adapter.
//!
//! Everything that can stall the async scheduler (child processes, disk
//! walks, OS shell-open calls) goes through this module. Subprocesses are
//! spawned with `kill_on_drop` so a dropped or timed-out call never leaves
//! an orphan behind.

use crate::error::ToolError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// One subprocess invocation: program, argument vector, optional bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The command as a single display string, e.g. `shutdown /s /t 0`.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Best message to show when the command failed.
    pub fn failure_message(&self) -> String {
        if !self.stderr.is_empty() {
            self.stderr.clone()
        } else if !self.stdout.is_empty() {
            self.stdout.clone()
        } else {
            match self.exit_code {
                Some(code) => format!("exited with code {}", code),
                None => "terminated by signal".to_string(),
            }
        }
    }
}

/// Runs a subprocess to completion and captures its output.
///
/// The timeout covers the whole call, including draining output pipes that
/// a background grandchild may still hold open. On timeout, or when the
/// returned future is dropped, the child and every process it started are
/// killed.
pub async fn run_command(spec: &CommandSpec) -> Result<CommandOutput, ToolError> {
    debug!("Running command: {}", spec.display());

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // The child leads its own process group so descendants can be signalled together.
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command
        .spawn()
        .map_err(|e| ToolError::from_io(&format!("Failed to start {}", spec.program), &e))?;
    let mut tree = ProcessTree::new(child.id());

    let mut stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let mut stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    let finished = async {
        let status = child.wait().await;
        let stdout = (&mut stdout_task).await.unwrap_or_default();
        let stderr = (&mut stderr_task).await.unwrap_or_default();
        (status, stdout, stderr)
    };

    let (status, stdout, stderr) = match spec.timeout {
        Some(limit) => match tokio::time::timeout(limit, finished).await {
            Ok(finished) => finished,
            Err(_) => {
                warn!("⏱️  {} exceeded {:?}, terminating", spec.program, limit);
                tree.kill();
                if let Err(e) = child.kill().await {
                    debug!("{} already exited: {}", spec.program, e);
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(ToolError::Timeout {
                    operation: spec.program.clone(),
                    after: limit,
                });
            }
        },
        None => finished.await,
    };
    tree.release();

    let status = status
        .map_err(|e| ToolError::execution(format!("Failed to wait for {}: {}", spec.program, e)))?;

    Ok(CommandOutput {
        exit_code: status.code(),
        stdout,
        stderr,
    })
}

/// Kills a child's whole process tree when dropped, unless released.
struct ProcessTree {
    root: Option<u32>,
}

impl ProcessTree {
    fn new(root: Option<u32>) -> Self {
        Self { root }
    }

    fn release(&mut self) {
        self.root = None;
    }

    fn kill(&mut self) {
        if let Some(root) = self.root.take() {
            kill_process_tree(root);
        }
    }
}

impl Drop for ProcessTree {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Signals the process group led by `root`.
#[cfg(unix)]
fn kill_process_tree(root: u32) {
    let group = format!("-{}", root);
    signal_tree(std::process::Command::new("kill").args(["-KILL", "--", group.as_str()]), root);
}

/// Terminates `root` and its descendants.
#[cfg(windows)]
fn kill_process_tree(root: u32) {
    let pid = root.to_string();
    signal_tree(
        std::process::Command::new("taskkill").args(["/T", "/F", "/PID", pid.as_str()]),
        root,
    );
}

#[cfg(not(any(unix, windows)))]
fn kill_process_tree(_root: u32) {}

#[cfg(any(unix, windows))]
fn signal_tree(command: &mut std::process::Command, root: u32) {
    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => debug!("Killed process tree {}", root),
        Ok(status) => debug!("Process tree {} was already gone ({})", root, status),
        Err(e) => warn!("Failed to kill process tree {}: {}", root, e),
    }
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf).await {
            debug!("Output stream closed early: {}", e);
        }
    }
    String::from_utf8_lossy(&buf).trim().to_string()
}

/// Runs a blocking closure on the blocking thread pool.
///
/// A panic inside `work` comes back as an execution error. When `timeout`
/// elapses the worker thread is left to finish on its own and its result is
/// discarded.
pub async fn run_blocking<T, F>(
    operation: &str,
    timeout: Option<Duration>,
    work: F,
) -> Result<T, ToolError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ToolError> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(work);

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("⏱️  {} exceeded {:?}, abandoning worker", operation, limit);
                return Err(ToolError::Timeout {
                    operation: operation.to_string(),
                    after: limit,
                });
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(ToolError::execution(format!(
            "{} failed unexpectedly",
            operation
        ))),
        Err(_) => Err(ToolError::execution(format!("{} was cancelled", operation))),
    }
}

/// Starts a program without waiting for it. Returns the child's pid.
pub fn spawn_detached(program: &Path, args: &[String]) -> Result<u32, ToolError> {
    let child = std::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            ToolError::from_io(&format!("Failed to launch {}", program.display()), &e)
        })?;
    Ok(child.id())
}

/// Executes command specs on behalf of handlers.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, ToolError>;
}

/// Runs commands on the host via [`run_command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, ToolError> {
        run_command(&spec).await
    }
}

/// Fire-and-forget launch requests. Success means the request was issued,
/// not that the target is now running.
pub trait Launcher: Send + Sync {
    /// Opens a file, folder, or URL with the system default handler.
    fn open(&self, target: &str) -> Result<(), ToolError>;

    /// Starts an executable with arguments.
    fn spawn(&self, program: &Path, args: &[String]) -> Result<(), ToolError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn open(&self, target: &str) -> Result<(), ToolError> {
        open::that_detached(target)
            .map_err(|e| ToolError::execution(format!("Could not open {}: {}", target, e)))
    }

    fn spawn(&self, program: &Path, args: &[String]) -> Result<(), ToolError> {
        let pid = spawn_detached(program, args)?;
        debug!("Launched {} (pid {})", program.display(), pid);
        Ok(())
    }
}
