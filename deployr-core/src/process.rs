//! Running the external imaging utility.
//!
//! The orchestration code only depends on the [`ProcessRunner`] trait: start a
//! command, push its output lines into a channel, honor a cancellation token,
//! and resolve to how the process ended. [`TokioProcessRunner`] is the
//! implementation used in production.
use crate::platform;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// A command line for the imaging utility.
///
/// Arguments are kept exactly as the utility expects them, including any
/// embedded quotes; see [`platform::append_args`] for how they reach the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The arguments joined by single spaces.
    pub fn arguments(&self) -> String {
        self.args.join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// A line read from one of the process's output channels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

impl OutputLine {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stderr,
            text: text.into(),
        }
    }
}

/// How the external process ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessExit {
    Code(i32),
    /// The process was killed from outside without reporting an exit code.
    Signal,
    /// The process was terminated because cancellation was requested.
    Cancelled,
}

impl From<std::process::ExitStatus> for ProcessExit {
    fn from(status: std::process::ExitStatus) -> Self {
        match status.code() {
            Some(code) => Self::Code(code),
            None => Self::Signal,
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit code {}", code),
            Self::Signal => f.write_str("terminated by signal"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Starts a process, streams its output, and waits for it to stop.
///
/// Implementations must:
/// - send every output line of both channels to `output`, in arrival order;
/// - drop every clone of `output` before returning;
/// - when `cancel` fires, terminate the process along with any helpers it
///   started, and return [`ProcessExit::Cancelled`] only after it has
///   actually exited;
/// - return an error only once the process is no longer running.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        invocation: &Invocation,
        output: mpsc::UnboundedSender<OutputLine>,
        cancel: &CancellationToken,
    ) -> Result<ProcessExit>;
}

/// Runs the utility as a child process using `tokio::process`.
#[derive(Clone, Debug)]
pub struct TokioProcessRunner {
    termination_grace: Duration,
}

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl TokioProcessRunner {
    /// `termination_grace` is how long a cancelled process gets to exit on
    /// its own before it is killed.
    pub fn new(termination_grace: Duration) -> Self {
        Self { termination_grace }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        output: mpsc::UnboundedSender<OutputLine>,
        cancel: &CancellationToken,
    ) -> Result<ProcessExit> {
        let mut command = Command::new(&invocation.program);
        platform::append_args(&mut command, &invocation.args);
        platform::isolate(&mut command);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start {}", invocation.program.display()))?;

        let readers: Vec<JoinHandle<()>> = [
            child
                .stdout
                .take()
                .map(|stdout| tokio::spawn(forward_lines(stdout, OutputStream::Stdout, output.clone()))),
            child
                .stderr
                .take()
                .map(|stderr| tokio::spawn(forward_lines(stderr, OutputStream::Stderr, output))),
        ]
        .into_iter()
        .flatten()
        .collect();

        let exit = tokio::select! {
            status = child.wait() => {
                status
                    .map(ProcessExit::from)
                    .context("failed to wait for the imaging utility")
            }
            _ = cancel.cancelled() => {
                warn!(program = %invocation.program.display(), "Cancellation requested, terminating process");
                platform::terminate(&mut child, self.termination_grace)
                    .await
                    .map(|()| ProcessExit::Cancelled)
                    .context("failed to terminate the imaging utility")
            }
        };

        if exit.is_err() {
            // The error is only reported once the child is gone.
            if let Err(e) = child.kill().await {
                warn!(program = %invocation.program.display(), "Failed to kill process: {}", e);
            }
        }

        // A normal exit drains the pipes to the end. After termination a
        // helper outside our reach may still hold them open, so the drain is
        // bounded.
        let drain_limit = match exit {
            Ok(ProcessExit::Code(_) | ProcessExit::Signal) => None,
            _ => Some(self.termination_grace),
        };
        join_readers(readers, drain_limit).await;

        exit
    }
}

/// Waits for the output readers so every line is delivered before the caller
/// classifies the result.
///
/// With a `limit`, a reader still blocked after that long is aborted, which
/// drops its sender.
async fn join_readers(readers: Vec<JoinHandle<()>>, limit: Option<Duration>) {
    for mut reader in readers {
        let joined = match limit {
            None => reader.await,
            Some(limit) => match tokio::time::timeout(limit, &mut reader).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(?limit, "Output pipe still open after termination, abandoning reader");
                    reader.abort();
                    continue;
                }
            },
        };
        if let Err(e) = joined {
            warn!("Output reader task failed: {}", e);
        }
    }
}

/// Reads `reader` to the end and forwards each non-empty line.
///
/// Lines are split on `\n` and `\r` because DISM redraws its progress bar
/// with carriage returns. Output is decoded lossily.
async fn forward_lines<R>(reader: R, stream: OutputStream, output: mpsc::UnboundedSender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) => break,
            Ok(_) => {
                for segment in buffer.split(|&b| b == b'\n' || b == b'\r') {
                    if segment.is_empty() {
                        continue;
                    }
                    let text = String::from_utf8_lossy(segment).into_owned();
                    if output.send(OutputLine { stream, text }).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(%stream, "Failed to read process output: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_renders_arguments_verbatim() {
        let invocation = Invocation::new(
            "dism",
            ["/Add-Driver", "/Image:D:\\", "/Driver:\"C:\\drivers\"", "/Recurse"],
        );
        assert_eq!(
            invocation.arguments(),
            "/Add-Driver /Image:D:\\ /Driver:\"C:\\drivers\" /Recurse"
        );
        assert_eq!(
            invocation.to_string(),
            "dism /Add-Driver /Image:D:\\ /Driver:\"C:\\drivers\" /Recurse"
        );
    }

    #[tokio::test]
    async fn forward_lines_splits_on_carriage_returns() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let data: &[u8] = b"first\r\n[==  10.0%  ]\r[====  20.0%  ]\r\nlast";

        forward_lines(data, OutputStream::Stdout, sender).await;

        let mut lines = Vec::new();
        while let Some(line) = receiver.recv().await {
            lines.push(line.text);
        }
        assert_eq!(lines, vec!["first", "[==  10.0%  ]", "[====  20.0%  ]", "last"]);
    }

    #[tokio::test]
    async fn spawn_failure_is_an_error() {
        let runner = TokioProcessRunner::default();
        let (sender, _receiver) = mpsc::unbounded_channel();
        let invocation = Invocation::new("nonexistent_imaging_tool_12345", Vec::<String>::new());

        let result = runner
            .run(&invocation, sender, &CancellationToken::new())
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reports_exit_code_and_both_streams() {
        let runner = TokioProcessRunner::default();
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let invocation = Invocation::new("sh", ["-c", "echo out; echo err >&2; exit 3"]);

        let exit = runner
            .run(&invocation, sender, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(exit, ProcessExit::Code(3));

        let mut lines = Vec::new();
        while let Some(line) = receiver.recv().await {
            lines.push(line);
        }
        assert!(lines.contains(&OutputLine::stdout("out")));
        assert!(lines.contains(&OutputLine::stderr("err")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_waits_for_the_process_to_exit() {
        let runner = TokioProcessRunner::new(Duration::from_secs(2));
        let (sender, mut receiver) = mpsc::unbounded_channel::<OutputLine>();
        let invocation = Invocation::new("sh", ["-c", "echo started; exec sleep 30"]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        let watcher = tokio::spawn(async move {
            while let Some(line) = receiver.recv().await {
                if line.text == "started" {
                    trigger.cancel();
                }
            }
        });

        let started = std::time::Instant::now();
        let exit = runner.run(&invocation, sender, &cancel).await.unwrap();

        assert_eq!(exit, ProcessExit::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
        watcher.await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_reaches_forked_helpers() {
        // Without `exec` the shell forks `sleep`, which inherits both pipes.
        let runner = TokioProcessRunner::new(Duration::from_millis(200));
        let (sender, mut receiver) = mpsc::unbounded_channel::<OutputLine>();
        let invocation = Invocation::new("sh", ["-c", "echo started; sleep 6; echo done"]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        let watcher = tokio::spawn(async move {
            let mut lines = Vec::new();
            while let Some(line) = receiver.recv().await {
                if line.text == "started" {
                    trigger.cancel();
                }
                lines.push(line.text);
            }
            lines
        });

        let started = std::time::Instant::now();
        let exit = runner.run(&invocation, sender, &cancel).await.unwrap();

        assert_eq!(exit, ProcessExit::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
        assert_eq!(watcher.await.unwrap(), vec!["started"]);
    }

    #[tokio::test]
    async fn bounded_join_abandons_a_blocked_reader() {
        let (sender, mut receiver) = mpsc::unbounded_channel::<OutputLine>();
        let blocked = tokio::spawn(async move {
            let _sender = sender;
            std::future::pending::<()>().await;
        });

        let started = std::time::Instant::now();
        join_readers(vec![blocked], Some(Duration::from_millis(50))).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        // The aborted reader's sender is gone, so the channel closes.
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn panicking_reader_does_not_fail_the_join() {
        let finished = tokio::spawn(async {});
        let panicked: JoinHandle<()> = tokio::spawn(async {
            panic!("reader failed");
        });

        join_readers(vec![panicked, finished], None).await;
    }
}
