//! The shared invocation protocol behind every imaging operation.
//!
//! Apply, capture, and the two driver operations all follow the same steps:
//! refuse to start if cancellation was already requested, subscribe a
//! [`ProgressRelay`], run the utility while pumping its output to the
//! observer, then classify how it ended. Only the argument list differs, and
//! that is built by the backend before calling [`OperationDriver::run`].
use crate::error::{DeployError, Result};
use crate::fs::{FileSystem, LocalFileSystem};
use crate::process::{Invocation, ProcessExit, ProcessRunner};
use crate::progress::{ProgressObserver, ProgressRelay};
use crate::trace::{TraceEvent, TraceObserver, TraceSink, TracingSink};
use crate::validate::Validator;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DEFAULT_TRANSCRIPT_LINES: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    ApplyImage,
    CaptureImage,
    AddDriver,
    RemoveDriver,
}

impl OperationKind {
    /// The phrase used when describing a failure of this operation.
    pub fn context(self) -> &'static str {
        match self {
            Self::ApplyImage => "image application",
            Self::CaptureImage => "image capture",
            Self::AddDriver => "deployment",
            Self::RemoveDriver => "removal",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ApplyImage => "apply-image",
            Self::CaptureImage => "capture-image",
            Self::AddDriver => "add-driver",
            Self::RemoveDriver => "remove-driver",
        })
    }
}

/// Caller-supplied hooks for one operation: where progress goes and how to
/// stop it.
#[derive(Clone)]
pub struct OperationContext {
    progress: Option<Arc<dyn ProgressObserver>>,
    cancel: CancellationToken,
}

impl Default for OperationContext {
    fn default() -> Self {
        Self {
            progress: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.progress = Some(observer);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn progress(&self) -> Option<&dyn ProgressObserver> {
        self.progress.as_deref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationContext")
            .field("progress", &self.progress.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Runs imaging utility invocations and turns their outcome into a [`Result`].
///
/// Holds the collaborators every operation needs. Cloning is cheap and clones
/// share the same runner, filesystem, and trace sink.
#[derive(Clone)]
pub struct OperationDriver {
    runner: Arc<dyn ProcessRunner>,
    fs: Arc<dyn FileSystem>,
    trace: Arc<dyn TraceSink>,
    transcript_lines: usize,
}

impl OperationDriver {
    /// A driver on the host filesystem that traces through `tracing`.
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            fs: Arc::new(LocalFileSystem),
            trace: Arc::new(TracingSink),
            transcript_lines: DEFAULT_TRANSCRIPT_LINES,
        }
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_trace_sink(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_transcript_lines(mut self, lines: usize) -> Self {
        self.transcript_lines = lines;
        self
    }

    pub fn validator(&self) -> Validator<'_> {
        Validator::new(self.fs.as_ref(), self.trace.as_ref())
    }

    /// Runs one invocation of the utility named `tool`.
    ///
    /// Output lines go to `observer`, or to the trace sink when there is none.
    /// Returns only after the process has stopped and its last output line has
    /// been delivered.
    ///
    /// # Errors
    ///
    /// - [`DeployError::Cancelled`] if `cancel` fired before or during the run.
    /// - [`DeployError::Deployment`] on any non-zero exit code.
    /// - [`DeployError::Terminated`] if the process died without an exit code.
    /// - [`DeployError::Runner`] if the process could not be run at all.
    pub async fn run(
        &self,
        operation: OperationKind,
        tool: &str,
        invocation: Invocation,
        observer: Option<&dyn ProgressObserver>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            self.trace.record(&TraceEvent::Cancelled {
                operation,
                started: false,
            });
            return Err(DeployError::Cancelled { operation });
        }

        let trace_observer = TraceObserver {
            sink: self.trace.as_ref(),
            operation,
        };
        let observer: &dyn ProgressObserver = match observer {
            Some(observer) => observer,
            None => &trace_observer,
        };
        let (relay, sender) = ProgressRelay::subscribe(observer, self.transcript_lines);

        self.trace.record(&TraceEvent::Starting {
            operation,
            command_line: invocation.to_string(),
        });

        let (exit, transcript) =
            tokio::join!(self.runner.run(&invocation, sender, cancel), relay.pump());

        let exit = exit.map_err(|source| DeployError::Runner { operation, source })?;
        self.trace.record(&TraceEvent::Exited { operation, exit });

        let output = transcript.into_text();
        match exit {
            ProcessExit::Code(0) => Ok(()),
            ProcessExit::Code(exit_code) => Err(DeployError::Deployment {
                operation,
                tool: tool.to_string(),
                exit_code,
                output,
            }),
            ProcessExit::Signal => Err(DeployError::Terminated {
                operation,
                tool: tool.to_string(),
                output,
            }),
            ProcessExit::Cancelled => {
                self.trace.record(&TraceEvent::Cancelled {
                    operation,
                    started: true,
                });
                Err(DeployError::Cancelled { operation })
            }
        }
    }
}

impl fmt::Debug for OperationDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDriver")
            .field("transcript_lines", &self.transcript_lines)
            .finish_non_exhaustive()
    }
}
