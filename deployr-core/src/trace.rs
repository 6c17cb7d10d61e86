//! Diagnostic trace sinks.
//!
//! Operations never log through a global facade directly. They report
//! [`TraceEvent`]s to an injected [`TraceSink`], which lets tests observe what
//! happened without installing a `tracing` subscriber. [`TracingSink`] is the
//! default and forwards everything to `tracing`.
use crate::operation::OperationKind;
use crate::process::ProcessExit;
use crate::progress::{ProgressEvent, ProgressObserver};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info, trace, warn};

/// A diagnostic fact recorded during an operation.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceEvent {
    CheckingImage { path: PathBuf, index: u32 },
    ImageFound { path: PathBuf },
    Starting {
        operation: OperationKind,
        command_line: String,
    },
    Output {
        operation: OperationKind,
        event: ProgressEvent,
    },
    Exited {
        operation: OperationKind,
        exit: ProcessExit,
    },
    /// `started` is `false` when the process was never spawned.
    Cancelled {
        operation: OperationKind,
        started: bool,
    },
}

/// Receives diagnostic events. Implementations must not fail or block.
pub trait TraceSink: Send + Sync {
    fn record(&self, event: &TraceEvent);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn record(&self, _event: &TraceEvent) {}
}

/// Forwards events to the `tracing` facade with structured fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn record(&self, event: &TraceEvent) {
        match event {
            TraceEvent::CheckingImage { path, index } => {
                trace!(path = %path.display(), index, "Checking image");
            }
            TraceEvent::ImageFound { path } => {
                trace!(path = %path.display(), "Image file exists");
            }
            TraceEvent::Starting {
                operation,
                command_line,
            } => {
                info!(operation = %operation, command = %command_line, "Starting imaging utility");
            }
            TraceEvent::Output { operation, event } => {
                trace!(
                    operation = %operation,
                    stream = %event.stream,
                    sequence = event.sequence,
                    "{}",
                    event.text
                );
            }
            TraceEvent::Exited { operation, exit } => match exit {
                ProcessExit::Code(0) => debug!(operation = %operation, "Imaging utility finished"),
                other => warn!(operation = %operation, exit = %other, "Imaging utility failed"),
            },
            TraceEvent::Cancelled { operation, started } => {
                warn!(operation = %operation, started, "Operation cancelled");
            }
        }
    }
}

/// Keeps every event in memory. Meant for tests and embedding applications
/// that want to show a diagnostic log after the fact.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<TraceEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.lock().clone()
    }

    /// Returns the text of every recorded output line, in order.
    pub fn output_lines(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Output { event, .. } => Some(event.text.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TraceEvent>> {
        // A panic while pushing cannot leave the Vec half-written.
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TraceSink for CollectingSink {
    fn record(&self, event: &TraceEvent) {
        self.lock().push(event.clone());
    }
}

/// Subscribes a trace sink to a progress relay, so that output lines of
/// operations without a caller observer end up in the diagnostic trace.
pub(crate) struct TraceObserver<'a> {
    pub(crate) sink: &'a dyn TraceSink,
    pub(crate) operation: OperationKind,
}

impl ProgressObserver for TraceObserver<'_> {
    fn on_progress(&self, event: &ProgressEvent) {
        self.sink.record(&TraceEvent::Output {
            operation: self.operation,
            event: event.clone(),
        });
    }
}
