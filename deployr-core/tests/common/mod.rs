#![allow(dead_code)]

use async_trait::async_trait;
use deployr_core::fs::FileSystem;
use deployr_core::process::OutputLine;
use deployr_core::trace::CollectingSink;
use deployr_core::{Invocation, OperationDriver, ProcessExit, ProcessRunner};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Pretends a fixed set of files exists.
#[derive(Default)]
pub struct StaticFileSystem {
    files: HashSet<PathBuf>,
}

impl StaticFileSystem {
    pub fn with_files<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
        }
    }
}

impl FileSystem for StaticFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        self.files.contains(path)
    }
}

/// Emits canned output and exits with a fixed status, recording invocations.
pub struct ScriptedRunner {
    lines: Vec<OutputLine>,
    exit: ProcessExit,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new(lines: Vec<OutputLine>, exit: ProcessExit) -> Arc<Self> {
        Arc::new(Self {
            lines,
            exit,
            invocations: Mutex::new(Vec::new()),
        })
    }

    pub fn exiting(code: i32) -> Arc<Self> {
        Self::new(Vec::new(), ProcessExit::Code(code))
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        output: mpsc::UnboundedSender<OutputLine>,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<ProcessExit> {
        self.invocations.lock().unwrap().push(invocation.clone());
        for line in &self.lines {
            output.send(line.clone())?;
            tokio::task::yield_now().await;
        }
        Ok(self.exit)
    }
}

/// Runs until cancelled, then takes a while to "terminate" before returning.
#[derive(Default)]
pub struct HangingRunner {
    pub started: AtomicBool,
    pub stopped: AtomicBool,
}

#[async_trait]
impl ProcessRunner for HangingRunner {
    async fn run(
        &self,
        _invocation: &Invocation,
        output: mpsc::UnboundedSender<OutputLine>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<ProcessExit> {
        self.started.store(true, Ordering::SeqCst);
        output.send(OutputLine::stdout("Applying image"))?;
        cancel.cancelled().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.stopped.store(true, Ordering::SeqCst);
        Ok(ProcessExit::Cancelled)
    }
}

pub fn driver_with(
    runner: Arc<dyn ProcessRunner>,
    fs: StaticFileSystem,
) -> (OperationDriver, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::new());
    let driver = OperationDriver::new(runner)
        .with_file_system(Arc::new(fs))
        .with_trace_sink(sink.clone());
    (driver, sink)
}
