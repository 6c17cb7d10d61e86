//! Forwarding of the imaging utility's output to a progress observer.
//!
//! Each operation creates its own [`ProgressRelay`] right before the external
//! process starts. The process runner pushes every line it reads into the
//! relay's channel; the relay hands each line to the subscribed observer in
//! arrival order and keeps a bounded transcript for error reports. The relay
//! is consumed by [`ProgressRelay::pump`], which returns only once every sender
//! has been dropped, so no line can reach the observer after the operation has
//! completed.
use crate::process::{OutputLine, OutputStream};
use std::collections::VecDeque;
use tokio::sync::mpsc;

/// One line of output from the imaging utility.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Position of the line within its operation, starting at 0.
    pub sequence: u64,
    pub stream: OutputStream,
    pub text: String,
}

impl ProgressEvent {
    /// Best-effort extraction of a completion percentage from the line.
    ///
    /// DISM draws `[====  45.0%  ]` and wimlib prints `(27%) done`. Lines are
    /// otherwise opaque, so `None` is the common answer.
    pub fn percentage(&self) -> Option<f32> {
        let end = self.text.rfind('%')?;
        let head = &self.text[..end];
        let start = head
            .char_indices()
            .rev()
            .find(|&(_, c)| !(c.is_ascii_digit() || c == '.'))
            .map_or(0, |(i, c)| i + c.len_utf8());

        head[start..]
            .parse::<f32>()
            .ok()
            .filter(|value| (0.0..=100.0).contains(value))
    }
}

/// Receives progress lines while an operation runs.
///
/// Called synchronously from the operation's task; keep it cheap.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// The last `capacity` lines of combined output.
#[derive(Debug, Default)]
pub struct Transcript {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Transcript {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    pub fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_text(self) -> String {
        Vec::from(self.lines).join("\n")
    }
}

/// A single-subscriber relay scoped to one operation.
pub struct ProgressRelay<'a> {
    observer: &'a dyn ProgressObserver,
    receiver: mpsc::UnboundedReceiver<OutputLine>,
    transcript: Transcript,
    next_sequence: u64,
}

impl<'a> ProgressRelay<'a> {
    /// Subscribes `observer` and returns the sender the process runner writes to.
    pub fn subscribe(
        observer: &'a dyn ProgressObserver,
        transcript_lines: usize,
    ) -> (Self, mpsc::UnboundedSender<OutputLine>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let relay = Self {
            observer,
            receiver,
            transcript: Transcript::with_capacity(transcript_lines),
            next_sequence: 0,
        };
        (relay, sender)
    }

    /// Forwards lines until every sender is gone, then returns the transcript.
    pub async fn pump(mut self) -> Transcript {
        while let Some(line) = self.receiver.recv().await {
            let event = ProgressEvent {
                sequence: self.next_sequence,
                stream: line.stream,
                text: line.text,
            };
            self.next_sequence += 1;
            self.observer.on_progress(&event);
            self.transcript.push(event.text);
        }
        self.transcript
    }
}
