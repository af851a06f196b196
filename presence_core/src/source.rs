//! Token sources feeding the processing loop.
//!
//! A source yields candidate strings without blocking the loop. The
//! listener backend reads newline-terminated scans on a background thread
//! (keyboard-wedge scanners, stdin, a pipe) and hands them over through a
//! bounded queue that drops new scans when full.

use crossbeam_channel::{bounded, Receiver, TryRecvError, TrySendError};
use std::collections::VecDeque;
use std::io::BufRead;
use std::thread::JoinHandle;

/// Produces candidate token strings
pub trait TokenSource {
    /// Next candidate if one is ready; never blocks
    fn poll_token(&mut self) -> Option<String>;

    /// Whether no candidate will ever arrive again
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Fixed sequence of candidates, for replays and tests
#[derive(Debug, Default)]
pub struct ScriptedSource {
    queue: VecDeque<String>,
}

impl ScriptedSource {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: candidates.into_iter().map(Into::into).collect(),
        }
    }

    pub fn push(&mut self, candidate: impl Into<String>) {
        self.queue.push_back(candidate.into());
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl TokenSource for ScriptedSource {
    fn poll_token(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    fn is_exhausted(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Consumer end of the listener hand-off queue
pub struct QueueSource {
    rx: Receiver<String>,
    handle: Option<JoinHandle<()>>,
}

impl TokenSource for QueueSource {
    fn poll_token(&mut self) -> Option<String> {
        match self.rx.try_recv() {
            Ok(token) => Some(token),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// The producer thread has stopped and the queue is drained
    fn is_exhausted(&self) -> bool {
        self.rx.is_empty() && self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

/// Spawn a background reader that pushes each non-empty line to a queue
///
/// The reader never waits on the queue: when `capacity` scans are already
/// pending the new one is dropped.
pub fn spawn_line_listener<R>(reader: R, capacity: usize) -> QueueSource
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = bounded(capacity.max(1));
    let handle = std::thread::spawn(move || {
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Scanner input failed: {}", e);
                    break;
                }
            };
            let candidate = line.trim();
            if candidate.is_empty() {
                continue;
            }
            match tx.try_send(candidate.to_owned()) {
                Ok(()) => {}
                Err(TrySendError::Full(dropped)) => {
                    tracing::warn!("Scan queue full, dropping {:?}", dropped);
                }
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
        tracing::debug!("Scanner input closed");
    });

    QueueSource {
        rx,
        handle: Some(handle),
    }
}
