//! Progress reporting and cooperative cancellation for parsers.
//!
//! Parsers poll a [`ProgressHandler`] at line or record boundaries. The
//! handler answers whether the caller asked to stop and receives the
//! cumulative number of bytes consumed from the input.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Collaborator notified while a parse makes forward progress.
///
/// Callbacks run on the parsing thread and must not block.
pub trait ProgressHandler: Send + Sync {
    /// Whether the caller has requested the parse to stop.
    fn is_cancelled(&self) -> bool;

    /// Called with the cumulative number of bytes read so far.
    fn notify_progress(&self, bytes_read: u64);
}

/// Shared abort flag. Clones observe the same flag, so one clone can be
/// handed to a worker while another stays with whoever may cancel.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl ProgressHandler for CancellationToken {
    fn is_cancelled(&self) -> bool {
        CancellationToken::is_cancelled(self)
    }

    fn notify_progress(&self, _bytes_read: u64) {}
}

/// Folds the per-file byte counts of parallel parses into one running
/// total, so the wrapped handler only ever sees that total grow.
pub struct CombinedProgress<'a> {
    inner: &'a dyn ProgressHandler,
    total: Mutex<u64>,
}

impl<'a> CombinedProgress<'a> {
    pub fn new(inner: &'a dyn ProgressHandler) -> Self {
        CombinedProgress {
            inner,
            total: Mutex::new(0),
        }
    }

    /// Handler for one file; hand each parse its own.
    pub fn file(&self) -> FileProgress<'_> {
        FileProgress {
            combined: self,
            last: AtomicU64::new(0),
        }
    }

    fn add(&self, delta: u64) {
        // held across the callback so totals reach it in order
        let mut total = self.total.lock().unwrap_or_else(PoisonError::into_inner);
        *total += delta;
        self.inner.notify_progress(*total);
    }
}

pub struct FileProgress<'a> {
    combined: &'a CombinedProgress<'a>,
    last: AtomicU64,
}

impl ProgressHandler for FileProgress<'_> {
    fn is_cancelled(&self) -> bool {
        self.combined.inner.is_cancelled()
    }

    fn notify_progress(&self, bytes_read: u64) {
        let previous = self.last.swap(bytes_read, Ordering::SeqCst);
        self.combined.add(bytes_read.saturating_sub(previous));
    }
}

/// Byte counter around a reader.
pub struct ProgressTrackingReader<R> {
    inner: R,
    bytes_read: u64,
}

impl<R: Read> ProgressTrackingReader<R> {
    pub fn new(inner: R) -> Self {
        ProgressTrackingReader {
            inner,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ProgressTrackingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}
