//! Progress reporting and cancellation for streaming transfers.
//!
//! Progress is an optional bounded channel of cumulative byte counts. The
//! producer awaits each send, so a slow consumer suspends the transfer
//! instead of letting events pile up in memory. A consumer that hangs up
//! simply stops receiving; the transfer itself is unaffected.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Per-transfer options for push and pull.
#[derive(Clone, Debug, Default)]
pub struct TransferOptions {
    /// Receives the cumulative number of bytes transferred after each chunk.
    pub progress: Option<mpsc::Sender<u64>>,
    /// Cancels the transfer at the next chunk boundary.
    pub cancel: Option<CancellationToken>,
}

impl TransferOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, progress: mpsc::Sender<u64>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Fail with [`EngineError::Cancelled`] if cancellation was requested.
    pub(crate) fn check_cancelled(&self) -> EngineResult<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Report `cumulative` bytes, waiting until the consumer accepts it.
    ///
    /// Cancellation interrupts the wait.
    pub(crate) async fn report(&self, cumulative: u64) -> EngineResult<()> {
        let Some(progress) = &self.progress else {
            return Ok(());
        };
        let sent = match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(EngineError::Cancelled),
                sent = progress.send(cumulative) => sent,
            },
            None => progress.send(cumulative).await,
        };
        if sent.is_err() {
            debug!(cumulative, "progress receiver dropped; continuing without reports");
        }
        Ok(())
    }
}

/// Terminal status of a pull.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PullStatus {
    /// Every byte of the file was written to the sink.
    Completed { bytes: u64 },
    /// The caller cancelled after `bytes` had been written.
    Cancelled { bytes: u64 },
}

impl PullStatus {
    pub fn bytes(&self) -> u64 {
        match self {
            PullStatus::Completed { bytes } | PullStatus::Cancelled { bytes } => *bytes,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PullStatus::Completed { .. })
    }
}
