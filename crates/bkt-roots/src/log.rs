//! The append-only root log ("thread").
//!
//! Every committed root change is appended here and fanned out to live
//! subscribers over a broadcast channel. Subscribers that fall behind lose
//! the oldest events (they observe `RecvError::Lagged`) instead of blocking
//! writers; they can catch up from the retained log with [`RootLog::since`].

use bkt_types::{BucketId, ContentId};
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::{RootEvent, RootEventKind};

/// A broadcast channel receiver for root events.
pub type RootEventStream = broadcast::Receiver<RootEvent>;

/// Default capacity of the live subscription channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Append-only log of root changes with live fan-out.
#[derive(Debug)]
pub struct RootLog {
    events: Vec<RootEvent>,
    sender: broadcast::Sender<RootEvent>,
}

impl RootLog {
    /// Create an empty log whose live channel buffers `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            events: Vec::new(),
            sender,
        }
    }

    /// Append an event and deliver it to live subscribers.
    pub fn append(
        &mut self,
        bucket_name: &str,
        bucket: BucketId,
        kind: RootEventKind,
        root: Option<ContentId>,
        version: u64,
    ) -> RootEvent {
        let event = RootEvent {
            seq: self.last_seq() + 1,
            bucket_name: bucket_name.to_string(),
            bucket,
            kind,
            root,
            version,
            committed_at: Utc::now(),
        };
        self.events.push(event.clone());
        // No receivers is fine; the event is retained in the log.
        let delivered = self.sender.send(event.clone()).unwrap_or(0);
        debug!(seq = event.seq, bucket = %bucket_name, %kind, delivered, "root event appended");
        event
    }

    /// Events with a sequence number greater than `seq`, in order.
    pub fn since(&self, seq: u64) -> Vec<RootEvent> {
        let start = self.events.partition_point(|e| e.seq <= seq);
        self.events[start..].to_vec()
    }

    /// Subscribe to events appended from now on.
    pub fn subscribe(&self) -> RootEventStream {
        self.sender.subscribe()
    }

    /// Sequence number of the newest event, or 0 for an empty log.
    pub fn last_seq(&self) -> u64 {
        self.events.last().map(|e| e.seq).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for RootLog {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
