//! In-memory root store for testing and single-process embedding.
//!
//! [`InMemoryRootStore`] keeps the root slots and the root log behind a
//! single `RwLock`, so the precondition check, the swap and the log append
//! of one compare-and-swap happen atomically.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bkt_types::BucketId;
use tracing::{debug, info};

use crate::error::{Result, RootError};
use crate::log::{RootEventStream, RootLog, DEFAULT_CHANNEL_CAPACITY};
use crate::traits::RootStore;
use crate::types::{BucketRoot, CasOutcome, Expected, RootEvent, RootEventKind, RootUpdate};

#[derive(Debug)]
struct State {
    roots: HashMap<String, BucketRoot>,
    log: RootLog,
}

/// An in-memory implementation of [`RootStore`].
///
/// Data is lost when the store is dropped.
#[derive(Debug)]
pub struct InMemoryRootStore {
    state: RwLock<State>,
}

impl InMemoryRootStore {
    /// Create an empty root store.
    pub fn new() -> Self {
        Self::with_channel_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create an empty root store whose live event channel buffers
    /// `capacity` events per subscriber.
    pub fn with_channel_capacity(capacity: usize) -> Self {
        Self {
            state: RwLock::new(State {
                roots: HashMap::new(),
                log: RootLog::new(capacity),
            }),
        }
    }

    /// Replay the root log after sequence number `seq`.
    pub fn events_since(&self, seq: u64) -> Result<Vec<RootEvent>> {
        let state = self
            .state
            .read()
            .map_err(|e| RootError::Unavailable(format!("lock poisoned: {e}")))?;
        Ok(state.log.since(seq))
    }
}

impl Default for InMemoryRootStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RootStore for InMemoryRootStore {
    async fn read(&self, name: &str) -> Result<Option<BucketRoot>> {
        let state = self
            .state
            .read()
            .map_err(|e| RootError::Unavailable(format!("lock poisoned: {e}")))?;
        Ok(state.roots.get(name).cloned())
    }

    async fn compare_and_swap(
        &self,
        name: &str,
        expected: Expected,
        update: RootUpdate,
    ) -> Result<CasOutcome> {
        let mut state = self
            .state
            .write()
            .map_err(|e| RootError::Unavailable(format!("lock poisoned: {e}")))?;
        let State { roots, log } = &mut *state;

        let current = roots.get(name);
        if !expected.matches(current) {
            debug!(bucket = %name, ?expected, "root CAS precondition failed");
            return Ok(CasOutcome::Conflict {
                current: current.cloned(),
            });
        }

        match update {
            RootUpdate::Publish { root } => {
                let (next, kind) = match current {
                    None => (
                        BucketRoot {
                            name: name.to_string(),
                            bucket: BucketId::new(),
                            root,
                            version: 1,
                        },
                        RootEventKind::Created,
                    ),
                    Some(prev) => (
                        BucketRoot {
                            root,
                            version: prev.version + 1,
                            ..prev.clone()
                        },
                        RootEventKind::Updated,
                    ),
                };
                log.append(name, next.bucket, kind, Some(root), next.version);
                if kind == RootEventKind::Created {
                    info!(bucket = %name, id = %next.bucket, "bucket created");
                }
                roots.insert(name.to_string(), next.clone());
                Ok(CasOutcome::Committed(Some(next)))
            }
            RootUpdate::Delete => {
                if let Some(prev) = roots.remove(name) {
                    log.append(name, prev.bucket, RootEventKind::Deleted, None, prev.version);
                    info!(bucket = %name, id = %prev.bucket, "bucket deleted");
                }
                Ok(CasOutcome::Committed(None))
            }
        }
    }

    async fn list(&self) -> Result<Vec<BucketRoot>> {
        let state = self
            .state
            .read()
            .map_err(|e| RootError::Unavailable(format!("lock poisoned: {e}")))?;
        let mut roots: Vec<BucketRoot> = state.roots.values().cloned().collect();
        roots.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roots)
    }

    fn subscribe(&self) -> RootEventStream {
        match self.state.read() {
            Ok(state) => state.log.subscribe(),
            Err(poisoned) => poisoned.into_inner().log.subscribe(),
        }
    }
}
