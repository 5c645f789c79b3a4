#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bkt_engine::{Buckets, Chunking, EngineConfig, InMemoryBlockStore, InMemoryRootStore};
use bkt_roots::{BucketRoot, CasOutcome, Expected, RootEventStream, RootStore, RootUpdate};
use tracing_subscriber::EnvFilter;

/// Route engine logs through the test harness. Set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Small fixed chunks so short test inputs span several chunks and index
/// levels.
pub fn small_chunks() -> EngineConfig {
    EngineConfig {
        chunking: Chunking::Fixed { size: 16 },
        max_links_per_node: 4,
        read_buffer_size: 10,
        ..EngineConfig::default()
    }
}

pub fn engine() -> Buckets<InMemoryBlockStore, InMemoryRootStore> {
    init_tracing();
    Buckets::in_memory(small_chunks()).unwrap()
}

/// Deterministic test payload.
pub fn data(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

/// Root store that lets a competing writer commit first, once.
///
/// When armed, the next CAS on the named bucket is preceded by the
/// competitor's update, so the caller's precondition is stale.
pub struct RacingRoots {
    inner: InMemoryRootStore,
    competitor: Mutex<Option<(String, RootUpdate)>>,
}

impl RacingRoots {
    pub fn new() -> Self {
        Self {
            inner: InMemoryRootStore::new(),
            competitor: Mutex::new(None),
        }
    }

    pub fn arm(&self, bucket: &str, update: RootUpdate) {
        *self.competitor.lock().unwrap() = Some((bucket.to_string(), update));
    }
}

#[async_trait]
impl RootStore for RacingRoots {
    async fn read(&self, name: &str) -> bkt_roots::Result<Option<BucketRoot>> {
        self.inner.read(name).await
    }

    async fn compare_and_swap(
        &self,
        name: &str,
        expected: Expected,
        update: RootUpdate,
    ) -> bkt_roots::Result<CasOutcome> {
        let armed = {
            let mut competitor = self.competitor.lock().unwrap();
            match competitor.as_ref() {
                Some((bucket, _)) if bucket == name => competitor.take(),
                _ => None,
            }
        };
        if let Some((_, competing)) = armed {
            let outcome = self.inner.compare_and_swap(name, expected, competing).await?;
            assert!(outcome.is_committed());
        }
        self.inner.compare_and_swap(name, expected, update).await
    }

    async fn list(&self) -> bkt_roots::Result<Vec<BucketRoot>> {
        self.inner.list().await
    }

    fn subscribe(&self) -> RootEventStream {
        self.inner.subscribe()
    }
}

/// Root store on which every CAS loses.
#[derive(Default)]
pub struct ConflictingRoots {
    inner: InMemoryRootStore,
    pub attempts: AtomicU32,
}

impl ConflictingRoots {
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RootStore for ConflictingRoots {
    async fn read(&self, name: &str) -> bkt_roots::Result<Option<BucketRoot>> {
        self.inner.read(name).await
    }

    async fn compare_and_swap(
        &self,
        name: &str,
        _expected: Expected,
        _update: RootUpdate,
    ) -> bkt_roots::Result<CasOutcome> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(CasOutcome::Conflict {
            current: self.inner.read(name).await?,
        })
    }

    async fn list(&self) -> bkt_roots::Result<Vec<BucketRoot>> {
        self.inner.list().await
    }

    fn subscribe(&self) -> RootEventStream {
        self.inner.subscribe()
    }
}

pub fn shared_store() -> Arc<InMemoryBlockStore> {
    Arc::new(InMemoryBlockStore::new())
}
