//! The [`RootStore`] trait: the replicated root slot the engine publishes to.
//!
//! Any backend (in-memory, a replicated log, a database) implements this
//! trait. The engine relies on nothing but the atomicity of
//! [`compare_and_swap`](RootStore::compare_and_swap).

use async_trait::async_trait;

use crate::error::Result;
use crate::log::RootEventStream;
use crate::types::{BucketRoot, CasOutcome, Expected, RootUpdate};

/// Storage backend for bucket roots.
///
/// Implementations must be thread-safe and must make each
/// `compare_and_swap` atomic: for a given precondition at most one writer
/// commits, every other writer observes [`CasOutcome::Conflict`].
#[async_trait]
pub trait RootStore: Send + Sync {
    /// Read the current root of a bucket.
    ///
    /// Returns `Ok(None)` if the bucket does not exist.
    async fn read(&self, name: &str) -> Result<Option<BucketRoot>>;

    /// Apply `update` if the bucket's current state matches `expected`.
    async fn compare_and_swap(
        &self,
        name: &str,
        expected: Expected,
        update: RootUpdate,
    ) -> Result<CasOutcome>;

    /// All existing buckets, sorted by name.
    async fn list(&self) -> Result<Vec<BucketRoot>>;

    /// Subscribe to committed root changes.
    fn subscribe(&self) -> RootEventStream;
}
