use bkt_types::ContentId;

use crate::error::{StoreError, StoreResult};

/// Content-addressed block store.
///
/// All implementations must satisfy these invariants:
/// - `put` is a pure function of the bytes: the same bytes always produce
///   the same id, and writing an existing block is a no-op.
/// - Blocks are immutable once written, so concurrent reads are always safe
///   and concurrent identical writes are idempotent.
/// - The store never interprets block contents.
/// - All I/O errors are propagated, never silently ignored.
pub trait BlockStore: Send + Sync {
    /// Write a block and return its content id.
    fn put(&self, data: &[u8]) -> StoreResult<ContentId>;

    /// Read a block by id.
    ///
    /// Returns `Ok(None)` if the block does not exist.
    /// Returns `Err` on I/O failure or data corruption.
    fn get(&self, id: &ContentId) -> StoreResult<Option<Vec<u8>>>;

    /// Check whether a block exists.
    fn has(&self, id: &ContentId) -> StoreResult<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Read a block that must exist, mapping absence to [`StoreError::NotFound`].
    fn get_required(&self, id: &ContentId) -> StoreResult<Vec<u8>> {
        self.get(id)?.ok_or(StoreError::NotFound(*id))
    }
}

impl<T: BlockStore + ?Sized> BlockStore for std::sync::Arc<T> {
    fn put(&self, data: &[u8]) -> StoreResult<ContentId> {
        (**self).put(data)
    }

    fn get(&self, id: &ContentId) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(id)
    }

    fn has(&self, id: &ContentId) -> StoreResult<bool> {
        (**self).has(id)
    }
}
