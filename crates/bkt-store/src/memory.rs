use std::collections::HashMap;
use std::sync::RwLock;

use bkt_types::ContentId;
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::hasher::ContentHasher;
use crate::traits::BlockStore;

/// In-memory, HashMap-based block store.
///
/// Intended for tests and embedding. Blocks are held behind a `RwLock` and
/// re-hashed on every read so corruption surfaces as
/// [`StoreError::HashMismatch`] rather than wrong bytes.
pub struct InMemoryBlockStore {
    blocks: RwLock<HashMap<ContentId, Vec<u8>>>,
}

impl InMemoryBlockStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blocks currently stored.
    pub fn len(&self) -> usize {
        self.blocks.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blocks.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blocks.
    pub fn total_bytes(&self) -> u64 {
        self.blocks
            .read()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }

    /// Drop a block. Returns `true` if it existed.
    ///
    /// Block reclamation is not part of normal operation; this exists for
    /// tooling and for exercising missing-block paths.
    pub fn remove(&self, id: &ContentId) -> bool {
        self.blocks
            .write()
            .expect("lock poisoned")
            .remove(id)
            .is_some()
    }
}

impl Default for InMemoryBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn put(&self, data: &[u8]) -> StoreResult<ContentId> {
        let id = ContentHasher::BLOCK.hash(data);
        let mut map = self.blocks.write().expect("lock poisoned");
        map.entry(id).or_insert_with(|| data.to_vec());
        Ok(id)
    }

    fn get(&self, id: &ContentId) -> StoreResult<Option<Vec<u8>>> {
        let map = self.blocks.read().expect("lock poisoned");
        let Some(data) = map.get(id) else {
            return Ok(None);
        };
        if !ContentHasher::BLOCK.verify(data, id) {
            let computed = ContentHasher::BLOCK.hash(data);
            warn!(block = %id.short_hex(), computed = %computed.short_hex(), "block failed hash verification");
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(Some(data.clone()))
    }

    fn has(&self, id: &ContentId) -> StoreResult<bool> {
        Ok(self.blocks.read().expect("lock poisoned").contains_key(id))
    }
}

impl std::fmt::Debug for InMemoryBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlockStore")
            .field("block_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get() {
        let store = InMemoryBlockStore::new();
        let id = store.put(b"hello world").unwrap();
        assert_eq!(store.get(&id).unwrap().as_deref(), Some(&b"hello world"[..]));
        assert!(store.has(&id).unwrap());
    }

    #[test]
    fn identical_bytes_deduplicate() {
        let store = InMemoryBlockStore::new();
        let id1 = store.put(b"identical content").unwrap();
        let id2 = store.put(b"identical content").unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_block_is_none() {
        let store = InMemoryBlockStore::new();
        let id = ContentHasher::BLOCK.hash(b"never written");
        assert!(store.get(&id).unwrap().is_none());
        assert!(matches!(
            store.get_required(&id),
            Err(StoreError::NotFound(missing)) if missing == id
        ));
    }

    #[test]
    fn corrupted_block_is_detected() {
        let store = InMemoryBlockStore::new();
        let id = store.put(b"verify me").unwrap();
        store
            .blocks
            .write()
            .unwrap()
            .insert(id, b"tampered".to_vec());
        assert!(matches!(
            store.get(&id),
            Err(StoreError::HashMismatch { .. })
        ));
    }

    #[test]
    fn empty_block_is_storable() {
        let store = InMemoryBlockStore::new();
        let id = store.put(b"").unwrap();
        assert_eq!(store.get(&id).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn remove_and_total_bytes() {
        let store = InMemoryBlockStore::new();
        let a = store.put(b"12345").unwrap();
        store.put(b"123456789").unwrap();
        assert_eq!(store.total_bytes(), 14);
        assert!(store.remove(&a));
        assert!(!store.remove(&a));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_writers_are_idempotent() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryBlockStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.put(b"shared chunk").unwrap())
            })
            .collect();
        let ids: Vec<ContentId> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.len(), 1);
    }
}
