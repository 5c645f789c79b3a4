//! Content-addressed block storage for the bucket engine.
//!
//! Every piece of bucket data -- file chunks and the directory/file nodes
//! that tie them together -- is stored as an immutable block identified by
//! its BLAKE3 hash.
//!
//! # Contents
//!
//! - [`BlockStore`] -- the get/put block interface the engine consumes
//! - [`InMemoryBlockStore`] -- `HashMap`-based store for tests and embedding
//! - [`DagNode`] / [`Link`] -- Merkle DAG nodes stored as blocks
//! - [`ContentHasher`] -- domain-separated hashing used for block ids
//!
//! # Design Rules
//!
//! 1. Blocks are immutable once written (content-addressing guarantees this).
//! 2. Writing a block that already exists is a no-op.
//! 3. Concurrent reads are always safe.
//! 4. Unreferenced blocks are harmless; no garbage collection happens here.

pub mod error;
pub mod hasher;
pub mod memory;
pub mod node;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use hasher::ContentHasher;
pub use memory::InMemoryBlockStore;
pub use node::{DagNode, Link, NodeKind};
pub use traits::BlockStore;
