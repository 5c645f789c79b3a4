//! Path-oriented operations over content-addressed buckets.
//!
//! A bucket is a Merkle DAG of directories and chunked files whose state is
//! summarized by a single root id held in a [`RootStore`]. This crate maps
//! path operations onto that DAG:
//!
//! - **List** resolves a path and reports the entry and its direct children.
//! - **Push** chunks a byte stream (or a local directory), stores the
//!   blocks, and publishes a new root with a bounded compare-and-swap
//!   retry loop.
//! - **Pull** streams a file's chunks back out in order.
//! - **Remove** drops an entry and collapses directories it leaves empty;
//!   an emptied bucket is deleted.
//!
//! Concurrent writers never lock a bucket. Each mutation re-derives the
//! tree from the latest root and only the final root swap is serialized.
//!
//! # Modules
//!
//! - [`buckets`] — The [`Buckets`] facade
//! - [`tree`] — [`BucketTree`]: resolution and the CAS mutation loop
//! - [`push`] / [`pull`] — Streaming pipelines
//! - [`list`] / [`remove`] — Listing and removal
//! - [`chunker`] — Fixed-size and content-defined chunking
//! - [`progress`] — Progress reporting and cancellation
//! - [`config`] — [`EngineConfig`]
//! - [`error`] — [`EngineError`]
//!
//! [`RootStore`]: bkt_roots::RootStore

pub mod buckets;
pub mod chunker;
pub mod config;
pub mod error;
pub mod list;
pub mod progress;
pub mod pull;
pub mod push;
pub mod remove;
pub mod tree;

pub use buckets::{Buckets, PushResult};
pub use chunker::{ChunkSplitter, Chunking};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use list::{ItemMetadata, ListResult, RootInfo};
pub use progress::{PullStatus, TransferOptions};
pub use pull::PullPipeline;
pub use push::PushPipeline;
pub use remove::RemoveResult;
pub use tree::{BucketTree, LeafEdit, Mutation, Resolved};

// Re-export key types
pub use bkt_roots::{BucketRoot, InMemoryRootStore, RootEvent, RootEventKind, RootStore};
pub use bkt_store::{BlockStore, InMemoryBlockStore};
pub use bkt_types::{BucketId, BucketPath, ContentId};
pub use tokio_util::sync::CancellationToken;
