//! Replicated bucket roots.
//!
//! Each bucket's full state is summarized by one root id: the content id of
//! its top-level directory node. This crate defines the slot that holds that
//! id and the only serialization point between concurrent writers: an
//! atomic compare-and-swap on `(bucket, version)`.
//!
//! # Architecture
//!
//! - **Roots** are mutable pointers to immutable DAG nodes. A successful
//!   publish bumps the bucket's version exactly once.
//! - **Buckets** come into existence with their first publish and vanish
//!   when deleted; a re-created bucket gets a fresh [`BucketId`].
//! - **The root log** is an append-only record of every committed change,
//!   with live fan-out to subscribers.
//!
//! # Modules
//!
//! - [`error`] — Error types for root operations
//! - [`types`] — [`BucketRoot`], [`Expected`], [`RootUpdate`], [`CasOutcome`], [`RootEvent`]
//! - [`traits`] — The [`RootStore`] trait
//! - [`log`] — The append-only [`RootLog`]
//! - [`memory`] — In-memory [`InMemoryRootStore`]
//!
//! [`BucketId`]: bkt_types::BucketId

pub mod error;
pub mod log;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{Result, RootError};
pub use log::{RootEventStream, RootLog};
pub use memory::InMemoryRootStore;
pub use traits::RootStore;
pub use types::{BucketRoot, CasOutcome, Expected, RootEvent, RootEventKind, RootUpdate};
