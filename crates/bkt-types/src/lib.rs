//! Foundation types for the bucket engine.
//!
//! Every other `bkt` crate depends on `bkt-types`.
//!
//! # Key Types
//!
//! - [`ContentId`] — Content identifier (BLAKE3 hash of a block)
//! - [`BucketId`] — Stable UUID v7 identity assigned at bucket creation
//! - [`BucketPath`] — Validated `bucket/seg/...` path

pub mod bucket;
pub mod content;
pub mod error;
pub mod path;

pub use bucket::BucketId;
pub use content::ContentId;
pub use error::TypeError;
pub use path::BucketPath;
