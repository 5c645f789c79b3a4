//! Core root types.
//!
//! Each bucket has exactly one root slot: the id of its top-level directory
//! node plus a version counter. Writers publish a new root with a
//! compare-and-swap against the version they read.

use bkt_types::{BucketId, ContentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RootError};

/// The published state of one bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRoot {
    /// Bucket name, the first segment of every path into the bucket.
    pub name: String,
    /// Identity assigned when the bucket was created.
    pub bucket: BucketId,
    /// Id of the top-level directory node.
    pub root: ContentId,
    /// Incremented exactly once per successful publish; starts at 1.
    pub version: u64,
}

impl BucketRoot {
    /// The CAS precondition matching this root.
    pub fn expected(&self) -> Expected {
        Expected::At {
            bucket: self.bucket,
            version: self.version,
        }
    }
}

/// Precondition for a compare-and-swap.
///
/// The bucket id is part of the precondition so that a writer holding a
/// stale root can never commit against a re-created bucket of the same name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expected {
    /// The bucket must not exist.
    Absent,
    /// The bucket must exist with exactly this identity and version.
    At { bucket: BucketId, version: u64 },
}

impl Expected {
    /// Whether `current` satisfies this precondition.
    pub fn matches(&self, current: Option<&BucketRoot>) -> bool {
        match (self, current) {
            (Expected::Absent, None) => true,
            (Expected::At { bucket, version }, Some(root)) => {
                root.bucket == *bucket && root.version == *version
            }
            _ => false,
        }
    }
}

/// The change a writer wants to publish.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RootUpdate {
    /// Point the bucket at a new top-level directory, creating the bucket
    /// if the precondition is [`Expected::Absent`].
    Publish { root: ContentId },
    /// Remove the bucket entirely.
    Delete,
}

/// Result of a compare-and-swap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CasOutcome {
    /// The update was applied. Carries the new root, or `None` after a delete.
    Committed(Option<BucketRoot>),
    /// Another writer got there first. Carries the root that is current now.
    Conflict { current: Option<BucketRoot> },
}

impl CasOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CasOutcome::Committed(_))
    }
}

/// What a committed root change did to its bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootEventKind {
    Created,
    Updated,
    Deleted,
}

impl std::fmt::Display for RootEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// One entry of the append-only root log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootEvent {
    /// Position in the log, starting at 1.
    pub seq: u64,
    pub bucket_name: String,
    pub bucket: BucketId,
    pub kind: RootEventKind,
    /// The published root; `None` for deletions.
    pub root: Option<ContentId>,
    /// Bucket version after the change (the last version for deletions).
    pub version: u64,
    pub committed_at: DateTime<Utc>,
}

impl RootEvent {
    /// Encode for shipping to another replica's log.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| RootError::Serialization(e.to_string()))
    }

    /// Decode an event received from another replica.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| RootError::Serialization(e.to_string()))
    }
}
