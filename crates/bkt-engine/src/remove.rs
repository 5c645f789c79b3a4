//! Removing paths, with directory collapsing.

use bkt_roots::RootStore;
use bkt_store::BlockStore;
use bkt_types::{BucketPath, ContentId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::tree::{BucketTree, LeafEdit};

/// Outcome of a removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoveResult {
    /// The bucket still has entries and now has this root.
    Updated { root: ContentId, version: u64 },
    /// The removal emptied the bucket, which no longer exists.
    BucketDeleted,
}

/// Remove `path` from its bucket.
///
/// Directories left empty by the removal are removed as well; removing the
/// last entry (or the bucket root path itself) deletes the bucket.
pub async fn remove<S, R>(tree: &BucketTree<S, R>, path: &BucketPath) -> EngineResult<RemoveResult>
where
    S: BlockStore,
    R: RootStore,
{
    let display = path.to_string();
    let mutation = tree
        .mutate_existing(path, |leaf| match leaf {
            Some(_) => Ok(LeafEdit::Remove),
            None => Err(EngineError::PathNotFound(display.clone())),
        })
        .await?;

    match mutation.root {
        Some(root) => Ok(RemoveResult::Updated {
            root: root.root,
            version: root.version,
        }),
        None => {
            info!(bucket = path.bucket(), "last entry removed; bucket deleted");
            Ok(RemoveResult::BucketDeleted)
        }
    }
}
