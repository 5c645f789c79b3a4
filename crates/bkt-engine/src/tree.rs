//! Path resolution and root publication for one bucket.
//!
//! [`BucketTree`] turns path-level edits into Merkle DAG mutations. An edit
//! loads the directory chain from the bucket root down to the edited entry,
//! replaces (or drops) the entry, then re-hashes every ancestor bottom-up
//! because each directory's id depends on its children's ids. The new root
//! is published with a compare-and-swap against the version that was read;
//! on conflict the whole cycle re-runs against the fresh root, up to a
//! fixed bound.
//!
//! # Invariants
//!
//! - Nodes are never modified in place; every edit writes new nodes.
//! - A directory emptied by a removal is removed from its parent too, all
//!   the way up to (not including) the top-level directory.
//! - An empty top-level directory is never published: the bucket is
//!   deleted instead.

use std::sync::Arc;

use bkt_roots::{BucketRoot, CasOutcome, Expected, RootStore, RootUpdate};
use bkt_store::{BlockStore, DagNode, Link};
use bkt_types::{BucketPath, ContentId};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};

/// A path resolved against a captured root.
#[derive(Clone, Debug)]
pub struct Resolved {
    /// The bucket root the path was resolved against.
    pub root: BucketRoot,
    /// Id of the node the path names.
    pub id: ContentId,
    pub node: DagNode,
}

/// What an edit does to the entry at the edited path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeafEdit {
    /// Insert or replace the entry with this node. The link name is ignored;
    /// the entry keeps the path's final segment as its name.
    Replace(Link),
    /// Remove the entry.
    Remove,
}

/// Result of a committed (or no-op) mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mutation {
    /// The bucket root after the edit; `None` if the bucket was deleted.
    pub root: Option<BucketRoot>,
    /// CAS attempts used, including the successful one.
    pub attempts: u32,
}

/// Path engine over a block store and a root store.
pub struct BucketTree<S, R> {
    store: Arc<S>,
    roots: Arc<R>,
    max_cas_retries: u32,
}

impl<S, R> Clone for BucketTree<S, R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            roots: Arc::clone(&self.roots),
            max_cas_retries: self.max_cas_retries,
        }
    }
}

impl<S: BlockStore, R: RootStore> BucketTree<S, R> {
    pub fn new(store: Arc<S>, roots: Arc<R>, max_cas_retries: u32) -> Self {
        Self {
            store,
            roots,
            max_cas_retries,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn roots(&self) -> &Arc<R> {
        &self.roots
    }

    /// Read the current root of a bucket, failing if it does not exist.
    pub async fn current_root(&self, bucket: &str) -> EngineResult<BucketRoot> {
        self.roots
            .read(bucket)
            .await?
            .ok_or_else(|| EngineError::NoSuchBucket(bucket.to_string()))
    }

    /// Resolve a path against the bucket's current root.
    pub async fn resolve(&self, path: &BucketPath) -> EngineResult<Resolved> {
        let root = self.current_root(path.bucket()).await?;
        let (id, node) = self.walk(&root.root, path)?;
        Ok(Resolved { root, id, node })
    }

    /// Walk `path`'s segments from the directory `root`.
    fn walk(&self, root: &ContentId, path: &BucketPath) -> EngineResult<(ContentId, DagNode)> {
        let mut id = *root;
        let mut node = DagNode::load(&*self.store, &id)?;
        for (depth, segment) in path.segments().iter().enumerate() {
            if !node.is_dir() {
                return Err(EngineError::NotADirectory(prefix(path, depth)));
            }
            let link = node
                .child(segment)
                .ok_or_else(|| EngineError::PathNotFound(path.to_string()))?;
            id = link.id;
            node = DagNode::load(&*self.store, &id)?;
        }
        Ok((id, node))
    }

    /// Apply an edit at `path` and publish the resulting root.
    ///
    /// `edit` receives the entry currently at `path` (if any) and is called
    /// again on every retry, against the then-current tree. Errors from
    /// `edit` abort the mutation without publishing anything.
    pub async fn mutate<F>(&self, path: &BucketPath, edit: F) -> EngineResult<Mutation>
    where
        F: FnMut(Option<&Link>) -> EngineResult<LeafEdit>,
    {
        self.run_mutation(path, false, edit).await
    }

    /// Like [`mutate`](Self::mutate), but fails with
    /// [`EngineError::NoSuchBucket`] whenever an attempt finds the bucket
    /// gone, including after a retry.
    pub async fn mutate_existing<F>(&self, path: &BucketPath, edit: F) -> EngineResult<Mutation>
    where
        F: FnMut(Option<&Link>) -> EngineResult<LeafEdit>,
    {
        self.run_mutation(path, true, edit).await
    }

    async fn run_mutation<F>(
        &self,
        path: &BucketPath,
        require_bucket: bool,
        mut edit: F,
    ) -> EngineResult<Mutation>
    where
        F: FnMut(Option<&Link>) -> EngineResult<LeafEdit>,
    {
        let bucket = path.bucket();
        let max_attempts = self.max_cas_retries.saturating_add(1);

        for attempt in 1..=max_attempts {
            let current = self.roots.read(bucket).await?;
            if require_bucket && current.is_none() {
                return Err(EngineError::NoSuchBucket(bucket.to_string()));
            }
            let update = self.rebuild(current.as_ref(), path, &mut edit)?;

            let (expected, update) = match (current.as_ref(), update) {
                (Some(root), RootUpdate::Publish { root: new_root }) if root.root == new_root => {
                    debug!(%path, root = %new_root.short_hex(), "edit left the root unchanged");
                    return Ok(Mutation {
                        root: current.clone(),
                        attempts: attempt,
                    });
                }
                (Some(root), update) => (root.expected(), update),
                (None, RootUpdate::Delete) => {
                    return Err(EngineError::NoSuchBucket(bucket.to_string()));
                }
                (None, update) => (Expected::Absent, update),
            };

            debug!(%path, attempt, ?expected, "publishing root");
            match self.roots.compare_and_swap(bucket, expected, update).await? {
                CasOutcome::Committed(root) => {
                    match &root {
                        Some(r) => info!(%path, root = %r.root.short_hex(), version = r.version, "root committed"),
                        None => info!(%path, "bucket emptied and deleted"),
                    }
                    return Ok(Mutation {
                        root,
                        attempts: attempt,
                    });
                }
                CasOutcome::Conflict { current } => {
                    warn!(
                        %path,
                        attempt,
                        seen = current.as_ref().map(|r| r.version),
                        "root CAS conflict; retrying against refreshed root"
                    );
                    tokio::task::yield_now().await;
                }
            }
        }

        Err(EngineError::ConcurrentModification {
            bucket: bucket.to_string(),
            attempts: max_attempts,
        })
    }

    /// Rebuild the directory chain for one edit against `current`.
    fn rebuild<F>(
        &self,
        current: Option<&BucketRoot>,
        path: &BucketPath,
        edit: &mut F,
    ) -> EngineResult<RootUpdate>
    where
        F: FnMut(Option<&Link>) -> EngineResult<LeafEdit>,
    {
        let segments = path.segments();

        // The bucket root itself is being replaced or removed.
        let Some(leaf_name) = segments.last() else {
            let existing = current.map(|r| {
                DagNode::load(&*self.store, &r.root).map(|node| node.link("", r.root))
            });
            let existing = existing.transpose()?;
            return match edit(existing.as_ref())? {
                LeafEdit::Remove => Ok(RootUpdate::Delete),
                LeafEdit::Replace(link) if link.is_dir() => {
                    if link.size == 0 && DagNode::load(&*self.store, &link.id)?.links.is_empty() {
                        Ok(RootUpdate::Delete)
                    } else {
                        Ok(RootUpdate::Publish { root: link.id })
                    }
                }
                LeafEdit::Replace(_) => Err(EngineError::IsADirectory(path.to_string())),
            };
        };

        // Directory chain: chain[d] is the directory at segments[..d].
        let mut chain: Vec<DagNode> = Vec::with_capacity(segments.len());
        chain.push(match current {
            Some(root) => DagNode::load(&*self.store, &root.root)?,
            None => DagNode::empty_directory(),
        });
        for (depth, segment) in segments[..segments.len() - 1].iter().enumerate() {
            let parent = &chain[depth];
            let next = match parent.child(segment) {
                Some(link) if link.is_dir() => DagNode::load(&*self.store, &link.id)?,
                Some(_) => return Err(EngineError::NotADirectory(prefix(path, depth + 1))),
                None => DagNode::empty_directory(),
            };
            chain.push(next);
        }

        let existing = chain[chain.len() - 1].child(leaf_name).cloned();
        let mut replacement = match edit(existing.as_ref())? {
            LeafEdit::Replace(link) => Some(Link { name: leaf_name.clone(), ..link }),
            LeafEdit::Remove => None,
        };

        // Walk back up. `replacement` is what the directory at `depth` should
        // hold under `segments[depth]`; `None` removes that entry.
        for depth in (1..segments.len()).rev() {
            let dir = &chain[depth];
            let updated = match replacement.take() {
                Some(link) => dir.with_child(link),
                None => dir.without_child(&segments[depth]),
            };
            if updated.links.is_empty() {
                // Collapse: the emptied directory disappears from its parent.
                continue;
            }
            let id = updated.store(&*self.store)?;
            replacement = Some(updated.link(segments[depth - 1].clone(), id));
        }

        let top = match replacement {
            Some(link) => chain[0].with_child(link),
            None => chain[0].without_child(&segments[0]),
        };
        if top.links.is_empty() {
            return Ok(RootUpdate::Delete);
        }
        let root = top.store(&*self.store)?;
        Ok(RootUpdate::Publish { root })
    }
}

/// `bucket/seg0/.../seg{depth-1}` for error messages.
fn prefix(path: &BucketPath, depth: usize) -> String {
    let mut out = path.bucket().to_string();
    for segment in &path.segments()[..depth] {
        out.push('/');
        out.push_str(segment);
    }
    out
}
