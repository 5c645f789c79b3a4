//! The caller-facing API: `ListPath`, `PushPath`, `PullPath` and
//! `RemovePath` over string paths of the form `bucket/seg/...`.

use std::path::Path;
use std::sync::Arc;

use bkt_roots::{InMemoryRootStore, RootEventStream, RootStore};
use bkt_store::{BlockStore, DagNode, InMemoryBlockStore, Link};
use bkt_types::{BucketPath, ContentId, TypeError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::list::{self, ListResult};
use crate::progress::{PullStatus, TransferOptions};
use crate::pull::PullPipeline;
use crate::push::PushPipeline;
use crate::remove::{self, RemoveResult};
use crate::tree::{BucketTree, LeafEdit};

/// Outcome of a committed push.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResult {
    /// The path the content was published at.
    pub path: String,
    /// Bucket root after the push.
    pub root: ContentId,
    pub version: u64,
    /// Id of the pushed file (or directory) node.
    pub file: ContentId,
    pub size: u64,
}

/// Bucket path engine over a block store and a root store.
pub struct Buckets<S, R> {
    tree: BucketTree<S, R>,
    config: EngineConfig,
}

impl<S, R> Clone for Buckets<S, R> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            config: self.config.clone(),
        }
    }
}

impl Buckets<InMemoryBlockStore, InMemoryRootStore> {
    /// An engine over fresh in-memory stores.
    pub fn in_memory(config: EngineConfig) -> EngineResult<Self> {
        Self::new(
            Arc::new(InMemoryBlockStore::new()),
            Arc::new(InMemoryRootStore::new()),
            config,
        )
    }
}

impl<S: BlockStore, R: RootStore> Buckets<S, R> {
    pub fn new(store: Arc<S>, roots: Arc<R>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let tree = BucketTree::new(store, roots, config.max_cas_retries);
        Ok(Self { tree, config })
    }

    pub fn tree(&self) -> &BucketTree<S, R> {
        &self.tree
    }

    pub fn store(&self) -> &Arc<S> {
        self.tree.store()
    }

    pub fn roots(&self) -> &Arc<R> {
        self.tree.roots()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribe to committed root changes across all buckets.
    pub fn watch(&self) -> RootEventStream {
        self.tree.roots().subscribe()
    }

    // ---- ListPath ----

    /// List a path. An empty path (or `/`) lists the buckets themselves.
    pub async fn list_path(&self, path: &str) -> EngineResult<ListResult> {
        if path.trim_matches('/').is_empty() {
            return list::list_buckets(&self.tree).await;
        }
        let path = BucketPath::parse(path)?;
        list::list(&self.tree, &path).await
    }

    // ---- PushPath ----

    /// Stream `reader` into a file at `path`, creating missing directories.
    ///
    /// Nothing is published unless the whole stream was read; a read error
    /// or cancellation before the commit leaves the bucket untouched.
    pub async fn push_path<Rd>(
        &self,
        path: &str,
        reader: &mut Rd,
        options: &TransferOptions,
    ) -> EngineResult<PushResult>
    where
        Rd: AsyncRead + Unpin + ?Sized,
    {
        let path = BucketPath::parse(path)?;
        if path.is_bucket_root() {
            return Err(TypeError::InvalidPath {
                path: path.to_string(),
                reason: "a file needs a name below the bucket".into(),
            }
            .into());
        }
        debug!(%path, "push started");

        let mut written = 0;
        let link = PushPipeline::new(&**self.store(), &self.config)
            .write_stream(reader, options, &mut written)
            .await?;
        self.commit(&path, link, options).await
    }

    /// Push an in-memory buffer to `path`.
    pub async fn push_bytes(&self, path: &str, data: &[u8]) -> EngineResult<PushResult> {
        let mut reader = data;
        self.push_path(path, &mut reader, &TransferOptions::default())
            .await
    }

    /// Push a local directory tree to `path`, replacing whatever is there,
    /// with a single root publish. `path` may be the bucket itself when
    /// `local` is a directory; a single file needs a name below the bucket.
    pub async fn push_dir(
        &self,
        path: &str,
        local: &Path,
        options: &TransferOptions,
    ) -> EngineResult<PushResult> {
        let path = BucketPath::parse(path)?;
        if path.is_bucket_root() {
            let metadata = tokio::fs::metadata(local)
                .await
                .map_err(EngineError::SourceRead)?;
            if !metadata.is_dir() {
                return Err(TypeError::InvalidPath {
                    path: path.to_string(),
                    reason: "a file needs a name below the bucket".into(),
                }
                .into());
            }
        }
        debug!(%path, local = %local.display(), "directory push started");

        let mut written = 0;
        let link = PushPipeline::new(&**self.store(), &self.config)
            .write_dir(local, options, &mut written)
            .await?;
        if path.is_bucket_root()
            && link.is_dir()
            && DagNode::load(&**self.store(), &link.id)?.links.is_empty()
        {
            return Err(TypeError::InvalidPath {
                path: path.to_string(),
                reason: "cannot publish an empty directory as a bucket".into(),
            }
            .into());
        }
        self.commit(&path, link, options).await
    }

    async fn commit(
        &self,
        path: &BucketPath,
        link: Link,
        options: &TransferOptions,
    ) -> EngineResult<PushResult> {
        options.check_cancelled()?;
        let mutation = self
            .tree
            .mutate(path, |_| Ok(LeafEdit::Replace(link.clone())))
            .await?;
        let root = mutation
            .root
            .ok_or_else(|| EngineError::NoSuchBucket(path.bucket().to_string()))?;

        info!(
            %path,
            file = %link.id.short_hex(),
            size = link.size,
            version = root.version,
            attempts = mutation.attempts,
            "push committed"
        );
        Ok(PushResult {
            path: path.to_string(),
            root: root.root,
            version: root.version,
            file: link.id,
            size: link.size,
        })
    }

    // ---- PullPath ----

    /// Stream the file at `path` into `writer`.
    pub async fn pull_path<W>(
        &self,
        path: &str,
        writer: &mut W,
        options: &TransferOptions,
    ) -> EngineResult<PullStatus>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let path = BucketPath::parse(path)?;
        let resolved = self.tree.resolve(&path).await?;
        if resolved.node.is_dir() {
            return Err(EngineError::IsADirectory(path.to_string()));
        }
        debug!(%path, file = %resolved.id.short_hex(), version = resolved.root.version, "pull started");
        PullPipeline::new(&**self.store())
            .write_to(&resolved.id, writer, options)
            .await
    }

    /// Read the whole file at `path` into memory.
    pub async fn pull_bytes(&self, path: &str) -> EngineResult<Bytes> {
        let mut out = Vec::new();
        self.pull_path(path, &mut out, &TransferOptions::default())
            .await?;
        Ok(Bytes::from(out))
    }

    // ---- RemovePath ----

    /// Remove `path`, collapsing directories it leaves empty.
    pub async fn remove_path(&self, path: &str) -> EngineResult<RemoveResult> {
        let path = BucketPath::parse(path)?;
        remove::remove(&self.tree, &path).await
    }
}
