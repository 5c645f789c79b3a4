//! Streaming bytes (or a local directory) into the block store.
//!
//! The pipeline reads the source in `read_buffer_size` pieces, splits it
//! into chunks, writes each chunk as a payload block plus a leaf node, and
//! reports cumulative progress after every chunk. Once the source is
//! exhausted the leaves are summarized by a balanced tree of index nodes.
//!
//! Nothing here touches a bucket root; the caller publishes the returned
//! link with [`BucketTree::mutate`](crate::BucketTree::mutate). Blocks
//! written before a failure or cancellation stay in the store, where they
//! are either reused by a later push or left unreferenced.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use bkt_store::{BlockStore, DagNode, Link};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::progress::TransferOptions;

/// Writes file and directory DAGs into a block store.
pub struct PushPipeline<'a, S> {
    store: &'a S,
    config: &'a EngineConfig,
}

impl<'a, S: BlockStore> PushPipeline<'a, S> {
    pub fn new(store: &'a S, config: &'a EngineConfig) -> Self {
        Self { store, config }
    }

    /// Chunk and store everything `reader` yields.
    ///
    /// `written` is the cumulative byte counter reported to progress; it is
    /// shared so a directory push reports one running total.
    /// Returns an unnamed link to the file's top-level node.
    pub async fn write_stream<Rd>(
        &self,
        reader: &mut Rd,
        options: &TransferOptions,
        written: &mut u64,
    ) -> EngineResult<Link>
    where
        Rd: AsyncRead + Unpin + ?Sized,
    {
        let mut splitter = self.config.chunking.splitter();
        let mut buf = vec![0u8; self.config.read_buffer_size];
        let mut leaves = Vec::new();

        loop {
            options.check_cancelled()?;
            let n = match &options.cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(EngineError::Cancelled),
                    read = reader.read(&mut buf) => read,
                },
                None => reader.read(&mut buf).await,
            }
            .map_err(EngineError::SourceRead)?;
            if n == 0 {
                break;
            }
            for chunk in splitter.push(&buf[..n]) {
                leaves.push(self.store_chunk(&chunk)?);
                *written += chunk.len() as u64;
                options.report(*written).await?;
            }
        }
        if let Some(chunk) = splitter.finish() {
            leaves.push(self.store_chunk(&chunk)?);
            *written += chunk.len() as u64;
            options.report(*written).await?;
        }

        debug!(chunks = leaves.len(), total = *written, "source exhausted");
        self.assemble(leaves)
    }

    /// Store one chunk as a payload block and a leaf node.
    fn store_chunk(&self, chunk: &[u8]) -> EngineResult<Link> {
        let payload = self.store.put(chunk)?;
        let leaf = DagNode::leaf(payload, chunk.len() as u64);
        let id = leaf.store(self.store)?;
        Ok(leaf.link("", id))
    }

    /// Summarize ordered leaves with index nodes of at most
    /// `max_links_per_node` parts each, level by level.
    fn assemble(&self, leaves: Vec<Link>) -> EngineResult<Link> {
        let mut level = leaves;
        if level.is_empty() {
            level.push(self.store_chunk(&[])?);
        }
        let fanout = self.config.max_links_per_node;
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(fanout));
            for group in level.chunks(fanout) {
                let index = DagNode::index(group.to_vec());
                let id = index.store(self.store)?;
                next.push(index.link("", id));
            }
            level = next;
        }
        Ok(level.swap_remove(0))
    }

    /// Store a local directory tree and return an unnamed link to its top
    /// node. Symbolic links and other special files are skipped.
    ///
    /// If `dir` is a regular file, it is stored as a single file.
    pub async fn write_dir(
        &self,
        dir: &Path,
        options: &TransferOptions,
        written: &mut u64,
    ) -> EngineResult<Link> {
        // Children are visited before their directory, so each directory's
        // entries are complete by the time it is reached.
        let entries = WalkDir::new(dir)
            .follow_links(false)
            .contents_first(true)
            .sort_by_file_name()
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EngineError::SourceRead(e.into()))?;

        let mut pending: HashMap<PathBuf, Vec<Link>> = HashMap::new();
        for entry in entries {
            options.check_cancelled()?;
            let file_type = entry.file_type();
            let link = if file_type.is_dir() {
                let children = pending.remove(entry.path()).unwrap_or_default();
                let node = DagNode::directory(children);
                let id = node.store(self.store)?;
                node.link("", id)
            } else if file_type.is_file() {
                let mut file = tokio::fs::File::open(entry.path())
                    .await
                    .map_err(EngineError::SourceRead)?;
                self.write_stream(&mut file, options, written).await?
            } else {
                debug!(path = %entry.path().display(), "skipping special file");
                continue;
            };

            if entry.depth() == 0 {
                return Ok(link);
            }

            let name = entry.file_name().to_str().ok_or_else(|| {
                EngineError::SourceRead(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("non UTF-8 file name: {}", entry.path().display()),
                ))
            })?;
            let parent = entry.path().parent().unwrap_or(dir).to_path_buf();
            pending.entry(parent).or_default().push(Link {
                name: name.to_string(),
                ..link
            });
        }

        Err(EngineError::SourceRead(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a regular file or directory", dir.display()),
        )))
    }
}
