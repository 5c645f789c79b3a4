//! Streaming a stored file back out to a sink.
//!
//! A file is read by walking its index tree depth-first, left to right,
//! and writing every leaf's payload in order. The walk works from ids
//! alone, so a pull keeps reading the version it resolved even if the
//! bucket root moves underneath it.

use bkt_store::{BlockStore, DagNode};
use bkt_types::ContentId;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::progress::{PullStatus, TransferOptions};

/// Reads file DAGs out of a block store.
pub struct PullPipeline<'a, S> {
    store: &'a S,
}

impl<'a, S: BlockStore> PullPipeline<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Write the file rooted at `file` to `writer`.
    ///
    /// Cancellation is checked before every block read and while waiting on
    /// progress; either way the pull stops and reports
    /// [`PullStatus::Cancelled`] with the bytes already written.
    pub async fn write_to<W>(
        &self,
        file: &ContentId,
        writer: &mut W,
        options: &TransferOptions,
    ) -> EngineResult<PullStatus>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut written = 0u64;
        let mut stack = vec![*file];

        while let Some(id) = stack.pop() {
            if options.is_cancelled() {
                debug!(file = %file.short_hex(), written, "pull cancelled");
                return Ok(PullStatus::Cancelled { bytes: written });
            }
            let node = DagNode::load(self.store, &id)?;
            if node.is_dir() {
                return Err(EngineError::Store(bkt_store::StoreError::CorruptNode {
                    id,
                    reason: "directory inside a file tree".into(),
                }));
            }

            let Some(payload) = node.payload else {
                stack.extend(node.links.iter().rev().map(|l| l.id));
                continue;
            };

            let bytes = self.store.get_required(&payload)?;
            writer
                .write_all(&bytes)
                .await
                .map_err(EngineError::SinkWrite)?;
            written += bytes.len() as u64;

            match options.report(written).await {
                Ok(()) => {}
                Err(EngineError::Cancelled) => {
                    debug!(file = %file.short_hex(), written, "pull cancelled");
                    return Ok(PullStatus::Cancelled { bytes: written });
                }
                Err(e) => return Err(e),
            }
        }

        writer.flush().await.map_err(EngineError::SinkWrite)?;
        Ok(PullStatus::Completed { bytes: written })
    }
}
