//! Splitting byte streams into content-addressed chunks.

use cdchunking::{ChunkerImpl, ZPAQ};
use serde::{Deserialize, Serialize};

/// How file bytes are split into chunks before they are stored.
///
/// Content-defined chunking places boundaries by content, so an insertion
/// near the start of a file only changes the chunks around the edit and the
/// rest still deduplicate. Fixed-size chunking is cheaper but shifts every
/// boundary after an insertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Chunking {
    /// Split into chunks of exactly `size` bytes (the last may be shorter).
    Fixed { size: usize },
    /// ZPAQ content-defined chunking with an average chunk size of 2^`bits`.
    Zpaq { bits: usize },
}

impl Chunking {
    /// 1 MiB fixed chunks.
    pub const FIXED: Self = Self::Fixed { size: 1024 * 1024 };

    /// Content-defined chunks averaging 256 KiB.
    pub const ZPAQ: Self = Self::Zpaq { bits: 18 };

    /// Upper bound on a single chunk.
    pub fn max_chunk_size(&self) -> usize {
        match self {
            Chunking::Fixed { size } => *size,
            Chunking::Zpaq { bits } => 8usize << bits,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            Chunking::Fixed { size: 0 } => Err("fixed chunk size must be positive".into()),
            Chunking::Zpaq { bits } if !(8..=28).contains(bits) => {
                Err(format!("zpaq bits must be within 8..=28, got {bits}"))
            }
            _ => Ok(()),
        }
    }

    /// A fresh splitter for one stream.
    pub fn splitter(&self) -> ChunkSplitter {
        let boundary: Box<dyn ChunkerImpl + Send> = match self {
            Chunking::Fixed { size } => Box::new(FixedChunker::new(*size)),
            Chunking::Zpaq { bits } => Box::new(ZPAQ::new(*bits)),
        };
        ChunkSplitter {
            boundary,
            buffer: Vec::new(),
            max_chunk: self.max_chunk_size(),
        }
    }
}

impl Default for Chunking {
    fn default() -> Self {
        Self::ZPAQ
    }
}

/// A `ChunkerImpl` which cuts every `chunk_size` bytes. Like every
/// `ChunkerImpl`, it reports the index of the last byte of a chunk.
struct FixedChunker {
    chunk_size: usize,
    seen: usize,
}

impl FixedChunker {
    fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            seen: 0,
        }
    }
}

impl ChunkerImpl for FixedChunker {
    fn find_boundary(&mut self, data: &[u8]) -> Option<usize> {
        let remaining = self.chunk_size - self.seen;
        if data.len() < remaining {
            self.seen += data.len();
            None
        } else {
            self.seen += remaining;
            Some(remaining - 1)
        }
    }

    fn reset(&mut self) {
        self.seen = 0;
    }
}

/// Incremental splitter: feed it bytes as they arrive, collect whole chunks.
///
/// At most one partial chunk is buffered between calls.
pub struct ChunkSplitter {
    boundary: Box<dyn ChunkerImpl + Send>,
    buffer: Vec<u8>,
    max_chunk: usize,
}

impl ChunkSplitter {
    /// Feed `data`, returning every chunk it completed.
    pub fn push(&mut self, mut data: &[u8]) -> Vec<Vec<u8>> {
        let mut chunks = Vec::new();
        while !data.is_empty() {
            let room = self.max_chunk - self.buffer.len();
            let window = &data[..data.len().min(room)];
            match self.boundary.find_boundary(window) {
                Some(last) => {
                    // The boundary index names the chunk's final byte.
                    let take = (last + 1).min(window.len());
                    self.buffer.extend_from_slice(&window[..take]);
                    chunks.push(std::mem::take(&mut self.buffer));
                    self.boundary.reset();
                    data = &data[take..];
                }
                None => {
                    self.buffer.extend_from_slice(window);
                    data = &data[window.len()..];
                    if self.buffer.len() >= self.max_chunk {
                        chunks.push(std::mem::take(&mut self.buffer));
                        self.boundary.reset();
                    }
                }
            }
        }
        chunks
    }

    /// Flush the buffered tail as a final chunk, if any.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        self.boundary.reset();
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

impl std::fmt::Debug for ChunkSplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkSplitter")
            .field("buffered", &self.buffer.len())
            .field("max_chunk", &self.max_chunk)
            .finish_non_exhaustive()
    }
}
