//! Merkle DAG nodes.
//!
//! A bucket is a tree of immutable [`DagNode`]s, each stored as one block and
//! addressed by the id of its canonical encoding. Nodes reference children
//! by id through [`Link`]s, never by ownership, so identical subtrees are
//! shared and a node's id is a pure function of its content.
//!
//! # Node shapes
//!
//! - **Directory**: named links sorted by name, no payload, size is the sum
//!   of child sizes.
//! - **File leaf**: a payload block holding one chunk of file bytes, no links.
//! - **File index**: unnamed links to file nodes in byte order, no payload.
//!   Large files are a tree of index nodes over leaves.

use std::collections::BTreeMap;

use bkt_types::ContentId;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::traits::BlockStore;

/// The kind of a DAG node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Directory,
    FileChunk,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Directory => write!(f, "directory"),
            Self::FileChunk => write!(f, "file"),
        }
    }
}

/// A reference from a node to a child node.
///
/// The child's size and kind are carried on the link so a directory can be
/// listed without loading every child.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Entry name within a directory; empty for file index parts.
    pub name: String,
    pub id: ContentId,
    pub size: u64,
    pub kind: NodeKind,
}

impl Link {
    pub fn new(name: impl Into<String>, id: ContentId, size: u64, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            id,
            size,
            kind,
        }
    }

    /// Returns `true` if the link points at a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// One immutable node of a bucket's Merkle DAG.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagNode {
    pub kind: NodeKind,
    /// Cumulative byte count for directories and index nodes, chunk length
    /// for leaves.
    pub size: u64,
    pub links: Vec<Link>,
    /// Block holding the chunk bytes (file leaves only).
    pub payload: Option<ContentId>,
}

impl DagNode {
    /// Build a directory from child links.
    ///
    /// Links are keyed by name; a later link with a duplicate name replaces
    /// the earlier one. The resulting links are sorted by name.
    pub fn directory(links: impl IntoIterator<Item = Link>) -> Self {
        let by_name: BTreeMap<String, Link> =
            links.into_iter().map(|l| (l.name.clone(), l)).collect();
        let links: Vec<Link> = by_name.into_values().collect();
        Self {
            kind: NodeKind::Directory,
            size: links.iter().map(|l| l.size).sum(),
            links,
            payload: None,
        }
    }

    /// An empty directory.
    pub fn empty_directory() -> Self {
        Self::directory(Vec::new())
    }

    /// A file leaf holding a single chunk.
    pub fn leaf(payload: ContentId, len: u64) -> Self {
        Self {
            kind: NodeKind::FileChunk,
            size: len,
            links: Vec::new(),
            payload: Some(payload),
        }
    }

    /// A file index node over ordered parts.
    pub fn index(parts: Vec<Link>) -> Self {
        Self {
            kind: NodeKind::FileChunk,
            size: parts.iter().map(|l| l.size).sum(),
            links: parts,
            payload: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Look up a directory entry by name.
    pub fn child(&self, name: &str) -> Option<&Link> {
        if !self.is_dir() {
            return None;
        }
        self.links
            .binary_search_by(|l| l.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.links[i])
    }

    /// A copy of this directory with `link` inserted or replaced.
    pub fn with_child(&self, link: Link) -> Self {
        let mut links = self.links.clone();
        match links.binary_search_by(|l| l.name.cmp(&link.name)) {
            Ok(i) => links[i] = link,
            Err(i) => links.insert(i, link),
        }
        Self::directory(links)
    }

    /// A copy of this directory without the entry `name`.
    pub fn without_child(&self, name: &str) -> Self {
        Self::directory(self.links.iter().filter(|l| l.name != name).cloned())
    }

    /// A link naming this node.
    pub fn link(&self, name: impl Into<String>, id: ContentId) -> Link {
        Link::new(name, id, self.size, self.kind)
    }

    /// Canonical encoding. Sorted links and fixed field order make the
    /// encoding, and therefore the id, deterministic.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode and validate a node read from block `id`.
    pub fn decode(id: &ContentId, data: &[u8]) -> StoreResult<Self> {
        let node: Self = serde_json::from_slice(data).map_err(|e| StoreError::CorruptNode {
            id: *id,
            reason: e.to_string(),
        })?;
        node.validate()
            .map_err(|reason| StoreError::CorruptNode { id: *id, reason })?;
        Ok(node)
    }

    /// Write this node as a block and return its id.
    pub fn store(&self, store: &dyn BlockStore) -> StoreResult<ContentId> {
        store.put(&self.encode()?)
    }

    /// Load the node stored at `id`.
    pub fn load(store: &dyn BlockStore, id: &ContentId) -> StoreResult<Self> {
        let data = store.get_required(id)?;
        Self::decode(id, &data)
    }

    fn validate(&self) -> Result<(), String> {
        let sum: u64 = self.links.iter().map(|l| l.size).sum();
        match self.kind {
            NodeKind::Directory => {
                if self.payload.is_some() {
                    return Err("directory carries a payload".into());
                }
                if self.links.windows(2).any(|w| w[0].name >= w[1].name) {
                    return Err("directory links are not strictly sorted".into());
                }
                if self.links.iter().any(|l| l.name.is_empty()) {
                    return Err("directory link has an empty name".into());
                }
                if sum != self.size {
                    return Err(format!("directory size {} != child sum {sum}", self.size));
                }
            }
            NodeKind::FileChunk => match (&self.payload, self.links.is_empty()) {
                (Some(_), true) => {}
                (None, false) => {
                    if self.links.iter().any(|l| l.kind != NodeKind::FileChunk) {
                        return Err("file index links to a directory".into());
                    }
                    if sum != self.size {
                        return Err(format!("file size {} != part sum {sum}", self.size));
                    }
                }
                (Some(_), false) => return Err("file leaf has links".into()),
                (None, true) => return Err("file node has neither payload nor parts".into()),
            },
        }
        Ok(())
    }
}
