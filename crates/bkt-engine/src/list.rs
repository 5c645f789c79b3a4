//! Read-only listings of buckets, directories and files.

use bkt_roots::{BucketRoot, RootStore};
use bkt_store::{BlockStore, ContentHasher, DagNode, Link, NodeKind};
use bkt_types::{BucketId, BucketPath, ContentId};
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::tree::BucketTree;

/// Metadata for one listed entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub name: String,
    /// Full path including the bucket name.
    pub path: String,
    pub id: ContentId,
    pub size: u64,
    pub is_dir: bool,
    /// Direct children of a directory; always empty for files.
    pub items: Vec<ItemMetadata>,
}

impl ItemMetadata {
    fn from_link(parent: &str, link: &Link) -> Self {
        Self {
            name: link.name.clone(),
            path: format!("{parent}/{}", link.name),
            id: link.id,
            size: link.size,
            is_dir: link.is_dir(),
            items: Vec::new(),
        }
    }

    /// Names of the direct children, in listing order.
    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.name.as_str()).collect()
    }

    /// Look up a direct child by name.
    pub fn item(&self, name: &str) -> Option<&ItemMetadata> {
        self.items.iter().find(|i| i.name == name)
    }
}

/// The bucket root a listing was taken from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootInfo {
    pub bucket: BucketId,
    pub name: String,
    pub root: ContentId,
    pub version: u64,
}

impl From<&BucketRoot> for RootInfo {
    fn from(root: &BucketRoot) -> Self {
        Self {
            bucket: root.bucket,
            name: root.name.clone(),
            root: root.root,
            version: root.version,
        }
    }
}

/// Answer to a list request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResult {
    /// Root the path was resolved against; `None` when listing buckets.
    pub root: Option<RootInfo>,
    pub item: ItemMetadata,
}

/// List `path` against the bucket's current root.
///
/// A directory yields its own size and id plus its direct children; a file
/// yields a single item with no children.
pub async fn list<S, R>(tree: &BucketTree<S, R>, path: &BucketPath) -> EngineResult<ListResult>
where
    S: BlockStore,
    R: RootStore,
{
    let resolved = tree.resolve(path).await?;
    let display = path.to_string();
    let name = path.file_name().unwrap_or(path.bucket()).to_string();
    let items = if resolved.node.is_dir() {
        resolved
            .node
            .links
            .iter()
            .map(|link| ItemMetadata::from_link(&display, link))
            .collect()
    } else {
        Vec::new()
    };

    Ok(ListResult {
        root: Some(RootInfo::from(&resolved.root)),
        item: ItemMetadata {
            name,
            path: display,
            id: resolved.id,
            size: resolved.node.size,
            is_dir: resolved.node.is_dir(),
            items,
        },
    })
}

/// List every bucket as a directory entry of a synthetic top level.
///
/// The top level's id is the id a directory of all bucket roots would
/// have, so it changes whenever any bucket changes. It is not written to
/// the store.
pub async fn list_buckets<S, R>(tree: &BucketTree<S, R>) -> EngineResult<ListResult>
where
    S: BlockStore,
    R: RootStore,
{
    let roots = tree.roots().list().await?;
    let mut links = Vec::with_capacity(roots.len());
    for root in &roots {
        let node = DagNode::load(&**tree.store(), &root.root)?;
        links.push(Link::new(root.name.clone(), root.root, node.size, NodeKind::Directory));
    }
    let top = DagNode::directory(links);
    let id = ContentHasher::BLOCK.hash(&top.encode()?);

    Ok(ListResult {
        root: None,
        item: ItemMetadata {
            name: String::new(),
            path: String::new(),
            id,
            size: top.size,
            is_dir: true,
            items: top
                .links
                .iter()
                .map(|link| ItemMetadata {
                    path: link.name.clone(),
                    ..ItemMetadata::from_link("", link)
                })
                .collect(),
        },
    })
}
