//! Path walking over the node tree.
//!
//! One private walker serves every lookup flavor, parameterized by what to
//! do when a segment is missing. Paths are `/`-delimited and empty segments
//! are skipped, so leading, trailing and doubled slashes are all accepted;
//! the empty path resolves to the root itself.

use std::sync::Arc;

use crate::buffer::ByteBuffer;
use crate::error::{FsError, FsResult};

use super::{Node, NodeRef, Stat};

/// What the walker does when a path segment does not exist.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Missing {
    /// Fail with `ENOENT` (or `ENOTDIR` when the last found node is not a
    /// directory).
    Error,
    /// Yield nothing.
    Empty,
    /// Create the remaining segments as fresh directories.
    Create,
}

/// Content swapped into the leaf at the end of a creating walk. Every field
/// is optional; absent fields leave the leaf untouched.
#[derive(Default)]
pub(crate) struct Graft {
    pub stat: Option<Stat>,
    pub data: Option<ByteBuffer>,
    pub children: Option<Vec<(String, NodeRef)>>,
}

impl Graft {
    pub fn with_stat(stat: Stat) -> Self {
        Self { stat: Some(stat), ..Self::default() }
    }
}

/// Result of a walk: the node a path names and the node holding it.
/// `parent` is absent when the path resolved to the starting root.
#[derive(Debug)]
pub(crate) struct Resolved {
    pub node: NodeRef,
    pub parent: Option<NodeRef>,
}

/// Walks `path` from `root`, failing on missing segments.
pub(crate) fn find(root: &NodeRef, path: &str) -> FsResult<Resolved> {
    walk_full(root, path, Missing::Error, None)
}

/// Walks `path` from `root`, yielding `None` on missing segments.
pub(crate) fn probe(root: &NodeRef, path: &str) -> FsResult<Option<NodeRef>> {
    Ok(walk(root, path, Missing::Empty, None)?.map(|found| found.node))
}

/// Walks `path` from `root`, creating missing segments as directories, and
/// applies `graft` to the leaf.
pub(crate) fn materialize(root: &NodeRef, path: &str, graft: Graft) -> FsResult<Resolved> {
    walk_full(root, path, Missing::Create, Some(graft))
}

fn walk_full(
    root: &NodeRef,
    path: &str,
    missing: Missing,
    graft: Option<Graft>,
) -> FsResult<Resolved> {
    let found = walk(root, path, missing, graft)?;
    Ok(found.expect("only the empty policy leaves a walk without a node"))
}

fn walk(
    root: &NodeRef,
    path: &str,
    missing: Missing,
    graft: Option<Graft>,
) -> FsResult<Option<Resolved>> {
    let mut parent: Option<NodeRef> = None;
    let mut current: NodeRef = Arc::clone(root);

    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        let existing = current.children().get(segment).map(|entry| Arc::clone(entry.value()));
        if let Some(child) = existing {
            parent = Some(std::mem::replace(&mut current, child));
            continue;
        }

        match missing {
            Missing::Error => {
                let code = if current.stat().is_dir() { libc::ENOENT } else { libc::ENOTDIR };
                return Err(FsError::errno(code));
            }
            Missing::Empty => return Ok(None),
            Missing::Create => {}
        }

        if !current.stat().is_dir() {
            return Err(FsError::errno(libc::ENOTDIR));
        }

        // insert-if-absent: a concurrent walk may have created the segment
        // since the lookup above
        let child = Arc::clone(
            current
                .children()
                .entry(segment.to_owned())
                .or_insert_with(|| Node::new(segment, Stat::directory()))
                .value(),
        );
        parent = Some(std::mem::replace(&mut current, child));
    }

    if let Some(graft) = graft {
        current.graft(graft);
    }
    Ok(Some(Resolved { node: current, parent }))
}
