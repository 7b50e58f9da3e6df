//! Directory and file mutators addressed by path.

use crate::error::{FsError, FsResult};

use super::resolve::{self, Graft};
use super::{NodeRef, Stat};

/// Path-addressed operations over a tree root. Implemented for [`NodeRef`]
/// so any held node can serve as the root of resolution.
pub trait Tree {
    /// Resolves `path` to a node. With `auto_create`, a missing path is
    /// created as a fresh regular file (intermediate segments become
    /// directories); without it, a missing path is an error.
    fn get(&self, path: &str, auto_create: bool) -> FsResult<NodeRef>;

    /// Creates an empty directory at `path`.
    fn mkdir(&self, path: &str) -> FsResult<()>;

    /// Removes the empty directory at `path`.
    fn rmdir(&self, path: &str) -> FsResult<()>;

    /// Removes the file at `path`.
    fn unlink(&self, path: &str) -> FsResult<()>;

    /// Moves the node at `path` to `dest`, overwriting an existing
    /// destination. Missing intermediate segments of `dest` are created as
    /// directories. Readers may briefly observe neither path during the
    /// move.
    fn rename(&self, path: &str, dest: &str) -> FsResult<()>;
}

impl Tree for NodeRef {
    fn get(&self, path: &str, auto_create: bool) -> FsResult<NodeRef> {
        if !auto_create {
            return Ok(resolve::find(self, path)?.node);
        }
        if let Some(node) = resolve::probe(self, path)? {
            return Ok(node);
        }
        Ok(resolve::materialize(self, path, Graft::with_stat(Stat::regular()))?.node)
    }

    fn mkdir(&self, path: &str) -> FsResult<()> {
        if resolve::probe(self, path)?.is_some() {
            return Err(FsError::errno(libc::EEXIST));
        }
        resolve::materialize(self, path, Graft::default())?;
        Ok(())
    }

    fn rmdir(&self, path: &str) -> FsResult<()> {
        let found = resolve::find(self, path)?;
        if !found.node.stat().is_dir() {
            return Err(FsError::errno(libc::ENOTDIR));
        }
        if found.node.has_children() {
            return Err(FsError::errno(libc::ENOTEMPTY));
        }
        let parent = found.parent.ok_or_else(|| FsError::errno(libc::EPERM))?;
        parent.children().remove(found.node.name());
        Ok(())
    }

    fn unlink(&self, path: &str) -> FsResult<()> {
        let found = resolve::find(self, path)?;
        if found.node.stat().is_dir() {
            return Err(FsError::errno(libc::EISDIR));
        }
        let parent = found.parent.ok_or_else(|| FsError::errno(libc::EPERM))?;
        parent.children().remove(found.node.name());
        Ok(())
    }

    fn rename(&self, path: &str, dest: &str) -> FsResult<()> {
        let found = resolve::find(self, path)?;
        let parent = found.parent.ok_or_else(|| FsError::errno(libc::EPERM))?;
        parent.children().remove(found.node.name());

        let payload = Graft {
            stat: Some(found.node.stat()),
            data: Some(found.node.data.clone()),
            children: Some(found.node.take_children()),
        };
        resolve::materialize(self, dest, payload)?;
        Ok(())
    }
}
