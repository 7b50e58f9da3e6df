//! Archive decoding behind a trait seam, plus the importer that turns a
//! decoded archive into a detached node subtree.

mod archive;

pub use archive::ArchiveBackend;

use std::time::Instant;

use tracing::info;

use crate::buffer::ByteBuffer;
use crate::error::FsResult;
use crate::node::{materialize, Graft, Node, NodeRef, Stat};

/// Source of archive entries. Implementations yield every entry in archive
/// order; a decode failure aborts the walk with the decoder's error.
pub trait Backend {
    fn for_each(
        &mut self,
        visit: &mut dyn FnMut(String, Stat, ByteBuffer) -> FsResult<()>,
    ) -> FsResult<()>;
}

/// Materializes the backend's entries as a detached subtree. On failure no
/// partial tree escapes.
pub fn import(backend: &mut dyn Backend) -> FsResult<NodeRef> {
    let started = Instant::now();
    let root = Node::root();

    backend.for_each(&mut |path, stat, data| {
        info!(path = %path, "loading archive entry");
        materialize(&root, &path, Graft { stat: Some(stat), data: Some(data), children: None })?;
        Ok(())
    })?;

    info!(elapsed_ms = started.elapsed().as_millis() as u64, "storage initialized successfully");
    Ok(root)
}
