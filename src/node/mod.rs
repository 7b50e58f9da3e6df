//! Defines the in-memory file [`Node`] and its attribute records.
//!
//! A node carries a stat record, its local name, a copy-on-write byte buffer
//! (empty for directories) and a concurrent map of children. Nodes are shared
//! as [`NodeRef`]s; whole subtrees are duplicated with [`Node::clone_tree`],
//! which deep-clones the structure while the file bytes stay shared
//! copy-on-write.

mod resolve;
mod tree;

pub use tree::Tree;

pub(crate) use resolve::{materialize, Graft};

use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

use crate::buffer::ByteBuffer;
use crate::error::{FsError, FsResult};

/// Shared handle onto a tree node.
pub type NodeRef = Arc<Node>;

/// Timestamp with nanosecond precision, seconds since the Unix epoch.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FileTime {
    pub seconds: i64,
    pub nanos: u32,
}

impl FileTime {
    /// Current realtime clock reading.
    pub fn now() -> Self {
        let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Self { seconds: elapsed.as_secs() as i64, nanos: elapsed.subsec_nanos() }
    }
}

/// Strategy for updating a timestamp in [`Node::utimens`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SetTime {
    #[default]
    DontChange,
    ServerCurrent,
    ClientProvided(FileTime),
}

/// POSIX-style attribute record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Stat {
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: FileTime,
    pub mtime: FileTime,
    pub ctime: FileTime,
}

impl Stat {
    /// Mints a fresh record with the supplied mode: one link, the effective
    /// uid/gid of the process, zero size and all timestamps set to now.
    pub fn new(mode: u32) -> Self {
        let now = FileTime::now();
        Self {
            mode,
            nlink: 1,
            // SAFETY: geteuid/getegid cannot fail.
            uid: unsafe { libc::geteuid() },
            gid: unsafe { libc::getegid() },
            size: 0,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    /// Default record for a directory.
    pub fn directory() -> Self {
        Self::new(libc::S_IFDIR | 0o755)
    }

    /// Default record for a regular file.
    pub fn regular() -> Self {
        Self::new(libc::S_IFREG | 0o644)
    }

    pub fn is_dir(&self) -> bool {
        self.mode & libc::S_IFMT == libc::S_IFDIR
    }
}

/// A single node of the in-memory tree.
#[derive(Debug)]
pub struct Node {
    name: String,
    stat: RwLock<Stat>,
    data: ByteBuffer,
    children: DashMap<String, NodeRef>,
}

impl Node {
    /// Returns a fresh root directory with an empty name.
    pub fn root() -> NodeRef {
        Self::new("", Stat::directory())
    }

    pub(crate) fn new(name: impl Into<String>, stat: Stat) -> NodeRef {
        Arc::new(Self {
            name: name.into(),
            stat: RwLock::new(stat),
            data: ByteBuffer::new(),
            children: DashMap::new(),
        })
    }

    /// Local name; matches the key the parent holds this node under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of the current attribute record.
    pub fn stat(&self) -> Stat {
        *self.stat.read().expect("node stat lock poisoned")
    }

    fn stat_mut(&self) -> RwLockWriteGuard<'_, Stat> {
        self.stat.write().expect("node stat lock poisoned")
    }

    pub(crate) fn children(&self) -> &DashMap<String, NodeRef> {
        &self.children
    }

    /// Weakly consistent snapshot of the children, name and stat each.
    pub fn list(&self) -> Vec<(String, Stat)> {
        self.children.iter().map(|entry| (entry.key().clone(), entry.value().stat())).collect()
    }

    /// Whether this node has any children.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Attaches `node` as a direct child named `name`.
    pub fn add(&self, name: &str, node: NodeRef) -> FsResult<()> {
        match self.children.entry(name.to_owned()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(FsError::errno(libc::EEXIST)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(node);
                Ok(())
            }
        }
    }

    /// Detaches the direct child named `name`.
    pub fn del(&self, name: &str) -> FsResult<()> {
        match self.children.remove(name) {
            Some(_) => Ok(()),
            None => Err(FsError::errno(libc::ENOENT)),
        }
    }

    /// Deep-clones the subtree rooted here. Every node is duplicated; file
    /// bytes stay shared copy-on-write through their buffer handles.
    pub fn clone_tree(&self) -> NodeRef {
        self.clone_as(self.name.clone())
    }

    /// Deep-clones the subtree, renaming the duplicated root to `name`.
    pub fn clone_as(&self, name: impl Into<String>) -> NodeRef {
        let copy = Self {
            name: name.into(),
            stat: RwLock::new(self.stat()),
            data: self.data.clone(),
            children: DashMap::new(),
        };
        for entry in self.children.iter() {
            copy.children.insert(entry.key().clone(), entry.value().clone_tree());
        }
        Arc::new(copy)
    }

    /// Marks the node as accessed.
    pub fn access(&self) {
        self.stat_mut().atime = FileTime::now();
    }

    /// Truncates or extends the file contents to `size` bytes.
    pub fn resize(&self, size: u64) -> FsResult<()> {
        if self.stat().is_dir() {
            return Err(FsError::errno(libc::EISDIR));
        }
        self.data.resize(size as usize);
        let mut stat = self.stat_mut();
        stat.size = self.data.len() as u64;
        stat.mtime = FileTime::now();
        Ok(())
    }

    /// Applies the requested timestamp updates.
    pub fn utimens(&self, atime: SetTime, mtime: SetTime) {
        let mut stat = self.stat_mut();
        apply_time(&mut stat.atime, atime);
        apply_time(&mut stat.mtime, mtime);
    }

    /// Reads file bytes at `offset`, updating the access time.
    pub fn read(&self, buf: &mut [u8], offset: usize) -> usize {
        self.access();
        self.data.read(buf, offset)
    }

    /// Writes file bytes at `offset`, updating size and modification time.
    pub fn write(&self, data: &[u8], offset: usize) -> usize {
        let count = self.data.write(data, offset);
        let mut stat = self.stat_mut();
        stat.size = self.data.len() as u64;
        stat.mtime = FileTime::now();
        count
    }

    /// Overwrites this node's content with the graft payload.
    pub(crate) fn graft(&self, payload: Graft) {
        if let Some(stat) = payload.stat {
            *self.stat_mut() = stat;
        }
        if let Some(data) = payload.data {
            self.data.swap(&data);
        }
        if let Some(children) = payload.children {
            self.children.clear();
            for (name, node) in children {
                self.children.insert(name, node);
            }
        }
    }

    fn take_children(&self) -> Vec<(String, NodeRef)> {
        let names: Vec<String> = self.children.iter().map(|entry| entry.key().clone()).collect();
        names.into_iter().filter_map(|name| self.children.remove(&name)).collect()
    }
}

fn apply_time(slot: &mut FileTime, update: SetTime) {
    match update {
        SetTime::DontChange => {}
        SetTime::ServerCurrent => *slot = FileTime::now(),
        SetTime::ClientProvided(value) => *slot = value,
    }
}
