//! The file-system façade: every inbound operation lands here, addressed by
//! path or by open handle.
//!
//! Each operation first checks whether the path names the control file; the
//! control branch either serves it (getattr, open, readdir at the root) or
//! rejects the mutation. Everything else is delegated to the live tree.

mod file;

pub use file::OpenedFile;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::control::ControlInterface;
use crate::error::{FsError, FsResult};
use crate::node::{NodeRef, SetTime, Stat, Tree};

/// The path-addressed operation surface consumed by the mount adapter.
pub struct SandboxFs {
    root: NodeRef,
    ctrl: ControlInterface,
    handles: DashMap<u64, Arc<OpenedFile>>,
    next_handle: AtomicU64,
}

impl SandboxFs {
    pub fn new(root: NodeRef, ctrl: ControlInterface) -> Self {
        Self {
            root,
            ctrl,
            handles: DashMap::new(),
            // handle ids start at 1; 0 means "no handle supplied"
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn control_name(&self) -> &str {
        self.ctrl.name()
    }

    fn is_control(&self, path: &str) -> bool {
        path.strip_prefix('/').is_some_and(|rest| rest == self.ctrl.name())
    }

    fn is_root(path: &str) -> bool {
        path.split('/').all(|segment| segment.is_empty())
    }

    pub fn getattr(&self, path: &str) -> FsResult<Stat> {
        if self.is_control(path) {
            Ok(self.ctrl.stat())
        } else {
            Ok(self.root.get(path, false)?.stat())
        }
    }

    pub fn mkdir(&self, path: &str, mode: u32) -> FsResult<()> {
        if mode & libc::S_IFMT != libc::S_IFDIR {
            Err(FsError::errno(libc::EINVAL))
        } else if self.is_control(path) {
            Err(FsError::errno(libc::EEXIST))
        } else {
            self.root.mkdir(path)
        }
    }

    pub fn rmdir(&self, path: &str) -> FsResult<()> {
        if self.is_control(path) {
            Err(FsError::errno(libc::ENOTDIR))
        } else {
            self.root.rmdir(path)
        }
    }

    pub fn unlink(&self, path: &str) -> FsResult<()> {
        if self.is_control(path) {
            Err(FsError::errno(libc::EPERM))
        } else {
            self.root.unlink(path)
        }
    }

    pub fn rename(&self, path: &str, dest: &str) -> FsResult<()> {
        if self.is_control(path) || self.is_control(dest) {
            Err(FsError::errno(libc::EPERM))
        } else {
            self.root.rename(path, dest)
        }
    }

    pub fn truncate(&self, path: &str, size: u64) -> FsResult<()> {
        if self.is_control(path) {
            Err(FsError::errno(libc::EPERM))
        } else {
            self.root.get(path, false)?.resize(size)
        }
    }

    pub fn utimens(&self, path: &str, atime: SetTime, mtime: SetTime) -> FsResult<()> {
        if self.is_control(path) {
            Err(FsError::errno(libc::EPERM))
        } else {
            self.root.get(path, false)?.utimens(atime, mtime);
            Ok(())
        }
    }

    pub fn access(&self, path: &str) -> FsResult<()> {
        if !self.is_control(path) {
            self.root.get(path, false)?.access();
        }
        Ok(())
    }

    /// Opens `path` and returns the handle id. `O_CREAT` in `flags` creates
    /// a missing path as a regular file.
    pub fn open(&self, path: &str, flags: i32) -> FsResult<u64> {
        let opened = if self.is_control(path) {
            OpenedFile::control(flags, self.ctrl.open())
        } else {
            let node = self.root.get(path, flags & libc::O_CREAT != 0)?;
            OpenedFile::node(flags, node)
        };
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.handles.insert(id, Arc::new(opened));
        Ok(id)
    }

    /// Creates and opens a regular file; the creation mode is fixed by the
    /// tree, not the caller.
    pub fn create(&self, path: &str, flags: i32) -> FsResult<u64> {
        self.open(path, flags | libc::O_CREAT)
    }

    pub fn read(&self, fh: u64, size: usize, offset: u64) -> FsResult<Vec<u8>> {
        let file = self.handle(fh)?;
        let mut buf = vec![0u8; size];
        let count = file.read(&mut buf, offset)?;
        buf.truncate(count);
        Ok(buf)
    }

    pub fn write(&self, fh: u64, data: &[u8], offset: u64) -> FsResult<usize> {
        self.handle(fh)?.write(data, offset)
    }

    pub fn release(&self, fh: u64) -> FsResult<()> {
        if fh == 0 {
            return Err(FsError::errno(libc::EINVAL));
        }
        match self.handles.remove(&fh) {
            Some(_) => Ok(()),
            None => Err(FsError::errno(libc::EBADF)),
        }
    }

    /// Stat through a handle, degrading to the path when no handle is
    /// supplied.
    pub fn fgetattr(&self, fh: u64, path: &str) -> FsResult<Stat> {
        if fh == 0 {
            self.getattr(path)
        } else {
            Ok(self.handle(fh)?.stat())
        }
    }

    /// Truncate through a handle, degrading to the path when no handle is
    /// supplied.
    pub fn ftruncate(&self, fh: u64, path: &str, size: u64) -> FsResult<()> {
        if fh == 0 {
            self.truncate(path, size)
        } else {
            self.handle(fh)?.resize(size)
        }
    }

    /// Whether the handle was opened in direct-I/O mode.
    pub fn direct_io(&self, fh: u64) -> bool {
        self.handles.get(&fh).map(|entry| entry.direct_io()).unwrap_or(false)
    }

    /// Directory listing: `.`, `..`, the control file at the mount root,
    /// then a weakly consistent snapshot of the children.
    pub fn readdir(&self, path: &str) -> FsResult<Vec<(String, Stat)>> {
        let mut entries =
            vec![(".".to_owned(), Stat::directory()), ("..".to_owned(), Stat::directory())];
        if Self::is_root(path) {
            entries.push((self.ctrl.name().to_owned(), self.ctrl.stat()));
        }
        entries.extend(self.root.get(path, false)?.list());
        Ok(entries)
    }

    fn handle(&self, fh: u64) -> FsResult<Arc<OpenedFile>> {
        if fh == 0 {
            return Err(FsError::errno(libc::EINVAL));
        }
        self.handles
            .get(&fh)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| FsError::errno(libc::EBADF))
    }
}
