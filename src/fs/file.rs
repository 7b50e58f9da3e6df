//! Opened-file handles and open-mode enforcement.

use crate::control::ControlFile;
use crate::error::{FsError, FsResult};
use crate::node::{NodeRef, Stat};

/// Raw per-handle operations, implemented by tree files and the control
/// handle alike.
trait RawFile: Send + Sync {
    fn stat(&self) -> Stat;
    fn set_len(&self, size: u64) -> FsResult<()>;
    fn read_at(&self, buf: &mut [u8], offset: u64) -> FsResult<usize>;
    fn write_at(&self, data: &[u8], offset: u64) -> FsResult<usize>;
}

/// An entry of the open-handle table. Wraps the raw operations with the
/// access-mode checks of the flags the file was opened with.
pub struct OpenedFile {
    flags: i32,
    direct_io: bool,
    file: Box<dyn RawFile>,
}

impl OpenedFile {
    /// Handle onto a tree node.
    pub(crate) fn node(flags: i32, node: NodeRef) -> Self {
        Self { flags, direct_io: false, file: Box::new(TreeFile(node)) }
    }

    /// Handle onto a fresh control stream pair; always direct I/O.
    pub(crate) fn control(flags: i32, control: ControlFile) -> Self {
        Self { flags, direct_io: true, file: Box::new(control) }
    }

    pub fn direct_io(&self) -> bool {
        self.direct_io
    }

    pub fn stat(&self) -> Stat {
        self.file.stat()
    }

    pub fn resize(&self, size: u64) -> FsResult<()> {
        if self.accmode() == libc::O_RDONLY {
            return Err(FsError::errno(libc::EBADF));
        }
        self.file.set_len(size)
    }

    pub fn read(&self, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        if self.accmode() == libc::O_WRONLY {
            return Err(FsError::errno(libc::EBADF));
        }
        self.file.read_at(buf, offset)
    }

    pub fn write(&self, data: &[u8], offset: u64) -> FsResult<usize> {
        if self.accmode() == libc::O_RDONLY {
            return Err(FsError::errno(libc::EBADF));
        }
        self.file.write_at(data, offset)
    }

    fn accmode(&self) -> i32 {
        self.flags & libc::O_ACCMODE
    }
}

struct TreeFile(NodeRef);

impl RawFile for TreeFile {
    fn stat(&self) -> Stat {
        self.0.stat()
    }

    fn set_len(&self, size: u64) -> FsResult<()> {
        self.0.resize(size)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> FsResult<usize> {
        Ok(self.0.read(buf, offset as usize))
    }

    fn write_at(&self, data: &[u8], offset: u64) -> FsResult<usize> {
        Ok(self.0.write(data, offset as usize))
    }
}

impl RawFile for ControlFile {
    fn stat(&self) -> Stat {
        ControlFile::stat(self)
    }

    // truncating the control stream is meaningless and silently accepted
    fn set_len(&self, _size: u64) -> FsResult<()> {
        Ok(())
    }

    fn read_at(&self, buf: &mut [u8], _offset: u64) -> FsResult<usize> {
        Ok(ControlFile::read(self, buf))
    }

    fn write_at(&self, data: &[u8], _offset: u64) -> FsResult<usize> {
        ControlFile::write(self, data)
    }
}
