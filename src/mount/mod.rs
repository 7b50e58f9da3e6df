//! Kernel adapter: bridges the FUSE low-level callback interface onto the
//! path-based façade and translates core failures back into `-errno`.

mod inode;

use std::ffi::OsStr;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::consts::FOPEN_DIRECT_IO;
use fuser::{
    FileType, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::fs::SandboxFs;
use crate::node::{FileTime, SetTime, Stat};

use inode::InodeTable;

/// Attributes are revalidated on every call since the tree mutates live.
const TTL: Duration = Duration::ZERO;

/// Mounts `fs` at `mountpoint` and serves requests until unmounted.
pub fn mount(fs: SandboxFs, mountpoint: &Path, options: &str) -> FsResult<()> {
    fuser::mount2(SandboxMount::new(fs), mountpoint, &mount_options(options))
        .map_err(FsError::from)
}

fn mount_options(list: &str) -> Vec<MountOption> {
    let mut options = vec![MountOption::FSName("sandbox_fs".to_owned())];
    for item in list.split(',').filter(|item| !item.is_empty()) {
        options.push(match item {
            "ro" => MountOption::RO,
            "rw" => MountOption::RW,
            "allow_other" => MountOption::AllowOther,
            "allow_root" => MountOption::AllowRoot,
            "auto_unmount" => MountOption::AutoUnmount,
            "default_permissions" => MountOption::DefaultPermissions,
            other => MountOption::CUSTOM(other.to_owned()),
        });
    }
    options
}

struct SandboxMount {
    fs: SandboxFs,
    inodes: Mutex<InodeTable>,
}

impl SandboxMount {
    fn new(fs: SandboxFs) -> Self {
        Self { fs, inodes: Mutex::new(InodeTable::new()) }
    }

    fn table(&self) -> MutexGuard<'_, InodeTable> {
        self.inodes.lock().expect("inode table lock poisoned")
    }

    fn rel_path(&self, ino: u64) -> FsResult<String> {
        self.table().path(ino).ok_or_else(|| FsError::errno(libc::ENOENT))
    }

    fn child_rel(&self, parent: u64, name: &OsStr) -> FsResult<String> {
        let name = name.to_str().ok_or_else(|| FsError::errno(libc::EINVAL))?;
        Ok(join(&self.rel_path(parent)?, name))
    }

    /// Stats `rel`, registers its inode and replies with the entry.
    fn reply_entry(&self, rel: String, reply: ReplyEntry) {
        match self.fs.getattr(&abs(&rel)) {
            Ok(stat) => {
                let ino = self.table().ensure(rel);
                reply.entry(&TTL, &file_attr(ino, &stat), 0);
            }
            Err(err) => reply.error(err.code),
        }
    }
}

impl Filesystem for SandboxMount {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.child_rel(parent, name) {
            Ok(rel) => self.reply_entry(rel, reply),
            Err(err) => reply.error(err.code),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let result = self.rel_path(ino).and_then(|rel| self.fs.getattr(&abs(&rel)));
        match result {
            Ok(stat) => reply.attr(&TTL, &file_attr(ino, &stat)),
            Err(err) => reply.error(err.code),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let rel = match self.rel_path(ino) {
            Ok(rel) => rel,
            Err(err) => return reply.error(err.code),
        };
        let path = abs(&rel);
        let fh = fh.unwrap_or(0);

        if let Some(size) = size {
            if let Err(err) = self.fs.ftruncate(fh, &path, size) {
                return reply.error(err.code);
            }
        }
        if atime.is_some() || mtime.is_some() {
            if let Err(err) = self.fs.utimens(&path, set_time(atime), set_time(mtime)) {
                return reply.error(err.code);
            }
        }

        match self.fs.fgetattr(fh, &path) {
            Ok(stat) => reply.attr(&TTL, &file_attr(ino, &stat)),
            Err(err) => reply.error(err.code),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let rel = match self.child_rel(parent, name) {
            Ok(rel) => rel,
            Err(err) => return reply.error(err.code),
        };
        // the kernel passes permission bits only; the façade wants the full
        // directory mode
        match self.fs.mkdir(&abs(&rel), libc::S_IFDIR | (mode & 0o7777)) {
            Ok(()) => self.reply_entry(rel, reply),
            Err(err) => reply.error(err.code),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let result = self.child_rel(parent, name).and_then(|rel| {
            self.fs.unlink(&abs(&rel))?;
            self.table().forget_path(&rel);
            Ok(())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(err.code),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let result = self.child_rel(parent, name).and_then(|rel| {
            self.fs.rmdir(&abs(&rel))?;
            self.table().forget_path(&rel);
            Ok(())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(err.code),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let result = self.child_rel(parent, name).and_then(|src| {
            let dest = self.child_rel(newparent, newname)?;
            self.fs.rename(&abs(&src), &abs(&dest))?;
            self.table().rename(&src, &dest);
            Ok(())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(err.code),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let result = self.rel_path(ino).and_then(|rel| self.fs.open(&abs(&rel), flags));
        match result {
            Ok(fh) => reply.opened(fh, open_flags(&self.fs, fh)),
            Err(err) => reply.error(err.code),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let rel = match self.child_rel(parent, name) {
            Ok(rel) => rel,
            Err(err) => return reply.error(err.code),
        };
        let result = self
            .fs
            .create(&abs(&rel), flags)
            .and_then(|fh| self.fs.fgetattr(fh, &abs(&rel)).map(|stat| (fh, stat)));
        match result {
            Ok((fh, stat)) => {
                let ino = self.table().ensure(rel);
                reply.created(&TTL, &file_attr(ino, &stat), 0, fh, open_flags(&self.fs, fh));
            }
            Err(err) => reply.error(err.code),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.fs.read(fh, size as usize, offset.max(0) as u64) {
            Ok(data) => reply.data(&data),
            Err(err) => reply.error(err.code),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        match self.fs.write(fh, data, offset.max(0) as u64) {
            Ok(count) => reply.written(count as u32),
            Err(err) => reply.error(err.code),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        // nothing is cached outside the tree itself
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        match self.fs.release(fh) {
            Ok(()) => reply.ok(),
            Err(err) => {
                debug!(fh, code = err.code, "release of unknown handle");
                reply.error(err.code);
            }
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let rel = match self.rel_path(ino) {
            Ok(rel) => rel,
            Err(err) => return reply.error(err.code),
        };
        let entries = match self.fs.readdir(&abs(&rel)) {
            Ok(entries) => entries,
            Err(err) => return reply.error(err.code),
        };

        for (index, (name, stat)) in entries.into_iter().enumerate().skip(offset.max(0) as usize) {
            let entry_ino = match name.as_str() {
                "." | ".." => ino,
                _ => self.table().ensure(join(&rel, &name)),
            };
            if reply.add(entry_ino, (index + 1) as i64, file_kind(stat.mode), &name) {
                break;
            }
        }
        reply.ok();
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, _mask: i32, reply: ReplyEmpty) {
        let result = self.rel_path(ino).and_then(|rel| self.fs.access(&abs(&rel)));
        match result {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(err.code),
        }
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}/{name}")
    }
}

fn abs(rel: &str) -> String {
    format!("/{rel}")
}

fn open_flags(fs: &SandboxFs, fh: u64) -> u32 {
    if fs.direct_io(fh) {
        FOPEN_DIRECT_IO
    } else {
        0
    }
}

fn file_attr(ino: u64, stat: &Stat) -> fuser::FileAttr {
    fuser::FileAttr {
        ino,
        size: stat.size,
        blocks: stat.size.div_ceil(512),
        atime: system_time(stat.atime),
        mtime: system_time(stat.mtime),
        ctime: system_time(stat.ctime),
        crtime: system_time(stat.ctime),
        kind: file_kind(stat.mode),
        perm: (stat.mode & 0o7777) as u16,
        nlink: stat.nlink,
        uid: stat.uid,
        gid: stat.gid,
        rdev: 0,
        blksize: 512,
        flags: 0,
    }
}

fn file_kind(mode: u32) -> FileType {
    match mode & libc::S_IFMT {
        libc::S_IFDIR => FileType::Directory,
        _ => FileType::RegularFile,
    }
}

fn system_time(time: FileTime) -> SystemTime {
    if time.seconds >= 0 {
        UNIX_EPOCH + Duration::new(time.seconds as u64, time.nanos)
    } else {
        UNIX_EPOCH - Duration::from_secs(time.seconds.unsigned_abs())
    }
}

fn file_time(at: SystemTime) -> FileTime {
    match at.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => {
            FileTime { seconds: elapsed.as_secs() as i64, nanos: elapsed.subsec_nanos() }
        }
        Err(before) => FileTime { seconds: -(before.duration().as_secs() as i64), nanos: 0 },
    }
}

fn set_time(update: Option<TimeOrNow>) -> SetTime {
    match update {
        None => SetTime::DontChange,
        Some(TimeOrNow::Now) => SetTime::ServerCurrent,
        Some(TimeOrNow::SpecificTime(at)) => SetTime::ClientProvided(file_time(at)),
    }
}
