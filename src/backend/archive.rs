//! Archive file decoding for tar, gzip-compressed tar and zip.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::debug;

use crate::buffer::ByteBuffer;
use crate::error::{FsError, FsResult};
use crate::node::{FileTime, Stat};

use super::Backend;

const COPY_CHUNK: usize = 64 * 1024;

/// Decodes a single archive file, sniffing the container format from its
/// leading magic bytes at open time.
pub struct ArchiveBackend {
    path: PathBuf,
    format: Format,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Format {
    Tar,
    TarGz,
    Zip,
}

impl ArchiveBackend {
    /// Opens `path` and determines its container format.
    pub fn open(path: impl Into<PathBuf>) -> FsResult<Self> {
        let path = path.into();
        let mut file = File::open(&path)?;
        let mut magic = [0u8; 4];
        let count = file.read(&mut magic)?;
        Ok(Self { path, format: sniff(&magic[..count]) })
    }
}

impl Backend for ArchiveBackend {
    fn for_each(
        &mut self,
        visit: &mut dyn FnMut(String, Stat, ByteBuffer) -> FsResult<()>,
    ) -> FsResult<()> {
        let file = File::open(&self.path)?;
        match self.format {
            Format::Tar => walk_tar(tar::Archive::new(file), visit),
            Format::TarGz => walk_tar(tar::Archive::new(GzDecoder::new(file)), visit),
            Format::Zip => walk_zip(file, visit),
        }
    }
}

fn sniff(magic: &[u8]) -> Format {
    if magic.starts_with(&[0x1f, 0x8b]) {
        Format::TarGz
    } else if magic.starts_with(b"PK") {
        Format::Zip
    } else {
        Format::Tar
    }
}

fn walk_tar<R: Read>(
    mut archive: tar::Archive<R>,
    visit: &mut dyn FnMut(String, Stat, ByteBuffer) -> FsResult<()>,
) -> FsResult<()> {
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = normalize(entry.path()?.as_ref());
        if path.is_empty() {
            continue;
        }

        let header = entry.header();
        let kind = header.entry_type();
        let is_dir = kind.is_dir();
        if !is_dir && !matches!(kind, tar::EntryType::Regular) {
            debug!(path = %path, kind = ?kind, "skipping unsupported archive entry");
            continue;
        }

        let mut stat = entry_stat(is_dir, header.mode()?);
        stat.uid = header.uid()? as u32;
        stat.gid = header.gid()? as u32;
        set_times(&mut stat, FileTime { seconds: header.mtime()? as i64, nanos: 0 });

        let data = ByteBuffer::new();
        if !is_dir {
            data.ensure(header.size()? as usize);
            copy_entry(&mut entry, &data)?;
            stat.size = data.len() as u64;
        }
        visit(path, stat, data)?;
    }
    Ok(())
}

fn walk_zip(
    file: File,
    visit: &mut dyn FnMut(String, Stat, ByteBuffer) -> FsResult<()>,
) -> FsResult<()> {
    let mut archive = zip::ZipArchive::new(file).map_err(zip_error)?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(zip_error)?;
        let path = match entry.enclosed_name().map(Path::to_owned) {
            Some(name) => normalize(&name),
            None => {
                debug!(name = entry.name(), "skipping zip entry with unsafe name");
                continue;
            }
        };
        if path.is_empty() {
            continue;
        }

        let is_dir = entry.is_dir();
        let mut stat = entry_stat(is_dir, entry.unix_mode().unwrap_or(0));
        set_times(&mut stat, zip_time(entry.last_modified()));

        let data = ByteBuffer::new();
        if !is_dir {
            data.ensure(entry.size() as usize);
            copy_entry(&mut entry, &data)?;
            stat.size = data.len() as u64;
        }
        visit(path, stat, data)?;
    }
    Ok(())
}

fn copy_entry(reader: &mut impl Read, data: &ByteBuffer) -> FsResult<()> {
    let mut chunk = [0u8; COPY_CHUNK];
    loop {
        let count = reader.read(&mut chunk)?;
        if count == 0 {
            return Ok(());
        }
        data.write(&chunk[..count], data.len());
    }
}

fn entry_stat(is_dir: bool, mode: u32) -> Stat {
    let perm = mode & 0o7777;
    if is_dir {
        Stat::new(libc::S_IFDIR | if perm == 0 { 0o755 } else { perm })
    } else {
        Stat::new(libc::S_IFREG | if perm == 0 { 0o644 } else { perm })
    }
}

fn set_times(stat: &mut Stat, time: FileTime) {
    stat.atime = time;
    stat.mtime = time;
    stat.ctime = time;
}

/// Joins the normal components of an archive path with `/`, dropping `.`,
/// `..` and any root prefix.
fn normalize(path: &Path) -> String {
    let parts: Vec<_> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

fn zip_error(err: zip::result::ZipError) -> FsError {
    match err {
        zip::result::ZipError::Io(inner) => inner.into(),
        other => FsError::with_message(libc::EINVAL, other.to_string()),
    }
}

fn zip_time(time: zip::DateTime) -> FileTime {
    let seconds = days_from_civil(time.year() as i64, time.month() as i64, time.day() as i64)
        * 86_400
        + (time.hour() as i64) * 3_600
        + (time.minute() as i64) * 60
        + time.second() as i64;
    FileTime { seconds, nanos: 0 }
}

/// Days since the Unix epoch for a proleptic Gregorian calendar date.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = if year >= 0 { year } else { year - 399 } / 400;
    let year_of_era = year - era * 400;
    let day_of_year = (153 * (if month > 2 { month - 3 } else { month + 9 }) + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}
