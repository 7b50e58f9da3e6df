//! Inode bookkeeping for the kernel adapter.
//!
//! FUSE addresses objects by inode while the core is addressed by path, so
//! the adapter keeps a bidirectional inode↔path table. Paths are stored
//! relative to the mount root without a leading slash; the root itself is
//! the empty string and always owns inode 1.

use std::collections::HashMap;

/// Inode reserved for the mount root.
pub const ROOT_INO: u64 = 1;

#[derive(Debug)]
pub struct InodeTable {
    next: u64,
    paths: HashMap<u64, String>,
    index: HashMap<String, u64>,
}

impl InodeTable {
    pub fn new() -> Self {
        let mut paths = HashMap::new();
        let mut index = HashMap::new();
        paths.insert(ROOT_INO, String::new());
        index.insert(String::new(), ROOT_INO);
        Self { next: ROOT_INO + 1, paths, index }
    }

    /// Path for an inode the kernel refers to.
    pub fn path(&self, ino: u64) -> Option<String> {
        self.paths.get(&ino).cloned()
    }

    /// Returns the inode for `path`, allocating one if needed.
    pub fn ensure(&mut self, path: String) -> u64 {
        if let Some(&ino) = self.index.get(&path) {
            return ino;
        }
        let ino = self.next;
        self.next += 1;
        self.paths.insert(ino, path.clone());
        self.index.insert(path, ino);
        ino
    }

    /// Drops the entry for `path` and every descendant.
    pub fn forget_path(&mut self, path: &str) {
        if path.is_empty() {
            return;
        }
        let prefix = format!("{path}/");
        let victims: Vec<(u64, String)> = self
            .paths
            .iter()
            .filter(|(_, entry)| entry.as_str() == path || entry.starts_with(&prefix))
            .map(|(&ino, entry)| (ino, entry.clone()))
            .collect();
        for (ino, entry) in victims {
            self.paths.remove(&ino);
            self.index.remove(&entry);
        }
    }

    /// Rewrites the entry for `old` and every descendant to live under
    /// `new`. Whatever previously answered to `new` is forgotten.
    pub fn rename(&mut self, old: &str, new: &str) {
        if old.is_empty() || new.is_empty() || old == new {
            return;
        }
        self.forget_path(new);

        let prefix = format!("{old}/");
        let moves: Vec<(u64, String)> = self
            .paths
            .iter()
            .filter_map(|(&ino, entry)| {
                if entry.as_str() == old {
                    Some((ino, new.to_owned()))
                } else {
                    entry.strip_prefix(&prefix).map(|suffix| (ino, format!("{new}/{suffix}")))
                }
            })
            .collect();
        for (ino, updated) in moves {
            if let Some(previous) = self.paths.insert(ino, updated.clone()) {
                self.index.remove(&previous);
            }
            self.index.insert(updated, ino);
        }
    }
}
