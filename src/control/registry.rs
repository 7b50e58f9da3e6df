//! Process-wide archive registry and the four control commands.
//!
//! Two concurrent maps serialize the whole lifecycle: `tokens` maps an
//! archive path to its token (guaranteeing at most one live LOAD per path),
//! `files` maps a token to the archive's detached subtree. MOUNT grafts a
//! deep clone of the subtree under the live root, so UNLOAD never disturbs
//! mounts that already happened.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use tracing::info;

use crate::backend::{self, ArchiveBackend};
use crate::error::{FsError, FsResult};
use crate::node::NodeRef;

const TOKEN_LEN: usize = 32;
const TOKEN_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

struct FileRecord {
    name: String,
    node: NodeRef,
}

/// Archive registry plus the live root every mount grafts onto.
pub struct Controller {
    root: NodeRef,
    files: DashMap<String, FileRecord>,
    tokens: DashMap<String, String>,
}

impl Controller {
    pub fn new(root: NodeRef) -> Arc<Self> {
        Arc::new(Self { root, files: DashMap::new(), tokens: DashMap::new() })
    }

    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    /// Imports the archive at `file` and registers it under a fresh token.
    /// A path that is already loaded fails `EEXIST`.
    pub fn load(&self, file: &str) -> FsResult<String> {
        let token = mint_token();
        match self.tokens.entry(file.to_owned()) {
            Entry::Occupied(_) => return Err(FsError::errno(libc::EEXIST)),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
            }
        }

        // a failed import leaves the token reservation behind, so the path
        // stays blocked until the process restarts
        let mut source = ArchiveBackend::open(file)?;
        let node = backend::import(&mut source)?;
        self.files.insert(token.clone(), FileRecord { name: file.to_owned(), node });

        info!(file = %file, token = %token, "archive loaded");
        Ok(token)
    }

    /// Grafts a clone of the subtree registered under `token` as the root
    /// child `alias`.
    pub fn mount(&self, token: &str, alias: &str) -> FsResult<()> {
        let node = match self.files.get(token) {
            Some(record) => record.node.clone_as(validate(alias)?),
            None => return Err(FsError::errno(libc::ENOENT)),
        };
        self.root.add(alias, node)?;
        info!(alias = %alias, token = %token, "virtual directory mounted");
        Ok(())
    }

    /// Drops the registry entry for `token`. Existing grafts are clones and
    /// stay alive.
    pub fn unload(&self, token: &str) -> FsResult<()> {
        let (_, record) =
            self.files.remove(token).ok_or_else(|| FsError::errno(libc::ENOENT))?;
        self.tokens.remove(&record.name);
        info!(file = %record.name, token = %token, "archive unloaded");
        Ok(())
    }

    /// Detaches the root child `alias`.
    pub fn unmount(&self, alias: &str) -> FsResult<()> {
        self.root.del(validate(alias)?)?;
        info!(alias = %alias, "virtual directory unmounted");
        Ok(())
    }

    /// Drops every registry entry.
    pub fn shutdown(&self) {
        self.files.clear();
        self.tokens.clear();
    }
}

/// Clears the registries when dropped, so they are released on every exit
/// path.
pub struct ShutdownGuard(Arc<Controller>);

impl ShutdownGuard {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self(controller)
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

fn mint_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN).map(|_| TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())] as char).collect()
}

fn validate(name: &str) -> FsResult<&str> {
    if name.contains(['/', '\0']) {
        Err(FsError::errno(libc::EINVAL))
    } else {
        Ok(name)
    }
}
