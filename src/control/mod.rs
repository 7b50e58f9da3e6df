//! The control channel: the pseudo-file surfaced at the mount root, the
//! line-delimited JSON protocol it speaks, and the command handlers that
//! mutate the live tree.

mod command;
mod file;
mod registry;

pub use file::ControlFile;
pub use registry::{Controller, ShutdownGuard};

use std::sync::Arc;

use crate::node::Stat;

/// Name of the control pseudo-file at the mount root.
pub const CONTROL_NAME: &str = "_fsctl";

/// The control file's identity: its name, its fixed stat record minted at
/// startup, and the controller behind every opened handle.
pub struct ControlInterface {
    controller: Arc<Controller>,
    stat: Stat,
}

impl ControlInterface {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self { stat: Stat::new(libc::S_IFREG | 0o644), controller }
    }

    pub fn name(&self) -> &str {
        CONTROL_NAME
    }

    pub fn stat(&self) -> Stat {
        self.stat
    }

    /// Opens a fresh control handle with its own stream pair.
    pub fn open(&self) -> ControlFile {
        ControlFile::new(Arc::clone(&self.controller), self.stat)
    }
}
