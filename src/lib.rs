//! sandbox-fs - an in-memory FUSE file system that exposes archive contents
//! as mountable virtual directory trees.
//!
//! Archives are loaded, mounted, unmounted and unloaded at runtime through
//! a JSON control channel surfaced as a pseudo-file at the mount root.

pub mod backend;
pub mod buffer;
pub mod control;
pub mod error;
pub mod fs;
pub mod mount;
pub mod node;

pub use error::{FsError, FsResult};
