//! Control protocol request shapes and parsing.
//!
//! A request line is a JSON object `{"cmd": <name>, "args": {..}}`. Each
//! command declares its argument record; anything malformed (invalid JSON,
//! a missing or mistyped argument, an unknown command) is `EINVAL`.

use serde::Deserialize;

use crate::error::{FsError, FsResult};

#[derive(Debug, Deserialize)]
struct Request {
    cmd: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct LoadArgs {
    pub file: String,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct MountArgs {
    pub token: String,
    pub alias: String,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct UnloadArgs {
    pub token: String,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct UnmountArgs {
    pub alias: String,
}

/// A fully parsed control request.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Load(LoadArgs),
    Mount(MountArgs),
    Unload(UnloadArgs),
    Unmount(UnmountArgs),
}

impl Command {
    /// Parses a single request line.
    pub fn parse(line: &str) -> FsResult<Self> {
        let request: Request = serde_json::from_str(line).map_err(|err| {
            FsError::with_message(libc::EINVAL, format!("cannot parse request: {err}"))
        })?;
        match request.cmd.as_str() {
            "LOAD" => Ok(Self::Load(args(request.args)?)),
            "MOUNT" => Ok(Self::Mount(args(request.args)?)),
            "UNLOAD" => Ok(Self::Unload(args(request.args)?)),
            "UNMOUNT" => Ok(Self::Unmount(args(request.args)?)),
            other => {
                Err(FsError::with_message(libc::EINVAL, format!("unknown command '{other}'")))
            }
        }
    }
}

fn args<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> FsResult<T> {
    serde_json::from_value(value).map_err(|err| {
        FsError::with_message(libc::EINVAL, format!("bad command arguments: {err}"))
    })
}
