//! The per-open control handle: a write-stream of request bytes, a
//! read-stream of reply bytes, and the newline framing between them.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;
use tracing::error;

use crate::error::FsResult;
use crate::node::Stat;

use super::registry::Controller;
use super::command::Command;

/// One opened control file. Every open gets its own stream pair; the
/// controller behind them is shared process state.
pub struct ControlFile {
    controller: Arc<Controller>,
    stat: Stat,
    /// Reply bytes not yet delivered to the client.
    rbuf: Mutex<VecDeque<u8>>,
    /// Request bytes not yet terminated by a newline.
    wbuf: Mutex<VecDeque<u8>>,
}

impl ControlFile {
    pub(crate) fn new(controller: Arc<Controller>, stat: Stat) -> Self {
        Self {
            controller,
            stat,
            rbuf: Mutex::new(VecDeque::new()),
            wbuf: Mutex::new(VecDeque::new()),
        }
    }

    pub fn stat(&self) -> Stat {
        self.stat
    }

    /// Drains pending reply bytes into `buf`; returns 0 when none are
    /// queued. Never blocks.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let mut rbuf = lock(&self.rbuf);
        let count = buf.len().min(rbuf.len());
        for (slot, byte) in buf.iter_mut().zip(rbuf.drain(..count)) {
            *slot = byte;
        }
        count
    }

    /// Buffers request bytes, then dispatches every complete line. The
    /// whole buffer is always accepted; a dispatch failure reaches the
    /// writer after the offending line has been consumed.
    pub fn write(&self, data: &[u8]) -> FsResult<usize> {
        lock(&self.wbuf).extend(data.iter().copied());
        if data.contains(&b'\n') {
            self.run_pending()?;
        }
        Ok(data.len())
    }

    fn run_pending(&self) -> FsResult<()> {
        while let Some(line) = self.take_line() {
            self.dispatch(&line)?;
        }
        Ok(())
    }

    /// Removes one `\n`-terminated line from the write-stream, without its
    /// terminator.
    fn take_line(&self) -> Option<String> {
        let mut wbuf = lock(&self.wbuf);
        let end = wbuf.iter().position(|&byte| byte == b'\n')?;
        let line: Vec<u8> = wbuf.drain(..=end).take(end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn dispatch(&self, line: &str) -> FsResult<()> {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(err) => {
                error!(error = %err, "cannot parse control request, dropped");
                return Err(err);
            }
        };

        match command {
            Command::Load(args) => {
                let token = self.controller.load(&args.file)?;
                self.reply(json!({ "token": token }));
            }
            Command::Mount(args) => self.controller.mount(&args.token, &args.alias)?,
            Command::Unload(args) => self.controller.unload(&args.token)?,
            Command::Unmount(args) => self.controller.unmount(&args.alias)?,
        }
        Ok(())
    }

    fn reply(&self, value: serde_json::Value) {
        let mut line = value.to_string();
        line.push('\n');
        lock(&self.rbuf).extend(line.into_bytes());
    }
}

fn lock<T>(cell: &Mutex<T>) -> MutexGuard<'_, T> {
    cell.lock().expect("control stream lock poisoned")
}
