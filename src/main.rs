use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sandbox_fs::control::{ControlInterface, Controller, ShutdownGuard};
use sandbox_fs::fs::SandboxFs;
use sandbox_fs::mount;
use sandbox_fs::node::Node;

#[derive(Parser)]
#[command(name = "sandbox_fs", version, about = "In-memory archive-mounting file system")]
struct Args {
    /// VFS mount options, forwarded to the kernel mount.
    #[arg(short = 'o', value_name = "opts", default_value = "")]
    options: String,

    /// Where to mount the file system.
    #[arg(value_name = "mountpoint")]
    mountpoint: Vec<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mountpoint = match args.mountpoint.as_slice() {
        [single] => single.clone(),
        [] => {
            eprintln!("* error: mountpoint is not specified.");
            return ExitCode::from(1);
        }
        _ => {
            eprintln!("* error: multiple mountpoints are not supported.");
            return ExitCode::from(1);
        }
    };

    let root = Node::root();
    let controller = Controller::new(Arc::clone(&root));
    let _guard = ShutdownGuard::new(Arc::clone(&controller));
    let fs = SandboxFs::new(root, ControlInterface::new(controller));
    info!("sandbox initialized successfully");

    if let Err(err) = mount::mount(fs, &mountpoint, &args.options) {
        error!(code = err.code, message = %err.message, "fatal file system error");
        return ExitCode::from(err.code.clamp(1, 255) as u8);
    }

    info!("bye");
    ExitCode::SUCCESS
}
