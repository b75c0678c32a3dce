//! ptscope - interactive register, page-table and memory inspector for a
//! paused QEMU guest, driven over gdb's machine interface.
//!
//! Usage:
//!   ptscope                                # gdb from PATH, stub on localhost:1234
//!   ptscope --target 192.168.0.5:1234      # remote stub elsewhere
//!   ptscope --gdb /opt/gdb/bin/gdb --log-file /tmp/ptscope.log

use clap::Parser;
use flexi_logger::{opt_format, FileSpec, Logger, LoggerHandle};
use ptscope::{BackendParams, Session};
use std::path::{Path, PathBuf};

mod app;
mod render;

/// Register and page-table inspector for QEMU guests.
#[derive(Parser)]
#[command(name = "ptscope", about = "QEMU guest register and page-table inspector")]
struct Args {
    /// Remote stub address gdb should attach to.
    #[arg(long, default_value = "localhost:1234", value_name = "HOST:PORT")]
    target: String,

    /// gdb executable to spawn.
    #[arg(long, default_value = "gdb", value_name = "PATH")]
    gdb: String,

    /// Write a debug log to this file (the terminal belongs to the UI).
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let _logger = args.log_file.as_deref().map(init_file_logger);

    let params = BackendParams::builder()
        .gdb_path(args.gdb)
        .target_addr(args.target)
        .build();

    let app = app::App::new(Session::new(params));
    if let Err(e) = app.run() {
        eprintln!("ptscope terminated with an error: {e}");
        std::process::exit(1);
    }
}

fn init_file_logger(path: &Path) -> LoggerHandle {
    let spec = FileSpec::try_from(path)
        .unwrap_or_else(|e| panic!("bad --log-file path: {e}"));
    Logger::try_with_env_or_str("debug")
        .unwrap_or_else(|e| panic!("logger spec failed: {e}"))
        .log_to_file(spec)
        .format(opt_format)
        .start()
        .unwrap_or_else(|e| panic!("logger initialization failed: {e}"))
}
