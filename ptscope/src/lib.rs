//! Debug-protocol client and x86_64 page-table inspector for paused QEMU
//! guests.
//!
//! `ptscope` drives a gdb child process in machine-interface (MI) mode
//! against a remote stub, typically QEMU's gdbstub on `localhost:1234`,
//! and layers three things on top:
//!
//! * a typed codec for the MI record grammar ([`protocol`]),
//! * a serialized request/response client owning the child process
//!   ([`AmClientCore`]), and
//! * high-level guest operations ([`target::Guest`]) including a live
//!   4-level page-table walk with 1 GiB / 2 MiB huge-page handling.
//!
//! A [`Session`] wraps all of it behind the small state machine a terminal
//! front-end needs: stopped/running tracking, coherent register and
//! walk snapshots with their predecessors for delta highlighting, and
//! memory-dump formatting.
//!
//! ```rust,no_run
//! use ptscope::{BackendParams, Session};
//!
//! let mut session = Session::new(BackendParams::default());
//! session.connect();
//! session.step();
//! println!("rip = {}", session.regs().value("rip"));
//! ```

#![deny(missing_debug_implementations)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

mod conn;
mod dbg_error;
pub mod protocol;
mod session;
pub mod target;
mod util;

pub use crate::conn::{
    AmClientCore, BackendParams, BackendParamsBuilder, CancelHandle, Exchange,
};
pub use crate::dbg_error::{DbgError, DbgResult};
pub use crate::session::{
    format_dump_lines, perm_from_flags, ExecState, InspectMode, PageInfo, Session,
    DEFAULT_DUMP_SIZE,
};
pub use crate::util::parse_u64_auto;
