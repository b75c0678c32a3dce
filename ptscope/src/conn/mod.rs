// The backend connection: the spawned gdb child, the serialized MI request
// channel on top of it, and the parameters for creating one.

mod am_client_core;
mod backend_params;
mod backend_process;
mod client_core;

pub use {
    am_client_core::AmClientCore,
    backend_params::{BackendParams, BackendParamsBuilder},
    client_core::{CancelHandle, Exchange},
};
