use crate::conn::client_core::ClientCore;
use crate::conn::{CancelHandle, Exchange};
use crate::{BackendParams, DbgResult};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// The shared handle to the protocol client.
///
/// All callers are serialized through the inner mutex: there is at most one
/// outstanding request, which is what makes positional request/response
/// matching sound.
#[derive(Clone, Debug)]
pub struct AmClientCore(Arc<Mutex<ClientCore>>);

impl AmClientCore {
    /// Spawns and bootstraps the backend.
    pub fn try_new(params: BackendParams) -> DbgResult<Self> {
        trace!("trying to connect via {params}");
        let start = Instant::now();
        let core = ClientCore::try_new(params)?;
        debug!(
            "backend up and connected ({} ms) via {}",
            Instant::now().duration_since(start).as_millis(),
            core.params(),
        );
        Ok(Self(Arc::new(Mutex::new(core))))
    }

    fn lock(&self) -> DbgResult<std::sync::MutexGuard<ClientCore>> {
        Ok(self.0.lock()?)
    }

    /// One MI command under the given deadline.
    pub fn send(&self, cmd: &str, timeout: Duration) -> DbgResult<Exchange> {
        self.lock()?.send(cmd, timeout)
    }

    /// One human-monitor command under the given deadline; returns the
    /// decoded console/target text.
    pub fn monitor(&self, text: &str, timeout: Duration) -> DbgResult<String> {
        self.lock()?.monitor(text, timeout)
    }

    /// SIGINT to the backend, outside the request channel.
    pub fn signal_interrupt(&self) -> DbgResult<()> {
        self.lock()?.signal_interrupt()
    }

    /// Whether the child is still owned and believed alive.
    pub fn is_connected(&self) -> DbgResult<bool> {
        Ok(self.lock()?.is_connected())
    }

    /// Handle for aborting a blocked call from another thread.
    pub fn cancel_handle(&self) -> DbgResult<CancelHandle> {
        Ok(self.lock()?.cancel_handle())
    }

    /// The parameters the client was created with.
    pub fn params(&self) -> DbgResult<BackendParams> {
        Ok(self.lock()?.params().clone())
    }

    /// Graceful shutdown of the backend; idempotent.
    pub fn close(&self) -> DbgResult<()> {
        self.lock()?.close();
        Ok(())
    }
}
