//! Backend parameters
use std::time::Duration;

/// An immutable struct with all information necessary to spawn the backend
/// debugger and attach it to the remote stub.
///
/// # Instantiating `BackendParams` using the `BackendParamsBuilder`
///
/// ```rust
/// use ptscope::BackendParams;
/// let params = BackendParams::builder()
///     .gdb_path("/usr/bin/gdb")
///     .target_addr("localhost:1234")
///     .build();
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BackendParams {
    gdb_path: String,
    target_addr: String,
    reply_timeout: Duration,
    connect_timeout: Duration,
    monitor_timeout: Duration,
}

impl BackendParams {
    /// Default deadline for ordinary request/response exchanges.
    pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Default deadline for attaching to the remote stub; connecting can
    /// involve an initial stop and register fetch, so it gets more headroom.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default deadline for monitor passthrough commands.
    pub const DEFAULT_MONITOR_TIMEOUT: Duration = Duration::from_secs(10);

    /// Grace period between the `quit` command and a hard kill.
    pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

    /// Returns a new builder for `BackendParams`.
    pub fn builder() -> BackendParamsBuilder {
        BackendParamsBuilder::default()
    }

    /// The gdb executable to spawn.
    pub fn gdb_path(&self) -> &str {
        &self.gdb_path
    }

    /// The `host:port` of the remote stub.
    pub fn target_addr(&self) -> &str {
        &self.target_addr
    }

    /// Deadline for ordinary exchanges.
    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    /// Deadline for the `target remote` bootstrap step.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Deadline for monitor passthrough commands.
    pub fn monitor_timeout(&self) -> Duration {
        self.monitor_timeout
    }
}

impl Default for BackendParams {
    fn default() -> Self {
        BackendParamsBuilder::default().build()
    }
}

impl std::fmt::Display for BackendParams {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} -> {}", self.gdb_path, self.target_addr)
    }
}

/// A builder for [`BackendParams`].
#[derive(Clone, Debug)]
pub struct BackendParamsBuilder {
    gdb_path: String,
    target_addr: String,
    reply_timeout: Duration,
    connect_timeout: Duration,
    monitor_timeout: Duration,
}

impl Default for BackendParamsBuilder {
    fn default() -> Self {
        Self {
            gdb_path: "gdb".to_string(),
            target_addr: "localhost:1234".to_string(),
            reply_timeout: BackendParams::DEFAULT_REPLY_TIMEOUT,
            connect_timeout: BackendParams::DEFAULT_CONNECT_TIMEOUT,
            monitor_timeout: BackendParams::DEFAULT_MONITOR_TIMEOUT,
        }
    }
}

impl BackendParamsBuilder {
    /// Sets the gdb executable path.
    #[must_use]
    pub fn gdb_path<S: Into<String>>(mut self, gdb_path: S) -> Self {
        self.gdb_path = gdb_path.into();
        self
    }

    /// Sets the `host:port` of the remote stub.
    #[must_use]
    pub fn target_addr<S: Into<String>>(mut self, target_addr: S) -> Self {
        self.target_addr = target_addr.into();
        self
    }

    /// Sets the deadline for ordinary exchanges.
    #[must_use]
    pub fn reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    /// Sets the deadline for the `target remote` bootstrap step.
    #[must_use]
    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Sets the deadline for monitor passthrough commands.
    #[must_use]
    pub fn monitor_timeout(mut self, monitor_timeout: Duration) -> Self {
        self.monitor_timeout = monitor_timeout;
        self
    }

    /// Produces the immutable `BackendParams`.
    #[must_use]
    pub fn build(self) -> BackendParams {
        BackendParams {
            gdb_path: self.gdb_path,
            target_addr: self.target_addr,
            reply_timeout: self.reply_timeout,
            connect_timeout: self.connect_timeout,
            monitor_timeout: self.monitor_timeout,
        }
    }
}
