use thiserror::Error;

/// A list specifying categories of [`DbgError`](crate::DbgError).
///
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DbgError {
    /// The backend process was never started, or a previous failure left the
    /// client unusable.
    #[error("backend is not connected")]
    NotConnected,

    /// The backend process closed its output pipe or exited.
    #[error("backend exited")]
    BackendExited,

    /// No terminating result record arrived before the deadline.
    #[error("deadline exceeded waiting for response to {command:?}")]
    Timeout {
        /// The command whose response did not arrive in time.
        command: String,
    },

    /// The in-flight call was aborted through a [`CancelHandle`](crate::CancelHandle).
    #[error("call canceled")]
    Canceled,

    /// The backend answered with an `error` result record.
    #[error("backend error: {message}")]
    Backend {
        /// The backend's `msg` attribute, or the raw record when absent.
        message: String,
    },

    /// A line from the backend could not be decoded as a record.
    #[error("malformed record: {reason}")]
    Decode {
        /// What the decoder stumbled over.
        reason: String,
    },

    /// The exchange terminated with a result class the caller did not expect.
    #[error("unexpected result record: {0}")]
    UnexpectedRecord(String),

    /// A register name is absent from the backend's register map.
    #[error("register {name:?} is not known to the backend")]
    RegisterUnknown {
        /// The requested register name.
        name: String,
    },

    /// CR3 could not be obtained, neither from the register map nor from the
    /// monitor fallback.
    #[error("CR3 unavailable; monitor said: {raw:?}")]
    Cr3Unavailable {
        /// The monitor text that matched none of the CR3 patterns.
        raw: String,
    },

    /// A monitor command produced no console or target output at all.
    #[error("monitor command produced no output")]
    MonitorNoOutput,

    /// The physical-memory dump did not contain a parseable value.
    #[error("cannot parse physical memory dump: {raw:?}")]
    ParsePhys {
        /// The decoded monitor text.
        raw: String,
    },

    /// The memory-read reply did not carry a usable `contents` attribute.
    #[error("cannot parse memory contents: {raw:?}")]
    ParseBytes {
        /// The offending result-record attributes.
        raw: String,
    },

    /// Error caused by calling an operation in the wrong execution state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Error caused by a malformed user-supplied argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Error occured in communication with the backend process.
    #[error(transparent)]
    Io {
        /// The causing Error.
        #[from]
        source: std::io::Error,
    },

    /// Error occured in thread synchronization.
    #[error("error occured in thread synchronization")]
    Poison,
}

/// Abbreviation of `Result<T, DbgError>`.
pub type DbgResult<T> = std::result::Result<T, DbgError>;

impl DbgError {
    /// True for errors that end the current connection; everything else is
    /// recoverable from the user's next command.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BackendExited)
    }
}

impl<G> From<std::sync::PoisonError<G>> for DbgError {
    fn from(_error: std::sync::PoisonError<G>) -> Self {
        Self::Poison
    }
}
