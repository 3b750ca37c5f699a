//! Error types for svcpool

use crate::id::Handle;
use crate::wire::CallError;
use thiserror::Error;

/// Result type for svcpool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while routing, receiving or dispatching messages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The receiver or channel was closed (router shutdown, receiver closed,
    /// or a dead reply arrived)
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// The latch backing a wait was closed
    #[error("latch closed")]
    LatchClosed,

    /// A timed wait expired
    #[error("operation timed out")]
    Timeout,

    /// No receiver is bound to the destination handle
    #[error("no receiver bound to {0}")]
    NoRoute(Handle),

    /// A fixed handle was requested but is already bound
    #[error("{0} is already bound")]
    HandleInUse(Handle),

    /// The router refuses new work after shutdown
    #[error("router is shut down")]
    RouterShutdown,

    /// Reply requested on a message that carries no reply handle
    #[error("message has no reply handle")]
    NoReplyTo,

    /// Receiver already belongs to a select
    #[error("{0} is already a member of a select")]
    AlreadySelected(Handle),

    /// Receiver is not a member of this select
    #[error("{0} is not a member of this select")]
    NotSelected(Handle),

    /// Payload could not be encoded
    #[error("encode failed: {0}")]
    Encode(String),

    /// Payload could not be decoded
    #[error("decode failed: {0}")]
    Decode(String),

    /// The remote side replied with an error value
    #[error("remote error: {0}")]
    Remote(CallError),

    /// Failed to spawn a worker thread
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// One or more pool workers terminated by panic
    #[error("{0} worker(s) panicked")]
    WorkersPanicked(usize),
}

impl Error {
    /// True when the error means "this channel will never yield again".
    ///
    /// Consumption loops use this to tell shutdown apart from faults.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Error::ChannelClosed(_) | Error::LatchClosed | Error::RouterShutdown
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}
