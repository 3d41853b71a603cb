//! Error types for the host side
//!
//! Every handler failure is caught at the dispatch boundary and turned into
//! an `{status: "error", message}` reply; nothing here terminates the host.

use thiserror::Error;

use crate::bridge::command::UnknownAddress;
use crate::bridge::error::CodecError;

/// Failures reported by the host object model
#[derive(Debug, Error)]
pub enum HostError {
    /// Object handle no longer refers to a live object
    #[error("object {0} no longer exists")]
    StaleObject(String),

    /// Construction context handle is unknown to the host
    #[error("construction context {0} does not exist")]
    UnknownContext(String),

    /// Host refused the operation
    #[error("host rejected operation: {0}")]
    Rejected(String),
}

/// Convenience result alias for host model operations
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Handler failures, converted to error replies
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No construction context has been initialized
    #[error("No device initialized")]
    NoContext,

    /// A wire endpoint is absent from the registry
    #[error("Wiring failed: Object not found")]
    WireEndpointMissing,

    /// The injection target is absent from the registry
    #[error("Target v8 object not found")]
    InjectTargetMissing,

    /// A batch replay is already running
    #[error("Batch replay already in progress")]
    ReplayInProgress,

    /// Address is not one of the supported operations
    #[error(transparent)]
    UnknownAddress(#[from] UnknownAddress),

    /// Inbound datagram could not be decoded
    #[error("{0}")]
    Decode(#[from] CodecError),

    /// Payload did not match the operation's schema
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// Host object model failure
    #[error("{0}")]
    Host(#[from] HostError),
}

/// Convenience result alias for dispatch operations
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
