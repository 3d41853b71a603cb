//! Error types for the bridge
//!
//! Each layer gets its own thiserror enum; the tool service converts them
//! into structured error envelopes at its boundary.

use std::io;
use thiserror::Error;

/// Wire-format errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// OSC packet could not be encoded
    #[error("OSC encode failed: {0}")]
    Encode(String),

    /// OSC packet could not be decoded
    #[error("OSC decode failed: {0}")]
    Decode(String),

    /// Packet was an OSC bundle rather than a single message
    #[error("OSC bundles are not supported")]
    Bundle,

    /// Message carried no argument to decode
    #[error("message {0} carried no argument")]
    MissingArgument(String),

    /// Argument type cannot carry a payload
    #[error("unsupported argument type: {0}")]
    UnsupportedArgument(String),

    /// JSON text inside the argument was malformed
    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Issuer-side request/response errors
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Transport has not been opened
    #[error("OSC bridge not initialized, open it before sending")]
    NotInitialized,

    /// Another request is still awaiting its reply
    #[error("request to {pending} still in flight, cannot send {address}")]
    Busy {
        /// Address of the request still pending
        pending: String,
        /// Address of the rejected request
        address: String,
    },

    /// No reply arrived within the budget
    #[error("host response timeout after {elapsed_ms}ms for {address}")]
    Timeout {
        /// Address of the request that timed out
        address: String,
        /// Elapsed time in milliseconds
        elapsed_ms: u64,
    },

    /// Datagram could not be sent
    #[error("OSC send failed: {0}")]
    Transport(#[from] io::Error),

    /// Payload could not be encoded
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Bridge was closed while a request was pending
    #[error("bridge closed while waiting for {0}")]
    Closed(String),
}

/// Convenience result alias for bridge operations
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Stable machine-readable code used in service envelopes
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::NotInitialized => "not_initialized",
            BridgeError::Busy { .. } => "busy",
            BridgeError::Timeout { .. } => "timeout",
            BridgeError::Transport(_) => "transport_error",
            BridgeError::Codec(_) => "codec_error",
            BridgeError::Closed(_) => "closed",
        }
    }
}
