use std::time::Duration;

use thiserror::Error;

use crate::types::{HostType, RemoteId};

/// Errors that can occur while encoding or decoding packets and payloads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Value could not be serialized
    #[error("Failed to encode {what}: {reason}")]
    Encode { what: &'static str, reason: String },

    /// Bytes or payload did not match the expected shape
    #[error("Failed to decode {what}: {reason}. The data is malformed or was produced for a different type")]
    Decode { what: &'static str, reason: String },
}

/// Errors surfaced by the remote messaging layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommError {
    /// A registry already owns this namespace under the same scope
    #[error("Namespace {namespace:?} is already claimed by another registry on this server. Choose a different namespace or destroy the existing registry")]
    DuplicateNamespace { namespace: String },

    /// A remote with the same kind and name already exists in the namespace
    #[error("Remote {remote} already exists in its namespace")]
    DuplicateRemote { remote: RemoteId },

    /// Operation was invoked from, or arrived at, the wrong side
    #[error("{operation} cannot be performed by a {host:?} host")]
    WrongRole {
        operation: &'static str,
        host: HostType,
    },

    /// Discovery gave up waiting for a remote to be announced
    #[error("Remote {remote} was not announced within {waited:?}")]
    NotFound { remote: RemoteId, waited: Duration },

    /// The bound handler failed while servicing a call
    #[error("Remote call {remote} failed: {reason}")]
    RemoteCallFailed { remote: RemoteId, reason: String },

    /// An awaited future exceeded its deadline
    #[error("Timed out after {after:?}")]
    Timeout { after: Duration },

    /// A pending future was explicitly cancelled by its holder
    #[error("Operation was cancelled")]
    Cancelled,

    /// The object was destroyed before or during the operation
    #[error("{what} has been destroyed")]
    Destroyed { what: String },

    /// The connection to the authority went away while the operation was pending
    #[error("Connection to the server was lost")]
    Disconnected,

    /// The transport refused to carry a packet
    #[error("Transport failed to send packet: {reason}")]
    Transport { reason: String },

    /// Codec error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}
