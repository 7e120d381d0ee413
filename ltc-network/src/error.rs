//! Peer- and group-level error taxonomy, matching the granularity
//! `ltc_chain::serialization::SerializationError` and
//! `ltc_consensus::error::VerifyHeaderError` use for their own layers.

use ltc_chain::serialization::SerializationError;
use thiserror::Error;

/// Why a [`crate::connection::PeerConnection`] moved to `Closing`.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum CloseReason {
    #[error("no pong within the liveness window")]
    Timeout,
    #[error("peer violated the protocol: {0}")]
    ProtocolViolation(String),
    #[error("socket I/O error")]
    Io,
    #[error("closed by the local peer")]
    Explicit,
    #[error("banned after a chain-engine verification failure")]
    Banned,
}

#[derive(Error, Debug)]
pub enum PeerError {
    #[error("message framing error")]
    Codec(#[from] SerializationError),

    #[error("socket I/O error")]
    Io(#[from] std::io::Error),

    #[error("request timed out waiting for a response")]
    Timeout,

    #[error("dependency download exceeded its depth or wall-clock bound")]
    DependencyLimit,

    #[error("transaction not present in the peer's mempool")]
    NotInMempool,

    #[error("connection is closed")]
    Closed,

    #[error("operation was cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum GroupError {
    #[error("no discovery source yielded any address")]
    NetworkUnavailable,

    #[error("timed out waiting for {0} ready peers")]
    NotEnoughPeers(usize),

    #[error(transparent)]
    Peer(#[from] PeerError),
}
