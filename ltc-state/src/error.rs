//! Storage and checkpoint error taxonomies.

use thiserror::Error;

/// Errors a [`crate::store::BlockStore`] implementation can return.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("a different block is already stored for this hash")]
    Conflict,

    #[error("no block is stored for this hash")]
    NotFound,

    #[error("store I/O error")]
    Io(#[from] std::io::Error),

    #[error("stored record is corrupt: {0}")]
    Corrupt(&'static str),
}

/// Errors from parsing or applying a checkpoint bundle.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint bundle has an unrecognized magic header")]
    BadMagic,

    #[error("checkpoint bundle declares {0} signatures, more than the 256 maximum")]
    TooManySignatures(u32),

    #[error("checkpoint bundle declares zero checkpoints")]
    NoCheckpoints,

    #[error("checkpoint bundle is truncated or malformed: {0}")]
    Malformed(&'static str),

    #[error("checkpoint signature did not verify against the embedded bundle hash")]
    BadSignature,

    #[error("seeding a checkpoint bundle into a pruned store is not supported")]
    UnsupportedOperation,

    #[error(transparent)]
    Store(#[from] StateError),
}
