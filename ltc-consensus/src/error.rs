//! Consensus error taxonomy: one enum per validation stage, matching the
//! granularity `ltc_chain::serialization::SerializationError` uses for the
//! wire format.

use thiserror::Error;

/// One variant per header-validation rejection reason.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum VerifyHeaderError {
    #[error("header's claimed parent is not in the store")]
    UnknownParent,

    #[error("header hash does not satisfy its own proof-of-work target")]
    BadProofOfWork,

    #[error("header's difficulty bits do not match the expected retarget")]
    BadDifficultyBits,

    #[error("header's difficulty bits are above the network's proof-of-work limit")]
    DifficultyAboveLimit,

    #[error("header's time is before its parent's")]
    TimeTooOld,

    #[error("header already present in the store")]
    Duplicate,
}
