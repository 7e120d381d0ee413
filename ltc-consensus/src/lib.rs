//! Header validation, difficulty retargeting, subsidy, and the chain engine
//! that ties them together into accept/reject decisions for incoming
//! headers.

pub mod block;
pub mod chain;
pub mod error;
pub mod parameters;

pub use chain::{Acceptance, ChainEngine, ChainObserver};
pub use error::VerifyHeaderError;
