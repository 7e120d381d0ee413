//! Core Litecoin data types: wire-exact serialization, block headers, difficulty,
//! transactions, and per-network consensus parameters.
//!
//! This crate has no networking or storage code; it is the vocabulary shared by
//! `ltc-network`, `ltc-state`, and `ltc-consensus`.

pub mod amount;
pub mod block;
pub mod cached;
pub mod compactint;
pub mod fmt;
pub mod parameters;
pub mod serialization;
pub mod transaction;
pub mod transparent;
pub mod work;

pub use compactint::CompactInt;
pub use serialization::{sha256d, BitcoinDeserialize, BitcoinDeserializeInto, BitcoinSerialize, SerializationError};
