use std::io::Write;

use bytes::Buf;
use chrono::{DateTime, Duration, Utc};
use ltc_serde_derive::{BtcDeserialize, BtcSerialize};
#[cfg(any(test, feature = "proptest-impl"))]
use proptest_derive::Arbitrary;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{cached::Cached, work::difficulty::CompactDifficulty};
use crate::{serialization::sha256d, BitcoinDeserialize, BitcoinSerialize, SerializationError};

use super::{merkle, Hash, Height};

/// A block header: the 80-byte record that chains blocks together and
/// carries everything needed to verify proof-of-work.
///
/// Headers point backwards via `previous_block_hash`, all the way to the
/// genesis block. The header's own hash is the double-SHA256 of its
/// 80-byte wire serialization.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, BtcSerialize, BtcDeserialize,
)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(Arbitrary))]
pub struct Header {
    /// The block's version field.
    pub version: u32,

    /// The hash of the previous block.
    pub previous_block_hash: Hash,

    /// The root of the transaction Merkle tree, binding the header to the
    /// block's transactions.
    pub merkle_root: merkle::Root,

    /// The block timestamp, a Unix epoch time (UTC).
    pub time: DateTime<Utc>,

    /// The packed proof-of-work target this header's hash must not exceed.
    pub difficulty_threshold: CompactDifficulty,

    /// Miner-chosen nonce.
    pub nonce: u32,

    /// Lazily computed, cached hash. Not part of the wire serialization.
    #[cfg_attr(any(test, feature = "proptest-impl"), proptest(value = "Cached::new()"))]
    hash: Cached<Hash>,
}

#[derive(Error, Debug)]
pub enum BlockTimeError {
    #[error("block time {0:?} for block {2:?} at height {1:?} is more than 2 hours in the future ({3:?})")]
    InvalidBlockTime(DateTime<Utc>, Height, Hash, DateTime<Utc>),
}

impl Header {
    /// Length of a serialized header in bytes.
    pub const fn len() -> usize {
        80
    }

    pub fn new(
        version: u32,
        previous_block_hash: Hash,
        merkle_root: merkle::Root,
        time: DateTime<Utc>,
        difficulty_threshold: CompactDifficulty,
        nonce: u32,
    ) -> Header {
        Header {
            version,
            previous_block_hash,
            merkle_root,
            time,
            difficulty_threshold,
            nonce,
            hash: Cached::new(),
        }
    }

    /// Enforces the "not more than 2 hours in the future" rule relative to `now`.
    pub fn time_is_valid_at(
        &self,
        now: DateTime<Utc>,
        height: &Height,
        hash: &Hash,
    ) -> Result<(), BlockTimeError> {
        let two_hours_in_the_future = now
            .checked_add_signed(Duration::hours(2))
            .expect("adding 2 hours to a valid timestamp does not overflow");
        if self.time <= two_hours_in_the_future {
            Ok(())
        } else {
            Err(BlockTimeError::InvalidBlockTime(
                self.time,
                *height,
                *hash,
                two_hours_in_the_future,
            ))
        }
    }

    pub fn bitcoin_serialize_to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Header::len());
        self.bitcoin_serialize(&mut out)
            .expect("serializing to a Vec is infallible");
        out
    }

    /// Returns this header's hash, using the cached value if present.
    pub fn hash(&self) -> Hash {
        match self.hash.value() {
            Some(h) => h,
            None => Hash::from(self),
        }
    }

    /// Deserializes a header from a `Buf`, hashing the raw 80 bytes directly
    /// instead of re-serializing afterward.
    pub fn deserialize_from_buf<B: Buf>(mut src: B) -> Result<Self, SerializationError> {
        if src.remaining() < Header::len() {
            return Err(SerializationError::Parse(
                "not enough bytes for a block header",
            ));
        }
        let src = src.copy_to_bytes(Header::len());
        let mut hash_writer = sha256d::Writer::default();
        hash_writer
            .write_all(&src[..])
            .expect("writing to a Writer is infallible");
        let own_hash = Hash::from_bytes_exact(hash_writer.finish());

        let mut cursor = std::io::Cursor::new(src);
        Ok(Header {
            version: u32::bitcoin_deserialize(&mut cursor)?,
            previous_block_hash: Hash::bitcoin_deserialize(&mut cursor)?,
            merkle_root: merkle::Root::bitcoin_deserialize(&mut cursor)?,
            time: <DateTime<Utc>>::bitcoin_deserialize(&mut cursor)?,
            difficulty_threshold: CompactDifficulty::bitcoin_deserialize(&mut cursor)?,
            nonce: u32::bitcoin_deserialize(&mut cursor)?,
            hash: Cached::from(own_hash),
        })
    }
}

/// A header paired with the transaction count reported for its block, as
/// carried in the wire `headers` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountedHeader {
    pub header: Header,
    pub transaction_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        Header::new(
            1,
            Hash([0u8; 32]),
            merkle::Root([0u8; 32]),
            Utc.timestamp(1_317_972_665, 0),
            CompactDifficulty(0x1e0ffff0),
            0,
        )
    }

    use chrono::TimeZone;

    #[test]
    fn serialize_round_trips_through_buf_deserialize() {
        let header = sample_header();
        let bytes = header.bitcoin_serialize_to_vec();
        assert_eq!(bytes.len(), Header::len());

        let decoded = Header::deserialize_from_buf(bytes::Bytes::from(bytes)).unwrap();
        assert_eq!(decoded.version, header.version);
        assert_eq!(decoded.hash(), header.hash());
    }

    #[test]
    fn time_rejects_far_future_blocks() {
        let header = sample_header();
        let now = Utc.timestamp(1_317_972_665 - 3 * 3600, 0);
        let result = header.time_is_valid_at(now, &Height(0), &header.hash());
        assert!(result.is_err());
    }
}
