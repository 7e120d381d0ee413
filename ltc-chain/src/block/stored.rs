//! The compact, persistable record a [`BlockStore`](crate) keeps per header:
//! the header itself plus the bookkeeping a chain engine needs to pick a
//! head without rewalking the whole chain.

use std::io::{self, Read, Write};

use crate::block::{Hash, Header, Height};
use crate::serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};
use crate::work::difficulty::Work;

/// A header plus its cumulative proof-of-work and height.
///
/// The on-disk compact form is exactly 96 bytes: a 12-byte big-endian
/// `chain_work`, a 4-byte big-endian `height`, then the 80-byte header.
/// Integers elsewhere on the wire are little-endian; this is the one place
/// big-endian is used, matching how hash/chainWork values are displayed and
/// compared as large integers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StoredBlock {
    pub header: Header,
    pub chain_work: Work,
    pub height: Height,
}

impl StoredBlock {
    pub const COMPACT_LEN: usize = 12 + 4 + 80;

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn to_compact_bytes(&self) -> [u8; Self::COMPACT_LEN] {
        let mut out = [0u8; Self::COMPACT_LEN];
        out[0..12].copy_from_slice(&self.chain_work.to_be_bytes_96());
        out[12..16].copy_from_slice(&self.height.0.to_be_bytes());
        let mut header_bytes = Vec::with_capacity(Header::len());
        self.header
            .bitcoin_serialize(&mut header_bytes)
            .expect("header serialization is infallible");
        out[16..].copy_from_slice(&header_bytes);
        out
    }

    pub fn from_compact_bytes(bytes: &[u8; Self::COMPACT_LEN]) -> Result<Self, SerializationError> {
        let mut work_bytes = [0u8; 12];
        work_bytes.copy_from_slice(&bytes[0..12]);
        let chain_work = Work::from_be_bytes_96(work_bytes);

        let mut height_bytes = [0u8; 4];
        height_bytes.copy_from_slice(&bytes[12..16]);
        let height = Height(u32::from_be_bytes(height_bytes));

        let header = Header::bitcoin_deserialize(&bytes[16..])?;

        Ok(StoredBlock {
            header,
            chain_work,
            height,
        })
    }

    pub fn bitcoin_serialize_compact<W: Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_all(&self.to_compact_bytes())
    }

    pub fn bitcoin_deserialize_compact<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        let mut bytes = [0u8; Self::COMPACT_LEN];
        reader.read_exact(&mut bytes)?;
        Self::from_compact_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::genesis;
    use crate::work::difficulty::CompactDifficulty;
    use chrono::{TimeZone, Utc};

    fn genesis_stored_block() -> StoredBlock {
        let header = Header::new(
            1,
            genesis::GENESIS_PREVIOUS_BLOCK_HASH,
            crate::block::merkle::Root([0u8; 32]),
            Utc.timestamp(genesis::MAINNET_GENESIS_TIME, 0),
            genesis::MAINNET_GENESIS_BITS,
            genesis::MAINNET_GENESIS_NONCE,
        );
        StoredBlock {
            header,
            chain_work: CompactDifficulty(0x1e0ffff0)
                .to_expanded()
                .unwrap()
                .to_work(),
            height: Height(0),
        }
    }

    #[test]
    fn compact_round_trips() {
        let stored = genesis_stored_block();
        let bytes = stored.to_compact_bytes();
        assert_eq!(bytes.len(), 96);
        let other = StoredBlock::from_compact_bytes(&bytes).unwrap();
        assert_eq!(stored, other);
    }
}
