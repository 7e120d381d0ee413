//! The transaction Merkle tree linking a block's transactions to its header.

use std::{fmt, io};

use ltc_serde_derive::BtcSerialize;
#[cfg(any(test, feature = "proptest-impl"))]
use proptest_derive::Arbitrary;
use serde::{Deserialize, Serialize};

use crate::serialization::{sha256d, BitcoinDeserialize, BitcoinSerialize, SerializationError};

/// The root of a block's transaction Merkle tree.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, BtcSerialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(Arbitrary))]
pub struct Root(pub [u8; 32]);

impl BitcoinDeserialize for Root {
    fn bitcoin_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        Ok(Root(<[u8; 32]>::bitcoin_deserialize(&mut reader)?))
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        f.write_str(&hex::encode(&reversed))
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        f.debug_tuple("merkle::Root")
            .field(&hex::encode(&reversed))
            .finish()
    }
}

/// Computes the Merkle root of a non-empty list of leaf double-SHA256 hashes,
/// following the Bitcoin convention of duplicating the last node when a
/// level has an odd number of entries.
impl std::iter::FromIterator<[u8; 32]> for Root {
    fn from_iter<I: IntoIterator<Item = [u8; 32]>>(iter: I) -> Self {
        let mut level: Vec<[u8; 32]> = iter.into_iter().collect();
        if level.is_empty() {
            return Root([0u8; 32]);
        }
        while level.len() > 1 {
            if level.len() % 2 == 1 {
                let last = *level.last().expect("non-empty");
                level.push(last);
            }
            level = level
                .chunks(2)
                .map(|pair| {
                    let mut concat = Vec::with_capacity(64);
                    concat.extend_from_slice(&pair[0]);
                    concat.extend_from_slice(&pair[1]);
                    sha256d::checksum(&concat)
                })
                .collect();
        }
        Root(level[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_leaf_is_root() {
        let leaf = sha256d::checksum(b"only tx");
        let root: Root = std::iter::once(leaf).collect();
        assert_eq!(root.0, leaf);
    }

    #[test]
    fn odd_count_duplicates_last() {
        let a = sha256d::checksum(b"a");
        let b = sha256d::checksum(b"b");
        let c = sha256d::checksum(b"c");
        let root: Root = vec![a, b, c].into_iter().collect();

        let ab = sha256d::checksum(&[a, b].concat());
        let cc = sha256d::checksum(&[c, c].concat());
        let expected = sha256d::checksum(&[ab, cc].concat());
        assert_eq!(root.0, expected);
    }
}
