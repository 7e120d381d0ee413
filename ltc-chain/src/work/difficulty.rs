//! `nBits`-style compact target encoding, expanded 256-bit targets, and
//! cumulative chain work.
//!
//! The compact encoding packs a 256-bit target into 32 bits: the top byte is
//! a base-256 exponent, the remaining three bytes are the mantissa. This
//! module implements the same encode/decode Litecoin inherits from Bitcoin.

use ltc_serde_derive::{BtcDeserialize, BtcSerialize};
#[cfg(any(test, feature = "proptest-impl"))]
use proptest_derive::Arbitrary;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parameters::Network;
use crate::serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

/// A 256-bit PoW target in the packed "compact" (`nBits`) representation
/// carried on the wire and in block headers.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, BtcSerialize, BtcDeserialize,
)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(Arbitrary))]
pub struct CompactDifficulty(pub u32);

/// A fully expanded 256-bit PoW target.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct ExpandedDifficulty(pub U256);

/// Cumulative proof-of-work, accumulated across a chain of headers.
///
/// `Work` for a single header is `2^256 / (target + 1)`; `StoredBlock::chain_work`
/// is the sum of every ancestor's `Work`, truncated to 96 bits (`u96`) per the
/// on-disk compact record.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Default)]
pub struct Work(pub U256);

#[derive(Error, Debug, Eq, PartialEq)]
pub enum ThresholdError {
    /// the compact difficulty's mantissa has the sign bit set
    #[error("negative compact difficulty")]
    Negative,
    /// the compact difficulty decodes to zero
    #[error("zero compact difficulty")]
    Zero,
    /// the compact difficulty overflows a 256-bit target
    #[error("compact difficulty overflows u256")]
    Overflow,
    /// the expanded target is above the network's proof-of-work limit
    #[error("target {0:?} is above the network proof-of-work limit")]
    AboveLimit(ExpandedDifficulty),
}

impl CompactDifficulty {
    /// The "maximum target" sentinel used by regtest/testnet minimum-difficulty
    /// blocks: every hash satisfies it.
    pub const UNRESTRICTED: CompactDifficulty = CompactDifficulty(0x207fffff);

    /// Expand this compact target into a 256-bit integer.
    ///
    /// Returns `Err` for the same malformed encodings `bitcoind` rejects:
    /// mantissa with the sign bit set, zero mantissa, or an exponent that
    /// would overflow 256 bits.
    pub fn to_expanded(self) -> Result<ExpandedDifficulty, ThresholdError> {
        let bits = self.0;
        let exponent = (bits >> 24) as u32;
        let mantissa = bits & 0x00ff_ffff;

        if mantissa & 0x0080_0000 != 0 {
            return Err(ThresholdError::Negative);
        }
        if mantissa == 0 {
            return Err(ThresholdError::Zero);
        }
        if exponent > 32 {
            return Err(ThresholdError::Overflow);
        }

        let mantissa = U256::from(mantissa);
        let target = if exponent <= 3 {
            mantissa >> (8 * (3 - exponent))
        } else {
            let shift = 8 * (exponent - 3);
            if shift >= 256 {
                return Err(ThresholdError::Overflow);
            }
            mantissa << shift
        };
        Ok(ExpandedDifficulty(target))
    }

    /// Validate against a network's proof-of-work limit, per §4.4 step 2
    /// ("reject if `bits > maxTarget`").
    pub fn validate_against_limit(self, limit: ExpandedDifficulty) -> Result<ExpandedDifficulty, ThresholdError> {
        let target = self.to_expanded()?;
        if target.0 > limit.0 {
            return Err(ThresholdError::AboveLimit(target));
        }
        Ok(target)
    }
}

impl From<u32> for CompactDifficulty {
    fn from(bits: u32) -> Self {
        CompactDifficulty(bits)
    }
}

impl ExpandedDifficulty {
    /// Round-trip this target through the compact encoding, rounding to the
    /// mantissa precision the compact format supports. §4.4 step 3 requires
    /// the retargeted value to be compared at this precision, not the full
    /// 256-bit value.
    pub fn to_compact(self) -> CompactDifficulty {
        let mut bytes = [0u8; 32];
        self.0.to_big_endian(&mut bytes);
        let first_nonzero = bytes.iter().position(|&b| b != 0);
        let first_nonzero = match first_nonzero {
            Some(i) => i,
            None => return CompactDifficulty(0),
        };
        let significant = &bytes[first_nonzero..];
        let mut size = (32 - first_nonzero) as u32;

        let mut mantissa_bytes = [0u8; 3];
        if significant[0] & 0x80 != 0 {
            // Would be interpreted as negative; shift right one byte and bump size.
            mantissa_bytes[1] = significant[0];
            if significant.len() > 1 {
                mantissa_bytes[2] = significant[1];
            }
            size += 1;
        } else {
            mantissa_bytes[0] = significant[0];
            if significant.len() > 1 {
                mantissa_bytes[1] = significant[1];
            }
            if significant.len() > 2 {
                mantissa_bytes[2] = significant[2];
            }
        }
        let mantissa = u32::from_be_bytes([0, mantissa_bytes[0], mantissa_bytes[1], mantissa_bytes[2]]);
        CompactDifficulty((size << 24) | mantissa)
    }

    /// The proof-of-work limit (`maxTarget`) for `network`: every header's
    /// target must be at or below this. Mainnet, testnet, and signet share
    /// the same limit; regtest uses the maximum possible target so blocks
    /// there can be mined instantly.
    pub fn target_difficulty_limit(network: Network) -> ExpandedDifficulty {
        let bits = match network {
            Network::Regtest => CompactDifficulty::UNRESTRICTED,
            Network::Mainnet | Network::Testnet | Network::Signet => CompactDifficulty(0x1e0fffff),
        };
        bits.to_expanded()
            .expect("hard-coded PoW limits are always valid compact difficulties")
    }

    /// `2^256 / (target + 1)`: the expected number of hash attempts to find a
    /// block at this target, used to accumulate `chainWork`.
    pub fn to_work(self) -> Work {
        if self.0.is_zero() {
            return Work(U256::MAX);
        }
        let denom = self.0.saturating_add(U256::one());
        // (2^256 - 1) / denom is a close enough approximation of 2^256 / denom
        // for accumulation purposes, matching bitcoind's `arith_uint256::GetWork`.
        Work(U256::MAX / denom)
    }
}

impl std::ops::Add for Work {
    type Output = Work;
    fn add(self, rhs: Work) -> Work {
        Work(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for Work {
    fn add_assign(&mut self, rhs: Work) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

/// The 12-byte big-endian on-disk encoding of `Work`, used by the compact
/// `StoredBlock` record (§3).
impl Work {
    pub fn to_be_bytes_96(self) -> [u8; 12] {
        let mut full = [0u8; 32];
        self.0.to_big_endian(&mut full);
        let mut out = [0u8; 12];
        out.copy_from_slice(&full[20..32]);
        out
    }

    pub fn from_be_bytes_96(bytes: [u8; 12]) -> Work {
        let mut full = [0u8; 32];
        full[20..32].copy_from_slice(&bytes);
        Work(U256::from_big_endian(&full))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_bits_round_trip() {
        // Litecoin mainnet genesis bits.
        let bits = CompactDifficulty(0x1e0ffff0);
        let target = bits.to_expanded().unwrap();
        assert_eq!(target.to_compact(), bits);
    }

    #[test]
    fn unrestricted_is_highest_target() {
        let target = CompactDifficulty::UNRESTRICTED.to_expanded().unwrap();
        let genesis = CompactDifficulty(0x1e0ffff0).to_expanded().unwrap();
        assert!(target.0 > genesis.0);
    }

    #[test]
    fn negative_mantissa_rejected() {
        let bits = CompactDifficulty(0x01800000);
        assert_eq!(bits.to_expanded(), Err(ThresholdError::Negative));
    }

    #[test]
    fn zero_mantissa_rejected() {
        let bits = CompactDifficulty(0x03000000);
        assert_eq!(bits.to_expanded(), Err(ThresholdError::Zero));
    }

    #[test]
    fn work_accumulates() {
        let bits = CompactDifficulty(0x1e0ffff0).to_expanded().unwrap();
        let w1 = bits.to_work();
        let total = w1 + w1;
        assert!(total.0 > w1.0);
    }

    #[test]
    fn work_be_bytes_round_trip() {
        let bits = CompactDifficulty(0x1b0404cb).to_expanded().unwrap();
        let work = bits.to_work();
        let bytes = work.to_be_bytes_96();
        assert_eq!(Work::from_be_bytes_96(bytes), work);
    }
}
