//! Per-network consensus and protocol parameters.

pub mod genesis;

use std::fmt;

#[cfg(any(test, feature = "proptest-impl"))]
use proptest_derive::Arbitrary;
use serde::{Deserialize, Serialize};

/// The interval, in blocks, between difficulty retargets.
pub const RETARGET_INTERVAL: u32 = 2016;

/// The target spacing between blocks, in seconds.
pub const TARGET_SPACING: i64 = 150;

/// The target timespan of a full retarget interval, in seconds.
pub const TARGET_TIMESPAN: i64 = RETARGET_INTERVAL as i64 * TARGET_SPACING;

/// The block height at which the block subsidy halves.
pub const SUBSIDY_HALVING_INTERVAL: u32 = 840_000;

/// The initial block subsidy, in satoshis (50 LTC).
pub const INITIAL_SUBSIDY: u64 = 50 * 100_000_000;

/// One of the networks this client can connect to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(Arbitrary))]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
    Signet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Network::Mainnet => "main",
            Network::Testnet => "test",
            Network::Regtest => "regtest",
            Network::Signet => "signet",
        };
        f.write_str(s)
    }
}

impl Network {
    /// The four-byte magic that prefixes every P2P message on this network.
    pub fn magic(self) -> [u8; 4] {
        match self {
            Network::Mainnet => [0xfb, 0xc0, 0xb6, 0xdb],
            Network::Testnet => [0xfd, 0xd2, 0xc8, 0xf1],
            Network::Regtest => [0xfa, 0xbf, 0xb5, 0xda],
            Network::Signet => [0x0b, 0x11, 0x09, 0x07],
        }
    }

    /// The default P2P listening port for this network.
    pub fn default_port(self) -> u16 {
        match self {
            Network::Mainnet => 9333,
            Network::Testnet => 19335,
            Network::Regtest => 18444,
            Network::Signet => 19445,
        }
    }

    /// The bech32 human-readable prefix used for SegWit addresses.
    pub fn hrp(self) -> &'static str {
        match self {
            Network::Mainnet => "ltc",
            Network::Testnet => "tltc",
            Network::Regtest => "rltc",
            Network::Signet => "tltc",
        }
    }

    /// The base58 version byte for P2PKH addresses.
    pub fn pubkey_address_prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x30,
            _ => 0x6f,
        }
    }

    /// The base58 version byte for P2SH addresses.
    pub fn script_address_prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x32,
            _ => 0xc4,
        }
    }

    /// BIP32 extended-public-key version bytes.
    pub fn bip32_xpub(self) -> [u8; 4] {
        match self {
            Network::Mainnet => [0x01, 0x9d, 0xa4, 0x62],
            _ => [0x04, 0x35, 0x87, 0xcf],
        }
    }

    /// BIP32 extended-private-key version bytes.
    pub fn bip32_xprv(self) -> [u8; 4] {
        match self {
            Network::Mainnet => [0x01, 0x9d, 0x9c, 0xfe],
            _ => [0x04, 0x35, 0x83, 0x94],
        }
    }

    /// Whether this network applies the post-2012-02-16 minimum-difficulty
    /// relaxation to non-retarget blocks.
    pub fn allows_min_difficulty_blocks(self) -> bool {
        matches!(self, Network::Testnet | Network::Regtest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_timespan_is_three_and_a_half_days() {
        assert_eq!(TARGET_TIMESPAN, 3 * 24 * 3600 + 12 * 3600);
    }
}
