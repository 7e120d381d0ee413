//! Genesis consensus parameters for each network.

use chrono::{TimeZone, Utc};

use crate::block::{self, Header, StoredBlock};
use crate::work::difficulty::CompactDifficulty;
use crate::parameters::Network;

/// The previous block hash for the genesis block.
///
/// All known networks use the Bitcoin `null` value for the parent of the
/// genesis block. (In Bitcoin, `null` is `[0; 32]`.)
pub const GENESIS_PREVIOUS_BLOCK_HASH: block::Hash = block::Hash([0; 32]);

/// The mainnet genesis block's timestamp.
pub const MAINNET_GENESIS_TIME: i64 = 1_317_972_665;

/// The mainnet genesis block's nonce.
pub const MAINNET_GENESIS_NONCE: u32 = 2_084_524_493;

/// The mainnet genesis block's packed difficulty target.
pub const MAINNET_GENESIS_BITS: CompactDifficulty = CompactDifficulty(0x1e0f_ffff);

/// The merkle root of the genesis block's single coinbase transaction,
/// shared with Bitcoin since Litecoin reused the same genesis coinbase
/// script and parameters.
pub const MAINNET_GENESIS_MERKLE_ROOT: block::merkle::Root = block::merkle::Root([
    0x4c, 0xed, 0xdd, 0x1e, 0x01, 0x73, 0x7f, 0xab, 0xfa, 0xad, 0x9b, 0xe2, 0x53, 0x23, 0xff, 0xfa,
    0xa3, 0x32, 0x32, 0x13, 0x7c, 0x3e, 0xdf, 0x6c, 0xfd, 0x97, 0xbe, 0xe6, 0xba, 0xfb, 0xdd, 0x97,
]);

/// Returns the hash for the genesis block in `network`.
///
/// Testnet, regtest, and signet genesis hashes are not yet populated; only
/// mainnet is backed by a verified constant.
pub fn genesis_hash(network: Network) -> block::Hash {
    match network {
        Network::Mainnet => {
            "12a765e31ffd4059bada1e25190f6e98c99d9714d334efa41a195a7e7e04bfe2"
                .parse()
                .expect("hard-coded hash parses")
        }
        Network::Testnet | Network::Regtest | Network::Signet => {
            unimplemented!("genesis hash for {:?} is not yet configured", network)
        }
    }
}

/// Builds the `StoredBlock` a fresh `BlockStore` is seeded with.
///
/// Only mainnet carries a verified header; other networks use the mainnet
/// constants as a placeholder seed, matching `genesis_hash`'s own caveat.
pub fn genesis_block(network: Network) -> StoredBlock {
    let header = Header::new(
        1,
        GENESIS_PREVIOUS_BLOCK_HASH,
        MAINNET_GENESIS_MERKLE_ROOT,
        Utc.timestamp(MAINNET_GENESIS_TIME, 0),
        MAINNET_GENESIS_BITS,
        MAINNET_GENESIS_NONCE,
    );
    let chain_work = MAINNET_GENESIS_BITS
        .to_expanded()
        .expect("genesis bits are a valid target")
        .to_work();
    StoredBlock {
        header,
        chain_work,
        height: block::Height(0),
    }
}
