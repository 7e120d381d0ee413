//! Small newtype wrappers shared by several message bodies.

use std::io::{Read, Write};

use bitflags::bitflags;
use ltc_chain::serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};
use ltc_serde_derive::{BtcDeserialize, BtcSerialize};

use ltc_chain::parameters::Network;

/// A nonce used to detect self-connections (`version`) and to pair `ping`/`pong`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, BtcSerialize, BtcDeserialize)]
pub struct Nonce(pub u64);

/// The P2P protocol version a peer speaks.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, BtcSerialize, BtcDeserialize)]
pub struct ProtocolVersion(pub u32);

bitflags! {
    /// Services a peer advertises in its `version` message.
    pub struct PeerServices: u64 {
        /// Full blocks and transactions can be requested from this peer.
        const NODE_NETWORK = 0x1;
        /// The peer supports `getutxo` (BIP 64), unused by a light client.
        const NODE_GETUTXO = 0x2;
        /// The peer relays compact blocks (BIP 152).
        const NODE_COMPACT_FILTERS = 0x40;
    }
}

impl BitcoinSerialize for PeerServices {
    fn bitcoin_serialize<W: Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.bits().bitcoin_serialize(target)
    }
}

impl BitcoinDeserialize for PeerServices {
    fn bitcoin_deserialize<R: Read>(reader: R) -> Result<Self, SerializationError> {
        let bits = u64::bitcoin_deserialize(reader)?;
        // Unknown high bits are permitted: future services must not be a hard error.
        Ok(PeerServices::from_bits_truncate(bits))
    }
}

/// A bloom filter's raw bit field, as installed by `filterload`/`filteradd`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Filter(pub Vec<u8>);

/// The random tweak mixed into a bloom filter's hash functions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Tweak(pub u32);

/// The four-byte magic prefixing every message on a given network.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Magic(pub [u8; 4]);

impl From<Network> for Magic {
    fn from(network: Network) -> Self {
        Magic(network.magic())
    }
}
