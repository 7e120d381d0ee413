//! The peer-to-peer network layer: wire framing, a per-peer connection
//! state machine, and the connection pool that discovers, maintains, and
//! elects among peers on the chain engine's behalf.

pub mod address_book;
pub mod connection;
pub mod constants;
pub mod error;
pub mod group;
pub mod meta_addr;
pub mod protocol;

pub use address_book::AddressBook;
pub use connection::{ConnectionState, PeerConnection, PeerEvent, PeerInfo};
pub use error::{CloseReason, GroupError, PeerError};
pub use group::{DiscoveryConfig, PeerGroup};
pub use meta_addr::MetaAddr;
