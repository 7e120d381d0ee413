//! Peer address records, as exchanged via `addr`/`getaddr` and tracked in the
//! address book that seeds [`crate::group::PeerGroup`]'s connection pool.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use ltc_serde_derive::{BtcDeserialize, BtcSerialize};

use crate::protocol::external::types::PeerServices;

/// A single entry in an `addr` message: a gossiped peer, the services it
/// claims to offer, and when it was last seen active.
#[derive(Clone, Copy, Debug, Eq, PartialEq, BtcSerialize, BtcDeserialize)]
pub struct MetaAddr {
    /// When this address was last seen alive, by whoever is reporting it.
    pub last_seen: DateTime<Utc>,
    /// The services the peer claims to offer.
    pub services: PeerServices,
    /// The peer's socket address.
    pub addr: SocketAddr,
}

impl MetaAddr {
    pub fn new(addr: SocketAddr, services: PeerServices, last_seen: DateTime<Utc>) -> Self {
        MetaAddr {
            last_seen,
            services,
            addr,
        }
    }
}
