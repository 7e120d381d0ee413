//! Tracks gossiped peer addresses and per-address reconnection backoff.
//!
//! `PeerGroup` consults this to pick whom to dial next; a failed connection
//! doubles that address's backoff (capped at [`BACKOFF_MAX`]), and a
//! successful `Ready` transition resets it to [`BACKOFF_INITIAL`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::constants::{BACKOFF_INITIAL, BACKOFF_MAX};
use crate::meta_addr::MetaAddr;

struct Entry {
    meta: MetaAddr,
    backoff: Duration,
    next_attempt: Instant,
}

/// The pool of known peer addresses, gossiped via `addr` or supplied as
/// configured seeds.
pub struct AddressBook {
    entries: HashMap<SocketAddr, Entry>,
}

impl AddressBook {
    pub fn new() -> Self {
        AddressBook {
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds or refreshes a gossiped address. Brand new addresses are
    /// immediately eligible for a connection attempt.
    pub fn insert(&mut self, meta: MetaAddr) {
        self.entries
            .entry(meta.addr)
            .and_modify(|entry| entry.meta = meta)
            .or_insert_with(|| Entry {
                meta,
                backoff: BACKOFF_INITIAL,
                next_attempt: Instant::now(),
            });
    }

    /// Addresses whose backoff has elapsed, up to `limit`.
    pub fn ready_candidates(&self, limit: usize) -> Vec<SocketAddr> {
        let now = Instant::now();
        let mut ready: Vec<_> = self
            .entries
            .values()
            .filter(|entry| entry.next_attempt <= now)
            .map(|entry| entry.meta.addr)
            .collect();
        ready.truncate(limit);
        ready
    }

    /// Resets `addr`'s backoff to the initial value after a successful
    /// `Ready` transition.
    pub fn record_success(&mut self, addr: SocketAddr) {
        if let Some(entry) = self.entries.get_mut(&addr) {
            entry.backoff = BACKOFF_INITIAL;
            entry.next_attempt = Instant::now();
        }
    }

    /// Doubles `addr`'s backoff, capped at [`BACKOFF_MAX`], and schedules the
    /// next attempt accordingly.
    pub fn record_failure(&mut self, addr: SocketAddr) {
        if let Some(entry) = self.entries.get_mut(&addr) {
            entry.backoff = std::cmp::min(entry.backoff * 2, BACKOFF_MAX);
            entry.next_attempt = Instant::now() + entry.backoff;
        }
    }
}

impl Default for AddressBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    #[test]
    fn fresh_address_is_immediately_ready() {
        let mut book = AddressBook::new();
        book.insert(MetaAddr::new(
            addr(9333),
            crate::protocol::external::types::PeerServices::NODE_NETWORK,
            Utc::now(),
        ));
        assert_eq!(book.ready_candidates(4), vec![addr(9333)]);
    }

    #[test]
    fn failure_backs_off_and_success_resets() {
        let mut book = AddressBook::new();
        book.insert(MetaAddr::new(
            addr(9333),
            crate::protocol::external::types::PeerServices::NODE_NETWORK,
            Utc::now(),
        ));
        book.record_failure(addr(9333));
        assert!(book.ready_candidates(4).is_empty());
        book.record_success(addr(9333));
        assert_eq!(book.ready_candidates(4), vec![addr(9333)]);
    }
}
