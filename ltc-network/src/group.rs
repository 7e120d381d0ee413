//! `PeerGroup`: discovers addresses, maintains a target-sized connection
//! pool, elects a single download peer to feed the chain engine, and fans
//! broadcast/filter updates out across every `Ready` connection.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use hyper::Client;
use rand::seq::SliceRandom;
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::{mpsc, Notify};
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

use ltc_chain::block::Height;
use ltc_chain::parameters::Network;
use ltc_chain::transaction::Transaction;
use ltc_consensus::{Acceptance, ChainEngine};

use crate::address_book::AddressBook;
use crate::connection::{self, ConnectionState, PeerConnection, PeerEvent};
use crate::constants::{
    BACKOFF_INITIAL, BACKOFF_MAX, BROADCAST_CONFIRM_TIMEOUT, CURRENT_VERSION,
    DEFAULT_TARGET_PEER_COUNT, DISCOVERY_RETRY_SURFACE_AFTER, DOWNLOAD_PEER_STALL_TIMEOUT,
    MIN_BROADCAST_PEERS, MISBEHAVIOR_BAN_DURATION, SEED_RESOLUTION_TIMEOUT,
    SHUTDOWN_JOIN_DEADLINE,
};
use crate::error::{CloseReason, GroupError};
use crate::meta_addr::MetaAddr;
use crate::protocol::external::{types::PeerServices, GetHeaders, InventoryHash, Message};

/// Where a `PeerGroup` looks for addresses on `start()`.
#[derive(Clone, Debug, Default)]
pub struct DiscoveryConfig {
    /// Hostnames resolved via DNS; each result is paired with `default_port`.
    pub dns_seeds: Vec<String>,
    /// URLs returning a newline-separated `ip:port` address list.
    pub http_seeds: Vec<String>,
    /// Addresses supplied directly by configuration.
    pub explicit: Vec<SocketAddr>,
    /// Port assumed for DNS seed results, which carry no port of their own.
    pub default_port: u16,
}

struct ElectedDownloadPeer {
    addr: SocketAddr,
    last_progress: Instant,
}

struct Shared {
    network: Network,
    our_services: PeerServices,
    our_best_height: RwLock<Height>,
    target_size: usize,
    address_book: Mutex<AddressBook>,
    peers: RwLock<HashMap<SocketAddr, PeerConnection>>,
    banned: Mutex<HashMap<SocketAddr, Instant>>,
    download_peer: Mutex<Option<ElectedDownloadPeer>>,
    chain_engine: Arc<ChainEngine>,
    ready_notify: Notify,
    stopping: std::sync::atomic::AtomicBool,
    /// Broadcasts awaiting their first `getdata`, keyed by txid.
    pending_broadcasts: Mutex<HashMap<ltc_chain::transaction::Hash, mpsc::UnboundedSender<SocketAddr>>>,
}

/// A handle to a running connection pool. Cloning is cheap; all clones share
/// the same pool.
#[derive(Clone)]
pub struct PeerGroup {
    inner: Arc<Shared>,
    events_tx: mpsc::UnboundedSender<PeerEvent>,
}

impl PeerGroup {
    /// Builds an idle group. Call [`PeerGroup::start`] to begin discovery and
    /// connection maintenance.
    pub fn new(network: Network, our_services: PeerServices, chain_engine: Arc<ChainEngine>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Shared {
            network,
            our_services,
            our_best_height: RwLock::new(Height(0)),
            target_size: DEFAULT_TARGET_PEER_COUNT,
            address_book: Mutex::new(AddressBook::new()),
            peers: RwLock::new(HashMap::new()),
            banned: Mutex::new(HashMap::new()),
            download_peer: Mutex::new(None),
            chain_engine,
            ready_notify: Notify::new(),
            stopping: std::sync::atomic::AtomicBool::new(false),
            pending_broadcasts: Mutex::new(HashMap::new()),
        });

        let group = PeerGroup { inner, events_tx };
        tokio::spawn(group.clone().run_event_loop(events_rx));
        group
    }

    /// Resolves `config`'s discovery sources into the address book, then
    /// begins the maintenance loop that keeps `target_size` connections
    /// open.
    ///
    /// An empty discovery result is retried with exponential backoff rather
    /// than failing outright; `GroupError::NetworkUnavailable` is only
    /// surfaced once [`DISCOVERY_RETRY_SURFACE_AFTER`] has elapsed without a
    /// single usable address.
    pub async fn start(&self, config: DiscoveryConfig) -> Result<(), GroupError> {
        let deadline = Instant::now() + DISCOVERY_RETRY_SURFACE_AFTER;
        let mut backoff = BACKOFF_INITIAL;

        loop {
            let discovered = discover(&config).await;
            if !discovered.is_empty() || !config.explicit.is_empty() {
                let mut book = self.inner.address_book.lock().expect("lock not poisoned");
                for addr in discovered.into_iter().chain(config.explicit.iter().copied()) {
                    book.insert(MetaAddr::new(addr, PeerServices::empty(), chrono::Utc::now()));
                }
                break;
            }

            if Instant::now() >= deadline {
                return Err(GroupError::NetworkUnavailable);
            }
            warn!(?backoff, "discovery found no addresses, retrying");
            tokio::time::sleep(backoff).await;
            backoff = std::cmp::min(backoff * 2, BACKOFF_MAX);
        }

        tokio::spawn(self.clone().maintenance_loop());
        Ok(())
    }

    /// Resolves when at least `n` peers are `Ready`.
    pub async fn wait_for_peers(&self, n: usize) {
        loop {
            if self.ready_peer_count() >= n {
                return;
            }
            self.inner.ready_notify.notified().await;
        }
    }

    fn ready_peer_count(&self) -> usize {
        self.inner
            .peers
            .read()
            .expect("lock not poisoned")
            .values()
            .filter(|p| p.state() == ConnectionState::Ready)
            .count()
    }

    /// Relays `tx` as an `inv` to at least `min(numPeers, 2)` ready peers and
    /// waits for at least one of them to ask for it via `getdata`.
    pub async fn broadcast_transaction(&self, tx: Transaction) -> Result<(), GroupError> {
        let txid = tx.hash();
        let ready: Vec<PeerConnection> = {
            let peers = self.inner.peers.read().expect("lock not poisoned");
            peers
                .values()
                .filter(|p| p.state() == ConnectionState::Ready)
                .cloned()
                .collect()
        };

        let fanout = std::cmp::min(ready.len(), MIN_BROADCAST_PEERS);
        if fanout == 0 {
            return Err(GroupError::NotEnoughPeers(MIN_BROADCAST_PEERS));
        }

        let (requested_tx, mut requested_rx) = mpsc::unbounded_channel::<SocketAddr>();
        self.inner
            .pending_broadcasts
            .lock()
            .expect("lock not poisoned")
            .insert(txid, requested_tx);

        for peer in ready.iter().take(fanout) {
            peer.send(Message::Inv(vec![InventoryHash::Tx(txid)]))
                .await
                .map_err(GroupError::Peer)?;
        }

        let wait = timeout(BROADCAST_CONFIRM_TIMEOUT, requested_rx.recv());
        let result = match wait.await {
            Ok(Some(requester)) => {
                if let Some(conn) = self.inner.peers.read().expect("lock not poisoned").get(&requester) {
                    let _ = conn.send(Message::Tx(Arc::new(tx))).await;
                }
                Ok(())
            }
            _ => Err(GroupError::NotEnoughPeers(MIN_BROADCAST_PEERS)),
        };
        self.inner
            .pending_broadcasts
            .lock()
            .expect("lock not poisoned")
            .remove(&txid);
        result
    }

    /// Sends `filterload` to every `Ready` peer. Delivery order across peers
    /// is unimportant; this only returns once every send has been queued, so
    /// no `getdata` issued by the caller afterward can race ahead of it on
    /// the same connection.
    pub async fn update_filter(&self, message: Message) -> Result<(), GroupError> {
        let ready: Vec<PeerConnection> = {
            let peers = self.inner.peers.read().expect("lock not poisoned");
            peers
                .values()
                .filter(|p| p.state() == ConnectionState::Ready)
                .cloned()
                .collect()
        };
        for peer in ready {
            peer.send(message.clone()).await.map_err(GroupError::Peer)?;
        }
        Ok(())
    }

    /// Records the embedder's current tip so newly handshaked peers see it in
    /// `version.best_block`.
    pub fn set_best_height(&self, height: Height) {
        *self.inner.our_best_height.write().expect("lock not poisoned") = height;
    }

    /// Stops accepting new work, closes every connection, and waits up to
    /// [`SHUTDOWN_JOIN_DEADLINE`] for them to finish.
    pub async fn stop(&self) {
        self.inner
            .stopping
            .store(true, std::sync::atomic::Ordering::Release);

        let peers: Vec<PeerConnection> = self
            .inner
            .peers
            .read()
            .expect("lock not poisoned")
            .values()
            .cloned()
            .collect();
        let closes = peers.iter().map(|p| p.close(CloseReason::Explicit));
        let _ = timeout(SHUTDOWN_JOIN_DEADLINE, futures::future::join_all(closes)).await;
    }

    async fn maintenance_loop(self) {
        let mut ticker = interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            if self.inner.stopping.load(std::sync::atomic::Ordering::Acquire) {
                return;
            }

            self.reap_closed_peers();
            self.reconnect_if_below_target().await;
            self.ensure_download_peer();
        }
    }

    fn reap_closed_peers(&self) {
        let mut peers = self.inner.peers.write().expect("lock not poisoned");
        peers.retain(|_, conn| conn.state() != ConnectionState::Closed);
    }

    async fn reconnect_if_below_target(&self) {
        let deficit = {
            let peers = self.inner.peers.read().expect("lock not poisoned");
            self.inner.target_size.saturating_sub(peers.len())
        };
        if deficit == 0 {
            return;
        }

        let now = Instant::now();
        let candidates = {
            let banned = self.inner.banned.lock().expect("lock not poisoned");
            let book = self.inner.address_book.lock().expect("lock not poisoned");
            book.ready_candidates(deficit * 4)
                .into_iter()
                .filter(|addr| banned.get(addr).map_or(true, |until| now >= *until))
                .take(deficit)
                .collect::<Vec<_>>()
        };

        for addr in candidates {
            self.dial(addr).await;
        }
    }

    async fn dial(&self, addr: SocketAddr) {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                let best_height = *self.inner.our_best_height.read().expect("lock not poisoned");
                let conn = connection::spawn(
                    stream,
                    addr,
                    self.inner.network,
                    self.inner.our_services,
                    CURRENT_VERSION,
                    best_height,
                    self.events_tx.clone(),
                );
                self.inner
                    .peers
                    .write()
                    .expect("lock not poisoned")
                    .insert(addr, conn);
                self.inner
                    .address_book
                    .lock()
                    .expect("lock not poisoned")
                    .record_success(addr);
                self.inner.ready_notify.notify_waiters();
            }
            Err(error) => {
                debug!(%addr, %error, "dial failed");
                self.inner
                    .address_book
                    .lock()
                    .expect("lock not poisoned")
                    .record_failure(addr);
            }
        }
    }

    fn ensure_download_peer(&self) {
        let peers = self.inner.peers.read().expect("lock not poisoned");
        let mut current = self.inner.download_peer.lock().expect("lock not poisoned");

        let current_still_good = current.as_ref().map_or(false, |elected| {
            peers
                .get(&elected.addr)
                .map_or(false, |p| p.state() == ConnectionState::Ready)
                && elected.last_progress.elapsed() < DOWNLOAD_PEER_STALL_TIMEOUT
        });
        if current_still_good {
            return;
        }

        let best = peers
            .values()
            .filter(|p| p.state() == ConnectionState::Ready && p.info().can_serve_blocks())
            .max_by(|a, b| {
                let a_info = a.info();
                let b_info = b.info();
                a_info
                    .best_height
                    .0
                    .cmp(&b_info.best_height.0)
                    .then_with(|| b_info.mean_ping.unwrap_or(Duration::MAX).cmp(
                        &a_info.mean_ping.unwrap_or(Duration::MAX),
                    ))
            });

        *current = best.map(|p| {
            info!(addr = %p.addr(), "elected download peer");
            ElectedDownloadPeer {
                addr: p.addr(),
                last_progress: Instant::now(),
            }
        });
    }

    /// Requests headers from the current download peer continuing from
    /// `locator`, feeding every accepted header to the chain engine.
    pub async fn sync_headers(&self, locator: Vec<ltc_chain::block::Hash>) -> Result<(), GroupError> {
        let download_peer = {
            let elected = self.inner.download_peer.lock().expect("lock not poisoned");
            elected.as_ref().map(|e| e.addr)
        };
        let addr = download_peer.ok_or(GroupError::NotEnoughPeers(1))?;
        let conn = self
            .inner
            .peers
            .read()
            .expect("lock not poisoned")
            .get(&addr)
            .cloned()
            .ok_or(GroupError::NotEnoughPeers(1))?;

        let headers = conn
            .request_headers(GetHeaders {
                block_header_hashes: locator,
                stop_hash: None,
            })
            .await
            .map_err(GroupError::Peer)?;

        self.ingest_headers(addr, headers).await;
        Ok(())
    }

    async fn ingest_headers(&self, from: SocketAddr, headers: Vec<ltc_chain::block::CountedHeader>) {
        for counted in headers {
            match self.inner.chain_engine.add_header(counted.header) {
                Ok(Acceptance::BestChain) | Ok(Acceptance::SideChain) => {
                    if let Some(elected) = self.inner.download_peer.lock().expect("lock not poisoned").as_mut() {
                        if elected.addr == from {
                            elected.last_progress = Instant::now();
                        }
                    }
                }
                Ok(Acceptance::Orphan) | Ok(Acceptance::Duplicate) => {}
                Err(error) => {
                    warn!(%from, %error, "peer sent a header the chain engine rejected");
                    self.ban(from);
                    return;
                }
            }
        }
    }

    fn ban(&self, addr: SocketAddr) {
        self.inner
            .banned
            .lock()
            .expect("lock not poisoned")
            .insert(addr, Instant::now() + MISBEHAVIOR_BAN_DURATION);
        if let Some(conn) = self.inner.peers.read().expect("lock not poisoned").get(&addr) {
            let conn = conn.clone();
            tokio::spawn(async move { conn.close(CloseReason::Banned).await });
        }
        let mut elected = self.inner.download_peer.lock().expect("lock not poisoned");
        if elected.as_ref().map_or(false, |e| e.addr == addr) {
            *elected = None;
        }
    }

    /// Consumes unsolicited messages forwarded by every connection: headers
    /// announcements feed the chain engine, `addr` feeds the address book,
    /// and `getdata` completes any outstanding broadcast.
    async fn run_event_loop(self, mut events: mpsc::UnboundedReceiver<PeerEvent>) {
        while let Some((from, message)) = events.recv().await {
            match message {
                Message::Headers(headers) => self.ingest_headers(from, headers).await,
                Message::Addr(addrs) => {
                    let mut book = self.inner.address_book.lock().expect("lock not poisoned");
                    for meta in addrs {
                        book.insert(meta);
                    }
                }
                Message::GetData(items) => {
                    let pending = self.inner.pending_broadcasts.lock().expect("lock not poisoned");
                    for item in items {
                        if let InventoryHash::Tx(txid) = item {
                            if let Some(sender) = pending.get(&txid) {
                                let _ = sender.send(from);
                            }
                        }
                    }
                }
                Message::Inv(_) => {
                    // Unsolicited inv announcements are advisory only; a
                    // light client pulls headers, not full blocks/txs, via
                    // explicit getdata.
                }
                _ => {}
            }
        }
    }
}

async fn discover(config: &DiscoveryConfig) -> Vec<SocketAddr> {
    let mut addrs = Vec::new();

    for seed in &config.dns_seeds {
        let lookup = timeout(SEED_RESOLUTION_TIMEOUT, lookup_host((seed.as_str(), config.default_port))).await;
        match lookup {
            Ok(Ok(resolved)) => addrs.extend(resolved),
            Ok(Err(error)) => warn!(%seed, %error, "DNS seed lookup failed"),
            Err(_) => warn!(%seed, "DNS seed lookup timed out"),
        }
    }

    let client: Client<_> = Client::new();
    for seed in &config.http_seeds {
        let fetch = timeout(SEED_RESOLUTION_TIMEOUT, fetch_http_seed_list(&client, seed));
        match fetch.await {
            Ok(Ok(resolved)) => addrs.extend(resolved),
            Ok(Err(error)) => warn!(%seed, %error, "HTTP seed fetch failed"),
            Err(_) => warn!(%seed, "HTTP seed fetch timed out"),
        }
    }

    addrs.shuffle(&mut rand::thread_rng());
    addrs
}

async fn fetch_http_seed_list(
    client: &Client<hyper::client::HttpConnector>,
    url: &str,
) -> Result<Vec<SocketAddr>, Box<dyn std::error::Error + Send + Sync>> {
    let uri: hyper::Uri = url.parse()?;
    let response = client.get(uri).await?;
    let body = hyper::body::to_bytes(response.into_body()).await?;
    let text = String::from_utf8_lossy(&body);
    Ok(text
        .lines()
        .filter_map(|line| line.trim().parse::<SocketAddr>().ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_config_defaults_to_empty() {
        let config = DiscoveryConfig::default();
        assert!(config.dns_seeds.is_empty());
        assert!(config.http_seeds.is_empty());
        assert!(config.explicit.is_empty());
    }
}
