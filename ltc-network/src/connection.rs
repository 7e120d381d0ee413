//! The per-peer connection state machine: `Connecting -> Handshaking -> Ready
//! -> Closing -> Closed`. A connection owns one TCP socket, speaks the
//! handshake, keeps itself alive with periodic pings, and tracks outstanding
//! `getdata`/`getheaders` requests so callers can `await` a reply.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc, RwLock,
};
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use rand::RngCore;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, sleep_until};
use tokio_util::codec::Framed;
use tracing::{debug, instrument, warn};

use ltc_chain::{
    block::{self, CountedHeader},
    parameters::Network,
    transaction::{self, Transaction},
};

use crate::constants::{
    CODEC_ERROR_LIMIT, CODEC_ERROR_WINDOW, DEFAULT_DEPENDENCY_DEPTH_LIMIT,
    DEFAULT_DEPENDENCY_WALL_CLOCK, PING_INTERVAL, PONG_TIMEOUT, REQUEST_TIMEOUT,
};
use crate::error::{CloseReason, PeerError};
use crate::protocol::external::{
    types::{Nonce, PeerServices, ProtocolVersion},
    Codec, GetHeaders as GetHeadersBody, InventoryHash, Message, Version,
};

/// A connection's position in its state machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Handshaking = 1,
    Ready = 2,
    Closing = 3,
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> ConnectionState {
        match raw {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Handshaking,
            2 => ConnectionState::Ready,
            3 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

/// What a peer told us about itself during the handshake.
#[derive(Clone, Debug)]
pub struct PeerInfo {
    pub version: ProtocolVersion,
    pub services: PeerServices,
    pub best_height: block::Height,
    pub mean_ping: Option<Duration>,
}

impl PeerInfo {
    /// A download-capable peer advertises full block relay.
    pub fn can_serve_blocks(&self) -> bool {
        self.services.contains(PeerServices::NODE_NETWORK)
    }
}

const PING_SAMPLE_CAPACITY: usize = 20;

/// What identifies the reply to an outstanding request. `getheaders` has no
/// wire nonce, so only one can be outstanding at a time; `getdata` requests
/// are keyed by the inventory hash they asked for.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
enum RequestKey {
    Headers,
    Data(InventoryHash),
}

struct PendingRequest {
    responder: oneshot::Sender<Message>,
    deadline: Instant,
}

enum ConnectionCommand {
    Send(Message),
    RequestHeaders(GetHeadersBody, oneshot::Sender<Result<Message, PeerError>>),
    RequestData(InventoryHash, oneshot::Sender<Result<Message, PeerError>>),
    Close(CloseReason),
}

/// A handle to a running connection actor. Cloning is cheap; all clones share
/// the same underlying socket and state.
#[derive(Clone)]
pub struct PeerConnection {
    addr: SocketAddr,
    state: Arc<AtomicU8>,
    info: Arc<RwLock<PeerInfo>>,
    commands: mpsc::Sender<ConnectionCommand>,
}

impl PeerConnection {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn info(&self) -> PeerInfo {
        self.info.read().expect("peer info lock poisoned").clone()
    }

    /// Fire-and-forget send; used for `inv`, `filterload`, and other messages
    /// that don't expect a matched reply.
    pub async fn send(&self, message: Message) -> Result<(), PeerError> {
        self.commands
            .send(ConnectionCommand::Send(message))
            .await
            .map_err(|_| PeerError::Closed)
    }

    pub async fn close(&self, reason: CloseReason) {
        let _ = self.commands.send(ConnectionCommand::Close(reason)).await;
    }

    /// Issues a `getheaders` and waits for the matching `headers` reply, or
    /// `PeerError::Timeout` after [`REQUEST_TIMEOUT`].
    #[instrument(skip(self))]
    pub async fn request_headers(
        &self,
        locator: GetHeadersBody,
    ) -> Result<Vec<CountedHeader>, PeerError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(ConnectionCommand::RequestHeaders(locator, tx))
            .await
            .map_err(|_| PeerError::Closed)?;
        match rx.await.map_err(|_| PeerError::Closed)?? {
            Message::Headers(headers) => Ok(headers),
            _ => Err(PeerError::Closed),
        }
    }

    /// Issues a `getdata` for a single inventory item and waits for the
    /// matching `tx`/`block`/`notfound` reply.
    #[instrument(skip(self))]
    pub async fn request_data(&self, item: InventoryHash) -> Result<Message, PeerError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(ConnectionCommand::RequestData(item, tx))
            .await
            .map_err(|_| PeerError::Closed)?;
        rx.await.map_err(|_| PeerError::Closed)?
    }

    /// BFS over `tx`'s unconfirmed ancestors, issuing `getdata(TX)` for each
    /// unseen input. `notfound` means the ancestor is already confirmed.
    /// Returns ancestors children-before-parents.
    pub async fn download_dependencies(&self, tx: &Transaction) -> Result<Vec<Transaction>, PeerError> {
        let start = Instant::now();
        let mut seen = std::collections::HashSet::new();
        let mut queue: VecDeque<transaction::Hash> = tx
            .inputs
            .iter()
            .filter_map(|input| match input {
                ltc_chain::transparent::Input::PrevOut { outpoint, .. } => Some(outpoint.hash),
                ltc_chain::transparent::Input::Coinbase { .. } => None,
            })
            .collect();
        let mut order = Vec::new();

        while let Some(txid) = queue.pop_front() {
            if !seen.insert(txid) {
                continue;
            }
            if order.len() >= DEFAULT_DEPENDENCY_DEPTH_LIMIT
                || start.elapsed() >= DEFAULT_DEPENDENCY_WALL_CLOCK
            {
                return Err(PeerError::DependencyLimit);
            }

            let reply = self.request_data(InventoryHash::Tx(txid)).await?;
            match reply {
                Message::Tx(ancestor) => {
                    for input in &ancestor.inputs {
                        if let ltc_chain::transparent::Input::PrevOut { outpoint, .. } = input {
                            queue.push_back(outpoint.hash);
                        }
                    }
                    order.push((*ancestor).clone());
                }
                Message::NotFound(_) => {
                    // Already confirmed in a block; nothing further to fetch.
                }
                _ => return Err(PeerError::Closed),
            }
        }

        Ok(order)
    }

    /// Asks the peer whether `txid` is in its mempool via `mempool`/`inv`,
    /// then fetches it with `getdata` if advertised.
    pub async fn mempool_transaction(&self, txid: transaction::Hash) -> Result<Transaction, PeerError> {
        self.send(Message::Mempool).await?;
        match self.request_data(InventoryHash::Tx(txid)).await? {
            Message::Tx(tx) => Ok((*tx).clone()),
            _ => Err(PeerError::NotInMempool),
        }
    }
}

/// An unsolicited message a connection couldn't match to a pending request:
/// `headers`/`inv` announcements, gossiped `addr`, and relayed `tx`. `PeerGroup`
/// is the usual subscriber, feeding headers to the chain engine and addresses
/// to the address book.
pub type PeerEvent = (SocketAddr, Message);

/// Spawns the actor task driving one connection and returns a cheap handle to
/// it. Both sides send `version` immediately on connect and wait for the
/// peer's `version` and `verack`; which side dialed doesn't matter.
pub fn spawn(
    stream: TcpStream,
    addr: SocketAddr,
    network: Network,
    our_services: PeerServices,
    our_version: ProtocolVersion,
    our_best_height: block::Height,
    events: mpsc::UnboundedSender<PeerEvent>,
) -> PeerConnection {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let state = Arc::new(AtomicU8::new(ConnectionState::Connecting as u8));
    let info = Arc::new(RwLock::new(PeerInfo {
        version: our_version,
        services: PeerServices::empty(),
        best_height: block::Height(0),
        mean_ping: None,
    }));

    let handle = PeerConnection {
        addr,
        state: state.clone(),
        info: info.clone(),
        commands: cmd_tx,
    };

    tokio::spawn(run(
        stream,
        addr,
        network,
        our_services,
        our_version,
        our_best_height,
        state,
        info,
        cmd_rx,
        events,
    ));

    handle
}

async fn run<S>(
    stream: S,
    addr: SocketAddr,
    network: Network,
    our_services: PeerServices,
    our_version: ProtocolVersion,
    our_best_height: block::Height,
    state: Arc<AtomicU8>,
    info: Arc<RwLock<PeerInfo>>,
    mut commands: mpsc::Receiver<ConnectionCommand>,
    events: mpsc::UnboundedSender<PeerEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    state.store(ConnectionState::Handshaking as u8, Ordering::Release);

    let codec = Codec::builder().for_network(network).finish();
    let mut framed = Framed::new(stream, codec);

    let version_msg = Message::Version(Version::new(
        our_version,
        addr,
        PeerServices::NODE_NETWORK,
        our_services,
        addr,
        Nonce(rand::thread_rng().next_u64()),
        crate::constants::USER_AGENT.to_owned(),
        our_best_height,
        true,
    ));
    if framed.send(version_msg).await.is_err() {
        state.store(ConnectionState::Closed as u8, Ordering::Release);
        return;
    }

    let mut sent_verack = false;
    let mut got_version = false;
    let mut got_verack = false;

    while !(got_version && got_verack) {
        match framed.next().await {
            Some(Ok(Message::Version(v))) => {
                {
                    let mut info = info.write().expect("peer info lock poisoned");
                    info.version = std::cmp::min(our_version, v.version);
                    info.services = v.services;
                    info.best_height = v.best_block;
                }
                got_version = true;
                if !sent_verack {
                    if framed.send(Message::Verack).await.is_err() {
                        state.store(ConnectionState::Closed as u8, Ordering::Release);
                        return;
                    }
                    sent_verack = true;
                }
            }
            Some(Ok(Message::Verack)) => got_verack = true,
            Some(Ok(_)) => { /* ignore other messages during handshake */ }
            _ => {
                state.store(ConnectionState::Closed as u8, Ordering::Release);
                return;
            }
        }
    }

    state.store(ConnectionState::Ready as u8, Ordering::Release);
    debug!(%addr, "peer ready");

    let mut inflight: HashMap<RequestKey, PendingRequest> = HashMap::new();
    let mut ping_samples: VecDeque<Duration> = VecDeque::with_capacity(PING_SAMPLE_CAPACITY);
    let mut ping_sent_at: Option<(Nonce, Instant)> = None;
    let mut ping_ticker = interval(PING_INTERVAL);
    let mut sweep_ticker = interval(Duration::from_secs(1));
    // Bad-magic and other decode errors leave the codec's internal buffer
    // already advanced past the offending header, so the stream resyncs on
    // its own; only a burst of them within the window below indicates a
    // genuinely broken peer.
    let mut codec_errors: VecDeque<Instant> = VecDeque::new();

    let close_reason = loop {
        tokio::select! {
            frame = framed.next() => {
                match frame {
                    Some(Ok(message)) => {
                        if let Some(reason) = handle_inbound(
                            message,
                            addr,
                            &mut framed,
                            &mut inflight,
                            &mut ping_samples,
                            &mut ping_sent_at,
                            &info,
                            &events,
                        ).await {
                            break reason;
                        }
                    }
                    Some(Err(error)) => {
                        let now = Instant::now();
                        codec_errors.push_back(now);
                        while codec_errors.front().map_or(false, |t| now.duration_since(*t) > CODEC_ERROR_WINDOW) {
                            codec_errors.pop_front();
                        }
                        if codec_errors.len() > CODEC_ERROR_LIMIT {
                            warn!(%addr, %error, "too many decode errors, disconnecting");
                            break CloseReason::Io;
                        }
                        warn!(%addr, %error, "dropping malformed frame, resyncing on next message");
                    }
                    None => break CloseReason::Io,
                }
            }
            _ = ping_ticker.tick() => {
                if ping_sent_at.is_some() {
                    // Previous ping never answered within the tick cadence;
                    // the sweep below enforces the real timeout.
                } else {
                    let nonce = Nonce(rand::thread_rng().next_u64());
                    ping_sent_at = Some((nonce, Instant::now()));
                    if framed.send(Message::Ping(nonce)).await.is_err() {
                        break CloseReason::Io;
                    }
                }
            }
            _ = sweep_ticker.tick() => {
                let now = Instant::now();
                if let Some((_, sent_at)) = ping_sent_at {
                    if now.duration_since(sent_at) > PONG_TIMEOUT {
                        break CloseReason::Timeout;
                    }
                }
                inflight.retain(|_, pending| pending.deadline > now);
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(ConnectionCommand::Send(message)) => {
                        if framed.send(message).await.is_err() {
                            break CloseReason::Io;
                        }
                    }
                    Some(ConnectionCommand::RequestHeaders(locator, responder)) => {
                        let deadline = Instant::now() + REQUEST_TIMEOUT;
                        let (tx, rx) = oneshot::channel();
                        inflight.insert(RequestKey::Headers, PendingRequest { responder: tx, deadline });
                        if framed.send(Message::GetHeaders(locator)).await.is_err() {
                            break CloseReason::Io;
                        }
                        spawn_await_with_timeout(rx, deadline, responder);
                    }
                    Some(ConnectionCommand::RequestData(item, responder)) => {
                        let deadline = Instant::now() + REQUEST_TIMEOUT;
                        let (tx, rx) = oneshot::channel();
                        inflight.insert(RequestKey::Data(item), PendingRequest { responder: tx, deadline });
                        if framed.send(Message::GetData(vec![item])).await.is_err() {
                            break CloseReason::Io;
                        }
                        spawn_await_with_timeout(rx, deadline, responder);
                    }
                    Some(ConnectionCommand::Close(reason)) => break reason,
                    None => break CloseReason::Explicit,
                }
            }
        }
    };

    state.store(ConnectionState::Closing as u8, Ordering::Release);
    warn!(%addr, ?close_reason, "closing peer connection");
    for (_, pending) in inflight.drain() {
        drop(pending.responder);
    }
    state.store(ConnectionState::Closed as u8, Ordering::Release);
}

/// Completes a pending request's oneshot with whatever the peer answered (or
/// nothing, if the deadline wins the race).
fn spawn_await_with_timeout(
    rx: oneshot::Receiver<Message>,
    deadline: Instant,
    responder: oneshot::Sender<Result<Message, PeerError>>,
) {
    tokio::spawn(async move {
        tokio::select! {
            result = rx => {
                let _ = responder.send(result.map_err(|_| PeerError::Closed));
            }
            _ = sleep_until(deadline.into()) => {
                let _ = responder.send(Err(PeerError::Timeout));
            }
        }
    });
}

/// Dispatches one inbound message: completes matching pending requests,
/// answers `ping` with `pong`, records `pong` round-trip samples. Returns
/// `Some(reason)` if the message is a protocol violation that should close
/// the connection.
async fn handle_inbound<S>(
    message: Message,
    addr: SocketAddr,
    framed: &mut Framed<S, Codec>,
    inflight: &mut HashMap<RequestKey, PendingRequest>,
    ping_samples: &mut VecDeque<Duration>,
    ping_sent_at: &mut Option<(Nonce, Instant)>,
    info: &Arc<RwLock<PeerInfo>>,
    events: &mpsc::UnboundedSender<PeerEvent>,
) -> Option<CloseReason>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match message {
        Message::Ping(nonce) => {
            if framed.send(Message::Pong(nonce)).await.is_err() {
                return Some(CloseReason::Io);
            }
            None
        }
        Message::Pong(nonce) => {
            if let Some((sent_nonce, sent_at)) = *ping_sent_at {
                if sent_nonce == nonce {
                    let rtt = sent_at.elapsed();
                    if ping_samples.len() == PING_SAMPLE_CAPACITY {
                        ping_samples.pop_front();
                    }
                    ping_samples.push_back(rtt);
                    let mean = ping_samples.iter().sum::<Duration>() / ping_samples.len() as u32;
                    info.write().expect("peer info lock poisoned").mean_ping = Some(mean);
                    *ping_sent_at = None;
                }
            }
            None
        }
        Message::Headers(headers) => {
            if let Some(pending) = inflight.remove(&RequestKey::Headers) {
                let _ = pending.responder.send(Message::Headers(headers));
            } else {
                // Unprompted announcement; let `PeerGroup` feed it to the chain engine.
                let _ = events.send((addr, Message::Headers(headers)));
            }
            None
        }
        Message::Tx(ref tx) => {
            if !complete_data_request(inflight, InventoryHash::Tx(tx.hash()), message.clone()) {
                let _ = events.send((addr, message));
            }
            None
        }
        Message::Block(ref block) => {
            complete_data_request(inflight, InventoryHash::Block(block.header.hash()), message.clone());
            None
        }
        Message::NotFound(ref items) => {
            for item in items {
                complete_data_request(inflight, *item, message.clone());
            }
            None
        }
        Message::Inv(_) | Message::Addr(_) | Message::GetData(_) => {
            let _ = events.send((addr, message));
            None
        }
        Message::Reject { .. } => None,
        _ => None,
    }
}

fn complete_data_request(
    inflight: &mut HashMap<RequestKey, PendingRequest>,
    item: InventoryHash,
    message: Message,
) -> bool {
    match inflight.remove(&RequestKey::Data(item)) {
        Some(pending) => {
            let _ = pending.responder.send(message);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_serve_blocks_requires_node_network() {
        let info = PeerInfo {
            version: ProtocolVersion(70015),
            services: PeerServices::empty(),
            best_height: block::Height(0),
            mean_ping: None,
        };
        assert!(!info.can_serve_blocks());

        let info = PeerInfo {
            services: PeerServices::NODE_NETWORK,
            ..info
        };
        assert!(info.can_serve_blocks());
    }
}
