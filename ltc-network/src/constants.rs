//! Protocol and peer-management constants.

use std::time::Duration;

use crate::protocol::external::types::ProtocolVersion;

/// The P2P protocol version this client speaks.
pub const CURRENT_VERSION: ProtocolVersion = ProtocolVersion(70015);

/// Sent in every `version` message's `user_agent` field.
pub const USER_AGENT: &str = "/ltc-light-client:0.1.0/";

/// How often a `Ready` connection sends an unsolicited `ping`.
pub const PING_INTERVAL: Duration = Duration::from_secs(2);

/// How long to wait for a `pong` before closing the connection.
pub const PONG_TIMEOUT: Duration = Duration::from_secs(20);

/// How long a `Pending` `getdata`/`getheaders` request waits before failing.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default BFS depth limit for `downloadDependencies`.
pub const DEFAULT_DEPENDENCY_DEPTH_LIMIT: usize = 1000;

/// Default wall-clock budget for `downloadDependencies`.
pub const DEFAULT_DEPENDENCY_WALL_CLOCK: Duration = Duration::from_secs(60);

/// Default number of peers a [`crate::group::PeerGroup`] tries to keep connected.
pub const DEFAULT_TARGET_PEER_COUNT: usize = 4;

/// Per-seed resolution timeout during discovery.
pub const SEED_RESOLUTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Starting reconnection backoff for a single remote address.
pub const BACKOFF_INITIAL: Duration = Duration::from_secs(1);

/// Reconnection backoff ceiling.
pub const BACKOFF_MAX: Duration = Duration::from_secs(5 * 60);

/// How long the download peer can make no progress before re-election.
pub const DOWNLOAD_PEER_STALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Ban duration applied to a peer whose header the `ChainEngine` rejects.
pub const MISBEHAVIOR_BAN_DURATION: Duration = Duration::from_secs(60 * 60);

/// Minimum peer fan-out for `broadcastTransaction`.
pub const MIN_BROADCAST_PEERS: usize = 2;

/// How long `broadcastTransaction` waits for a peer to `getdata` the
/// announced txid before giving up on the broadcast.
pub const BROADCAST_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `PeerGroup::start` keeps retrying discovery (with exponential
/// backoff) before surfacing `GroupError::NetworkUnavailable` to the caller.
pub const DISCOVERY_RETRY_SURFACE_AFTER: Duration = Duration::from_secs(10 * 60);

/// `stop()`'s deadline for graceful shutdown before sockets are forced closed.
pub const SHUTDOWN_JOIN_DEADLINE: Duration = Duration::from_secs(5);

/// Codec decode errors tolerated within [`CODEC_ERROR_WINDOW`] before a
/// connection is closed, e.g. a burst of magic mismatches from a desynced
/// stream.
pub const CODEC_ERROR_LIMIT: usize = 3;

/// Sliding window over which [`CODEC_ERROR_LIMIT`] is counted.
pub const CODEC_ERROR_WINDOW: Duration = Duration::from_secs(60);
