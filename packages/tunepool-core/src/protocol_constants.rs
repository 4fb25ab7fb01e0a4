//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the streaming provider's Web API contract or
//! by invariants the queue logic depends on. Tunable values live in
//! [`Config`](crate::state::Config).

// ─────────────────────────────────────────────────────────────────────────────
// Provider OAuth
// ─────────────────────────────────────────────────────────────────────────────

/// Share of the provider-stated token lifetime we actually use (percent).
///
/// A token is refreshed once 98% of its lifetime has elapsed, so it is never
/// presented during the last sliver of its validity window. Integer percent
/// keeps the expiry arithmetic exact (3600 s -> 3528 s).
pub const TOKEN_LIFETIME_PERCENT: u64 = 98;

/// Default provider accounts (token endpoint) base URL.
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// Default provider Web API base URL.
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";

/// Scopes requested on the consent page: profile email for room ownership,
/// device listing, transfer and playback control.
pub const DEFAULT_SCOPES: &str = "user-read-private user-read-email \
user-read-playback-state user-modify-playback-state";

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

/// Timeout for provider HTTP requests (seconds).
///
/// Without it a hung provider call would suspend an advancement indefinitely.
pub const PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Default number of tracks returned by a search.
pub const DEFAULT_SEARCH_LIMIT: u32 = 5;

/// Upper bound the provider accepts for the search `limit` parameter.
pub const MAX_SEARCH_LIMIT: u32 = 50;

/// Retry delays for transient provider errors (exponential backoff).
pub const PROVIDER_RETRY_DELAYS_MS: [u64; 3] = [200, 500, 1000];

// ─────────────────────────────────────────────────────────────────────────────
// Rooms
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum room name length (characters).
pub const MAX_ROOM_NAME_LEN: usize = 64;

/// Default capacity of the room event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Name of the room snapshot file inside the data directory.
pub const ROOMS_FILE: &str = "rooms.json";

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket
// ─────────────────────────────────────────────────────────────────────────────

/// Interval for checking WebSocket client liveness (seconds).
pub const WS_HEARTBEAT_CHECK_INTERVAL_SECS: u64 = 10;

/// A WebSocket client silent for this long is disconnected (seconds).
pub const WS_HEARTBEAT_TIMEOUT_SECS: u64 = 60;

/// Fallback port range scanned when no preferred port is configured.
pub const DEFAULT_PORT_RANGE: (u16, u16) = (3000, 3010);

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Service identifier reported by the health endpoint.
pub const SERVICE_ID: &str = "tunepool";
