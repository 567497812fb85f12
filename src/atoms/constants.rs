// ── DocChat Atoms: Constants ───────────────────────────────────────────────
// All named constants for the crate live here.
// Rationale: collecting constants in one place eliminates magic numbers,
// makes auditing easier, and keeps every layer's code self-documenting.

// ── Reconnect backoff ──────────────────────────────────────────────────────
// Used by `reconnect_backoff()` in engine/backoff.rs and as the
// `TransportConfig` defaults. The delay doubles per attempt from the base
// and is capped; a server-initiated close skips the escalation and retries
// at the flat base delay.
pub(crate) const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 1_000;
pub(crate) const DEFAULT_RECONNECT_MAX_DELAY_MS: u64 = 10_000;

/// Reconnect attempts before the transport gives up entirely.
pub(crate) const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

// ── Turn handling ──────────────────────────────────────────────────────────
// A turn with no acknowledgment, answer, or server error within this window
// is synthesized into a local timeout error. The connection itself may still
// be healthy — only the request stalled — so the timeout never touches the
// connection state.
pub(crate) const DEFAULT_TURN_TIMEOUT_MS: u64 = 10_000;

// ── Transport establishment ────────────────────────────────────────────────
/// Hard ceiling on a single connection attempt. A hung TCP/TLS/upgrade
/// handshake counts as a connect error and feeds the reconnect schedule.
pub(crate) const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 20_000;

// ── Outbound turn metadata ─────────────────────────────────────────────────
pub(crate) const DEFAULT_LANGUAGE: &str = "en";

// ── Driver plumbing ────────────────────────────────────────────────────────
// Commands queue while the driver is mid-await (e.g. during a connection
// attempt); the buffer only needs to absorb a brief burst from one UI.
pub(crate) const COMMAND_QUEUE_CAPACITY: usize = 32;

// ── HTTP fallback retry ────────────────────────────────────────────────────
// Used by `HttpAsk` in engine/fallback.rs. Mirrors the realtime path's base
// delay; request retries cap lower than reconnects because the caller is
// blocked waiting on the answer.
pub(crate) const FALLBACK_MAX_RETRIES: u32 = 3;
pub(crate) const FALLBACK_MAX_RETRY_DELAY_MS: u64 = 30_000;
