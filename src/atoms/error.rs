// ── DocChat Atoms: Error Types ─────────────────────────────────────────────
// Single canonical error enum for the transport, built with `thiserror`.
//
// Design rules:
//   • Variants follow the failure taxonomy: connection-level faults never
//     abort a pending turn early, turn-level faults never change the
//     connection state, and the two are distinct variants so callers can't
//     conflate them.
//   • The `#[from]` attribute wires external error conversions automatically.
//   • `TransportError` → `String` conversion is provided via `Display` so the
//     UI boundary can call `.to_string()` without boilerplate.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransportError {
    /// The channel is not in the Connected state.
    #[error("Not connected to the chat server")]
    NotConnected,

    /// A turn is already in flight; the backend correlates one outstanding
    /// question per conversation, so concurrent submission is rejected.
    #[error("A question is already waiting for an answer (turn {0})")]
    TurnPending(u64),

    /// The submitted question was empty after trimming.
    #[error("Cannot send an empty question")]
    EmptyTurn,

    /// No acknowledgment, answer, or server error arrived for the turn
    /// within its deadline. Local and recoverable — the user may resubmit.
    #[error("The chat server did not respond in time (turn {0})")]
    TurnTimeout(u64),

    /// Transient transport-level failure; auto-recovered via reconnect.
    #[error("Connection fault: {0}")]
    ConnectionFault(String),

    /// Reconnect attempt budget exhausted. Terminal for this session.
    #[error("Lost connection to the chat server after {0} reconnect attempts — reload to retry")]
    ConnectionExhausted(u32),

    /// Error reported by the backend for a single turn. Recoverable.
    #[error("Server error: {0}")]
    Server(String),

    /// Malformed or out-of-contract inbound traffic. Dropped, logged only.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Transport configuration is invalid (bad URL, bad scheme, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP failure on the fallback path (reqwest layer).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// WebSocket-level failure (tungstenite layer).
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Catch-all for errors that do not yet have a dedicated variant.
    /// Prefer adding a specific variant over using this in new code.
    #[error("{0}")]
    Other(String),
}

// ── Migration bridge: String → TransportError ──────────────────────────────
// Allows `?` and `.into()` on plain-string error sites.

impl From<String> for TransportError {
    fn from(s: String) -> Self {
        TransportError::Other(s)
    }
}

impl From<&str> for TransportError {
    fn from(s: &str) -> Self {
        TransportError::Other(s.to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All transport operations should return this type.
pub type TransportResult<T> = Result<T, TransportError>;
