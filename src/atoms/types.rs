// ── DocChat Atoms: Shared Types ────────────────────────────────────────────
// Connection lifecycle primitives and the externally visible status snapshot.

use serde::{Deserialize, Serialize};

// ── Connection state machine ───────────────────────────────────────────────

/// Lifecycle state of the logical channel connection.
///
/// `Failed` is terminal: the reconnect budget is spent and only a fresh
/// transport instance (page/session reload) recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl ConnectionState {
    /// The legal transition edges. Everything not listed here is refused by
    /// the session, so illegal sequences of channel callbacks cannot corrupt
    /// the lifecycle.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Reconnecting)
                | (Connecting, Disconnected)
                | (Connected, Reconnecting)
                | (Connected, Disconnected)
                | (Reconnecting, Connected)
                | (Reconnecting, Disconnected)
                | (Reconnecting, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Failed)
    }
}

// ── Disconnect classification ──────────────────────────────────────────────

/// Why the channel went away. Drives the reconnect policy: caller-initiated
/// teardown never reconnects, a server-sent close retries at the flat base
/// delay, and a transport fault retries with exponential escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called — intentional navigation/unload.
    Requested,
    /// The server sent a close frame.
    ServerClose,
    /// I/O error, protocol error, or the stream ended without a close frame.
    TransportFault,
}

// ── Transport status snapshot ──────────────────────────────────────────────

/// Point-in-time view of the transport, readable from any thread without
/// touching the driver task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub state: ConnectionState,
    pub conversation_id: String,
    pub reconnect_attempt: u32,
    pub turn_pending: bool,
    pub messages_received: u64,
}
