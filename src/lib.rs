// DocChat Transport Core — realtime client transport for the DocChat
// PDF-document chat assistant.
//
// Owns one logical channel connection per session, hides reconnection churn
// from the UI layer, and guarantees at most one in-flight user turn:
//   - Connection lifecycle: connect → join conversation → degrade →
//     reconnect with bounded exponential backoff → fail.
//   - Turn correlation: every question carries a monotonic turn id; stale
//     late responses are discarded instead of resurfacing as new answers.
//   - Conversation affinity: inbound events for a foreign conversation id
//     never reach the UI.
//
// The rendering layer is an external consumer of the `TransportEvents`
// callback surface. The question-answering backend, document storage, and
// authentication are black boxes on the far side of the channel.

pub mod atoms;
pub mod engine;

pub use atoms::error::{TransportError, TransportResult};
pub use atoms::types::{ChannelStatus, ConnectionState, DisconnectReason};
pub use engine::channel::{Channel, ChannelConnector, ChannelEvent, WebSocketConnector};
pub use engine::config::TransportConfig;
pub use engine::events::{EventSender, TransportEvent, TransportEvents};
pub use engine::fallback::HttpAsk;
pub use engine::transport::ChatTransport;
pub use engine::wire::{InboundFrame, OutboundFrame};
