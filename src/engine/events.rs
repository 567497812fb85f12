// DocChat Transport Engine — UI Event Surface
//
// The transport never touches the DOM-equivalent directly: the rendering
// layer hands in a `TransportEvents` implementation at spawn time and gets
// every user-visible development pushed through it. Status changes mirror
// the connection state machine; errors are conversation-stream messages,
// never modals, so a failed turn keeps its place in the history.

use crate::atoms::types::ConnectionState;
use tokio::sync::mpsc;

// ── Event payloads ─────────────────────────────────────────────────────

/// One user-visible transport development, for consumers that prefer a
/// channel of values over implementing the callback trait.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    StatusChange(ConnectionState),
    Message {
        text: String,
        timestamp: Option<String>,
        suggestions: Vec<String>,
    },
    TypingChange(bool),
    Error {
        message: String,
        /// Fatal errors require a session reload; everything else leaves
        /// the conversation usable.
        fatal: bool,
    },
}

// ── Callback surface ───────────────────────────────────────────────────

/// Callbacks consumed by the rendering layer. Invoked from the driver task;
/// implementations must be cheap and non-blocking.
pub trait TransportEvents: Send + Sync {
    fn on_status_change(&self, state: ConnectionState);
    fn on_message(&self, text: &str, timestamp: Option<&str>, suggestions: &[String]);
    fn on_typing_change(&self, is_typing: bool);
    fn on_error(&self, message: &str, fatal: bool);
}

// ── Channel-backed implementation ──────────────────────────────────────

/// `TransportEvents` implementation that forwards every callback into an
/// unbounded channel. The receiving end is the UI's (or a test's) inbox.
pub struct EventSender(mpsc::UnboundedSender<TransportEvent>);

impl EventSender {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSender(tx), rx)
    }
}

impl TransportEvents for EventSender {
    fn on_status_change(&self, state: ConnectionState) {
        let _ = self.0.send(TransportEvent::StatusChange(state));
    }

    fn on_message(&self, text: &str, timestamp: Option<&str>, suggestions: &[String]) {
        let _ = self.0.send(TransportEvent::Message {
            text: text.to_string(),
            timestamp: timestamp.map(str::to_string),
            suggestions: suggestions.to_vec(),
        });
    }

    fn on_typing_change(&self, is_typing: bool) {
        let _ = self.0.send(TransportEvent::TypingChange(is_typing));
    }

    fn on_error(&self, message: &str, fatal: bool) {
        let _ = self.0.send(TransportEvent::Error {
            message: message.to_string(),
            fatal,
        });
    }
}
