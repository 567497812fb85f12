// DocChat Transport Engine — Session State Machine
//
// All transport decisions live here, synchronously and without I/O: state
// transitions, pending-turn bookkeeping, and inbound dispatch filtering.
// The driver task feeds this machine and executes whatever it decides —
// which is what makes every lifecycle rule unit-testable without a socket.
//
// Invariants enforced here:
//   • Connection state only moves along the edges in
//     `ConnectionState::can_transition_to`; illegal transitions are refused.
//   • At most one pending turn exists; a second submission is rejected
//     without mutating anything.
//   • A new pending turn is only created while Connected, but an existing
//     one survives reconnects (its deadline keeps ticking).
//   • Inbound events scoped to a foreign conversation are discarded before
//     they can reach the UI.
//   • A response for a timed-out or errored turn is stale and dropped; a
//     response for an acknowledged turn is the promised answer and delivered.

use crate::atoms::error::{TransportError, TransportResult};
use crate::atoms::types::{ConnectionState, DisconnectReason};
use crate::engine::wire::{InboundFrame, OutboundFrame};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

// ── Turn bookkeeping ───────────────────────────────────────────────────

/// The one in-flight user question.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub seq: u64,
    pub text: String,
    pub deadline: Instant,
}

/// The most recently retired turn. `deliverable` records whether a late
/// answer for it is still welcome: acknowledged turns yes, timed-out or
/// errored turns no.
#[derive(Debug, Clone, Copy)]
struct RetiredTurn {
    seq: u64,
    deliverable: bool,
}

// ── Dispatch decisions ─────────────────────────────────────────────────

/// What the driver should do with one inbound frame.
#[derive(Debug, PartialEq)]
pub enum Dispatch {
    /// Forward a bot message to the UI. `resolved_turn` is set when this
    /// message answered the live pending turn.
    Message {
        text: String,
        timestamp: Option<String>,
        suggestions: Vec<String>,
        resolved_turn: Option<u64>,
    },
    /// The live turn was acknowledged; its timeout is cancelled and the
    /// next submission is allowed.
    Acked { turn_id: u64 },
    /// Toggle the typing indicator.
    Typing { is_typing: bool },
    /// Backend-reported turn error: forward to the UI, connection state
    /// untouched (a single failed turn is not a connection fault).
    ServerError {
        message: String,
        cleared_turn: Option<u64>,
    },
    /// Silently dropped; the reason is logged at debug level only.
    Ignored(&'static str),
}

/// What the driver should do after a non-caller-initiated channel drop.
#[derive(Debug, PartialEq)]
pub enum DropOutcome {
    /// Schedule reconnect attempt `attempt` (1-based). `flat_delay` is set
    /// for server-initiated closes — retry at the base cadence instead of
    /// the escalated schedule.
    Reconnect { attempt: u32, flat_delay: bool },
    /// Attempt budget spent. State is now Failed; only a fresh session
    /// recovers.
    Exhausted { attempts: u32 },
    /// Drop arrived in a state that cannot reconnect (already torn down or
    /// already Failed) — nothing to do.
    Ignored,
}

// ── Session ────────────────────────────────────────────────────────────

pub struct Session {
    conversation_id: String,
    client_id: Uuid,
    state: ConnectionState,
    reconnect_attempt: u32,
    pending_turn: Option<PendingTurn>,
    retired_turn: Option<RetiredTurn>,
    next_turn_seq: u64,
}

impl Session {
    /// A session with a caller-provided conversation id (resuming a stored
    /// conversation) or a fresh client-generated one.
    pub fn new(conversation_id: Option<String>) -> Self {
        let conversation_id = conversation_id
            .unwrap_or_else(|| format!("conv_{}", chrono::Utc::now().timestamp_millis()));
        Session {
            conversation_id,
            client_id: Uuid::new_v4(),
            state: ConnectionState::Disconnected,
            reconnect_attempt: 0,
            pending_turn: None,
            retired_turn: None,
            next_turn_seq: 1,
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    pub fn turn_pending(&self) -> bool {
        self.pending_turn.is_some()
    }

    /// Deadline of the live turn, if any — the driver turns this into its
    /// cancellable turn-timeout timer.
    pub fn turn_deadline(&self) -> Option<Instant> {
        self.pending_turn.as_ref().map(|t| t.deadline)
    }

    // ── Connection lifecycle ───────────────────────────────────────────

    /// Start connecting. Returns false (and does nothing) unless the
    /// session is Disconnected: Connecting, Connected and Reconnecting all
    /// already own a connection attempt, and Failed is terminal. This is
    /// what guarantees a single socket per session.
    pub fn begin_connect(&mut self) -> bool {
        if self.state != ConnectionState::Disconnected {
            debug!(
                "[transport] connect() ignored while {:?}",
                self.state
            );
            return false;
        }
        self.transition(ConnectionState::Connecting)
    }

    /// The transport came up. Resets the attempt counter and returns the
    /// join frame — room membership is not preserved across reconnects, so
    /// the driver must send this after every successful connect.
    pub fn mark_connected(&mut self) -> Option<OutboundFrame> {
        if !self.transition(ConnectionState::Connected) {
            return None;
        }
        self.reconnect_attempt = 0;
        Some(OutboundFrame::JoinConversation {
            conversation_id: self.conversation_id.clone(),
            client_id: self.client_id.to_string(),
        })
    }

    /// The channel went away without the caller asking for it. Decides
    /// between scheduling a reconnect and giving up.
    pub fn mark_dropped(&mut self, reason: DisconnectReason, max_attempts: u32) -> DropOutcome {
        if reason == DisconnectReason::Requested {
            // Caller-initiated teardown goes through mark_disconnected.
            return DropOutcome::Ignored;
        }
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Failed => return DropOutcome::Ignored,
            ConnectionState::Connecting | ConnectionState::Connected => {
                self.transition(ConnectionState::Reconnecting);
            }
            ConnectionState::Reconnecting => {}
        }

        if self.reconnect_attempt >= max_attempts {
            self.transition(ConnectionState::Failed);
            // The turn can never resolve now; the fatal error supersedes it.
            self.pending_turn = None;
            DropOutcome::Exhausted {
                attempts: self.reconnect_attempt,
            }
        } else {
            self.reconnect_attempt += 1;
            DropOutcome::Reconnect {
                attempt: self.reconnect_attempt,
                flat_delay: reason == DisconnectReason::ServerClose,
            }
        }
    }

    /// Caller-initiated teardown (navigation/unload). Clears the pending
    /// turn without reporting an error and returns whether the state
    /// actually changed. Failed stays Failed.
    pub fn mark_disconnected(&mut self) -> bool {
        if matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Failed
        ) {
            return false;
        }
        self.transition(ConnectionState::Disconnected);
        self.pending_turn = None;
        self.retired_turn = None;
        self.reconnect_attempt = 0;
        true
    }

    // ── Turn lifecycle ─────────────────────────────────────────────────

    /// Open a turn and build its wire frame. Preconditions: non-empty text,
    /// Connected, no live turn. On violation nothing is mutated and nothing
    /// must be sent.
    pub fn begin_turn(
        &mut self,
        text: &str,
        language: &str,
        timeout: Duration,
        now: Instant,
    ) -> TransportResult<(u64, OutboundFrame)> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(TransportError::EmptyTurn);
        }
        if self.state != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(turn) = &self.pending_turn {
            return Err(TransportError::TurnPending(turn.seq));
        }

        let seq = self.next_turn_seq;
        self.next_turn_seq += 1;
        self.pending_turn = Some(PendingTurn {
            seq,
            text: trimmed.to_string(),
            deadline: now + timeout,
        });
        Ok((
            seq,
            OutboundFrame::NewMessage {
                message: trimmed.to_string(),
                conversation_id: self.conversation_id.clone(),
                turn_id: seq,
                language: language.to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
        ))
    }

    /// The live turn's deadline passed with no acknowledgment, answer or
    /// server error. Retires it as non-deliverable — a late response must
    /// not resurface as a fresh bot message — and returns its seq for the
    /// synthesized timeout error.
    pub fn take_timed_out_turn(&mut self) -> Option<u64> {
        let turn = self.pending_turn.take()?;
        self.retired_turn = Some(RetiredTurn {
            seq: turn.seq,
            deliverable: false,
        });
        Some(turn.seq)
    }

    /// Wire frame announcing the user is (or stopped) typing. Only valid
    /// while Connected; the driver drops it otherwise.
    pub fn typing_frame(&self, is_typing: bool) -> Option<OutboundFrame> {
        if self.state != ConnectionState::Connected {
            return None;
        }
        Some(if is_typing {
            OutboundFrame::Typing {
                conversation_id: self.conversation_id.clone(),
            }
        } else {
            OutboundFrame::StopTyping {
                conversation_id: self.conversation_id.clone(),
            }
        })
    }

    // ── Inbound dispatch ───────────────────────────────────────────────

    /// Decide what one inbound frame means for this session. Filtering
    /// rules, in order: turn correlation beats conversation matching for
    /// frames that reference a turn; everything else is scoped to the
    /// current conversation id and silently discarded on mismatch.
    pub fn dispatch(&mut self, frame: InboundFrame) -> Dispatch {
        match frame {
            InboundFrame::NewMessage {
                message,
                conversation_id,
                timestamp,
                turn_id,
                suggestions,
            } => match turn_id {
                Some(t) if self.live_turn_is(t) => {
                    // Answer for the live turn: resolve it, adopting the
                    // server-assigned conversation id if it differs.
                    self.adopt_conversation_id(conversation_id);
                    self.retire_live_turn(true);
                    Dispatch::Message {
                        text: message,
                        timestamp,
                        suggestions,
                        resolved_turn: Some(t),
                    }
                }
                Some(t) if self.retired_deliverable(t) => {
                    // The answer promised by an earlier acknowledgment, or
                    // a further chunk of an already-answered turn.
                    Dispatch::Message {
                        text: message,
                        timestamp,
                        suggestions,
                        resolved_turn: None,
                    }
                }
                Some(_) => Dispatch::Ignored("stale response for a retired turn"),
                None => {
                    if self.is_foreign(conversation_id.as_deref()) {
                        return Dispatch::Ignored("message for a foreign conversation");
                    }
                    // Server push for the current conversation. If a turn is
                    // live, a backend that does not echo turn ids is
                    // answering it.
                    let resolved = self.pending_turn.as_ref().map(|t| t.seq);
                    if resolved.is_some() {
                        self.retire_live_turn(true);
                    }
                    Dispatch::Message {
                        text: message,
                        timestamp,
                        suggestions,
                        resolved_turn: resolved,
                    }
                }
            },

            InboundFrame::MessageReceived {
                conversation_id,
                turn_id,
            } => {
                let live = self.pending_turn.as_ref().map(|t| t.seq);
                match (turn_id, live) {
                    (Some(t), Some(l)) if t == l => {
                        self.adopt_conversation_id(conversation_id);
                        self.retire_live_turn(true);
                        Dispatch::Acked { turn_id: t }
                    }
                    (None, Some(l)) => {
                        self.adopt_conversation_id(conversation_id);
                        self.retire_live_turn(true);
                        Dispatch::Acked { turn_id: l }
                    }
                    _ => Dispatch::Ignored("acknowledgment without a matching live turn"),
                }
            }

            InboundFrame::Typing {
                conversation_id,
                is_typing,
            } => {
                if self.is_foreign(conversation_id.as_deref()) {
                    Dispatch::Ignored("typing for a foreign conversation")
                } else {
                    Dispatch::Typing {
                        is_typing: is_typing.unwrap_or(true),
                    }
                }
            }

            InboundFrame::StopTyping { conversation_id } => {
                if self.is_foreign(conversation_id.as_deref()) {
                    Dispatch::Ignored("typing for a foreign conversation")
                } else {
                    Dispatch::Typing { is_typing: false }
                }
            }

            InboundFrame::Error { message } => {
                let cleared = self.pending_turn.as_ref().map(|t| t.seq);
                if cleared.is_some() {
                    self.retire_live_turn(false);
                }
                Dispatch::ServerError {
                    message,
                    cleared_turn: cleared,
                }
            }
        }
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn transition(&mut self, next: ConnectionState) -> bool {
        if self.state == next {
            return false;
        }
        if !self.state.can_transition_to(next) {
            warn!(
                "[transport] refused illegal state transition {:?} -> {:?}",
                self.state, next
            );
            return false;
        }
        debug!("[transport] state {:?} -> {:?}", self.state, next);
        self.state = next;
        true
    }

    fn live_turn_is(&self, seq: u64) -> bool {
        self.pending_turn.as_ref().map(|t| t.seq) == Some(seq)
    }

    fn retired_deliverable(&self, seq: u64) -> bool {
        self.retired_turn
            .map(|r| r.seq == seq && r.deliverable)
            .unwrap_or(false)
    }

    fn retire_live_turn(&mut self, deliverable: bool) {
        if let Some(turn) = self.pending_turn.take() {
            self.retired_turn = Some(RetiredTurn {
                seq: turn.seq,
                deliverable,
            });
        }
    }

    fn is_foreign(&self, conversation_id: Option<&str>) -> bool {
        conversation_id.map_or(false, |c| c != self.conversation_id)
    }

    /// Adopt the server-assigned conversation id carried by the live turn's
    /// acknowledgment or answer. Unsolicited frames never reach this — they
    /// are discarded by the foreign-conversation check instead.
    fn adopt_conversation_id(&mut self, conversation_id: Option<String>) {
        if let Some(cid) = conversation_id {
            if cid != self.conversation_id {
                info!(
                    "[transport] conversation id superseded by server: {} -> {}",
                    self.conversation_id, cid
                );
                self.conversation_id = cid;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::ConnectionState::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn session() -> Session {
        Session::new(Some("conv_test".into()))
    }

    fn connected() -> Session {
        let mut s = session();
        assert!(s.begin_connect());
        assert!(s.mark_connected().is_some());
        s
    }

    fn answer(turn_id: Option<u64>, conversation_id: &str) -> InboundFrame {
        InboundFrame::NewMessage {
            message: "answer text".into(),
            conversation_id: Some(conversation_id.into()),
            timestamp: None,
            turn_id,
            suggestions: vec![],
        }
    }

    // ── Connection lifecycle ───────────────────────────────────────────

    #[test]
    fn connect_is_a_noop_unless_disconnected() {
        let mut s = session();
        assert!(s.begin_connect());
        assert_eq!(s.state(), Connecting);
        assert!(!s.begin_connect()); // already connecting

        assert!(s.mark_connected().is_some());
        assert_eq!(s.state(), Connected);
        assert!(!s.begin_connect()); // already connected
    }

    #[test]
    fn connected_resets_attempt_counter_and_rejoins() {
        let mut s = connected();
        s.mark_dropped(DisconnectReason::TransportFault, 10);
        assert_eq!(s.state(), Reconnecting);
        assert_eq!(s.reconnect_attempt(), 1);

        let join = s.mark_connected().expect("join frame on reconnect");
        assert_eq!(s.reconnect_attempt(), 0);
        assert!(matches!(
            join,
            OutboundFrame::JoinConversation { conversation_id, .. } if conversation_id == "conv_test"
        ));
    }

    #[test]
    fn drops_escalate_to_failed_after_budget() {
        let mut s = connected();
        for attempt in 1..=3u32 {
            let outcome = s.mark_dropped(DisconnectReason::TransportFault, 3);
            assert_eq!(
                outcome,
                DropOutcome::Reconnect {
                    attempt,
                    flat_delay: false
                }
            );
        }
        let outcome = s.mark_dropped(DisconnectReason::TransportFault, 3);
        assert_eq!(outcome, DropOutcome::Exhausted { attempts: 3 });
        assert_eq!(s.state(), Failed);

        // Terminal: further drops and connects do nothing.
        assert_eq!(
            s.mark_dropped(DisconnectReason::TransportFault, 3),
            DropOutcome::Ignored
        );
        assert!(!s.begin_connect());
        assert!(!s.mark_disconnected());
        assert_eq!(s.state(), Failed);
    }

    #[test]
    fn server_close_reconnects_without_escalation() {
        let mut s = connected();
        let outcome = s.mark_dropped(DisconnectReason::ServerClose, 10);
        assert_eq!(
            outcome,
            DropOutcome::Reconnect {
                attempt: 1,
                flat_delay: true
            }
        );
    }

    #[test]
    fn requested_teardown_never_reconnects() {
        let mut s = connected();
        assert_eq!(
            s.mark_dropped(DisconnectReason::Requested, 10),
            DropOutcome::Ignored
        );
        assert!(s.mark_disconnected());
        assert_eq!(s.state(), Disconnected);
        // Second disconnect is a no-op.
        assert!(!s.mark_disconnected());
    }

    #[test]
    fn disconnect_clears_pending_turn_silently() {
        let mut s = connected();
        s.begin_turn("question", "en", TIMEOUT, Instant::now()).unwrap();
        assert!(s.turn_pending());
        s.mark_disconnected();
        assert!(!s.turn_pending());
        assert_eq!(s.turn_deadline(), None);
    }

    // ── Turn lifecycle ─────────────────────────────────────────────────

    #[test]
    fn begin_turn_enforces_preconditions() {
        let mut s = session();
        assert!(matches!(
            s.begin_turn("hi", "en", TIMEOUT, Instant::now()),
            Err(TransportError::NotConnected)
        ));

        let mut s = connected();
        assert!(matches!(
            s.begin_turn("   ", "en", TIMEOUT, Instant::now()),
            Err(TransportError::EmptyTurn)
        ));

        let (seq, frame) = s
            .begin_turn("  What is the refund policy?  ", "en", TIMEOUT, Instant::now())
            .unwrap();
        assert_eq!(seq, 1);
        assert!(matches!(
            frame,
            OutboundFrame::NewMessage { message, turn_id, .. }
                if message == "What is the refund policy?" && turn_id == 1
        ));

        // Second submission while the first is live: rejected, untouched.
        let err = s
            .begin_turn("another question", "en", TIMEOUT, Instant::now())
            .unwrap_err();
        assert!(matches!(err, TransportError::TurnPending(1)));
        assert!(s.turn_pending());
    }

    #[test]
    fn turn_seq_is_monotonic() {
        let mut s = connected();
        let (first, _) = s.begin_turn("q1", "en", TIMEOUT, Instant::now()).unwrap();
        s.dispatch(answer(Some(first), "conv_test"));
        let (second, _) = s.begin_turn("q2", "en", TIMEOUT, Instant::now()).unwrap();
        assert_eq!(second, first + 1);
    }

    #[test]
    fn pending_turn_survives_reconnect() {
        let mut s = connected();
        let (seq, _) = s.begin_turn("q", "en", TIMEOUT, Instant::now()).unwrap();
        s.mark_dropped(DisconnectReason::TransportFault, 10);
        assert!(s.turn_pending());
        s.mark_connected();
        // Still answerable after the reconnect.
        let d = s.dispatch(answer(Some(seq), "conv_test"));
        assert!(matches!(d, Dispatch::Message { resolved_turn: Some(n), .. } if n == seq));
    }

    #[test]
    fn timed_out_turn_is_retired_non_deliverable() {
        let mut s = connected();
        let (seq, _) = s.begin_turn("q", "en", TIMEOUT, Instant::now()).unwrap();
        assert_eq!(s.take_timed_out_turn(), Some(seq));
        assert!(!s.turn_pending());
        // Nothing left to time out.
        assert_eq!(s.take_timed_out_turn(), None);

        // The stale late answer is dropped, not resurrected.
        let d = s.dispatch(answer(Some(seq), "conv_test"));
        assert_eq!(d, Dispatch::Ignored("stale response for a retired turn"));
    }

    #[test]
    fn typing_frames_require_connected() {
        let mut s = session();
        assert!(s.typing_frame(true).is_none());
        let s = connected();
        assert!(matches!(
            s.typing_frame(true),
            Some(OutboundFrame::Typing { .. })
        ));
        assert!(matches!(
            s.typing_frame(false),
            Some(OutboundFrame::StopTyping { .. })
        ));
    }

    // ── Inbound dispatch ───────────────────────────────────────────────

    #[test]
    fn answer_resolves_live_turn() {
        let mut s = connected();
        let (seq, _) = s.begin_turn("q", "en", TIMEOUT, Instant::now()).unwrap();
        let d = s.dispatch(answer(Some(seq), "conv_test"));
        assert!(matches!(d, Dispatch::Message { resolved_turn: Some(n), .. } if n == seq));
        assert!(!s.turn_pending());
    }

    #[test]
    fn foreign_conversation_messages_are_discarded() {
        let mut s = connected();
        let d = s.dispatch(answer(None, "conv_other"));
        assert_eq!(d, Dispatch::Ignored("message for a foreign conversation"));

        // Typing indicators are scoped the same way.
        let d = s.dispatch(InboundFrame::Typing {
            conversation_id: Some("conv_other".into()),
            is_typing: None,
        });
        assert_eq!(d, Dispatch::Ignored("typing for a foreign conversation"));
        let d = s.dispatch(InboundFrame::StopTyping {
            conversation_id: Some("conv_other".into()),
        });
        assert_eq!(d, Dispatch::Ignored("typing for a foreign conversation"));
    }

    #[test]
    fn push_message_without_turn_id_is_delivered() {
        let mut s = connected();
        let d = s.dispatch(answer(None, "conv_test"));
        assert!(matches!(d, Dispatch::Message { resolved_turn: None, .. }));

        // Absent conversation id means "current conversation".
        let d = s.dispatch(InboundFrame::NewMessage {
            message: "push".into(),
            conversation_id: None,
            timestamp: None,
            turn_id: None,
            suggestions: vec![],
        });
        assert!(matches!(d, Dispatch::Message { .. }));
    }

    #[test]
    fn push_message_resolves_live_turn_when_backend_omits_turn_ids() {
        let mut s = connected();
        let (seq, _) = s.begin_turn("q", "en", TIMEOUT, Instant::now()).unwrap();
        let d = s.dispatch(answer(None, "conv_test"));
        assert!(matches!(d, Dispatch::Message { resolved_turn: Some(n), .. } if n == seq));
        assert!(!s.turn_pending());
    }

    #[test]
    fn ack_resolves_turn_and_keeps_answer_deliverable() {
        let mut s = connected();
        let (seq, _) = s.begin_turn("q", "en", TIMEOUT, Instant::now()).unwrap();
        let d = s.dispatch(InboundFrame::MessageReceived {
            conversation_id: None,
            turn_id: Some(seq),
        });
        assert_eq!(d, Dispatch::Acked { turn_id: seq });
        assert!(!s.turn_pending());
        assert_eq!(s.turn_deadline(), None);

        // The answer that follows the ack is still delivered.
        let d = s.dispatch(answer(Some(seq), "conv_test"));
        assert!(matches!(d, Dispatch::Message { resolved_turn: None, .. }));
    }

    #[test]
    fn stray_ack_is_ignored() {
        let mut s = connected();
        let d = s.dispatch(InboundFrame::MessageReceived {
            conversation_id: None,
            turn_id: Some(7),
        });
        assert_eq!(d, Dispatch::Ignored("acknowledgment without a matching live turn"));

        let (seq, _) = s.begin_turn("q", "en", TIMEOUT, Instant::now()).unwrap();
        let d = s.dispatch(InboundFrame::MessageReceived {
            conversation_id: None,
            turn_id: Some(seq + 10),
        });
        assert_eq!(d, Dispatch::Ignored("acknowledgment without a matching live turn"));
        assert!(s.turn_pending());
    }

    #[test]
    fn server_assigned_conversation_id_is_adopted_from_live_turn_only() {
        let mut s = connected();
        let (seq, _) = s.begin_turn("q", "en", TIMEOUT, Instant::now()).unwrap();

        // Ack for the live turn carries the server-assigned id.
        s.dispatch(InboundFrame::MessageReceived {
            conversation_id: Some("conv_server".into()),
            turn_id: Some(seq),
        });
        assert_eq!(s.conversation_id(), "conv_server");

        // Frames for the old id are now foreign.
        let d = s.dispatch(answer(None, "conv_test"));
        assert_eq!(d, Dispatch::Ignored("message for a foreign conversation"));

        // An unsolicited frame never changes the id.
        s.dispatch(answer(None, "conv_hijack"));
        assert_eq!(s.conversation_id(), "conv_server");
    }

    #[test]
    fn server_error_clears_turn_but_not_connection() {
        let mut s = connected();
        let (seq, _) = s.begin_turn("q", "en", TIMEOUT, Instant::now()).unwrap();
        let d = s.dispatch(InboundFrame::Error {
            message: "backend exploded".into(),
        });
        assert_eq!(
            d,
            Dispatch::ServerError {
                message: "backend exploded".into(),
                cleared_turn: Some(seq),
            }
        );
        assert_eq!(s.state(), Connected);
        assert!(!s.turn_pending());

        // The errored turn's late answer is stale.
        let d = s.dispatch(answer(Some(seq), "conv_test"));
        assert_eq!(d, Dispatch::Ignored("stale response for a retired turn"));
    }

    #[test]
    fn typing_toggle_maps_to_bool() {
        let mut s = connected();
        let d = s.dispatch(InboundFrame::Typing {
            conversation_id: Some("conv_test".into()),
            is_typing: None,
        });
        assert_eq!(d, Dispatch::Typing { is_typing: true });
        let d = s.dispatch(InboundFrame::Typing {
            conversation_id: Some("conv_test".into()),
            is_typing: Some(false),
        });
        assert_eq!(d, Dispatch::Typing { is_typing: false });
        let d = s.dispatch(InboundFrame::StopTyping {
            conversation_id: Some("conv_test".into()),
        });
        assert_eq!(d, Dispatch::Typing { is_typing: false });
    }

    #[test]
    fn fresh_conversation_id_has_the_conv_prefix() {
        let s = Session::new(None);
        assert!(s.conversation_id().starts_with("conv_"));
        assert!(s.conversation_id().len() > "conv_".len());
    }
}
