// DocChat Transport Engine — ChatTransport Driver
//
// One spawned task per session owns the channel, the session state machine,
// and both timers (reconnect backoff, turn timeout). The UI holds a
// cloneable `ChatTransport` handle; commands flow in over an mpsc queue, so
// every operation is serialized and there is never a second socket or a
// duplicated connection attempt in flight.
//
// Timer discipline: each concern is one deadline owned by the driver —
// `reconnect_at` and the live turn's deadline — re-read on every loop
// iteration. Clearing the deadline is cancelling the timer.

use crate::atoms::constants::COMMAND_QUEUE_CAPACITY;
use crate::atoms::error::{TransportError, TransportResult};
use crate::atoms::types::{ChannelStatus, ConnectionState, DisconnectReason};
use crate::engine::backoff;
use crate::engine::channel::{Channel, ChannelConnector, ChannelEvent};
use crate::engine::config::TransportConfig;
use crate::engine::events::TransportEvents;
use crate::engine::session::{Dispatch, DropOutcome, Session};
use crate::engine::wire::OutboundFrame;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

// ── Commands ───────────────────────────────────────────────────────────

enum Command {
    Connect,
    SubmitTurn {
        text: String,
        reply: oneshot::Sender<TransportResult<u64>>,
    },
    NotifyTyping {
        is_typing: bool,
    },
    Disconnect,
}

// ── Public handle ──────────────────────────────────────────────────────

/// Handle to a running transport driver. Cheap to clone; dropping every
/// clone stops the driver task.
#[derive(Clone)]
pub struct ChatTransport {
    cmd_tx: mpsc::Sender<Command>,
    status: Arc<Mutex<ChannelStatus>>,
}

impl ChatTransport {
    /// Spawn the driver task. The connector and event sink are injected so
    /// the UI layer owns its transport instance — no ambient singletons.
    pub fn spawn(
        config: TransportConfig,
        connector: Arc<dyn ChannelConnector>,
        events: Arc<dyn TransportEvents>,
    ) -> Self {
        Self::spawn_with_conversation(config, connector, events, None)
    }

    /// Like `spawn`, but resuming a previously stored conversation id.
    pub fn spawn_with_conversation(
        config: TransportConfig,
        connector: Arc<dyn ChannelConnector>,
        events: Arc<dyn TransportEvents>,
        conversation_id: Option<String>,
    ) -> Self {
        let session = Session::new(conversation_id);
        let status = Arc::new(Mutex::new(ChannelStatus {
            state: session.state(),
            conversation_id: session.conversation_id().to_string(),
            reconnect_attempt: 0,
            turn_pending: false,
            messages_received: 0,
        }));
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);

        let driver = Driver {
            config,
            connector,
            events,
            session,
            cmd_rx,
            channel: None,
            reconnect_at: None,
            last_emitted_state: None,
            messages_received: 0,
            status: status.clone(),
        };
        tokio::spawn(driver.run());

        ChatTransport { cmd_tx, status }
    }

    /// Establish the channel. No-op if already connecting or connected.
    pub async fn connect(&self) {
        let _ = self.cmd_tx.send(Command::Connect).await;
    }

    /// Submit one user turn. Resolves with the turn id once the question is
    /// on the wire; the answer arrives later through the event surface.
    pub async fn submit_turn(&self, text: impl Into<String>) -> TransportResult<u64> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SubmitTurn {
                text: text.into(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| TransportError::Other("transport task stopped".into()))?;
        reply_rx
            .await
            .map_err(|_| TransportError::Other("transport task stopped".into()))?
    }

    /// Best-effort typing indicator for the current conversation.
    pub async fn notify_typing(&self, is_typing: bool) {
        let _ = self.cmd_tx.send(Command::NotifyTyping { is_typing }).await;
    }

    /// Graceful teardown: clears the pending turn without reporting an
    /// error and cancels any scheduled reconnect.
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect).await;
    }

    /// Point-in-time status snapshot.
    pub fn status(&self) -> ChannelStatus {
        self.status.lock().clone()
    }
}

// ── Driver ─────────────────────────────────────────────────────────────

struct Driver {
    config: TransportConfig,
    connector: Arc<dyn ChannelConnector>,
    events: Arc<dyn TransportEvents>,
    session: Session,
    cmd_rx: mpsc::Receiver<Command>,
    channel: Option<Box<dyn Channel>>,
    /// Scheduled reconnect attempt; `None` means no timer armed.
    reconnect_at: Option<Instant>,
    last_emitted_state: Option<ConnectionState>,
    messages_received: u64,
    status: Arc<Mutex<ChannelStatus>>,
}

/// Next event from the live channel, or never if there is none. Keeping the
/// `None` arm pending (instead of a guard) means the select below stays
/// uniform across connected and disconnected iterations.
async fn next_channel_event(channel: &mut Option<Box<dyn Channel>>) -> ChannelEvent {
    match channel.as_mut() {
        Some(ch) => ch.next_event().await,
        None => std::future::pending().await,
    }
}

/// Sleep until an optional deadline; never resolves when unarmed.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl Driver {
    async fn run(mut self) {
        info!(
            "[transport] session started, conversation {}",
            self.session.conversation_id()
        );
        self.sync_status();

        loop {
            let turn_deadline = self.session.turn_deadline();
            let reconnect_at = self.reconnect_at;

            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => {
                            // Every handle is gone — tear down quietly.
                            debug!("[transport] all handles dropped");
                            break;
                        }
                    }
                }
                event = next_channel_event(&mut self.channel) => {
                    self.handle_channel_event(event);
                }
                _ = sleep_until(turn_deadline) => {
                    self.handle_turn_timeout();
                }
                _ = sleep_until(reconnect_at) => {
                    self.attempt_connect().await;
                }
            }

            self.sync_status();
        }

        info!("[transport] session stopped");
    }

    // ── Command handling ───────────────────────────────────────────────

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect => {
                if self.session.begin_connect() {
                    self.emit_status();
                    self.attempt_connect().await;
                }
            }

            Command::SubmitTurn { text, reply } => {
                let result = self.submit_turn(&text).await;
                let _ = reply.send(result);
            }

            Command::NotifyTyping { is_typing } => {
                if let Some(frame) = self.session.typing_frame(is_typing) {
                    self.send_frame(&frame).await;
                } else {
                    debug!("[transport] typing indicator dropped while not connected");
                }
            }

            Command::Disconnect => {
                info!("[transport] disconnect requested");
                self.channel = None;
                self.reconnect_at = None;
                if self.session.mark_disconnected() {
                    self.emit_status();
                }
            }
        }
    }

    async fn submit_turn(&mut self, text: &str) -> TransportResult<u64> {
        let begun = self.session.begin_turn(
            text,
            &self.config.language,
            self.config.turn_timeout(),
            Instant::now(),
        );
        match begun {
            Ok((seq, frame)) => {
                debug!("[transport] turn {} submitted", seq);
                // A send failure here surfaces as a channel drop; the turn
                // stays pending and resolves through reconnect or timeout,
                // never by aborting it early.
                self.send_frame(&frame).await;
                Ok(seq)
            }
            Err(e) => {
                if matches!(e, TransportError::NotConnected) {
                    warn!("[transport] turn rejected: not connected");
                    // Fail fast, but arm the next attempt.
                    if self.session.begin_connect() {
                        self.emit_status();
                        self.attempt_connect().await;
                    }
                }
                Err(e)
            }
        }
    }

    // ── Connection handling ────────────────────────────────────────────

    /// One connection attempt. Runs both for an explicit `connect()` (state
    /// Connecting) and for a fired backoff timer (state Reconnecting).
    async fn attempt_connect(&mut self) {
        self.reconnect_at = None;
        debug!(
            "[transport] connection attempt {} ({:?})",
            self.session.reconnect_attempt(),
            self.session.state()
        );

        match self.connector.connect().await {
            Ok(channel) => {
                self.channel = Some(channel);
                let Some(join) = self.session.mark_connected() else {
                    // Session refused the transition — drop the socket
                    // rather than leak it.
                    self.channel = None;
                    return;
                };
                info!(
                    "[transport] connected, joining conversation {}",
                    self.session.conversation_id()
                );
                self.emit_status();
                self.send_frame(&join).await;
            }
            Err(e) => {
                warn!("[transport] connection attempt failed: {}", e);
                self.handle_drop(DisconnectReason::TransportFault);
            }
        }
    }

    fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Frame(frame) => match self.session.dispatch(frame) {
                Dispatch::Message {
                    text,
                    timestamp,
                    suggestions,
                    resolved_turn,
                } => {
                    self.messages_received += 1;
                    if let Some(seq) = resolved_turn {
                        debug!("[transport] turn {} answered", seq);
                    }
                    self.events
                        .on_message(&text, timestamp.as_deref(), &suggestions);
                }
                Dispatch::Acked { turn_id } => {
                    debug!("[transport] turn {} acknowledged", turn_id);
                }
                Dispatch::Typing { is_typing } => {
                    self.events.on_typing_change(is_typing);
                }
                Dispatch::ServerError {
                    message,
                    cleared_turn,
                } => {
                    if let Some(seq) = cleared_turn {
                        warn!("[transport] turn {} failed on the server: {}", seq, message);
                    }
                    self.events
                        .on_error(&TransportError::Server(message).to_string(), false);
                }
                Dispatch::Ignored(why) => {
                    debug!("[transport] dropped inbound frame: {}", why);
                }
            },
            ChannelEvent::Closed(reason) => {
                self.channel = None;
                self.handle_drop(reason);
            }
        }
    }

    /// The channel dropped without the caller asking for it. Schedules the
    /// next reconnect attempt or gives up for good.
    fn handle_drop(&mut self, reason: DisconnectReason) {
        self.channel = None;
        match self
            .session
            .mark_dropped(reason, self.config.max_reconnect_attempts)
        {
            DropOutcome::Reconnect {
                attempt,
                flat_delay,
            } => {
                let delay = if flat_delay {
                    backoff::flat_backoff(self.config.reconnect_base_delay_ms)
                } else {
                    backoff::reconnect_backoff(
                        attempt,
                        self.config.reconnect_base_delay_ms,
                        self.config.reconnect_max_delay_ms,
                    )
                };
                warn!(
                    "[transport] connection lost ({:?}) — reconnecting in {}ms (attempt {}/{})",
                    reason,
                    delay.as_millis(),
                    attempt,
                    self.config.max_reconnect_attempts
                );
                self.reconnect_at = Some(Instant::now() + delay);
                self.emit_status();
            }
            DropOutcome::Exhausted { attempts } => {
                self.reconnect_at = None;
                let fault = TransportError::ConnectionExhausted(attempts);
                error!("[transport] {}", fault);
                self.emit_status();
                self.events.on_error(&fault.to_string(), true);
            }
            DropOutcome::Ignored => {}
        }
    }

    fn handle_turn_timeout(&mut self) {
        if let Some(seq) = self.session.take_timed_out_turn() {
            warn!(
                "[transport] turn {} timed out after {}ms",
                seq, self.config.turn_timeout_ms
            );
            self.events
                .on_error(&TransportError::TurnTimeout(seq).to_string(), false);
        }
    }

    // ── Wire + status plumbing ─────────────────────────────────────────

    /// Send one frame on the live channel. A failure is a transport fault:
    /// the channel is dropped and the reconnect schedule takes over.
    async fn send_frame(&mut self, frame: &OutboundFrame) {
        let Some(channel) = self.channel.as_mut() else {
            debug!("[transport] no channel for outbound frame");
            return;
        };
        if let Err(e) = channel.send(frame).await {
            warn!("[transport] send failed: {}", e);
            self.handle_drop(DisconnectReason::TransportFault);
        }
    }

    /// Notify the UI of a state change, once per actual change.
    fn emit_status(&mut self) {
        let state = self.session.state();
        if self.last_emitted_state != Some(state) {
            self.last_emitted_state = Some(state);
            self.events.on_status_change(state);
        }
    }

    fn sync_status(&self) {
        let mut status = self.status.lock();
        status.state = self.session.state();
        status.conversation_id = self.session.conversation_id().to_string();
        status.reconnect_attempt = self.session.reconnect_attempt();
        status.turn_pending = self.session.turn_pending();
        status.messages_received = self.messages_received;
    }
}
