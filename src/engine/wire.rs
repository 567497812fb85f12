// DocChat Transport Engine — Wire Frames
//
// JSON frames exchanged with the chat backend over the channel. Every frame
// is a flat object tagged by a `type` field; the inbound side is tolerant of
// fields it does not know and of frame types it does not recognize (callers
// log and skip unparseable frames rather than dropping the connection).
//
// The backend may answer with either `message` or `answer` as the text key;
// both are accepted.

use crate::atoms::error::{TransportError, TransportResult};
use serde::{Deserialize, Serialize};

// ── Outbound frames ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Control message joining the conversation room. Room membership is
    /// not preserved across transport reconnects, so this is re-sent after
    /// every successful (re)connect.
    JoinConversation {
        conversation_id: String,
        client_id: String,
    },
    /// One user turn. `turn_id` is echoed back by the backend on the
    /// acknowledgment and the answer.
    NewMessage {
        message: String,
        conversation_id: String,
        turn_id: u64,
        language: String,
        timestamp: String,
    },
    Typing {
        conversation_id: String,
    },
    StopTyping {
        conversation_id: String,
    },
}

// ── Inbound frames ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// A bot answer or server push for a conversation.
    NewMessage {
        #[serde(alias = "answer")]
        message: String,
        #[serde(default)]
        conversation_id: Option<String>,
        #[serde(default)]
        timestamp: Option<String>,
        #[serde(default)]
        turn_id: Option<u64>,
        #[serde(default)]
        suggestions: Vec<String>,
    },
    /// Receipt acknowledgment for an outbound turn. May carry the
    /// server-assigned conversation id on the first turn.
    MessageReceived {
        #[serde(default)]
        conversation_id: Option<String>,
        #[serde(default)]
        turn_id: Option<u64>,
    },
    Typing {
        #[serde(default)]
        conversation_id: Option<String>,
        /// Some backend versions send `typing {is_typing: false}` instead
        /// of a separate `stop_typing` frame.
        #[serde(default)]
        is_typing: Option<bool>,
    },
    StopTyping {
        #[serde(default)]
        conversation_id: Option<String>,
    },
    Error {
        message: String,
    },
}

impl InboundFrame {
    /// Parse one text frame. Unknown `type` tags and malformed JSON both
    /// surface as `Protocol` errors; the channel logs and skips them.
    pub fn parse(text: &str) -> TransportResult<InboundFrame> {
        serde_json::from_str(text)
            .map_err(|e| TransportError::Protocol(format!("unparseable frame: {}", e)))
    }

    /// The conversation the frame is scoped to, if it names one.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            InboundFrame::NewMessage { conversation_id, .. }
            | InboundFrame::MessageReceived { conversation_id, .. }
            | InboundFrame::Typing { conversation_id, .. }
            | InboundFrame::StopTyping { conversation_id } => conversation_id.as_deref(),
            InboundFrame::Error { .. } => None,
        }
    }
}

impl OutboundFrame {
    pub fn encode(&self) -> TransportResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_answer_payload() {
        let frame = InboundFrame::parse(
            r#"{"type": "new_message",
                "message": "Refunds are processed within 14 days.",
                "conversation_id": "conv_1718000000000",
                "timestamp": "2026-08-06T10:00:00Z",
                "turn_id": 3,
                "suggestions": ["How do I request one?", "What about shipping?"]}"#,
        )
        .unwrap();
        match frame {
            InboundFrame::NewMessage {
                message,
                conversation_id,
                turn_id,
                suggestions,
                ..
            } => {
                assert_eq!(message, "Refunds are processed within 14 days.");
                assert_eq!(conversation_id.as_deref(), Some("conv_1718000000000"));
                assert_eq!(turn_id, Some(3));
                assert_eq!(suggestions.len(), 2);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn accepts_answer_as_message_alias() {
        let frame = InboundFrame::parse(
            r#"{"type": "new_message", "answer": "42", "conversation_id": "conv_1"}"#,
        )
        .unwrap();
        assert!(matches!(frame, InboundFrame::NewMessage { message, .. } if message == "42"));
    }

    #[test]
    fn parses_bare_ack_and_error() {
        let ack = InboundFrame::parse(r#"{"type": "message_received"}"#).unwrap();
        assert_eq!(
            ack,
            InboundFrame::MessageReceived {
                conversation_id: None,
                turn_id: None
            }
        );

        let err = InboundFrame::parse(r#"{"type": "error", "message": "no such document"}"#)
            .unwrap();
        assert!(matches!(err, InboundFrame::Error { message } if message == "no such document"));
    }

    #[test]
    fn unknown_type_is_a_protocol_error() {
        let err = InboundFrame::parse(r#"{"type": "test_response", "ok": true}"#).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
        assert!(InboundFrame::parse("not json at all").is_err());
    }

    #[test]
    fn outbound_turn_carries_the_full_contract() {
        let frame = OutboundFrame::NewMessage {
            message: "What is the refund policy?".into(),
            conversation_id: "conv_1718000000000".into(),
            turn_id: 1,
            language: "en".into(),
            timestamp: "2026-08-06T10:00:00+00:00".into(),
        };
        let value: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "new_message");
        assert_eq!(value["message"], "What is the refund policy?");
        assert_eq!(value["conversation_id"], "conv_1718000000000");
        assert_eq!(value["turn_id"], 1);
        assert_eq!(value["language"], "en");
        assert_eq!(value["timestamp"], "2026-08-06T10:00:00+00:00");
    }

    #[test]
    fn join_frame_is_snake_case_tagged() {
        let frame = OutboundFrame::JoinConversation {
            conversation_id: "conv_1".into(),
            client_id: "c1".into(),
        };
        let value: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "join_conversation");
        assert_eq!(value["conversation_id"], "conv_1");
        assert_eq!(value["client_id"], "c1");
    }
}
