// DocChat Transport Engine — Configuration
//
// Transport tuning knobs plus server-URL normalization.
//
// Security:
//   - HTTPS enforced — `http://` URLs are auto-coerced to `https://`
//   - Non-http(s) schemes are rejected outright
//   - The websocket endpoint is always derived (`wss://host/ws`), never
//     taken verbatim from configuration

use crate::atoms::constants::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_LANGUAGE, DEFAULT_MAX_RECONNECT_ATTEMPTS,
    DEFAULT_RECONNECT_BASE_DELAY_MS, DEFAULT_RECONNECT_MAX_DELAY_MS, DEFAULT_TURN_TIMEOUT_MS,
};
use crate::atoms::error::{TransportError, TransportResult};
use log::warn;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

// ── Transport Config ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Chat server URL (e.g. "https://chat.example.com")
    pub server_url: String,
    /// Language tag sent with every turn (answer language hint)
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Deadline for a pending turn before a local timeout is synthesized
    #[serde(default = "default_turn_timeout_ms")]
    pub turn_timeout_ms: u64,
    /// Ceiling on a single transport connection attempt
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.into()
}
fn default_max_reconnect_attempts() -> u32 {
    DEFAULT_MAX_RECONNECT_ATTEMPTS
}
fn default_reconnect_base_delay_ms() -> u64 {
    DEFAULT_RECONNECT_BASE_DELAY_MS
}
fn default_reconnect_max_delay_ms() -> u64 {
    DEFAULT_RECONNECT_MAX_DELAY_MS
}
fn default_turn_timeout_ms() -> u64 {
    DEFAULT_TURN_TIMEOUT_MS
}
fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            server_url: String::new(),
            language: default_language(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            turn_timeout_ms: default_turn_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl TransportConfig {
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

// ── URL normalization ──────────────────────────────────────────────────

/// Normalize the server URL to enforce HTTPS.
/// - Strips trailing slashes
/// - Coerces `http://` → `https://` with a warning
/// - Adds `https://` if no scheme is present
/// - Rejects URLs with non-http(s) schemes
pub fn normalize_server_url(raw: &str) -> TransportResult<String> {
    let url = raw.trim().trim_end_matches('/');
    if url.is_empty() {
        return Err(TransportError::Config("Server URL is required.".into()));
    }

    if let Some(stripped) = url.strip_prefix("http://") {
        let secure = format!("https://{}", stripped);
        warn!(
            "[transport] Coerced server URL from http:// to https:// — \
             chat traffic must not cross plaintext HTTP"
        );
        return Ok(secure);
    }

    if url.starts_with("https://") {
        return Ok(url.to_string());
    }

    // Check for other schemes (ftp://, ws://, etc.)
    if let Some(colon_pos) = url.find("://") {
        let scheme = &url[..colon_pos];
        return Err(TransportError::Config(format!(
            "Unsupported URL scheme '{}://'. Use https:// for the chat server.",
            scheme
        )));
    }

    // No scheme at all — assume https
    warn!("[transport] No URL scheme provided, assuming https://{}", url);
    Ok(format!("https://{}", url))
}

/// Derive the websocket endpoint from a normalized server URL:
/// `https://host[:port]` → `wss://host[:port]/ws`.
pub fn websocket_url(server_url: &str) -> TransportResult<String> {
    let mut url = Url::parse(server_url)
        .map_err(|e| TransportError::Config(format!("Invalid server URL '{}': {}", server_url, e)))?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(TransportError::Config(format!(
                "Cannot derive websocket endpoint from scheme '{}'",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| TransportError::Config("Failed to set websocket scheme".into()))?;
    url.set_path("/ws");
    Ok(url.to_string())
}
