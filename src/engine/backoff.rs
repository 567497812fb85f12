// DocChat Transport Engine — Backoff & Retry Timing
//
// Shared delay math for the reconnect schedule and the HTTP fallback
// retries.
//
// Features:
//   • Exponential reconnect backoff with ±25% jitter (base 1s, cap 10s)
//   • Flat-delay variant for server-initiated closes (no escalation)
//   • Request retry on 429 (rate limit), 500, 502, 503, 504
//   • Respects `Retry-After` header on the fallback path
//
// Reconnect delays are computed, not slept: the driver turns them into a
// cancellable deadline so `disconnect()` can abort a scheduled attempt.

use std::time::{Duration, SystemTime};

use crate::atoms::constants::FALLBACK_MAX_RETRY_DELAY_MS;

// ── Reconnect backoff ──────────────────────────────────────────────────────

/// Delay before reconnect attempt `attempt` (1-based, as counted by the
/// session). Doubles per attempt from `base_ms`, capped at `max_ms`,
/// jittered ±25%.
pub fn reconnect_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exp = attempt.saturating_sub(1).min(12);
    let nominal = base_ms.saturating_mul(2u64.pow(exp)).min(max_ms);
    Duration::from_millis(apply_jitter(nominal))
}

/// Flat reconnect delay for server-initiated closes: the server asked us to
/// go away deliberately, so hammering it with an escalated schedule buys
/// nothing — retry at the base cadence.
pub fn flat_backoff(base_ms: u64) -> Duration {
    Duration::from_millis(apply_jitter(base_ms))
}

/// Apply ±25% jitter to prevent thundering-herd effects.
fn apply_jitter(base_ms: u64) -> u64 {
    let jitter_range = (base_ms / 4) as i64;
    if jitter_range == 0 {
        return base_ms.max(100);
    }
    let offset = (rand_jitter() % (2 * jitter_range + 1)) - jitter_range;
    let result = base_ms as i64 + offset;
    result.max(100) as u64
}

/// Simple jitter source using system clock nanos (no extra crate needed).
fn rand_jitter() -> i64 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as i64
}

// ── Fallback request retry ─────────────────────────────────────────────────

/// Check if an HTTP status code represents a transient/retryable error.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Sleep with exponential backoff + ±25% jitter before retry `attempt`
/// (0-based). Respects Retry-After if the server sent one.
/// Returns the actual delay duration for logging.
pub async fn retry_delay(attempt: u32, base_ms: u64, retry_after_secs: Option<u64>) -> Duration {
    let nominal = base_ms
        .saturating_mul(2u64.pow(attempt.min(12)))
        .min(FALLBACK_MAX_RETRY_DELAY_MS);
    let delay_ms = if let Some(secs) = retry_after_secs {
        // Use the server-specified delay, but cap at 60s and floor at our
        // computed backoff
        (secs.min(60) * 1000).max(nominal)
    } else {
        nominal
    };
    let delay = Duration::from_millis(apply_jitter(delay_ms));
    tokio::time::sleep(delay).await;
    delay
}

/// Parse a Retry-After header value (integer seconds only).
/// HTTP-date format is not implemented — falls back to computed backoff.
pub fn parse_retry_after(header_value: &str) -> Option<u64> {
    header_value.trim().parse::<u64>().ok()
}

// ── Tests ──────────────────────────────────────────────────────────────────
