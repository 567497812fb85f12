// DocChat Transport Engine — HTTP Ask Fallback
//
// The stateless alternative to the realtime channel: `POST /api/ask
// {question}` → `{answer}`. No conversation correlation, no reconnection
// semantics — one request, one answer. Used by embedders that cannot hold a
// websocket open.
//
// Transient failures (429, 5xx, network) are retried with exponential
// backoff, honoring `Retry-After` when the server sends one.

use crate::atoms::constants::{DEFAULT_RECONNECT_BASE_DELAY_MS, FALLBACK_MAX_RETRIES};
use crate::atoms::error::{TransportError, TransportResult};
use crate::engine::backoff::{is_retryable_status, parse_retry_after, retry_delay};
use crate::engine::config::normalize_server_url;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    answer: String,
}

pub struct HttpAsk {
    client: reqwest::Client,
    ask_url: String,
}

impl HttpAsk {
    pub fn new(server_url: &str) -> TransportResult<Self> {
        let base = normalize_server_url(server_url)?;
        Ok(HttpAsk::from_ask_url(format!("{}/api/ask", base)))
    }

    /// Bypass URL normalization and target an explicit ask endpoint.
    /// For embedders that already resolved their endpoint (and for tests
    /// against plaintext local servers).
    pub fn from_ask_url(ask_url: impl Into<String>) -> Self {
        HttpAsk {
            client: reqwest::Client::new(),
            ask_url: ask_url.into(),
        }
    }

    /// One question, one answer. Blocks (asynchronously) until the backend
    /// responds or the retry budget is spent.
    pub async fn ask(&self, question: &str) -> TransportResult<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(TransportError::EmptyTurn);
        }

        let mut attempt: u32 = 0;
        loop {
            let sent = self
                .client
                .post(&self.ask_url)
                .json(&AskRequest { question })
                .send()
                .await;

            match sent {
                Ok(response) if response.status().is_success() => {
                    let body: AskResponse = response.json().await?;
                    debug!("[fallback] answer received ({} chars)", body.answer.len());
                    return Ok(body.answer);
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    if is_retryable_status(status) && attempt < FALLBACK_MAX_RETRIES {
                        let retry_after = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(parse_retry_after);
                        let delay = retry_delay(
                            attempt,
                            DEFAULT_RECONNECT_BASE_DELAY_MS,
                            retry_after,
                        )
                        .await;
                        attempt += 1;
                        warn!(
                            "[fallback] ask failed with HTTP {} — retried after {}ms ({}/{})",
                            status,
                            delay.as_millis(),
                            attempt,
                            FALLBACK_MAX_RETRIES
                        );
                        continue;
                    }
                    return Err(TransportError::Server(format!(
                        "ask endpoint returned HTTP {}",
                        status
                    )));
                }
                Err(e) if attempt < FALLBACK_MAX_RETRIES => {
                    let delay =
                        retry_delay(attempt, DEFAULT_RECONNECT_BASE_DELAY_MS, None).await;
                    attempt += 1;
                    warn!(
                        "[fallback] ask request error: {} — retried after {}ms ({}/{})",
                        e,
                        delay.as_millis(),
                        attempt,
                        FALLBACK_MAX_RETRIES
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
