// # HTTP Messaging Notifier
//
// This crate delivers change notifications through a ticketing/messaging
// HTTP API.
//
// ## Behavior
//
// - Makes ONE POST per message; the engine serializes calls and paces them
// - Full error propagation (no retry, no queueing)
// - HTTP timeout configured (30 seconds)
// - Dry-run mode logs the payload instead of posting it
//
// ## Security Requirements
//
// - API key NEVER appears in logs or `Debug` output
//
// ## API Reference
//
// ```http
// POST /api/send/:phone_number
// Authorization: Bearer <key>
// accept: application/json
//
// {"body": "...", "connectionFrom": 5, "ticketStrategy": "create"}
// ```

use async_trait::async_trait;
use cardwatch_core::config::NotifierConfig;
use cardwatch_core::traits::Notifier;
use cardwatch_core::{Error, Result};
use serde::Serialize;
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Request body for `/api/send/:phone`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    body: &'a str,
    connection_from: u32,
    ticket_strategy: &'a str,
}

/// Notifier backed by the messaging API
///
/// # Dry-Run Mode
///
/// When `dry_run` is true the notifier logs the payload it would have
/// posted and reports success without any network activity.
pub struct HttpNotifier {
    /// ⚠️ NEVER log this value
    api_key: String,

    /// Full send URL, including the destination number
    send_url: String,

    connection_from: u32,
    ticket_strategy: String,
    dry_run: bool,
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for HttpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpNotifier")
            .field("api_key", &"<REDACTED>")
            .field("send_url", &self.send_url)
            .field("connection_from", &self.connection_from)
            .field("ticket_strategy", &self.ticket_strategy)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl HttpNotifier {
    /// Create a notifier from validated messaging settings
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        if config.dry_run {
            tracing::warn!("Notifier running in DRY-RUN mode - no messages will be sent");
        }

        Ok(Self {
            api_key: config.api_key.clone(),
            send_url: format!(
                "{}/api/send/{}",
                config.api_url.trim_end_matches('/'),
                config.phone_number
            ),
            connection_from: config.connection_from,
            ticket_strategy: config.ticket_strategy.clone(),
            dry_run: config.dry_run,
            client,
        })
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn request_body<'a>(&'a self, message: &'a str) -> SendRequest<'a> {
        SendRequest {
            body: message,
            connection_from: self.connection_from,
            ticket_strategy: &self.ticket_strategy,
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let payload = self.request_body(message);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                self.send_url,
                serde_json::to_string(&payload)?
            );
            return Ok(());
        }

        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(&self.api_key)
            .header("accept", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::notifier(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response".to_string());

        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => Error::auth(format!(
                    "Messaging API rejected the API key. Status: {}",
                    status
                )),
                429 => Error::rate_limited(format!(
                    "Messaging API rate limit exceeded. Status: {}",
                    status
                )),
                _ => Error::notifier(format!(
                    "HTTP error! status: {} - {}",
                    status,
                    response_text.trim()
                )),
            });
        }

        tracing::debug!("Notification accepted: {}", response_text);
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "http"
    }
}
