// # Trello Board Source
//
// This crate provides a `BoardSource` over the Trello REST API.
//
// ## Behavior
//
// - One HTTP request per call (cards or lists), no retries, no caching
// - Errors are propagated to the engine, which owns retry scheduling
// - HTTP timeout configured (30 seconds)
// - Specific error handling for HTTP status codes (401/403, 404, 429, 5xx)
//
// ## Security Requirements
//
// - API key and token NEVER appear in logs, errors, or `Debug` output
// - Both are sent as query parameters, so request URLs are stripped from
//   transport errors before they are surfaced
//
// ## API Reference
//
// - Board cards: GET `/1/boards/:board_id/cards?key=..&token=..&list=true`
// - Board lists: GET `/1/boards/:board_id/lists?key=..&token=..`

use async_trait::async_trait;
use cardwatch_core::config::BoardConfig;
use cardwatch_core::model::{BoardList, Card};
use cardwatch_core::traits::BoardSource;
use cardwatch_core::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Card as returned by `/boards/:id/cards?list=true`
#[derive(Debug, Deserialize)]
struct TrelloCard {
    id: String,
    name: String,
    #[serde(rename = "idList")]
    id_list: String,
    #[serde(default)]
    list: Option<TrelloListRef>,
}

/// Embedded list, present only when `list=true` is requested
#[derive(Debug, Deserialize)]
struct TrelloListRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TrelloList {
    id: String,
    name: String,
}

impl From<TrelloCard> for Card {
    fn from(card: TrelloCard) -> Self {
        let embedded = card.list.map(|list| list.name);
        let mut converted = Card::new(card.id, card.name, card.id_list);
        converted.list_name = embedded;
        converted
    }
}

/// Trello board source
///
/// Stateless apart from the HTTP client: every `fetch_*` call is a single
/// GET against the board.
pub struct TrelloBoardSource {
    /// ⚠️ NEVER log this value
    api_key: String,

    /// ⚠️ NEVER log this value
    api_token: String,

    board_id: String,

    /// API base URL without trailing slash
    base_url: String,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for TrelloBoardSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrelloBoardSource")
            .field("api_key", &"<REDACTED>")
            .field("api_token", &"<REDACTED>")
            .field("board_id", &self.board_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl TrelloBoardSource {
    /// Create a board source from validated board settings
    ///
    /// Fails if the key, token or board id is empty, or if the HTTP client
    /// cannot be built.
    pub fn new(config: &BoardConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            api_token: config.api_token.clone(),
            board_id: config.board_id.clone(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Board this source reads from
    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/1/boards/{}/{}", self.base_url, self.board_id, resource)
    }

    /// GET a board sub-resource and decode the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        extra_query: &[(&str, &str)],
    ) -> Result<T> {
        tracing::debug!("GET board {} ({})", resource, self.board_id);

        let response = self
            .client
            .get(self.endpoint(resource))
            .query(&[("key", self.api_key.as_str()), ("token", self.api_token.as_str())])
            .query(extra_query)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                Error::board(format!("HTTP request for {} failed: {}", resource, e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(self.status_error(resource, status, &error_text));
        }

        response.json::<T>().await.map_err(|e| {
            Error::provider(
                "trello",
                format!("Failed to parse {} response: {}", resource, e.without_url()),
            )
        })
    }

    fn status_error(&self, resource: &str, status: reqwest::StatusCode, body: &str) -> Error {
        match status.as_u16() {
            401 | 403 => Error::auth(format!(
                "Trello rejected the API key or token. Status: {}",
                status
            )),
            404 => Error::board(format!("Board not found: {}", self.board_id)),
            429 => Error::rate_limited(format!(
                "Trello rate limit exceeded. Status: {}",
                status
            )),
            500..=599 => Error::provider(
                "trello",
                format!("Trello server error (transient): {} - {}", status, body.trim()),
            ),
            _ => Error::provider(
                "trello",
                format!("Fetching {} failed: {} - {}", resource, status, body.trim()),
            ),
        }
    }
}

#[async_trait]
impl BoardSource for TrelloBoardSource {
    async fn fetch_cards(&self) -> Result<Vec<Card>> {
        let cards: Vec<TrelloCard> = self.get_json("cards", &[("list", "true")]).await?;
        tracing::debug!("Fetched {} cards from board {}", cards.len(), self.board_id);
        Ok(cards.into_iter().map(Card::from).collect())
    }

    async fn fetch_lists(&self) -> Result<Vec<BoardList>> {
        let lists: Vec<TrelloList> = self.get_json("lists", &[]).await?;
        tracing::debug!("Fetched {} lists from board {}", lists.len(), self.board_id);
        Ok(lists
            .into_iter()
            .map(|list| BoardList::new(list.id, list.name))
            .collect())
    }

    fn source_name(&self) -> &'static str {
        "trello"
    }
}
