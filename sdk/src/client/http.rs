//! HTTP client implementation.
//!
//! Provides the main HTTP client for interacting with the LexMarket REST API.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::config::ClientConfig;
use super::error::ClientError;
use crate::types::conversation::NewMessage;
use crate::types::{
    Appointment, Bid, Case, Conversation, Lawyer, Message, NewBid, NewCase, NewRating, Rating,
};

/// Upper bound for the timeout retry backoff.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// API error response format.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

/// API error details.
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Flat `{"message": ...}` error body.
#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: String,
}

/// HTTP client for the LexMarket REST API.
#[derive(Debug, Clone)]
pub struct LexClient {
    config: ClientConfig,
    base: Url,
    http: reqwest::Client,
}

impl LexClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let base = Url::parse(&config.base_url)
            .map_err(|e| ClientError::InvalidConfig(format!("base_url: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidConfig(
                "base_url cannot be a base URL".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(ref token) = config.token {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Ignoring auth token with invalid header characters"),
            }
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .build()
            .map_err(ClientError::Request)?;

        Ok(Self { config, base, http })
    }

    /// Creates a new client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults() -> Result<Self, ClientError> {
        Self::new(ClientConfig::default())
    }

    /// Creates a new client with the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(ClientConfig::new(base_url))
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns true if a bearer token is configured.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.config.token.is_some()
    }

    fn require_token(&self) -> Result<&str, ClientError> {
        self.config.token.as_deref().ok_or(ClientError::MissingToken)
    }

    /// Builds an endpoint URL from path segments under the base URL.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Makes a GET request and returns the raw body.
    async fn get_raw(&self, url: Url) -> Result<Vec<u8>, ClientError> {
        debug!("GET {}", url.path());
        let resource = url.path().to_string();
        self.request_with_retry(&resource, || self.http.get(url.clone()))
            .await
    }

    /// Makes a POST request with a JSON body and returns the raw body.
    async fn post_raw<B>(&self, url: Url, payload: &B) -> Result<Vec<u8>, ClientError>
    where
        B: Serialize + ?Sized,
    {
        debug!("POST {}", url.path());
        let resource = url.path().to_string();
        self.request_with_retry(&resource, || self.http.post(url.clone()).json(payload))
            .await
    }

    /// Makes a request with retry logic.
    async fn request_with_retry<F>(
        &self,
        resource: &str,
        request_fn: F,
    ) -> Result<Vec<u8>, ClientError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_error = None;
        let mut retry_count = 0;

        while retry_count <= self.config.max_retries {
            let response = request_fn().send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        return resp
                            .bytes()
                            .await
                            .map(|b| b.to_vec())
                            .map_err(|e| ClientError::Deserialization(e.to_string()));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse().ok());

                        if retry_count < self.config.max_retries {
                            let wait_time = retry_after.unwrap_or(1);
                            tokio::time::sleep(Duration::from_secs(wait_time)).await;
                            retry_count += 1;
                            continue;
                        }

                        return Err(ClientError::RateLimited { retry_after });
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(ClientError::NotFound(resource.to_string()));
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        warn!("Request to {} rejected: unauthorized", resource);
                        return Err(ClientError::Unauthorized);
                    }

                    if status == reqwest::StatusCode::FORBIDDEN {
                        return Err(ClientError::Forbidden);
                    }

                    let body = resp.text().await.unwrap_or_default();
                    return Err(api_error(status, body));
                }
                Err(e) => {
                    if e.is_timeout() && retry_count < self.config.max_retries {
                        retry_count += 1;
                        tokio::time::sleep(retry_delay(retry_count)).await;
                        last_error = Some(ClientError::from(e));
                        continue;
                    }
                    return Err(ClientError::from(e));
                }
            }
        }

        Err(last_error.unwrap_or(ClientError::Timeout))
    }

    /// Gets the current user's cases.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured or the request fails.
    pub async fn get_cases(&self) -> Result<Vec<Case>, ClientError> {
        self.require_token()?;
        let body = self.get_raw(self.url(&["cases"])).await?;
        decode_list(&body, "cases")
    }

    /// Gets a case by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured, the request fails or the
    /// case does not exist.
    pub async fn get_case(&self, id: &str) -> Result<Case, ClientError> {
        self.require_token()?;
        let body = self.get_raw(self.url(&["cases", id])).await?;
        decode_one(&body, "case")
    }

    /// Posts a new case.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured or the request fails.
    pub async fn create_case(&self, case: &NewCase) -> Result<Case, ClientError> {
        self.require_token()?;
        let body = self.post_raw(self.url(&["cases"]), case).await?;
        decode_one(&body, "case")
    }

    /// Gets the bids placed on a case.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured or the request fails.
    pub async fn get_bids(&self, case_id: &str) -> Result<Vec<Bid>, ClientError> {
        self.require_token()?;
        let body = self.get_raw(self.url(&["cases", case_id, "bids"])).await?;
        decode_list(&body, "bids")
    }

    /// Places a bid on a case.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured or the request fails.
    pub async fn place_bid(&self, case_id: &str, bid: &NewBid) -> Result<Bid, ClientError> {
        self.require_token()?;
        let body = self
            .post_raw(self.url(&["cases", case_id, "bids"]), bid)
            .await?;
        decode_one(&body, "bid")
    }

    /// Gets all listed lawyers.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_lawyers(&self) -> Result<Vec<Lawyer>, ClientError> {
        let body = self.get_raw(self.url(&["lawyers"])).await?;
        decode_list(&body, "lawyers")
    }

    /// Gets a lawyer profile by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the lawyer does not exist.
    pub async fn get_lawyer(&self, id: &str) -> Result<Lawyer, ClientError> {
        let body = self.get_raw(self.url(&["lawyers", id])).await?;
        decode_one(&body, "lawyer")
    }

    /// Gets the ratings a lawyer has received.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_ratings(&self, lawyer_id: &str) -> Result<Vec<Rating>, ClientError> {
        let body = self
            .get_raw(self.url(&["lawyers", lawyer_id, "ratings"]))
            .await?;
        decode_list(&body, "ratings")
    }

    /// Submits a rating.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured or the request fails.
    pub async fn submit_rating(&self, rating: &NewRating) -> Result<Rating, ClientError> {
        self.require_token()?;
        let body = self.post_raw(self.url(&["ratings"]), rating).await?;
        decode_one(&body, "rating")
    }

    /// Gets the current user's conversations.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured or the request fails.
    pub async fn get_conversations(&self) -> Result<Vec<Conversation>, ClientError> {
        self.require_token()?;
        let body = self.get_raw(self.url(&["conversations"])).await?;
        decode_list(&body, "conversations")
    }

    /// Gets the messages of a conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured or the request fails.
    pub async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ClientError> {
        self.require_token()?;
        let body = self
            .get_raw(self.url(&["conversations", conversation_id, "messages"]))
            .await?;
        decode_list(&body, "messages")
    }

    /// Sends a message in a conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured or the request fails.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<Message, ClientError> {
        self.require_token()?;
        let body = self
            .post_raw(
                self.url(&["conversations", conversation_id, "messages"]),
                &NewMessage { body: text },
            )
            .await?;
        decode_one(&body, "message")
    }

    /// Gets the current user's appointments.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured or the request fails.
    pub async fn get_appointments(&self) -> Result<Vec<Appointment>, ClientError> {
        self.require_token()?;
        let body = self.get_raw(self.url(&["appointments"])).await?;
        decode_list(&body, "appointments")
    }

    /// Returns the calendar download URL for an appointment.
    ///
    /// The token travels as a query parameter so the URL can be handed to
    /// calendar applications directly.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured.
    pub fn calendar_url(&self, appointment_id: &str) -> Result<Url, ClientError> {
        let token = self.require_token()?;
        let mut url = self.url(&["appointments", appointment_id, "calendar.ics"]);
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }

    /// Downloads an appointment as an iCalendar file.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured or the request fails.
    pub async fn download_calendar(&self, appointment_id: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.calendar_url(appointment_id)?;
        self.get_raw(url).await
    }
}

/// Builds an API error from a non-success response body.
/// Backoff after a timed-out attempt: 100ms doubled per retry, capped.
fn retry_delay(retry_count: u32) -> Duration {
    Duration::from_millis(100)
        .saturating_mul(2u32.saturating_pow(retry_count))
        .min(MAX_RETRY_DELAY)
}

fn api_error(status: reqwest::StatusCode, body: String) -> ClientError {
    if let Ok(error_resp) = serde_json::from_str::<ApiErrorResponse>(&body) {
        return ClientError::Api {
            code: error_resp
                .error
                .code
                .unwrap_or_else(|| status.as_str().to_string()),
            message: error_resp.error.message,
        };
    }

    if let Ok(msg) = serde_json::from_str::<MessageResponse>(&body) {
        return ClientError::Api {
            code: status.as_str().to_string(),
            message: msg.message,
        };
    }

    ClientError::Api {
        code: status.as_str().to_string(),
        message: body,
    }
}

/// Decodes a list that is either a bare array or wrapped under `key`.
fn decode_list<T: DeserializeOwned>(body: &[u8], key: &str) -> Result<Vec<T>, ClientError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ClientError::Deserialization(e.to_string()))?;

    let items = match value {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => map
            .remove(key)
            .or_else(|| map.remove("data"))
            .ok_or_else(|| ClientError::Deserialization(format!("missing `{}` array", key)))?,
        other => {
            return Err(ClientError::Deserialization(format!(
                "expected array or object, got {}",
                other
            )))
        }
    };

    serde_json::from_value(items).map_err(|e| ClientError::Deserialization(e.to_string()))
}

/// Decodes a resource that is either bare or wrapped under `key`.
fn decode_one<T: DeserializeOwned>(body: &[u8], key: &str) -> Result<T, ClientError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ClientError::Deserialization(e.to_string()))?;

    let value = match value {
        Value::Object(mut map) if map.get(key).is_some_and(Value::is_object) => {
            map.remove(key).unwrap_or(Value::Null)
        }
        other => other,
    };

    serde_json::from_value(value).map_err(|e| ClientError::Deserialization(e.to_string()))
}
