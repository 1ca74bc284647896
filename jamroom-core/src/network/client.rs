//! Relay HTTP Client

use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::types::*;
use super::RoomCode;
use crate::config::SessionConfig;

/// Errors that can occur when talking to the relay
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Room {0} not found")]
    RoomNotFound(RoomCode),

    #[error("Relay did not respond in time")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("Unexpected relay response (HTTP {0})")]
    Api(u16),
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RelayError::Timeout
        } else {
            RelayError::Http(e)
        }
    }
}

impl RelayError {
    /// Whether retrying on the next tick may succeed
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, RelayError::RoomNotFound(_))
    }
}

/// Per-operation request timeouts
#[derive(Debug, Clone, Copy)]
struct Timeouts {
    one_shot: Duration,
    poll: Duration,
    send: Duration,
    ping: Duration,
}

/// Client for the relay's HTTP API
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    base_url: String,
    timeouts: Timeouts,
}

impl RelayClient {
    /// Create a client using the URL and timeouts from `config`
    pub fn new(config: &SessionConfig) -> Self {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            // Limit connection pool to avoid stale connections to sleeping relays
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            base_url: config.relay_url.trim_end_matches('/').to_string(),
            timeouts: Timeouts {
                one_shot: config.request_timeout,
                poll: config.poll_timeout,
                send: config.send_timeout,
                ping: config.ping_timeout,
            },
        }
    }

    /// The relay base URL (without trailing slash)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decode a response, mapping 404 to [`RelayError::RoomNotFound`]
    async fn decode<T: DeserializeOwned>(
        resp: reqwest::Response,
        room: Option<&RoomCode>,
    ) -> Result<T, RelayError> {
        match resp.status() {
            status if status.is_success() => Ok(resp.json().await?),
            StatusCode::NOT_FOUND => match room {
                Some(code) => Err(RelayError::RoomNotFound(code.clone())),
                None => Err(RelayError::Api(404)),
            },
            status => {
                warn!("Relay answered HTTP {}", status);
                Err(RelayError::Api(status.as_u16()))
            }
        }
    }

    /// Create a new room
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn host(&self) -> Result<HostResponse, RelayError> {
        let resp = self
            .http
            .post(self.url("/host"))
            .timeout(self.timeouts.one_shot)
            .send()
            .await?;
        let body: HostResponse = Self::decode(resp, None).await?;
        debug!("Relay created room {}", body.room_code);
        Ok(body)
    }

    /// Check that a room exists
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn join(&self, code: &RoomCode) -> Result<JoinResponse, RelayError> {
        let resp = self
            .http
            .post(self.url(&format!("/join/{}", code)))
            .timeout(self.timeouts.one_shot)
            .send()
            .await?;
        Self::decode(resp, Some(code)).await
    }

    /// Append a command to a room's log
    pub async fn send(&self, code: &RoomCode, command: &WireCommand) -> Result<(), RelayError> {
        let resp = self
            .http
            .post(self.url(&format!("/send/{}", code)))
            .timeout(self.timeouts.send)
            .json(command)
            .send()
            .await?;
        let _: StatusResponse = Self::decode(resp, Some(code)).await?;
        debug!("Sent '{}' to room {}", command.command, code);
        Ok(())
    }

    /// Fetch every command with a receipt time after `since`
    pub async fn receive_since(
        &self,
        code: &RoomCode,
        since: Timestamp,
    ) -> Result<ReceiveResponse, RelayError> {
        let resp = self
            .http
            .get(self.url(&format!("/receive/{}?since={}", code, since)))
            .timeout(self.timeouts.poll)
            .send()
            .await?;
        Self::decode(resp, Some(code)).await
    }

    /// Keep-alive ping. Returns the round-trip time.
    pub async fn ping(&self) -> Result<Duration, RelayError> {
        self.ping_with_timeout(self.timeouts.ping).await
    }

    /// Ping with the long one-shot timeout, for waking a sleeping relay
    pub async fn wake(&self) -> Result<Duration, RelayError> {
        self.ping_with_timeout(self.timeouts.one_shot).await
    }

    async fn ping_with_timeout(&self, timeout: Duration) -> Result<Duration, RelayError> {
        let started = Instant::now();
        let resp = self
            .http
            .get(self.url("/ping"))
            .timeout(timeout)
            .send()
            .await?;
        let _: PingResponse = Self::decode(resp, None).await?;
        Ok(started.elapsed())
    }

    /// List the relay's active rooms
    pub async fn rooms(&self) -> Result<RoomsResponse, RelayError> {
        let resp = self
            .http
            .get(self.url("/rooms"))
            .timeout(self.timeouts.send)
            .send()
            .await?;
        Self::decode(resp, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let config = SessionConfig {
            relay_url: "http://127.0.0.1:8080/".to_string(),
            ..SessionConfig::default()
        };
        let client = RelayClient::new(&config);
        assert_eq!(client.base_url(), "http://127.0.0.1:8080");
        assert_eq!(client.url("/ping"), "http://127.0.0.1:8080/ping");
    }

    #[test]
    fn test_room_not_found_is_not_recoverable() {
        let code = RoomCode::parse("ABC123").unwrap();
        assert!(!RelayError::RoomNotFound(code).is_recoverable());
        assert!(RelayError::Timeout.is_recoverable());
        assert!(RelayError::Api(500).is_recoverable());
    }
}
