//! Session client configuration

use std::time::Duration;

/// Default relay deployment
pub const DEFAULT_RELAY_URL: &str = "https://music-sync-relay.onrender.com";

/// Seconds between polls for new commands
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Seconds between keep-alive pings (stops free-tier relays from idling out)
const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Host/join/wake-up may hit a relay that is cold-starting
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Consecutive poll failures before reporting degraded connectivity
const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 3;

/// Tunables for [`SessionClient`](crate::session::SessionClient)
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub relay_url: String,
    pub poll_interval: Duration,
    pub keep_alive_interval: Duration,
    /// Timeout for one-shot session operations (host, join, wake-up)
    pub request_timeout: Duration,
    pub poll_timeout: Duration,
    pub send_timeout: Duration,
    pub ping_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_consecutive_errors: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}

impl SessionConfig {
    /// Defaults with overrides from the environment:
    /// `JAMROOM_RELAY_URL`, `JAMROOM_POLL_INTERVAL_MS`, `JAMROOM_KEEP_ALIVE_SECS`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("JAMROOM_RELAY_URL") {
            if !url.trim().is_empty() {
                config.relay_url = url.trim().to_string();
            }
        }
        if let Some(ms) = env_u64("JAMROOM_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(secs) = env_u64("JAMROOM_KEEP_ALIVE_SECS") {
            config.keep_alive_interval = Duration::from_secs(secs.max(1));
        }

        config
    }

    /// Same configuration pointed at another relay
    pub fn with_relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = url.into();
        self
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.keep_alive_interval, Duration::from_secs(30));
        assert_eq!(config.max_consecutive_errors, 3);
        assert!(config.poll_timeout < config.request_timeout);
    }

    #[test]
    fn test_with_relay_url() {
        let config = SessionConfig::default().with_relay_url("http://localhost:9000");
        assert_eq!(config.relay_url, "http://localhost:9000");
    }
}
