//! Relay configuration from the environment

use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

/// Rooms older than this are evicted (one hour)
const DEFAULT_ROOM_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub room_ttl: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            room_ttl: DEFAULT_ROOM_TTL,
        }
    }
}

impl RelayConfig {
    /// Defaults overridden by `RELAY_HOST`, `RELAY_PORT` and `ROOM_TTL_SECS`.
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("RELAY_HOST") {
            if !host.trim().is_empty() {
                config.host = host.trim().to_string();
            }
        }
        if let Some(port) = std::env::var("RELAY_PORT")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            config.port = port;
        }
        if let Some(secs) = std::env::var("ROOM_TTL_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.room_ttl = Duration::from_secs(secs);
        }

        config
    }

    /// Address to bind, falling back to all interfaces if `host` is not an IP
    pub fn bind_addr(&self) -> SocketAddr {
        let ip = self
            .host
            .parse()
            .unwrap_or_else(|_| std::net::Ipv4Addr::UNSPECIFIED.into());
        SocketAddr::new(ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.room_ttl, Duration::from_secs(3600));
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_bad_host_falls_back() {
        let config = RelayConfig {
            host: "not an ip".to_string(),
            port: 9000,
            ..RelayConfig::default()
        };
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:9000");
    }
}
