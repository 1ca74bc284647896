//! Relay connection health
//!
//! Counts consecutive poll failures and tracks keep-alive round-trip times,
//! deciding when the user should hear about degraded connectivity.

use std::time::Duration;

use crate::network::RelayError;

/// Number of RTT samples to keep for averaging
const RTT_SAMPLE_COUNT: usize = 5;

/// A user-facing connectivity change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthNotice {
    /// Threshold reached on timeouts; free-tier relays sleep when idle
    RelaySleeping,
    /// Threshold reached on other failures
    ConnectionLost,
    /// First success after a reported outage
    Restored,
}

impl HealthNotice {
    pub fn message(&self) -> &'static str {
        match self {
            HealthNotice::RelaySleeping => "Connection unstable - relay may be sleeping",
            HealthNotice::ConnectionLost => "Connection lost to relay server",
            HealthNotice::Restored => "Connection to relay restored",
        }
    }
}

#[derive(Debug)]
pub struct ConnectionHealth {
    threshold: u32,
    consecutive_errors: u32,
    /// Set once the degraded notice went out for the current outage
    reported: bool,
    /// Recent keep-alive RTT samples in milliseconds
    samples: Vec<u64>,
}

impl ConnectionHealth {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_errors: 0,
            reported: false,
            samples: Vec::with_capacity(RTT_SAMPLE_COUNT),
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn is_degraded(&self) -> bool {
        self.consecutive_errors >= self.threshold
    }

    /// Record a failed poll. Returns a notice the first time the threshold is
    /// reached in this outage.
    pub fn record_failure(&mut self, error: &RelayError) -> Option<HealthNotice> {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        if self.reported || self.consecutive_errors < self.threshold {
            return None;
        }
        self.reported = true;
        Some(match error {
            RelayError::Timeout => HealthNotice::RelaySleeping,
            _ => HealthNotice::ConnectionLost,
        })
    }

    /// Record a successful poll. Returns a notice if an outage had been reported.
    pub fn record_success(&mut self) -> Option<HealthNotice> {
        self.consecutive_errors = 0;
        if std::mem::take(&mut self.reported) {
            Some(HealthNotice::Restored)
        } else {
            None
        }
    }

    pub fn add_rtt_sample(&mut self, rtt: Duration) {
        if self.samples.len() >= RTT_SAMPLE_COUNT {
            self.samples.remove(0);
        }
        self.samples.push(rtt.as_millis() as u64);
    }

    /// Average keep-alive RTT, if any ping succeeded yet
    pub fn average_rtt_ms(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u64 = self.samples.iter().sum();
        Some(sum / self.samples.len() as u64)
    }

    /// Forget everything (when leaving a room)
    pub fn reset(&mut self) {
        self.consecutive_errors = 0;
        self.reported = false;
        self.samples.clear();
    }
}
