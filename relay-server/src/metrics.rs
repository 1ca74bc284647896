//! Metrics tracking for the relay server

use chrono::{DateTime, Local};
use std::collections::VecDeque;

/// Maximum number of log entries to keep
const MAX_LOG_ENTRIES: usize = 100;

/// A log entry for the dashboard
#[derive(Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Room,
    Command,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Room => "ROOM",
            LogLevel::Command => "CMD",
        }
    }
}

/// Server metrics
pub struct Metrics {
    /// Server start time
    pub start_time: DateTime<Local>,

    /// Address the HTTP listener is bound to
    pub listen_addr: Option<String>,

    /// Room time-to-live in seconds
    pub room_ttl_secs: u64,

    /// Rooms currently open
    pub active_rooms: usize,

    /// Rooms created since start
    pub rooms_created: u64,

    /// Peak simultaneously open rooms
    pub peak_rooms: usize,

    /// Rooms removed by the TTL sweep
    pub rooms_evicted: u64,

    /// Successful joins
    pub joins: u64,

    /// Commands appended to room logs
    pub commands_relayed: u64,

    /// Receive requests answered
    pub polls_served: u64,

    /// Commands handed out across all polls (redeliveries included)
    pub commands_delivered: u64,

    /// Keep-alive pings answered
    pub pings: u64,

    /// Requests naming an unknown room
    pub not_found: u64,

    /// Log entries
    pub logs: VecDeque<LogEntry>,

    /// Server status
    pub status: ServerStatus,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ServerStatus {
    Starting,
    Running,
    Error,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time: Local::now(),
            listen_addr: None,
            room_ttl_secs: 0,
            active_rooms: 0,
            rooms_created: 0,
            peak_rooms: 0,
            rooms_evicted: 0,
            joins: 0,
            commands_relayed: 0,
            polls_served: 0,
            commands_delivered: 0,
            pings: 0,
            not_found: 0,
            logs: VecDeque::with_capacity(MAX_LOG_ENTRIES),
            status: ServerStatus::Starting,
        }
    }

    /// Add a log entry
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        if self.logs.len() >= MAX_LOG_ENTRIES {
            self.logs.pop_front();
        }
        self.logs.push_back(LogEntry {
            timestamp: Local::now(),
            level,
            message: message.into(),
        });
    }

    pub fn room_created(&mut self, code: &str, active_rooms: usize) {
        self.rooms_created += 1;
        self.active_rooms = active_rooms;
        if active_rooms > self.peak_rooms {
            self.peak_rooms = active_rooms;
        }
        self.log(LogLevel::Room, format!("Created room {}", code));
    }

    pub fn room_joined(&mut self, code: &str) {
        self.joins += 1;
        self.log(LogLevel::Room, format!("Join: {}", code));
    }

    pub fn rooms_evicted(&mut self, codes: &[String], active_rooms: usize) {
        self.active_rooms = active_rooms;
        if codes.is_empty() {
            return;
        }
        self.rooms_evicted += codes.len() as u64;
        for code in codes {
            self.log(LogLevel::Room, format!("Expired room {}", code));
        }
    }

    pub fn command_relayed(&mut self, code: &str, command: &str) {
        self.commands_relayed += 1;
        self.log(LogLevel::Command, format!("{} → {}", command, code));
    }

    pub fn poll_served(&mut self, delivered: usize) {
        self.polls_served += 1;
        self.commands_delivered += delivered as u64;
    }

    pub fn ping(&mut self) {
        self.pings += 1;
    }

    pub fn room_not_found(&mut self, code: &str) {
        self.not_found += 1;
        self.log(LogLevel::Warning, format!("Unknown room: {}", truncate_code(code)));
    }

    /// Get uptime as formatted string
    pub fn uptime(&self) -> String {
        let duration = Local::now().signed_duration_since(self.start_time);
        let secs = duration.num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            let hours = secs / 3600;
            let mins = (secs % 3600) / 60;
            format!("{}h {}m", hours, mins)
        }
    }
}

/// Clients can put anything in the path; keep log lines short
pub fn truncate_code(code: &str) -> String {
    if code.chars().count() > 16 {
        let head: String = code.chars().take(12).collect();
        format!("{}...", head)
    } else {
        code.to_string()
    }
}
