//! Bounded event console
//!
//! Accepted events land here as formatted lines, newest first. A single
//! transient status line sits above them and expires after a fixed time.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::config::ConsoleConfig;

/// One formatted console entry
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleLine {
    pub timestamp: DateTime<Local>,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub text: String,
}

impl ConsoleLine {
    pub fn new(event_type: &str, payload: &serde_json::Value, timestamp: DateTime<Local>) -> Self {
        let text = format!(
            "[{}] {} {}",
            timestamp.format("%H:%M:%S%.3f"),
            event_type,
            payload
        );
        Self {
            timestamp,
            event_type: event_type.to_string(),
            payload: payload.clone(),
            text,
        }
    }
}

struct StatusLine {
    message: String,
    shown_at: Instant,
}

pub struct ConsoleSink {
    lines: VecDeque<ConsoleLine>,
    capacity: usize,
    status: Option<StatusLine>,
    status_duration: Duration,
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(&ConsoleConfig::default())
    }
}

impl ConsoleSink {
    pub fn new(config: &ConsoleConfig) -> Self {
        Self {
            lines: VecDeque::with_capacity(config.capacity),
            capacity: config.capacity.max(1),
            status: None,
            status_duration: config.status_duration(),
        }
    }

    pub fn push(&mut self, event_type: &str, payload: &serde_json::Value) {
        self.push_at(event_type, payload, Local::now());
    }

    pub fn push_at(&mut self, event_type: &str, payload: &serde_json::Value, timestamp: DateTime<Local>) {
        self.lines.push_front(ConsoleLine::new(event_type, payload, timestamp));
        self.lines.truncate(self.capacity);
    }

    /// Lines, newest first
    pub fn lines(&self) -> impl Iterator<Item = &ConsoleLine> {
        self.lines.iter()
    }

    pub fn newest(&self) -> Option<&ConsoleLine> {
        self.lines.front()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.set_status_at(message, Instant::now());
    }

    /// Replace the status line; it shows for the configured duration from `now`
    pub fn set_status_at(&mut self, message: impl Into<String>, now: Instant) {
        self.status = Some(StatusLine {
            message: message.into(),
            shown_at: now,
        });
    }

    pub fn status(&self) -> Option<&str> {
        self.status_at(Instant::now())
    }

    /// Status line if it has not expired at `now`
    pub fn status_at(&self, now: Instant) -> Option<&str> {
        self.status
            .as_ref()
            .filter(|s| now.saturating_duration_since(s.shown_at) < self.status_duration)
            .map(|s| s.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 5, 1, h, m, s)
            .single()
            .unwrap()
            + chrono::Duration::milliseconds(ms as i64)
    }

    #[test]
    fn test_line_format() {
        let line = ConsoleLine::new("statechange", &json!(["Idle"]), at(9, 5, 7, 42));
        assert_eq!(line.text, r#"[09:05:07.042] statechange ["Idle"]"#);
    }

    #[test]
    fn test_newest_first_and_capped() {
        let mut sink = ConsoleSink::default();
        for i in 0..150 {
            sink.push_at("advance", &json!(i), at(12, 0, 0, 0));
        }
        assert_eq!(sink.len(), 100);
        assert_eq!(sink.newest().unwrap().payload, json!(149));
        assert_eq!(sink.lines().last().unwrap().payload, json!(50));
    }

    #[test]
    fn test_clear() {
        let mut sink = ConsoleSink::default();
        sink.push("load", &json!(null));
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_status_expires() {
        let now = Instant::now();
        let mut sink = ConsoleSink::default();
        assert_eq!(sink.status_at(now), None);

        sink.set_status_at("Event logging disabled due to overload", now);
        assert_eq!(
            sink.status_at(now + Duration::from_millis(2999)),
            Some("Event logging disabled due to overload")
        );
        assert_eq!(sink.status_at(now + Duration::from_secs(3)), None);
    }

    #[test]
    fn test_custom_capacity() {
        let mut sink = ConsoleSink::new(&ConsoleConfig {
            capacity: 2,
            status_duration_ms: 10,
        });
        for name in ["a", "b", "c"] {
            sink.push(name, &json!({}));
        }
        let types: Vec<_> = sink.lines().map(|l| l.event_type.as_str()).collect();
        assert_eq!(types, ["c", "b"]);
    }
}
