//! Engine event ingestion: category filter, throttle, console.

use std::time::Instant;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::console_sink::ConsoleSink;
use crate::prefs::Preferences;
use crate::throttle::{EventThrottle, ThrottleStatus, ThrottleTransition, Verdict};

pub const OVERLOAD_STATUS: &str = "Event logging disabled due to overload";
pub const RECOVERED_STATUS: &str = "Event logging resumed";

/// Group of engine event types that can be logged or muted together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    /// load, loaderror
    Lifecycle,
    /// play, pause, stop, loop
    Playback,
    StateChange,
    /// advance, draw
    Frame,
    /// Events authored in the document
    Custom,
    Other,
}

impl EventCategory {
    pub const ALL: [EventCategory; 6] = [
        EventCategory::Lifecycle,
        EventCategory::Playback,
        EventCategory::StateChange,
        EventCategory::Frame,
        EventCategory::Custom,
        EventCategory::Other,
    ];

    pub fn from_event_type(event_type: &str) -> Self {
        match event_type.to_ascii_lowercase().as_str() {
            "load" | "loaderror" => EventCategory::Lifecycle,
            "play" | "pause" | "stop" | "loop" => EventCategory::Playback,
            "statechange" => EventCategory::StateChange,
            "advance" | "draw" => EventCategory::Frame,
            "riveevent" => EventCategory::Custom,
            _ => EventCategory::Other,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EventCategory::Lifecycle => "lifecycle",
            EventCategory::Playback => "playback",
            EventCategory::StateChange => "statechange",
            EventCategory::Frame => "frame",
            EventCategory::Custom => "custom",
            EventCategory::Other => "other",
        }
    }

    /// Frame events fire every tick and are muted unless asked for
    pub fn logged_by_default(self) -> bool {
        !matches!(self, EventCategory::Frame)
    }
}

/// What happened to one ingested event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Logged,
    /// Category muted in preferences
    Muted,
    Throttled(Verdict),
}

pub struct EventMonitor {
    prefs: Preferences,
    throttle: EventThrottle,
    console: ConsoleSink,
    muted: u64,
}

impl EventMonitor {
    pub fn new(config: &Config, prefs: Preferences) -> Self {
        Self {
            prefs,
            throttle: EventThrottle::new(config.throttle.clone()),
            console: ConsoleSink::new(&config.console),
            muted: 0,
        }
    }

    pub fn ingest(&mut self, event_type: &str, payload: &serde_json::Value) -> IngestOutcome {
        self.ingest_at(event_type, payload, Instant::now(), Local::now())
    }

    /// `now` drives the throttle and status line, `timestamp` the console line
    pub fn ingest_at(
        &mut self,
        event_type: &str,
        payload: &serde_json::Value,
        now: Instant,
        timestamp: DateTime<Local>,
    ) -> IngestOutcome {
        let category = EventCategory::from_event_type(event_type);
        if !self.prefs.is_logged(category) {
            self.muted += 1;
            return IngestOutcome::Muted;
        }

        let verdict = self.throttle.evaluate(event_type, payload, now);
        match self.throttle.take_transition() {
            Some(ThrottleTransition::Overloaded) => self.console.set_status_at(OVERLOAD_STATUS, now),
            Some(ThrottleTransition::Recovered) => self.console.set_status_at(RECOVERED_STATUS, now),
            None => {}
        }

        if verdict != Verdict::Accepted {
            return IngestOutcome::Throttled(verdict);
        }
        self.console.push_at(event_type, payload, timestamp);
        IngestOutcome::Logged
    }

    pub fn console(&self) -> &ConsoleSink {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut ConsoleSink {
        &mut self.console
    }

    pub fn throttle(&self) -> &EventThrottle {
        &self.throttle
    }

    pub fn status(&self) -> ThrottleStatus {
        self.throttle.status()
    }

    /// Master switch for event logging
    pub fn set_enabled(&mut self, enabled: bool) {
        self.throttle.set_enabled(enabled);
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    pub fn set_logged(&mut self, category: EventCategory, logged: bool) {
        self.prefs.set_logged(category, logged);
    }

    pub fn muted(&self) -> u64 {
        self.muted
    }
}
