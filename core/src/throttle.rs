//! Rate limiting for the engine event stream.
//!
//! Every event goes through, in order: the master switch, the window roll
//! (and shutdown cooldown), the emergency circuit breaker, the shutdown
//! gate, the steady-state cap, and per-key debouncing.
//!
//! Two counters are kept per window. `received` counts every arrival that
//! got past the master switch and feeds the circuit breaker; `accepted`
//! counts admitted events and feeds the cap. Counting only admitted events
//! could never reach the emergency threshold once the cap is hit.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Thresholds (`[throttle]` in config.toml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Initial state of the master switch
    pub enabled: bool,
    pub window_ms: u64,
    /// A window admits at most `max_events_per_window - 1` events
    pub max_events_per_window: u32,
    /// Arrivals per window that trip the circuit breaker
    pub emergency_threshold: u32,
    /// Identical events closer together than this are dropped
    pub debounce_ms: u64,
    pub cooldown_ms: u64,
    /// Debounce keys remembered before the oldest is evicted
    pub max_tracked_keys: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 1000,
            max_events_per_window: 50,
            emergency_threshold: 200,
            debounce_ms: 100,
            cooldown_ms: 5000,
            max_tracked_keys: 50,
        }
    }
}

impl ThrottleConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleStatus {
    /// Accepting events
    Active,
    /// This window's cap is reached
    Capped,
    /// Circuit breaker tripped
    Shutdown,
    /// Master switch off
    Disabled,
}

/// Change of degraded mode the UI should report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleTransition {
    Overloaded,
    Recovered,
}

/// Why an event was let through or not
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Disabled,
    Overload,
    Shutdown,
    Capped,
    Debounced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThrottleStats {
    pub accepted: u64,
    pub disabled: u64,
    pub shutdown: u64,
    pub capped: u64,
    pub debounced: u64,
}

pub struct EventThrottle {
    config: ThrottleConfig,
    enabled: bool,
    window_start: Option<Instant>,
    events_this_window: u32,
    received_this_window: u32,
    shutdown: bool,
    shutdown_entered_at: Option<Instant>,
    last_fire: HashMap<String, Instant>,
    key_order: VecDeque<String>,
    transition: Option<ThrottleTransition>,
    stats: ThrottleStats,
}

impl Default for EventThrottle {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}

impl EventThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            enabled: config.enabled,
            config,
            window_start: None,
            events_this_window: 0,
            received_this_window: 0,
            shutdown: false,
            shutdown_entered_at: None,
            last_fire: HashMap::new(),
            key_order: VecDeque::new(),
            transition: None,
            stats: ThrottleStats::default(),
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Master switch
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            tracing::info!("Event logging {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    pub fn stats(&self) -> ThrottleStats {
        self.stats
    }

    pub fn status(&self) -> ThrottleStatus {
        if self.shutdown {
            ThrottleStatus::Shutdown
        } else if !self.enabled {
            ThrottleStatus::Disabled
        } else if self.events_this_window + 1 >= self.config.max_events_per_window {
            ThrottleStatus::Capped
        } else {
            ThrottleStatus::Active
        }
    }

    /// Pending degraded-mode change, cleared once taken
    pub fn take_transition(&mut self) -> Option<ThrottleTransition> {
        self.transition.take()
    }

    pub fn accept(&mut self, event_type: &str, payload: &serde_json::Value) -> bool {
        self.accept_at(event_type, payload, Instant::now())
    }

    pub fn accept_at(&mut self, event_type: &str, payload: &serde_json::Value, now: Instant) -> bool {
        self.evaluate(event_type, payload, now) == Verdict::Accepted
    }

    /// Run the full pipeline for one event
    pub fn evaluate(&mut self, event_type: &str, payload: &serde_json::Value, now: Instant) -> Verdict {
        if !self.enabled {
            self.stats.disabled += 1;
            return Verdict::Disabled;
        }

        self.roll_window(now);

        self.received_this_window += 1;
        if self.received_this_window >= self.config.emergency_threshold {
            if !self.shutdown {
                tracing::warn!(
                    "Event logging disabled due to overload ({} events in one window)",
                    self.received_this_window
                );
                self.shutdown = true;
                self.shutdown_entered_at = Some(now);
                self.transition = Some(ThrottleTransition::Overloaded);
            }
            self.enabled = false;
            self.stats.shutdown += 1;
            return Verdict::Overload;
        }

        if self.shutdown {
            self.stats.shutdown += 1;
            return Verdict::Shutdown;
        }

        if self.events_this_window + 1 >= self.config.max_events_per_window {
            self.stats.capped += 1;
            return Verdict::Capped;
        }

        let key = event_key(event_type, payload);
        if let Some(&last) = self.last_fire.get(&key) {
            if now.saturating_duration_since(last) < self.config.debounce() {
                self.stats.debounced += 1;
                return Verdict::Debounced;
            }
        }

        self.events_this_window += 1;
        self.remember(key, now);
        self.stats.accepted += 1;
        Verdict::Accepted
    }

    fn roll_window(&mut self, now: Instant) {
        match self.window_start {
            Some(start) if now.saturating_duration_since(start) <= self.config.window() => {}
            _ => {
                self.window_start = Some(now);
                self.events_this_window = 0;
                self.received_this_window = 0;
            }
        }

        if let (true, Some(entered)) = (self.shutdown, self.shutdown_entered_at) {
            if now.saturating_duration_since(entered) >= self.config.cooldown() {
                tracing::info!("Event overload cooldown elapsed");
                self.shutdown = false;
                self.shutdown_entered_at = None;
                self.transition = Some(ThrottleTransition::Recovered);
            }
        }
    }

    fn remember(&mut self, key: String, now: Instant) {
        if self.last_fire.insert(key.clone(), now).is_some() {
            if let Some(pos) = self.key_order.iter().position(|k| *k == key) {
                self.key_order.remove(pos);
            }
        }
        self.key_order.push_back(key);

        while self.key_order.len() > self.config.max_tracked_keys {
            if let Some(oldest) = self.key_order.pop_front() {
                self.last_fire.remove(&oldest);
            }
        }
    }

    /// Number of debounce keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.last_fire.len()
    }
}

/// Debounce key: event type plus serialized payload
fn event_key(event_type: &str, payload: &serde_json::Value) -> String {
    format!("{}:{}", event_type, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_window_admits_cap_minus_one() {
        let start = Instant::now();
        let mut throttle = EventThrottle::default();
        for i in 0..49 {
            assert!(throttle.accept_at("statechange", &json!({ "n": i }), start), "event {}", i);
        }
        assert_eq!(throttle.status(), ThrottleStatus::Capped);
        assert!(!throttle.accept_at("statechange", &json!({ "n": 49 }), start));

        // The next window accepts again
        assert!(throttle.accept_at("statechange", &json!({ "n": 50 }), start + ms(1001)));
        assert_eq!(throttle.status(), ThrottleStatus::Active);
    }

    #[test]
    fn test_window_boundary_is_exclusive() {
        let start = Instant::now();
        let mut throttle = EventThrottle::default();
        for i in 0..49 {
            throttle.accept_at("e", &json!(i), start);
        }
        // Exactly one window later the window has not rolled yet
        assert!(!throttle.accept_at("e", &json!("x"), start + ms(1000)));
        assert!(throttle.accept_at("e", &json!("y"), start + ms(1001)));
    }

    #[test]
    fn test_debounce_same_key() {
        let start = Instant::now();
        let mut throttle = EventThrottle::default();
        let payload = json!({ "name": "jump" });
        assert!(throttle.accept_at("riveevent", &payload, start));
        assert_eq!(throttle.evaluate("riveevent", &payload, start + ms(50)), Verdict::Debounced);
        // Different type, same payload
        assert!(throttle.accept_at("statechange", &payload, start + ms(50)));
        assert!(throttle.accept_at("riveevent", &payload, start + ms(100)));
        assert_eq!(throttle.stats().debounced, 1);
    }

    #[test]
    fn test_emergency_shutdown_and_recovery() {
        let start = Instant::now();
        let mut throttle = EventThrottle::default();
        let mut accepted = 0;
        for i in 0..200 {
            if throttle.accept_at("advance", &json!(i), start) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 49);
        assert!(throttle.is_shutdown());
        assert!(!throttle.is_enabled());
        assert_eq!(throttle.status(), ThrottleStatus::Shutdown);
        assert_eq!(throttle.take_transition(), Some(ThrottleTransition::Overloaded));
        assert_eq!(throttle.take_transition(), None);

        // Master switch stays off across windows
        assert_eq!(throttle.evaluate("advance", &json!("late"), start + ms(2000)), Verdict::Disabled);
        assert!(throttle.is_shutdown());

        // Re-enabled before the cooldown: still shut down
        throttle.set_enabled(true);
        assert_eq!(throttle.evaluate("advance", &json!("a"), start + ms(3000)), Verdict::Shutdown);

        // Cooldown elapsed: the flag clears on the next evaluation
        assert!(throttle.accept_at("advance", &json!("b"), start + ms(5000)));
        assert!(!throttle.is_shutdown());
        assert_eq!(throttle.take_transition(), Some(ThrottleTransition::Recovered));
    }

    #[test]
    fn test_disabled_does_no_accounting() {
        let start = Instant::now();
        let mut throttle = EventThrottle::new(ThrottleConfig {
            enabled: false,
            ..Default::default()
        });
        for i in 0..500 {
            assert!(!throttle.accept_at("advance", &json!(i), start));
        }
        assert_eq!(throttle.status(), ThrottleStatus::Disabled);
        assert!(!throttle.is_shutdown());
        throttle.set_enabled(true);
        assert!(throttle.accept_at("advance", &json!(0), start));
    }

    #[test]
    fn test_key_eviction() {
        let start = Instant::now();
        let mut throttle = EventThrottle::new(ThrottleConfig {
            max_events_per_window: 1000,
            emergency_threshold: 5000,
            max_tracked_keys: 3,
            ..Default::default()
        });
        for i in 0..5 {
            throttle.accept_at("e", &json!(i), start);
        }
        assert_eq!(throttle.tracked_keys(), 3);
        // Key 0 was evicted, so it is no longer debounced
        assert!(throttle.accept_at("e", &json!(0), start + ms(10)));
        assert!(!throttle.accept_at("e", &json!(4), start + ms(10)));
    }

    #[test]
    fn test_config_from_toml() {
        let config: ThrottleConfig = toml::from_str("max_events_per_window = 10\n").unwrap();
        assert_eq!(config.max_events_per_window, 10);
        assert_eq!(config.emergency_threshold, 200);
        assert!(config.enabled);
    }
}
