//! Events command - replay an event log through the throttled console

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Args;
use serde::Deserialize;
use vmscope_core::events::{EventMonitor, IngestOutcome};
use vmscope_core::prefs::{Preferences, TomlFileStore};
use vmscope_core::{Config, EventCategory};

/// Arguments for the events command
#[derive(Args)]
pub struct EventsArgs {
    /// Event log, one `{"type": .., "payload": ..}` object per line
    pub log: PathBuf,

    /// Simulated time between consecutive events
    #[arg(long, default_value_t = 10)]
    pub interval_ms: u64,

    /// Log every category regardless of saved preferences
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Simulated clock reading for the `index`th event
fn event_time(
    start: Instant,
    wall_start: DateTime<Local>,
    step: Duration,
    index: u32,
) -> Result<(Instant, DateTime<Local>)> {
    let offset = step
        .checked_mul(index)
        .context("Simulated time overflows; use a smaller --interval-ms")?;
    let at = start
        .checked_add(offset)
        .context("Simulated time overflows; use a smaller --interval-ms")?;
    let timestamp = chrono::Duration::from_std(offset)
        .ok()
        .and_then(|offset| wall_start.checked_add_signed(offset))
        .context("Simulated timestamp out of range; use a smaller --interval-ms")?;
    Ok((at, timestamp))
}

/// Execute the events command
pub fn execute(args: EventsArgs, config: &Config) -> Result<()> {
    let file = std::fs::File::open(&args.log)
        .with_context(|| format!("Failed to open event log {}", args.log.display()))?;

    let prefs = if args.all {
        let mut prefs = Preferences::default();
        for category in EventCategory::ALL {
            prefs.set_logged(category, true);
        }
        prefs
    } else {
        TomlFileStore::open_default()
            .map(|store| Preferences::load(&store))
            .unwrap_or_default()
    };

    let mut monitor = EventMonitor::new(config, prefs);
    let start = Instant::now();
    let wall_start = Local::now();
    let step = Duration::from_millis(args.interval_ms);

    let mut total = 0u32;
    let mut logged = 0u32;
    let mut last = start;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", args.log.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: EventRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid event", args.log.display(), line_no + 1))?;

        let (at, timestamp) = event_time(start, wall_start, step, total)?;
        last = at;
        if monitor.ingest_at(&record.event_type, &record.payload, last, timestamp) == IngestOutcome::Logged {
            logged += 1;
        }
        total += 1;
    }

    for line in monitor.console().lines() {
        println!("{}", line.text);
    }
    if let Some(status) = monitor.console().status_at(last) {
        println!("-- {}", status);
    }

    let stats = monitor.throttle().stats();
    println!(
        "{} events, {} logged, {} muted, {} capped, {} debounced, {} dropped by shutdown; throttle {:?}",
        total,
        logged,
        monitor.muted(),
        stats.capped,
        stats.debounced,
        stats.shutdown + stats.disabled,
        monitor.status()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("events.jsonl");
        std::fs::write(
            &log,
            "{\"type\":\"load\"}\n\n{\"type\":\"statechange\",\"payload\":[\"Idle\"]}\n",
        )
        .unwrap();
        let args = EventsArgs {
            log,
            interval_ms: 10,
            all: true,
        };
        execute(args, &Config::default()).unwrap();
    }

    #[test]
    fn test_invalid_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("events.jsonl");
        std::fs::write(&log, "{\"payload\":1}\n").unwrap();
        let err = execute(
            EventsArgs {
                log,
                interval_ms: 10,
                all: true,
            },
            &Config::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("events.jsonl:1"));
    }

    #[test]
    fn test_huge_interval_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("events.jsonl");
        std::fs::write(&log, "{\"type\":\"load\"}\n{\"type\":\"play\"}\n").unwrap();
        let err = execute(
            EventsArgs {
                log,
                interval_ms: u64::MAX,
                all: true,
            },
            &Config::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("--interval-ms"));
    }

    #[test]
    fn test_event_time_offsets() {
        let start = Instant::now();
        let wall = Local::now();
        let (at, timestamp) = event_time(start, wall, Duration::from_millis(10), 3).unwrap();
        assert_eq!(at - start, Duration::from_millis(30));
        assert_eq!((timestamp - wall).num_milliseconds(), 30);
        assert!(event_time(start, wall, Duration::MAX, 2).is_err());
    }
}
