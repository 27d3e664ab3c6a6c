//! vmscope - inspect view-model document snapshots
//!
//! # Commands
//!
//! - `vmscope inspect` - Print the schema tree of a snapshot as JSON
//! - `vmscope controls` - List the controls built for a snapshot
//! - `vmscope events` - Replay an event log through the throttled console
//!
//! # Usage
//!
//! ```bash
//! vmscope inspect character.json --pretty
//! vmscope controls character.json
//! vmscope events session.jsonl --interval-ms 5
//! ```
//!
//! Settings are read from `config.toml` in the platform config directory,
//! or from the file given with `--config`.

mod controls;
mod events;
mod inspect;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use vmscope_core::Config;
use vmscope_core::live::memory::MemoryGraph;

/// vmscope - view-model inspector
#[derive(Parser)]
#[command(name = "vmscope")]
#[command(about = "Inspect live view-model document snapshots")]
#[command(version)]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the schema tree of a snapshot as JSON
    Inspect(inspect::InspectArgs),

    /// List the controls built for a snapshot
    Controls(controls::ControlsArgs),

    /// Replay an event log through the throttled console
    Events(events::EventsArgs),
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => vmscope_core::config::load_from(path)?,
        None => vmscope_core::config::load(),
    };

    match cli.command {
        Commands::Inspect(args) => inspect::execute(args),
        Commands::Controls(args) => controls::execute(args, &config),
        Commands::Events(args) => events::execute(args, &config),
    }
}

/// Read a snapshot file into an in-memory document
pub(crate) fn load_snapshot(path: &Path) -> Result<MemoryGraph> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    MemoryGraph::from_json(&json).with_context(|| format!("Invalid snapshot {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(
            &path,
            r#"{"definitions":[{"name":"Main","instances":[{"name":"Root","properties":[{"type":"number","name":"Volume","value":0.5}]}]}]}"#,
        )
        .unwrap();
        let graph = load_snapshot(&path).unwrap();
        assert_eq!(graph.leaf_paths(), ["Root/Volume"]);
    }

    #[test]
    fn test_load_snapshot_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();
        let err = load_snapshot(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("broken.json"));

        let err = load_snapshot(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["vmscope", "events", "log.jsonl", "--interval-ms", "5", "--config", "c.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
        assert!(matches!(cli.command, Commands::Events(_)));
    }
}
