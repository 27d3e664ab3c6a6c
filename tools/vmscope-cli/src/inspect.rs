//! Inspect command - print a snapshot's schema tree

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use vmscope_core::introspect;

/// Arguments for the inspect command
#[derive(Args)]
pub struct InspectArgs {
    /// Document snapshot (.json)
    pub snapshot: PathBuf,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// Execute the inspect command
pub fn execute(args: InspectArgs) -> Result<()> {
    let graph = crate::load_snapshot(&args.snapshot)?;
    let tree = introspect(&graph).context("Document structure is unavailable")?;

    let stats = tree.stats();
    tracing::info!(
        "{} instances, {} properties, {} errors",
        stats.instances,
        stats.properties,
        stats.errors
    );

    let json = tree.to_json()?;
    let text = if args.pretty {
        serde_json::to_string_pretty(&json)?
    } else {
        serde_json::to_string(&json)?
    };
    println!("{}", text);
    Ok(())
}
