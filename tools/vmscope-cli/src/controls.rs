//! Controls command - list the controls a snapshot produces

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use vmscope_core::binding::display_value;
use vmscope_core::{Config, EnumResolver, EnumSource, Generation, WidgetKind, control, introspect};

/// Arguments for the controls command
#[derive(Args)]
pub struct ControlsArgs {
    /// Document snapshot (.json)
    pub snapshot: PathBuf,

    /// Print descriptors as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Execute the controls command
pub fn execute(args: ControlsArgs, config: &Config) -> Result<()> {
    let graph = crate::load_snapshot(&args.snapshot)?;
    let tree = introspect(&graph).context("Document structure is unavailable")?;
    let resolver = EnumResolver::new(config.enum_matching.clone());
    let schema = control::build(&tree, &graph, &resolver, Generation::default());
    let descriptors = schema.descriptors();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    for d in &descriptors {
        let value = d
            .current_value
            .as_ref()
            .map(display_value)
            .unwrap_or_else(|| "-".to_string());
        let mut line = format!(
            "{:<32} {:<10} {:<10} {}",
            d.key.to_string(),
            d.declared_type.type_name(),
            format!("{:?}", WidgetKind::for_descriptor(d)).to_lowercase(),
            value
        );
        match &d.enum_source {
            EnumSource::Resolved(name) => line.push_str(&format!("  [{}: {}]", name, d.enum_choices.join(", "))),
            EnumSource::Unavailable => line.push_str("  [no values available]"),
            EnumSource::NotEnum => {}
        }
        if let Some(error) = &d.error {
            line.push_str(&format!("  ! {}", error));
        }
        println!("{}", line);
    }
    println!(
        "{} controls ({} placeholders)",
        descriptors.len(),
        schema.placeholder_count()
    );
    Ok(())
}
