use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use requisite::{
    domain::ViolationKind, BindingsFile, Configuration, Lookup, RequirementSet, ValidationErrors,
};
use serde_json::json;
use tracing::instrument;

use super::{load_requirement_set, terminal::Colorize};

#[derive(Debug, Parser)]
pub struct Check {
    /// The requirement manifest (TOML)
    #[arg(short, long)]
    manifest: PathBuf,

    /// The values to bind, as a flat TOML table of `name = value`
    #[arg(short, long)]
    bindings: PathBuf,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl Check {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self) -> anyhow::Result<()> {
        let set = load_requirement_set(&self.manifest)?;
        let bindings = BindingsFile::load(&self.bindings)
            .with_context(|| format!("failed to load bindings {}", self.bindings.display()))?
            .bindings(&set)?;

        match Configuration::from_bindings(Arc::clone(&set), bindings) {
            Ok(configuration) => {
                match self.output {
                    OutputFormat::Table => output_configuration(&set, &configuration),
                    OutputFormat::Json => output_configuration_json(&configuration)?,
                }
                Ok(())
            }
            Err(errors) => {
                match self.output {
                    OutputFormat::Table => output_violations(&errors),
                    OutputFormat::Json => output_violations_json(&errors)?,
                }
                std::process::exit(1);
            }
        }
    }
}

fn output_configuration(set: &RequirementSet, configuration: &Configuration) {
    let width = set
        .iter()
        .map(|requirement| requirement.name().len())
        .max()
        .unwrap_or_default();

    for requirement in set.iter() {
        let name = format!("{:width$}", requirement.name());
        match configuration.lookup(requirement) {
            Lookup::Bound(value) => println!("{}  {value}", name.info()),
            Lookup::Unbound | Lookup::Unknown => {
                println!("{}  {}", name.info(), "(unbound)".dim());
            }
        }
    }

    println!(
        "\n{}",
        format!("✓ {} of {} requirements bound", configuration.len(), set.len()).success()
    );
}

fn output_configuration_json(configuration: &Configuration) -> anyhow::Result<()> {
    let bindings: Vec<_> = configuration
        .iter()
        .map(|(requirement, value)| {
            json!({
                "name": requirement.name(),
                "type": requirement.requirement_type().to_string(),
                "value": value.to_string(),
            })
        })
        .collect();

    let output = json!({
        "valid": true,
        "bindings": bindings,
        "records": configuration.to_records()?,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn output_violations(errors: &ValidationErrors) {
    let mut by_kind: BTreeMap<ViolationKind, Vec<String>> = BTreeMap::new();
    for violation in errors.iter() {
        by_kind
            .entry(violation.kind())
            .or_default()
            .push(violation.to_string());
    }

    for (kind, messages) in &by_kind {
        println!("{}", format!("✗ {kind} ({})", messages.len()).failure());
        for message in messages {
            println!("    {message}");
        }
    }

    let noun = if errors.len() == 1 {
        "violation"
    } else {
        "violations"
    };
    println!("\n{}", format!("{} {noun} found", errors.len()).warning());
}

fn output_violations_json(errors: &ValidationErrors) -> anyhow::Result<()> {
    let violations: Vec<_> = errors
        .iter()
        .map(|violation| {
            json!({
                "kind": violation.kind(),
                "requirement": violation.requirement(),
                "message": violation.to_string(),
            })
        })
        .collect();

    let output = json!({
        "valid": false,
        "violations": violations,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
