mod check;
mod order;
mod terminal;

use std::{path::Path, sync::Arc};

use anyhow::Context;
use check::Check;
use clap::ArgAction;
use order::Order;
use requisite::{Manifest, RequirementSet};

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);
        self.command.run()
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Validate a bindings file against a requirement manifest
    Check(Check),

    /// Show the dependency trees of a requirement manifest
    ///
    /// Each tree is listed with its roots, then in breadth-first and in
    /// validation (topological) order.
    Order(Order),
}

impl Command {
    fn run(self) -> anyhow::Result<()> {
        match self {
            Self::Check(command) => command.run(),
            Self::Order(command) => command.run(),
        }
    }
}

/// Load a manifest and build the requirement set it declares.
fn load_requirement_set(path: &Path) -> anyhow::Result<Arc<RequirementSet>> {
    let manifest = Manifest::load(path)
        .with_context(|| format!("failed to load manifest {}", path.display()))?;
    let set = manifest
        .requirement_set()
        .with_context(|| format!("invalid requirement manifest {}", path.display()))?;
    tracing::info!(requirements = set.len(), "loaded requirement set");
    Ok(Arc::new(set))
}
