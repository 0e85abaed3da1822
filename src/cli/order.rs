use std::path::PathBuf;

use clap::Parser;
use requisite::{domain::TreeNode, RequirementSet};
use tracing::instrument;

use super::{load_requirement_set, terminal::Colorize};

#[derive(Debug, Parser)]
pub struct Order {
    /// The requirement manifest (TOML)
    #[arg(short, long)]
    manifest: PathBuf,
}

impl Order {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self) -> anyhow::Result<()> {
        let set = load_requirement_set(&self.manifest)?;

        for (i, tree) in set.forest().trees().enumerate() {
            if i > 0 {
                println!();
            }
            println!(
                "{}",
                format!("Tree {} ({} requirements)", i + 1, tree.len()).info()
            );
            println!("  {}  {}", "roots:        ".dim(), names(&set, tree.roots()));
            println!(
                "  {}  {}",
                "breadth-first:".dim(),
                names(&set, tree.breadth_first())
            );
            println!(
                "  {}  {}",
                "topological:  ".dim(),
                names(&set, tree.topological())
            );
        }

        Ok(())
    }
}

fn names<'a>(set: &RequirementSet, nodes: impl IntoIterator<Item = &'a TreeNode>) -> String {
    nodes
        .into_iter()
        .map(|node| set.requirements()[node.index()].name())
        .collect::<Vec<_>>()
        .join(", ")
}
