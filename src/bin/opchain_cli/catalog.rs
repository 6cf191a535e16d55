//! Catalog command - list registered operation kinds

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use opchain::{Capability, OperationCatalog};

use super::output::print_json;

#[derive(Parser, Debug)]
pub struct CatalogCmd {
    /// Only list kinds of this capability
    #[arg(long, value_parser = ["function", "predicate", "binary_operator"])]
    pub capability: Option<String>,
}

#[derive(Serialize)]
struct KindEntry {
    kind: &'static str,
    capability: &'static str,
    declaration: &'static str,
}

impl CatalogCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        let catalog = OperationCatalog::builtin();
        let entries: Vec<KindEntry> = catalog
            .kinds()
            .into_iter()
            .filter(|info| self.matches(info.capability))
            .map(|info| KindEntry {
                kind: info.kind,
                capability: info.capability.name(),
                declaration: info.declaration,
            })
            .collect();

        if json_output {
            return print_json(&entries);
        }
        let width = entries.iter().map(|e| e.kind.len()).max().unwrap_or(0);
        for entry in &entries {
            println!("{:<width$}  {:<15}  {}", entry.kind, entry.capability, entry.declaration);
        }
        Ok(())
    }

    fn matches(&self, capability: Capability) -> bool {
        self.capability
            .as_deref()
            .map_or(true, |name| name == capability.name())
    }
}
