//! Check command - build a pipeline and report its stage signatures

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use serde::Serialize;

use opchain::{OperationCatalog, Pipeline, Settings, StageDescription};

use super::output::{format_stages, print_json};

#[derive(Parser, Debug)]
pub struct CheckCmd {
    /// Pipeline document (YAML or JSON)
    pub pipeline: PathBuf,

    /// Fail if any stage signature could not be fully resolved
    #[arg(long)]
    pub deny_unknown: bool,
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    success: bool,
    name: Option<&'a str>,
    element: String,
    stages: &'a [StageDescription],
    unresolved: Vec<&'a str>,
}

impl CheckCmd {
    pub fn execute(&self, settings: &Settings, json_output: bool, verbose: bool) -> Result<()> {
        let pipeline = Pipeline::from_path(&self.pipeline, &OperationCatalog::builtin())?;
        let unresolved: Vec<&str> = pipeline
            .unknown_stages()
            .into_iter()
            .map(|stage| stage.stage.as_str())
            .collect();

        if settings.deny_unknown && !unresolved.is_empty() {
            bail!(
                "{}: unresolved signatures in {}",
                self.pipeline.display(),
                unresolved.join(", ")
            );
        }

        if json_output {
            return print_json(&CheckOutput {
                success: true,
                name: pipeline.name(),
                element: pipeline.element().to_string(),
                stages: pipeline.describe(),
                unresolved,
            });
        }

        match pipeline.name() {
            Some(name) => println!("Pipeline `{name}` OK"),
            None => println!("Pipeline {} OK", self.pipeline.display()),
        }
        println!("  element: {}", pipeline.element());
        print!("{}", format_stages(pipeline.describe(), verbose));
        if !unresolved.is_empty() {
            println!("{} stage(s) with unresolved signatures", unresolved.len());
        }
        Ok(())
    }
}
