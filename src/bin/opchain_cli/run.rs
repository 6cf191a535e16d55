//! Run command - run a pipeline over JSON input values

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};

use opchain::{OperationCatalog, Pipeline, Settings, Value};

use super::output::{format_value, print_json};

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "value"])))]
pub struct RunCmd {
    /// Pipeline document (YAML or JSON)
    pub pipeline: PathBuf,

    /// Input file: a JSON array, or one JSON value per line
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// A single JSON input value
    #[arg(long)]
    pub value: Option<String>,
}

impl RunCmd {
    pub fn execute(&self, settings: &Settings, json_output: bool) -> Result<()> {
        let pipeline = Pipeline::from_path(&self.pipeline, &OperationCatalog::builtin())?;

        let inputs = match (&self.input, &self.value) {
            (Some(path), _) => read_inputs(path)?,
            (None, Some(raw)) => {
                vec![serde_json::from_str(raw).with_context(|| format!("--value is not valid JSON: {raw}"))?]
            }
            (None, None) => bail!("one of --input or --value is required"),
        };
        if inputs.len() > settings.max_inputs {
            bail!(
                "{} input values exceed the limit of {} (OPCHAIN_MAX_INPUTS)",
                inputs.len(),
                settings.max_inputs
            );
        }

        let report = pipeline.run(inputs.into_iter().map(Value::from).collect())?;

        if json_output {
            return print_json(&report);
        }
        for output in &report.outputs {
            println!("{}", format_value(output));
        }
        if let Some(aggregate) = &report.aggregate {
            println!("aggregate: {}", format_value(aggregate));
        }
        eprintln!(
            "{} input(s), {} filtered out, {} output(s)",
            report.input_count,
            report.filtered_out,
            report.outputs.len()
        );
        Ok(())
    }
}

/// Read input values from a JSON array file or a JSON Lines file.
fn read_inputs(path: &Path) -> Result<Vec<serde_json::Value>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {}", path.display()))?;
    parse_inputs(&contents).with_context(|| format!("Failed to parse input file {}", path.display()))
}

fn parse_inputs(contents: &str) -> Result<Vec<serde_json::Value>> {
    if contents.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(contents)?);
    }
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| serde_json::from_str(line).with_context(|| format!("line {}", i + 1)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_array_and_lines() {
        assert_eq!(parse_inputs(r#"["1", 2]"#).unwrap(), vec![json!("1"), json!(2)]);
        assert_eq!(
            parse_inputs("\"1\"\n\n{\"a\": 2}\n").unwrap(),
            vec![json!("1"), json!({ "a": 2 })]
        );
    }

    #[test]
    fn test_parse_reports_line() {
        let err = parse_inputs("1\nnot json\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }
}
