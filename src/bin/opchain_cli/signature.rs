//! Signature command - resolve the signatures of one operation document

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;

use opchain::catalog::kind_of;
use opchain::{Capability, OperationCatalog, Shape};

use super::output::print_json;

#[derive(Parser, Debug)]
pub struct SignatureCmd {
    /// Operation document (YAML or JSON) with a `kind` tag
    pub document: PathBuf,

    /// Extra type declarations, e.g. "class UserId extends String"
    #[arg(long = "declare", value_name = "DECLARATION")]
    pub declarations: Vec<String>,
}

#[derive(Serialize)]
struct SignatureOutput {
    kind: String,
    capability: &'static str,
    input: String,
    output: String,
    has_unknown: bool,
}

impl SignatureCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        let catalog = OperationCatalog::builtin()
            .fork_with_types(self.declarations.as_slice())
            .context("Invalid --declare")?;
        let document = load_document(&self.document)?;
        let (capability, shape) = resolve_document(&catalog, &document)
            .with_context(|| format!("Failed to resolve {}", self.document.display()))?;

        let output = SignatureOutput {
            kind: kind_of(&document)?.to_string(),
            capability: capability.name(),
            input: shape.input.to_string(),
            output: shape.output.to_string(),
            has_unknown: shape.input.has_unknown() || shape.output.has_unknown(),
        };

        if json_output {
            return print_json(&output);
        }
        println!("{} ({})", output.kind, output.capability);
        println!("  input:  {}", output.input);
        println!("  output: {}", output.output);
        Ok(())
    }
}

/// Read a document, as YAML for `.yaml`/`.yml` and JSON otherwise.
fn load_document(path: &Path) -> Result<serde_json::Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse YAML document {}", path.display()))
    } else {
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse JSON document {}", path.display()))
    }
}

fn resolve_document(catalog: &OperationCatalog, document: &serde_json::Value) -> Result<(Capability, Shape)> {
    let kind = kind_of(document)?;
    let capability = catalog
        .capability_of(kind)
        .ok_or_else(|| anyhow!("unknown operation kind `{kind}`"))?;
    let resolver = catalog.resolver();
    let shape = match capability {
        Capability::Function => resolver.resolve_shape(&catalog.decode_function(document)?)?,
        Capability::Predicate => resolver.resolve_shape(&catalog.decode_predicate(document)?)?,
        Capability::BinaryOperator => resolver.resolve_shape(&catalog.decode_operator(document)?)?,
    };
    Ok((capability, shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_each_capability() {
        let catalog = OperationCatalog::builtin();

        let (capability, shape) = resolve_document(&catalog, &json!({ "kind": "ToLong" })).unwrap();
        assert_eq!(capability, Capability::Function);
        assert_eq!(shape.to_string(), "Object -> Long");

        let (capability, shape) = resolve_document(&catalog, &json!({ "kind": "AreEqual" })).unwrap();
        assert_eq!(capability, Capability::Predicate);
        assert_eq!(shape.to_string(), "(Object, Object) -> Boolean");

        let (capability, shape) = resolve_document(&catalog, &json!({ "kind": "Sum" })).unwrap();
        assert_eq!(capability, Capability::BinaryOperator);
        assert_eq!(shape.to_string(), "(Number, Number) -> Number");
    }

    #[test]
    fn test_unknown_kind() {
        let err = resolve_document(&OperationCatalog::builtin(), &json!({ "kind": "Nope" })).unwrap_err();
        assert!(err.to_string().contains("unknown operation kind `Nope`"));
    }
}
