//! Output formatting for the opchain CLI

use anyhow::Result;
use serde::Serialize;

use opchain::{StageDescription, Value};

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Compact single-line JSON for one value.
pub fn format_value(value: &Value) -> String {
    serde_json::Value::from(value.clone()).to_string()
}

/// One line per stage: `  stage: input -> output`, with the operation kind when verbose.
pub fn format_stages(stages: &[StageDescription], verbose: bool) -> String {
    let mut out = String::new();
    for stage in stages {
        out.push_str(&format!("  {}: {} -> {}", stage.stage, stage.input, stage.output));
        if verbose {
            out.push_str(&format!("  [{}]", stage.kind));
        }
        if stage.has_unknown {
            out.push_str("  (unresolved)");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(name: &str, has_unknown: bool) -> StageDescription {
        StageDescription {
            stage: name.to_string(),
            kind: "ToLong".to_string(),
            input: "Object".to_string(),
            output: if has_unknown { "?" } else { "Long" }.to_string(),
            has_unknown,
        }
    }

    #[test]
    fn test_format_stages() {
        let stages = [stage("transform[0]", false), stage("transform[1]", true)];
        assert_eq!(
            format_stages(&stages, false),
            "  transform[0]: Object -> Long\n  transform[1]: Object -> ?  (unresolved)\n"
        );
        assert!(format_stages(&stages[..1], true).contains("[ToLong]"));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&Value::Long(42)), "42");
        assert_eq!(format_value(&Value::from("a")), "\"a\"");
    }
}
