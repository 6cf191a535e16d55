use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use opchain_resolver::{AssignabilityChecker, Operation, Signature, SignatureResolver, SlotType};
use opchain_types::{builtin, parse_declaration, parse_descriptor, TypeDescriptor, TypeRegistry, Value};

use crate::catalog::{kind_of, OperationCatalog};
use crate::composite::FunctionComposite;
use crate::operation::{BinaryOperator, Function, Predicate};
use crate::tuple::{
    record_signature, TupleAdaptedBinaryOperator, TupleAdaptedFunction, TupleAdaptedPredicate, UNKNOWN_SLOT,
};

pub const SUPPORTED_PIPELINE_VERSION: u32 = 1;

/// Declarative pipeline document: filter, transform, then optionally aggregate a list of
/// input values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    #[serde(default = "default_pipeline_version")]
    pub version: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Element type expression, e.g. `String`.
    #[serde(default)]
    pub input: Option<String>,
    /// Element record slot types; `?` marks an unknown slot.
    #[serde(default)]
    pub record: Option<Vec<String>>,
    /// Extra type declarations, e.g. `class UserId extends String`.
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub filter: Option<FilterStage>,
    #[serde(default)]
    pub transform: Vec<TransformStage>,
    #[serde(default)]
    pub aggregate: Option<AggregateStage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterStage {
    pub predicate: serde_json::Value,
    #[serde(default)]
    pub select: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformStage {
    #[serde(default)]
    pub name: Option<String>,
    pub function: serde_json::Value,
    #[serde(default)]
    pub select: Option<Vec<usize>>,
    #[serde(default)]
    pub project: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateStage {
    pub operator: serde_json::Value,
    #[serde(default)]
    pub select: Option<Vec<usize>>,
}

/// Encoding of a pipeline document, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineFormat {
    Yaml,
    Json,
}

impl PipelineFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|value| value.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            Some(other) => bail!(
                "pipeline {} has unsupported extension `.{other}` (expected .yaml, .yml or .json)",
                path.display()
            ),
            None => bail!(
                "pipeline {} has no extension (expected .yaml, .yml or .json)",
                path.display()
            ),
        }
    }
}

/// A stage as named in validation issues, build errors and [`StageDescription`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageRef<'a> {
    Filter,
    Transform { index: usize, name: Option<&'a str> },
    Aggregate,
}

impl StageRef<'_> {
    fn transform(index: usize, step: &TransformStage) -> StageRef<'_> {
        StageRef::Transform {
            index,
            name: step.name.as_deref().filter(|name| !name.trim().is_empty()),
        }
    }
}

impl std::fmt::Display for StageRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageRef::Filter => f.write_str("filter"),
            StageRef::Transform { index, name: Some(name) } => write!(f, "transform[{index}] (`{name}`)"),
            StageRef::Transform { index, name: None } => write!(f, "transform[{index}]"),
            StageRef::Aggregate => f.write_str("aggregate"),
        }
    }
}

impl PipelineSpec {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let format = PipelineFormat::from_path(path)?;
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline {}", path.display()))?;
        let spec = Self::parse(&raw, format)
            .with_context(|| format!("Failed to load pipeline {}", path.display()))?;
        spec.validate()
            .with_context(|| format!("Pipeline {} is not runnable", path.display()))?;
        Ok(spec)
    }

    /// Parse a document without validating it.
    pub fn parse(raw: &str, format: PipelineFormat) -> Result<Self> {
        match format {
            PipelineFormat::Yaml => serde_yaml::from_str(raw).context("pipeline document is not valid YAML"),
            PipelineFormat::Json => serde_json::from_str(raw).context("pipeline document is not valid JSON"),
        }
    }

    /// Check everything that does not need the catalog: version, element declaration,
    /// stage documents and record index lists. Every problem is reported at once.
    pub fn validate(&self) -> Result<()> {
        let mut issues = Vec::new();
        self.check_header(&mut issues);
        self.check_stages(&mut issues);
        if issues.is_empty() {
            return Ok(());
        }

        let subject = match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!("Pipeline `{name}`"),
            _ => "Pipeline".to_string(),
        };
        let formatted = issues
            .iter()
            .enumerate()
            .map(|(idx, issue)| format!("  {}. {}", idx + 1, issue))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("{subject} has {} problem(s):\n{formatted}", issues.len());
    }

    fn check_header(&self, issues: &mut Vec<String>) {
        if self.version != SUPPORTED_PIPELINE_VERSION {
            issues.push(format!(
                "version {} is not supported (expected {})",
                self.version, SUPPORTED_PIPELINE_VERSION
            ));
        }
        if matches!(self.name.as_deref(), Some(name) if name.trim().is_empty()) {
            issues.push("name cannot be empty".to_string());
        }
        for (index, declaration) in self.types.iter().enumerate() {
            if let Err(err) = parse_declaration(declaration) {
                issues.push(format!("types[{index}]: {err}"));
            }
        }

        match (&self.input, &self.record) {
            (Some(_), Some(_)) => {
                issues.push("`input` and `record` are mutually exclusive".to_string());
            }
            (Some(input), None) => {
                if let Err(err) = parse_descriptor(input) {
                    issues.push(format!("input: {err}"));
                }
            }
            (None, Some(record)) if record.is_empty() => {
                issues.push("record must have at least one slot".to_string());
            }
            (None, Some(record)) => {
                for (index, slot) in record.iter().enumerate() {
                    if slot.trim() == UNKNOWN_SLOT {
                        continue;
                    }
                    if let Err(err) = parse_descriptor(slot) {
                        issues.push(format!("record[{index}]: {err}"));
                    }
                }
            }
            (None, None) => {}
        }

        if self.filter.is_none() && self.transform.is_empty() && self.aggregate.is_none() {
            issues.push("at least one of `filter`, `transform` or `aggregate` is required".to_string());
        }
    }

    /// Stage checks. Record indices are checked against the declared record while it is
    /// still statically known: a transform keeps the record only when it selects and
    /// projects back into it.
    fn check_stages(&self, issues: &mut Vec<String>) {
        let mut width = self.record.as_ref().map(Vec::len);

        if let Some(filter) = &self.filter {
            self.check_stage(StageRef::Filter, &filter.predicate, filter.select.as_deref(), None, width, issues);
        }
        for (index, step) in self.transform.iter().enumerate() {
            let stage = StageRef::transform(index, step);
            self.check_stage(stage, &step.function, step.select.as_deref(), step.project.as_deref(), width, issues);
            let keeps_record = step.select.is_some() && step.project.as_ref().is_some_and(|p| !p.is_empty());
            if !keeps_record {
                width = None;
            }
        }
        if let Some(aggregate) = &self.aggregate {
            self.check_stage(
                StageRef::Aggregate,
                &aggregate.operator,
                aggregate.select.as_deref(),
                None,
                width,
                issues,
            );
        }
    }

    fn check_stage(
        &self,
        stage: StageRef<'_>,
        document: &serde_json::Value,
        select: Option<&[usize]>,
        project: Option<&[usize]>,
        width: Option<usize>,
        issues: &mut Vec<String>,
    ) {
        if let Err(err) = kind_of(document) {
            issues.push(format!("{stage}: {err}"));
        }
        if (select.is_some() || project.is_some()) && self.record.is_none() {
            issues.push(format!("{stage}: `select`/`project` require a `record` element"));
        }
        if matches!(select, Some([])) {
            issues.push(format!("{stage}: `select` cannot be empty"));
        }
        if project.is_some() && select.is_none() {
            issues.push(format!("{stage}: `project` requires `select`"));
        }
        let Some(width) = width else {
            return;
        };
        for (list, indices) in [("select", select), ("project", project)] {
            for &index in indices.unwrap_or_default() {
                if index >= width {
                    issues.push(format!(
                        "{stage}: {list} index {index} is outside the {width}-slot record"
                    ));
                }
            }
        }
    }
}

fn default_pipeline_version() -> u32 {
    SUPPORTED_PIPELINE_VERSION
}

/// Resolved signature of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageDescription {
    pub stage: String,
    pub kind: String,
    pub input: String,
    pub output: String,
    pub has_unknown: bool,
}

impl StageDescription {
    fn new<O: Operation + ?Sized>(stage: String, operation: &O, input: &Signature, output: &Signature) -> Self {
        Self {
            stage,
            kind: operation.type_descriptor().to_string(),
            input: input.to_string(),
            output: output.to_string(),
            has_unknown: input.has_unknown() || output.has_unknown(),
        }
    }
}

/// Outcome of [`Pipeline::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub input_count: usize,
    pub filtered_out: usize,
    pub outputs: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Value>,
}

/// A built pipeline. Every edge has been checked at construction.
#[derive(Debug)]
pub struct Pipeline {
    name: Option<String>,
    catalog: OperationCatalog,
    element: Signature,
    filter: Option<Box<dyn Predicate>>,
    transform: Option<FunctionComposite>,
    aggregate: Option<Box<dyn BinaryOperator>>,
    stages: Vec<StageDescription>,
}

fn check_edge(
    checker: &AssignabilityChecker<'_>,
    label: &str,
    producer: &Signature,
    consumer: &Signature,
) -> Result<()> {
    let result = checker.check_assignable(producer, consumer);
    if !result.valid {
        bail!(
            "{label}: `{producer}` cannot feed input `{consumer}`: {}",
            result.explanation().unwrap_or_default()
        );
    }
    Ok(())
}

impl Pipeline {
    pub fn from_path(path: &Path, catalog: &OperationCatalog) -> Result<Self> {
        let spec = PipelineSpec::load_from_path(path)?;
        Self::build(&spec, catalog)
            .with_context(|| format!("Failed to build pipeline {}", path.display()))
    }

    pub fn build(spec: &PipelineSpec, catalog: &OperationCatalog) -> Result<Self> {
        spec.validate()?;
        let catalog = catalog
            .fork_with_types(&spec.types)
            .context("Invalid type declarations in `types`")?;

        let element = match (&spec.input, &spec.record) {
            (_, Some(record)) => record_signature(record).context("Invalid `record`")?,
            (Some(input), None) => Signature::Single(parse_descriptor(input).context("Invalid `input`")?),
            (None, None) => Signature::Unknown,
        };

        let resolver = catalog.resolver();
        let checker = resolver.checker();
        let mut stages = Vec::new();

        let filter = match &spec.filter {
            Some(stage) => Some(Self::build_filter(&resolver, &catalog, stage, &element, &mut stages)?),
            None => None,
        };

        let mut current = element.clone();
        let mut functions: Vec<Box<dyn Function>> = Vec::with_capacity(spec.transform.len());
        for (index, step) in spec.transform.iter().enumerate() {
            let label = StageRef::transform(index, step).to_string();
            let mut function = catalog
                .decode_function(&step.function)
                .with_context(|| format!("{label}: invalid function"))?;
            if let Some(select) = &step.select {
                function = Box::new(
                    TupleAdaptedFunction::build(
                        &resolver,
                        function,
                        select.clone(),
                        step.project.clone().unwrap_or_default(),
                        &current,
                    )
                    .with_context(|| format!("{label}: invalid tuple mapping"))?,
                );
            }
            let shape = resolver.resolve_shape(&function).with_context(|| format!("{label}: unresolvable"))?;
            check_edge(&checker, &label, &current, &shape.input)?;
            stages.push(StageDescription::new(label, &function, &shape.input, &shape.output));
            current = shape.output;
            functions.push(function);
        }
        let transform = if functions.is_empty() {
            None
        } else {
            Some(FunctionComposite::build(&resolver, functions)?)
        };

        let aggregate = match &spec.aggregate {
            Some(stage) => Some(Self::build_aggregate(&resolver, &catalog, stage, &current, &mut stages)?),
            None => None,
        };

        tracing::debug!(
            name = spec.name.as_deref().unwrap_or("<unnamed>"),
            stages = stages.len(),
            %element,
            "built pipeline"
        );

        Ok(Self {
            name: spec.name.clone(),
            catalog,
            element,
            filter,
            transform,
            aggregate,
            stages,
        })
    }

    fn build_filter(
        resolver: &SignatureResolver<'_>,
        catalog: &OperationCatalog,
        stage: &FilterStage,
        element: &Signature,
        stages: &mut Vec<StageDescription>,
    ) -> Result<Box<dyn Predicate>> {
        let mut predicate = catalog
            .decode_predicate(&stage.predicate)
            .context("filter: invalid predicate")?;
        if let Some(select) = &stage.select {
            predicate = Box::new(
                TupleAdaptedPredicate::build(resolver, predicate, select.clone(), element)
                    .context("filter: invalid tuple mapping")?,
            );
        }
        let shape = resolver.resolve_shape(&predicate).context("filter: unresolvable")?;
        check_edge(&resolver.checker(), &StageRef::Filter.to_string(), element, &shape.input)?;
        stages.push(StageDescription::new(StageRef::Filter.to_string(), &predicate, &shape.input, &shape.output));
        Ok(predicate)
    }

    fn build_aggregate(
        resolver: &SignatureResolver<'_>,
        catalog: &OperationCatalog,
        stage: &AggregateStage,
        current: &Signature,
        stages: &mut Vec<StageDescription>,
    ) -> Result<Box<dyn BinaryOperator>> {
        let operator = catalog
            .decode_operator(&stage.operator)
            .context("aggregate: invalid operator")?;
        if let Some(select) = &stage.select {
            let adapted = TupleAdaptedBinaryOperator::build(resolver, operator, select.clone(), current)
                .context("aggregate: invalid tuple mapping")?;
            stages.push(StageDescription::new(
                StageRef::Aggregate.to_string(),
                &adapted,
                current,
                adapted.output_record(),
            ));
            return Ok(Box::new(adapted));
        }

        let shape = resolver.resolve_shape(&operator).context("aggregate: unresolvable")?;
        // Operands are whole elements; records travel as lists.
        let operand = match current {
            Signature::Single(ty) => Some(ty.clone()),
            Signature::Tuple(_) => Some(TypeDescriptor::named(builtin::LIST)),
            Signature::Unknown => None,
        };
        if let Some(operand) = operand {
            let result = resolver
                .checker()
                .assignable_from(&shape.input, &[operand.clone(), operand.clone()]);
            if !result.valid {
                bail!(
                    "aggregate: `{operand}` elements cannot be folded by input `{}`: {}",
                    shape.input,
                    result.explanation().unwrap_or_default()
                );
            }
        }
        stages.push(StageDescription::new(StageRef::Aggregate.to_string(), &operator, &shape.input, &shape.output));
        Ok(operator)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn element(&self) -> &Signature {
        &self.element
    }

    pub fn catalog(&self) -> &OperationCatalog {
        &self.catalog
    }

    /// Resolved signature of every stage, in execution order.
    pub fn describe(&self) -> &[StageDescription] {
        &self.stages
    }

    /// Stages whose input or output signature could not be fully resolved.
    pub fn unknown_stages(&self) -> Vec<&StageDescription> {
        self.stages.iter().filter(|stage| stage.has_unknown).collect()
    }

    pub fn run(&self, inputs: Vec<Value>) -> Result<RunReport> {
        let registry = self.catalog.registry();
        let input_count = inputs.len();
        let mut filtered_out = 0;
        let mut outputs = Vec::with_capacity(input_count);

        for (index, input) in inputs.into_iter().enumerate() {
            check_element(registry, &self.element, &input)
                .with_context(|| format!("input {index} does not match element `{}`", self.element))?;

            if let Some(filter) = &self.filter {
                if !filter.test(&input) {
                    tracing::trace!(index, "filtered out");
                    filtered_out += 1;
                    continue;
                }
            }

            let output = match &self.transform {
                Some(transform) => transform
                    .apply(input)
                    .with_context(|| format!("input {index}: transform failed"))?,
                None => input,
            };
            outputs.push(output);
        }

        let aggregate = match &self.aggregate {
            Some(operator) => {
                let mut state = Value::Null;
                for (index, output) in outputs.iter().enumerate() {
                    state = operator
                        .apply(state, output.clone())
                        .with_context(|| format!("output {index}: aggregate failed"))?;
                }
                Some(state)
            }
            None => None,
        };

        Ok(RunReport {
            input_count,
            filtered_out,
            outputs,
            aggregate,
        })
    }
}

fn check_value(registry: &TypeRegistry, expected: &TypeDescriptor, value: &Value) -> Result<()> {
    match value.descriptor() {
        Some(actual) if !registry.is_subtype(&actual, expected) => {
            bail!("value of type `{actual}` is not a `{expected}`")
        }
        _ => Ok(()),
    }
}

fn check_element(registry: &TypeRegistry, element: &Signature, value: &Value) -> Result<()> {
    match element {
        Signature::Unknown => Ok(()),
        Signature::Single(expected) => check_value(registry, expected, value),
        Signature::Tuple(slots) => {
            let Some(values) = value.as_list() else {
                bail!("expected a record, got {}", value.kind_name());
            };
            if values.len() != slots.len() {
                bail!("expected a record of width {}, got {}", slots.len(), values.len());
            }
            for (index, (slot, value)) in slots.iter().zip(values).enumerate() {
                if let SlotType::Known(expected) = slot {
                    check_value(registry, expected, value).with_context(|| format!("slot {index}"))?;
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn spec(yaml: &str) -> PipelineSpec {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn strings(values: &[&str]) -> Vec<Value> {
        values.iter().map(|value| Value::from(*value)).collect()
    }

    const DOUBLED_SUM: &str = r#"
version: 1
name: doubled-sum
input: String
filter:
  predicate: { kind: Regex, value: "[0-9]+" }
transform:
  - function: { kind: ToLong }
  - name: double
    function: { kind: MultiplyBy, by: 2 }
aggregate:
  operator: { kind: Sum }
"#;

    #[test]
    fn validates_minimal_pipeline() {
        let spec = PipelineSpec {
            version: SUPPORTED_PIPELINE_VERSION,
            name: Some("smoke".to_string()),
            description: None,
            input: Some("Long".to_string()),
            record: None,
            types: Vec::new(),
            filter: None,
            transform: vec![TransformStage {
                name: None,
                function: json!({ "kind": "ToString" }),
                select: None,
                project: None,
            }],
            aggregate: None,
        };
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn collects_every_validation_issue() {
        let spec = PipelineSpec {
            version: 2,
            name: Some(" ".to_string()),
            description: None,
            input: Some("Long".to_string()),
            record: Some(vec!["Long".to_string()]),
            types: Vec::new(),
            filter: Some(FilterStage {
                predicate: json!("Exists"),
                select: Some(Vec::new()),
            }),
            transform: vec![TransformStage {
                name: Some("t".to_string()),
                function: json!({ "by": 2 }),
                select: None,
                project: Some(vec![0]),
            }],
            aggregate: None,
        };

        let err = spec.validate().expect_err("expected validation failure").to_string();
        assert!(err.starts_with("Pipeline has 7 problem(s):"));
        assert!(err.contains("version 2 is not supported"));
        assert!(err.contains("name cannot be empty"));
        assert!(err.contains("mutually exclusive"));
        assert!(err.contains("filter: operation document must be a JSON object"));
        assert!(err.contains("filter: `select` cannot be empty"));
        assert!(err.contains("transform[0] (`t`): operation document has no string `kind` field"));
        assert!(err.contains("transform[0] (`t`): `project` requires `select`"));
    }

    #[test]
    fn rejects_empty_pipeline() {
        let err = spec("version: 1\ninput: String\n").validate().unwrap_err();
        assert!(err.to_string().contains("at least one of"));
    }

    #[test]
    fn runs_filter_transform_aggregate() {
        let pipeline = Pipeline::build(&spec(DOUBLED_SUM), &OperationCatalog::builtin()).unwrap();
        let report = pipeline.run(strings(&["1", "x", "20"])).unwrap();

        assert_eq!(report.input_count, 3);
        assert_eq!(report.filtered_out, 1);
        assert_eq!(report.outputs, vec![Value::Long(2), Value::Long(40)]);
        assert_eq!(report.aggregate, Some(Value::Long(42)));

        let stages: Vec<_> = pipeline
            .describe()
            .iter()
            .map(|stage| format!("{}: {} -> {}", stage.stage, stage.input, stage.output))
            .collect();
        assert_eq!(
            stages,
            vec![
                "filter: String -> Boolean",
                "transform[0]: Object -> Long",
                "transform[1] (`double`): Number -> Number",
                "aggregate: (Number, Number) -> Number",
            ]
        );
        assert!(pipeline.unknown_stages().is_empty());
    }

    #[test]
    fn rejects_incompatible_transform_chain() {
        let spec = spec(
            r#"
input: String
transform:
  - function: { kind: MultiplyBy, by: 2 }
"#,
        );
        let err = Pipeline::build(&spec, &OperationCatalog::builtin()).unwrap_err();
        assert!(format!("{err:#}").contains("transform[0]: `String` cannot feed input `Number`"));
    }

    #[test]
    fn rejects_incompatible_aggregate() {
        let spec = spec(
            r#"
input: String
aggregate:
  operator: { kind: Sum }
"#,
        );
        let err = Pipeline::build(&spec, &OperationCatalog::builtin()).unwrap_err();
        assert!(err.to_string().contains("aggregate: `String` elements cannot be folded"));
    }

    #[test]
    fn runs_record_pipeline_with_tuple_adapters() {
        let spec = spec(
            r#"
record: [String, Long]
filter:
  predicate: { kind: IsMoreThan, value: 1 }
  select: [1]
transform:
  - function: { kind: ToLong }
    select: [0]
    project: [0]
  - function: { kind: Concat, separator: ":" }
    select: [0, 1]
aggregate:
  operator: { kind: StringConcat, separator: ";" }
"#,
        );
        let pipeline = Pipeline::build(&spec, &OperationCatalog::builtin()).unwrap();
        assert_eq!(pipeline.describe()[1].output, "(Long, Long)");

        let rows = vec![
            Value::from(json!(["7", 5])),
            Value::from(json!(["8", 1])),
            Value::from(json!(["9", 3])),
        ];
        let report = pipeline.run(rows).unwrap();
        assert_eq!(report.filtered_out, 1);
        assert_eq!(report.aggregate, Some(Value::from("7:5;9:3")));
    }

    #[test]
    fn aggregates_selected_record_slot() {
        let spec = spec(
            r#"
record: [String, Long]
aggregate:
  operator: { kind: Sum }
  select: [1]
"#,
        );
        let pipeline = Pipeline::build(&spec, &OperationCatalog::builtin()).unwrap();
        let report = pipeline
            .run(vec![Value::from(json!(["a", 1])), Value::from(json!(["b", 5]))])
            .unwrap();
        assert_eq!(report.aggregate, Some(Value::from(json!(["a", 6]))));
    }

    #[test]
    fn rejects_inputs_that_do_not_match_the_element() {
        let pipeline = Pipeline::build(&spec(DOUBLED_SUM), &OperationCatalog::builtin()).unwrap();
        let err = pipeline.run(vec![Value::Long(3)]).unwrap_err();
        assert!(format!("{err:#}").contains("input 0 does not match element `String`"));
    }

    #[test]
    fn declares_pipeline_types() {
        let spec = spec(
            r#"
input: UserId
types: ["class UserId extends Long"]
transform:
  - function: { kind: MultiplyBy, by: 10 }
"#,
        );
        let pipeline = Pipeline::build(&spec, &OperationCatalog::builtin()).unwrap();
        assert_eq!(pipeline.describe()[0].input, "Number");
        assert!(pipeline.catalog().registry().get_named("UserId").is_some());
    }

    #[test]
    fn reports_unknown_stages() {
        let spec = spec(
            r#"
input: Long
transform:
  - function: { kind: Identity }
"#,
        );
        let pipeline = Pipeline::build(&spec, &OperationCatalog::builtin()).unwrap();
        let unknown = pipeline.unknown_stages();
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].kind, "Identity");
    }

    #[test]
    fn loads_yaml_and_json_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("pipeline.yaml");
        fs::File::create(&yaml_path)
            .unwrap()
            .write_all(DOUBLED_SUM.as_bytes())
            .unwrap();
        let loaded = PipelineSpec::load_from_path(&yaml_path).unwrap();
        assert_eq!(loaded.name.as_deref(), Some("doubled-sum"));

        let json_path = dir.path().join("pipeline.json");
        fs::write(&json_path, serde_json::to_string(&loaded).unwrap()).unwrap();
        let reloaded = PipelineSpec::load_from_path(&json_path).unwrap();
        assert_eq!(reloaded.transform.len(), 2);

        let bad_path = dir.path().join("bad.json");
        fs::write(&bad_path, "{ not json").unwrap();
        let err = PipelineSpec::load_from_path(&bad_path).unwrap_err();
        assert!(err.to_string().starts_with("Failed to load pipeline"));
        assert!(format!("{err:#}").contains("pipeline document is not valid JSON"));

        let toml_path = dir.path().join("pipeline.toml");
        fs::write(&toml_path, "version = 1").unwrap();
        let err = PipelineSpec::load_from_path(&toml_path).unwrap_err();
        assert!(err.to_string().contains("unsupported extension `.toml`"));

        let invalid_path = dir.path().join("invalid.yml");
        fs::write(&invalid_path, "version: 1\nname: broken\ninput: String\n").unwrap();
        let err = PipelineSpec::load_from_path(&invalid_path).unwrap_err();
        assert!(err.to_string().contains("is not runnable"));
        assert!(format!("{err:#}").contains("Pipeline `broken` has 1 problem(s)"));
    }

    #[test]
    fn validates_declarations_and_record_indices() {
        let err = spec(
            r#"
name: indices
record: [String, "List<", "?"]
types: ["struct Nope"]
filter:
  predicate: { kind: Exists }
  select: [3]
transform:
  - function: { kind: ToLong }
    select: [1]
    project: [0, 5]
  - function: { kind: ToString }
    select: [0]
  - function: { kind: ToLong }
    select: [9]
aggregate:
  operator: { kind: Sum }
  select: [7]
"#,
        )
        .validate()
        .unwrap_err()
        .to_string();

        assert!(err.starts_with("Pipeline `indices` has 4 problem(s):"));
        assert!(err.contains("types[0]:"));
        assert!(err.contains("record[1]:"));
        assert!(err.contains("filter: select index 3 is outside the 3-slot record"));
        assert!(err.contains("transform[0]: project index 5 is outside the 3-slot record"));
        // transform[1] replaces the record, so later indices cannot be checked yet.
        assert!(!err.contains("index 9"));
        assert!(!err.contains("index 7"));

        let err = spec("input: \"List<\"\ntransform:\n  - function: { kind: ToString }\n")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("input:"));
    }
}
