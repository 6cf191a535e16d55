//! opchain: typed, declaratively composed operation pipelines.
//!
//! This crate is the application layer over the workspace crates:
//!
//! - `opchain-types`: type descriptors, the declared type hierarchy and runtime values
//! - `opchain-resolver`: signature resolution and assignability checks
//! - `opchain-core`: runnable operations, the catalog and pipelines
//!
//! On top of those it adds [`config::Settings`] (environment-driven configuration)
//! and [`logging`] (the tracing subscriber used by the `opchain` binary).
//!
//! ## Quick Start
//!
//! ```
//! use opchain::{OperationCatalog, Pipeline, PipelineSpec, Value};
//!
//! let spec: PipelineSpec = serde_yaml::from_str(r#"
//! version: 1
//! name: doubled-sum
//! input: String
//! filter: { predicate: { kind: Regex, value: "[0-9]+" } }
//! transform:
//!   - function: { kind: ToLong }
//!   - function: { kind: MultiplyBy, by: 2 }
//! aggregate: { operator: { kind: Sum } }
//! "#).unwrap();
//!
//! let pipeline = Pipeline::build(&spec, &OperationCatalog::builtin()).unwrap();
//! let report = pipeline
//!     .run(vec![Value::from("1"), Value::from("x"), Value::from("20")])
//!     .unwrap();
//! assert_eq!(report.aggregate, Some(Value::Long(42)));
//! ```

pub mod config;
pub mod logging;

pub use opchain_core::{
    catalog, composite, errors, impls, operation, pipeline, tuple, And, BinaryOperator, Catalogued,
    CompositionError, DecodeError, ErrorCode, Function, FunctionComposite, KindInfo, Not, OperationCatalog,
    OperationError, Or, Phase, Pipeline, PipelineSpec, Predicate, RunReport, StageDescription,
};
pub use opchain_resolver::{self as resolver, Capability, Operation, Shape, Signature, SignatureResolver};
pub use opchain_types::{self as types, TypeDescriptor, TypeRegistry, Value};

pub use config::Settings;
