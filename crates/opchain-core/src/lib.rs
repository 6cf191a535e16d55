//! Runnable operations for opchain.
//!
//! This crate builds on the type model (`opchain-types`) and signature resolution
//! (`opchain-resolver`) with everything needed to compose and execute operations:
//!
//! - [`operation`]: the [`Function`], [`Predicate`] and [`BinaryOperator`] capability traits
//! - [`composite`]: sequential function composites and `And`/`Or`/`Not` predicates
//! - [`tuple`]: adapters reading from and writing to positions of a record
//! - [`impls`]: the leaf operation library
//! - [`catalog`]: decoding operation documents by their `kind` tag
//! - [`pipeline`]: declarative filter/transform/aggregate pipelines
//! - [`errors`]: typed errors with stable phase-prefixed codes
//!
//! Every composition check happens once, at construction. A built composite, adapter
//! or pipeline has had each of its edges validated.
//!
//! # Example
//!
//! ```
//! use opchain_core::{OperationCatalog, Value};
//! use serde_json::json;
//!
//! let catalog = OperationCatalog::builtin();
//! let function = catalog
//!     .decode_function(&json!({
//!         "kind": "FunctionComposite",
//!         "functions": [{ "kind": "ToLong" }, { "kind": "MultiplyBy", "by": 3 }],
//!     }))
//!     .unwrap();
//!
//! assert_eq!(function.apply(Value::from("14")).unwrap(), Value::Long(42));
//! assert_eq!(
//!     catalog.resolver().resolve_input_signature(&function).unwrap().to_string(),
//!     "Object"
//! );
//! ```

pub mod catalog;
pub mod composite;
pub mod errors;
pub mod impls;
pub mod operation;
pub mod pipeline;
pub mod tuple;

pub use catalog::{Catalogued, KindInfo, OperationCatalog};
pub use composite::{And, FunctionComposite, Not, Or};
pub use errors::{CompositionError, DecodeError, ErrorCode, OperationError, Phase};
pub use operation::{BinaryOperator, Function, Predicate};
pub use pipeline::{Pipeline, PipelineFormat, PipelineSpec, RunReport, StageDescription, SUPPORTED_PIPELINE_VERSION};
pub use tuple::{record_signature, TupleAdaptedBinaryOperator, TupleAdaptedFunction, TupleAdaptedPredicate};

pub use opchain_resolver::{Capability, Operation, Shape, Signature, SignatureResolver};
pub use opchain_types::{TypeDescriptor, TypeRegistry, Value};
