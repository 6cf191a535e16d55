//! Signature resolution for opchain operations.
//!
//! This crate provides:
//! - [`Signature`]: the input or output shape of an operation (`Single`, `Tuple(n)`, `Unknown`)
//! - [`Operation`]: the introspection trait every operation implements
//! - [`SignatureResolver`]: recovers signatures by walking an operation's declared ancestry
//! - [`AssignabilityChecker`]: decides whether one shape may be substituted for another
//!
//! # Example
//!
//! ```
//! use opchain_resolver::{Capability, Signature, SignatureResolver};
//! use opchain_types::{TypeDescriptor, TypeRegistry};
//!
//! let registry = TypeRegistry::with_builtins();
//! registry.declare_str("class Length implements Function<String, Long>").unwrap();
//!
//! let resolver = SignatureResolver::new(&registry);
//! let shape = resolver
//!     .resolve_type(&TypeDescriptor::named("Length"), Capability::Function)
//!     .unwrap();
//! assert_eq!(shape.output, Signature::single("Long"));
//!
//! let edge = resolver.checker().check_assignable(&shape.output, &Signature::single("Number"));
//! assert!(edge.valid);
//! ```

pub mod assignability;
pub mod capability;
pub mod operation;
pub mod resolver;
pub mod signature;

pub use assignability::{AssignabilityChecker, AssignabilityResult, Mismatch};
pub use capability::{Capability, CapabilityInterface, SlotSource};
pub use operation::{Operation, Shape};
pub use resolver::{ResolveError, SignatureResolver};
pub use signature::{Signature, SignatureKind, SlotType};
