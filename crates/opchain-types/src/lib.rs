//! Type model for opchain operations.
//!
//! This crate owns the nominal type system that signature resolution walks:
//!
//! - [`TypeDescriptor`]: comparable identity of a concrete type (name + array depth),
//!   cached per Rust type for the process lifetime.
//! - [`TypeRegistry`]: declared supertypes of every nominal type, populated from textual
//!   declarations such as `class Regex implements Predicate<String>`.
//! - [`Value`] and [`Tuple`]: the runtime values operations consume and produce.
//! - [`env_utils`]: typed environment variable helpers used for configuration.
//!
//! # Example
//!
//! ```
//! use opchain_types::{TypeDescriptor, TypeRegistry};
//!
//! let registry = TypeRegistry::with_builtins();
//! registry.declare_str("class Celsius extends Number").unwrap();
//!
//! let celsius = TypeDescriptor::named("Celsius");
//! assert!(registry.is_subtype(&celsius, &TypeDescriptor::named("Number")));
//! ```

pub mod builtin;
pub mod descriptor;
pub mod env_utils;
pub mod registry;
pub mod type_parsing;
pub mod value;

pub use descriptor::{Nominal, TypeDescriptor, ROOT_TYPE};
pub use registry::{Ancestors, DeclKind, ParentRef, RegistryError, TypeDecl, TypeRef, TypeRegistry};
pub use type_parsing::{parse_declaration, parse_descriptor, TypeParseError};
pub use value::{Tuple, Value};
