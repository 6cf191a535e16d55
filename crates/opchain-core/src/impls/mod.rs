//! Leaf operations shipped with the catalog.
//!
//! Each operation declares its nominal type with a `DECLARATION` (see
//! [`Catalogued`](crate::catalog::Catalogued)); signatures are resolved from those
//! declarations rather than stored on the instance.

pub mod binary_operators;
pub mod functions;
pub mod predicates;

pub use binary_operators::{CollectionConcat, Max, Min, StringConcat, Sum};
pub use functions::{
    Concat, CsvLinesToMaps, FunctionMap, Identity, IterableFunction, MultiplyBy, ToIterable, ToLong, ToString,
};
pub use predicates::{AreEqual, CollectionContains, Exists, IsA, IsEqual, IsLessThan, IsMoreThan, IsXMoreThanY, Regex};
