//! Capability traits implemented by every runnable operation.
//!
//! Each trait extends [`Operation`] so signatures can be resolved for any instance, and
//! requires [`to_document`](Function::to_document) so every instance can be written back
//! to the declarative form it was decoded from.
//!
//! Multi-slot inputs (`Function2`, `Predicate2`, binary operator pairs) travel as a
//! `Value::List` in slot order.

use opchain_resolver::Operation;
use opchain_types::Value;

use crate::errors::OperationError;

/// Maps an input value to an output value.
pub trait Function: Operation {
    fn apply(&self, input: Value) -> Result<Value, OperationError>;

    fn to_document(&self) -> serde_json::Value;
}

/// Tests an input value. Predicates are total: inputs they cannot handle test false.
pub trait Predicate: Operation {
    fn test(&self, input: &Value) -> bool;

    fn to_document(&self) -> serde_json::Value;
}

/// Folds two values into one.
pub trait BinaryOperator: Operation {
    /// Combine two non-null values.
    fn combine(&self, state: Value, input: Value) -> Result<Value, OperationError>;

    /// Combine with null handling: a null side yields the other side unchanged.
    fn apply(&self, state: Value, input: Value) -> Result<Value, OperationError> {
        if state.is_null() {
            return Ok(input);
        }
        if input.is_null() {
            return Ok(state);
        }
        self.combine(state, input)
    }

    fn to_document(&self) -> serde_json::Value;
}

/// Split a two-slot input into its halves.
pub(crate) fn pair<'v>(operation: &'static str, input: &'v Value) -> Result<(&'v Value, &'v Value), OperationError> {
    match input.as_list() {
        Some([first, second]) => Ok((first, second)),
        Some(items) => Err(OperationError::RecordWidth {
            expected: 2,
            actual: items.len().to_string(),
        }),
        None => Err(OperationError::type_mismatch(operation, "a pair", input)),
    }
}
