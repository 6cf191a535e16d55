//! Leaf binary operators. Null operands are handled by [`BinaryOperator::apply`].

use serde::Deserialize;
use serde_json::json;
use std::cmp::Ordering;

use opchain_resolver::{Capability, Operation};
use opchain_types::{Nominal, TypeDescriptor, Value};

use crate::catalog::{fields, no_fields, Catalogued, OperationCatalog};
use crate::errors::{DecodeError, OperationError};
use crate::operation::BinaryOperator;

macro_rules! operator_operation {
    ($name:ident) => {
        impl Nominal for $name {
            const TYPE_NAME: &'static str = stringify!($name);
        }

        impl Operation for $name {
            fn type_descriptor(&self) -> TypeDescriptor {
                TypeDescriptor::of::<Self>()
            }

            fn capability(&self) -> Capability {
                Capability::BinaryOperator
            }
        }
    };
}

/// Numeric sum. Longs add with overflow checking; any double makes the result a double.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

operator_operation!(Sum);

impl Catalogued for Sum {
    const DECLARATION: &'static str = "class Sum implements BinaryOperator<Number>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        no_fields(Self::TYPE_NAME, document)?;
        Ok(Sum)
    }
}

impl BinaryOperator for Sum {
    fn combine(&self, state: Value, input: Value) -> Result<Value, OperationError> {
        match (&state, &input) {
            (Value::Long(a), Value::Long(b)) => a
                .checked_add(*b)
                .map(Value::Long)
                .ok_or(OperationError::Overflow {
                    operation: Self::TYPE_NAME,
                }),
            _ => {
                let a = state
                    .as_f64()
                    .ok_or_else(|| OperationError::type_mismatch(Self::TYPE_NAME, "a number", &state))?;
                let b = input
                    .as_f64()
                    .ok_or_else(|| OperationError::type_mismatch(Self::TYPE_NAME, "a number", &input))?;
                Ok(Value::Double(a + b))
            }
        }
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME })
    }
}

fn pick(
    operation: &'static str,
    state: Value,
    input: Value,
    keep_input: Ordering,
) -> Result<Value, OperationError> {
    match input.compare(&state) {
        Some(ordering) if ordering == keep_input => Ok(input),
        Some(_) => Ok(state),
        None => Err(OperationError::Unsupported {
            operation,
            message: format!("cannot compare {} with {}", state.kind_name(), input.kind_name()),
        }),
    }
}

/// Largest of the two operands. Ties keep the state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

operator_operation!(Max);

impl Catalogued for Max {
    const DECLARATION: &'static str = "class Max implements BinaryOperator<Comparable<Object>>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        no_fields(Self::TYPE_NAME, document)?;
        Ok(Max)
    }
}

impl BinaryOperator for Max {
    fn combine(&self, state: Value, input: Value) -> Result<Value, OperationError> {
        pick(Self::TYPE_NAME, state, input, Ordering::Greater)
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME })
    }
}

/// Smallest of the two operands. Ties keep the state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Min;

operator_operation!(Min);

impl Catalogued for Min {
    const DECLARATION: &'static str = "class Min implements BinaryOperator<Comparable<Object>>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        no_fields(Self::TYPE_NAME, document)?;
        Ok(Min)
    }
}

impl BinaryOperator for Min {
    fn combine(&self, state: Value, input: Value) -> Result<Value, OperationError> {
        pick(Self::TYPE_NAME, state, input, Ordering::Less)
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME })
    }
}

/// Joins two strings with a separator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StringConcat {
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    ",".into()
}

impl Default for StringConcat {
    fn default() -> Self {
        Self {
            separator: default_separator(),
        }
    }
}

operator_operation!(StringConcat);

impl Catalogued for StringConcat {
    const DECLARATION: &'static str = "class StringConcat implements BinaryOperator<String>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        fields(Self::TYPE_NAME, document)
    }
}

impl BinaryOperator for StringConcat {
    fn combine(&self, state: Value, input: Value) -> Result<Value, OperationError> {
        match (state, input) {
            (Value::String(mut joined), Value::String(next)) => {
                joined.push_str(&self.separator);
                joined.push_str(&next);
                Ok(Value::String(joined))
            }
            (Value::String(_), other) | (other, _) => {
                Err(OperationError::type_mismatch(Self::TYPE_NAME, "a string", &other))
            }
        }
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME, "separator": self.separator })
    }
}

/// Appends the input list to the state list.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionConcat;

operator_operation!(CollectionConcat);

impl Catalogued for CollectionConcat {
    const DECLARATION: &'static str = "class CollectionConcat implements BinaryOperator<List<Object>>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        no_fields(Self::TYPE_NAME, document)?;
        Ok(CollectionConcat)
    }
}

impl BinaryOperator for CollectionConcat {
    fn combine(&self, state: Value, input: Value) -> Result<Value, OperationError> {
        match (state, input) {
            (Value::List(mut items), Value::List(more)) => {
                items.extend(more);
                Ok(Value::List(items))
            }
            (Value::List(_), other) | (other, _) => {
                Err(OperationError::type_mismatch(Self::TYPE_NAME, "a list", &other))
            }
        }
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opchain_resolver::Signature;

    fn fold<O: BinaryOperator>(operator: &O, values: Vec<Value>) -> Result<Value, OperationError> {
        values
            .into_iter()
            .try_fold(Value::Null, |state, value| operator.apply(state, value))
    }

    #[test]
    fn test_sum() {
        assert_eq!(
            fold(&Sum, vec![Value::Long(1), Value::Long(2), Value::Long(3)]).unwrap(),
            Value::Long(6)
        );
        assert_eq!(
            fold(&Sum, vec![Value::Long(1), Value::Double(0.5)]).unwrap(),
            Value::Double(1.5)
        );
        assert_eq!(
            Sum.apply(Value::Long(i64::MAX), Value::Long(1)).unwrap_err(),
            OperationError::Overflow { operation: "Sum" }
        );
        assert!(Sum.apply(Value::Long(1), Value::from("x")).is_err());
    }

    #[test]
    fn test_null_operands_yield_the_other_side() {
        assert_eq!(Sum.apply(Value::Null, Value::Long(4)).unwrap(), Value::Long(4));
        assert_eq!(Sum.apply(Value::Long(4), Value::Null).unwrap(), Value::Long(4));
        assert_eq!(fold(&Max, vec![]).unwrap(), Value::Null);
    }

    #[test]
    fn test_max_and_min() {
        let values = vec![Value::Long(3), Value::Double(7.5), Value::Long(-1)];
        assert_eq!(fold(&Max, values.clone()).unwrap(), Value::Double(7.5));
        assert_eq!(fold(&Min, values).unwrap(), Value::Long(-1));
        assert_eq!(
            fold(&Max, vec![Value::from("pear"), Value::from("apple")]).unwrap(),
            Value::from("pear")
        );
        assert!(Max.apply(Value::Long(1), Value::from("a")).is_err());
    }

    #[test]
    fn test_string_and_collection_concat() {
        let concat = StringConcat {
            separator: "-".into(),
        };
        assert_eq!(
            fold(&concat, vec![Value::from("a"), Value::from("b"), Value::from("c")]).unwrap(),
            Value::from("a-b-c")
        );
        assert!(concat.apply(Value::from("a"), Value::Long(1)).is_err());

        assert_eq!(
            CollectionConcat
                .apply(
                    Value::List(vec![Value::Long(1)]),
                    Value::List(vec![Value::Long(2)])
                )
                .unwrap(),
            Value::List(vec![Value::Long(1), Value::Long(2)])
        );
    }

    #[test]
    fn test_declared_signatures() {
        let catalog = OperationCatalog::builtin();
        let shape = catalog.resolver().resolve_shape(&Sum).unwrap();
        assert_eq!(shape.input.to_string(), "(Number, Number)");
        assert_eq!(shape.output, Signature::single("Number"));
    }
}
