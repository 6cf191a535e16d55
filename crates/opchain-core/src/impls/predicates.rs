//! Leaf predicates.

use serde::Deserialize;
use serde_json::json;
use std::cmp::Ordering;
use std::sync::Arc;

use opchain_resolver::{Capability, Operation};
use opchain_types::{parse_descriptor, Nominal, TypeDescriptor, TypeRegistry, Value};

use crate::catalog::{fields, no_fields, Catalogued, OperationCatalog};
use crate::errors::DecodeError;
use crate::operation::{pair, Predicate};

macro_rules! predicate_operation {
    ($name:ident) => {
        impl Nominal for $name {
            const TYPE_NAME: &'static str = stringify!($name);
        }

        impl Operation for $name {
            fn type_descriptor(&self) -> TypeDescriptor {
                TypeDescriptor::of::<Self>()
            }

            fn capability(&self) -> Capability {
                Capability::Predicate
            }
        }
    };
}

/// True for any non-null value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exists;

predicate_operation!(Exists);

impl Catalogued for Exists {
    const DECLARATION: &'static str = "class Exists implements Predicate<Object>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        no_fields(Self::TYPE_NAME, document)?;
        Ok(Exists)
    }
}

impl Predicate for Exists {
    fn test(&self, input: &Value) -> bool {
        !input.is_null()
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME })
    }
}

/// Equality with a fixed value. Numbers compare by value across `Long` and `Double`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IsEqual {
    pub value: Value,
}

predicate_operation!(IsEqual);

impl Catalogued for IsEqual {
    const DECLARATION: &'static str = "class IsEqual implements Predicate<Object>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        fields(Self::TYPE_NAME, document)
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b || a.compare(b) == Some(Ordering::Equal)
}

impl Predicate for IsEqual {
    fn test(&self, input: &Value) -> bool {
        values_equal(input, &self.value)
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME, "value": self.value })
    }
}

macro_rules! threshold_predicate {
    ($name:ident, $declaration:literal, $wanted:path, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct $name {
            pub value: Value,
            #[serde(default, rename = "orEqualTo")]
            pub or_equal_to: bool,
        }

        predicate_operation!($name);

        impl Catalogued for $name {
            const DECLARATION: &'static str = $declaration;

            fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
                fields(Self::TYPE_NAME, document)
            }
        }

        impl Predicate for $name {
            fn test(&self, input: &Value) -> bool {
                match input.compare(&self.value) {
                    Some(Ordering::Equal) => self.or_equal_to,
                    Some(ordering) => ordering == $wanted,
                    None => false,
                }
            }

            fn to_document(&self) -> serde_json::Value {
                json!({
                    "kind": Self::TYPE_NAME,
                    "value": self.value,
                    "orEqualTo": self.or_equal_to,
                })
            }
        }
    };
}

threshold_predicate!(
    IsMoreThan,
    "class IsMoreThan implements Predicate<Comparable<Object>>",
    Ordering::Greater,
    "True when the input compares greater than `value` (or equal, with `orEqualTo`)."
);

threshold_predicate!(
    IsLessThan,
    "class IsLessThan implements Predicate<Comparable<Object>>",
    Ordering::Less,
    "True when the input compares less than `value` (or equal, with `orEqualTo`)."
);

/// Whole-string regular expression match. Non-string inputs are false.
#[derive(Debug, Clone)]
pub struct Regex {
    pattern: String,
    compiled: regex::Regex,
}

predicate_operation!(Regex);

impl Regex {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let compiled = regex::Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self {
            pattern: pattern.to_string(),
            compiled,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RegexFields {
    value: String,
}

impl Catalogued for Regex {
    const DECLARATION: &'static str = "class Regex implements Predicate<String>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        let RegexFields { value } = fields(Self::TYPE_NAME, document)?;
        Regex::new(&value).map_err(|err| DecodeError::invalid(Self::TYPE_NAME, err.to_string()))
    }
}

impl Predicate for Regex {
    fn test(&self, input: &Value) -> bool {
        input.as_str().is_some_and(|text| self.compiled.is_match(text))
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME, "value": self.pattern })
    }
}

/// True when a list input contains `value`, or a map input has it as a value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionContains {
    pub value: Value,
}

predicate_operation!(CollectionContains);

impl Catalogued for CollectionContains {
    const DECLARATION: &'static str = "class CollectionContains implements Predicate<Collection<Object>>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        fields(Self::TYPE_NAME, document)
    }
}

impl Predicate for CollectionContains {
    fn test(&self, input: &Value) -> bool {
        match input {
            Value::List(items) => items.iter().any(|item| values_equal(item, &self.value)),
            Value::Map(entries) => entries.values().any(|item| values_equal(item, &self.value)),
            _ => false,
        }
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME, "value": self.value })
    }
}

/// True when the runtime type of the input is a subtype of a declared type.
#[derive(Debug, Clone)]
pub struct IsA {
    ty: TypeDescriptor,
    registry: Arc<TypeRegistry>,
}

predicate_operation!(IsA);

impl IsA {
    pub fn new(ty: TypeDescriptor, registry: Arc<TypeRegistry>) -> Self {
        Self { ty, registry }
    }

    pub fn target(&self) -> &TypeDescriptor {
        &self.ty
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct IsAFields {
    #[serde(rename = "type")]
    ty: String,
}

impl Catalogued for IsA {
    const DECLARATION: &'static str = "class IsA implements Predicate<Object>";

    fn decode(catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        let IsAFields { ty } = fields(Self::TYPE_NAME, document)?;
        let ty = parse_descriptor(&ty).map_err(|err| DecodeError::invalid(Self::TYPE_NAME, err.to_string()))?;
        if !catalog.registry().contains(&ty) {
            return Err(DecodeError::invalid(
                Self::TYPE_NAME,
                format!("type `{ty}` is not declared"),
            ));
        }
        Ok(IsA::new(ty, Arc::clone(catalog.registry())))
    }
}

impl Predicate for IsA {
    fn test(&self, input: &Value) -> bool {
        input
            .descriptor()
            .is_some_and(|actual| self.registry.is_subtype(&actual, &self.ty))
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME, "type": self.ty.to_string() })
    }
}

/// Two-slot equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct AreEqual;

predicate_operation!(AreEqual);

impl Catalogued for AreEqual {
    const DECLARATION: &'static str = "class AreEqual implements Predicate2<Object, Object>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        no_fields(Self::TYPE_NAME, document)?;
        Ok(AreEqual)
    }
}

impl Predicate for AreEqual {
    fn test(&self, input: &Value) -> bool {
        pair(Self::TYPE_NAME, input).is_ok_and(|(x, y)| values_equal(x, y))
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME })
    }
}

/// True when the first slot compares greater than the second.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsXMoreThanY;

predicate_operation!(IsXMoreThanY);

impl Catalogued for IsXMoreThanY {
    const DECLARATION: &'static str =
        "class IsXMoreThanY implements Predicate2<Comparable<Object>, Comparable<Object>>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        no_fields(Self::TYPE_NAME, document)?;
        Ok(IsXMoreThanY)
    }
}

impl Predicate for IsXMoreThanY {
    fn test(&self, input: &Value) -> bool {
        pair(Self::TYPE_NAME, input).is_ok_and(|(x, y)| x.compare(y) == Some(Ordering::Greater))
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME })
    }
}
