//! Operation catalog: decodes operation documents by their `kind` tag.
//!
//! Documents are JSON objects such as `{"kind": "Regex", "value": "[0-9]+"}`. Each
//! capability has its own table of decoders; composites and adapters decode their
//! members recursively through the same catalog.
//!
//! The catalog owns the [`TypeRegistry`] that every registered operation declares its
//! type into, so signatures of decoded operations resolve against it.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use opchain_resolver::{Capability, SignatureResolver};
use opchain_types::{Nominal, TypeRegistry};

use crate::composite::{And, FunctionComposite, Not, Or};
use crate::errors::DecodeError;
use crate::impls::{binary_operators, functions, predicates};
use crate::operation::{BinaryOperator, Function, Predicate};
use crate::tuple::{record_signature, TupleAdaptedBinaryOperator, TupleAdaptedFunction, TupleAdaptedPredicate};

/// An operation the catalog can decode.
pub trait Catalogued: Nominal + Sized {
    /// Type declaration registered alongside the decoder, e.g.
    /// `class Regex implements Predicate<String>`.
    const DECLARATION: &'static str;

    fn decode(catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError>;
}

/// Deserialize the fields of `document` other than `kind`.
pub(crate) fn fields<T: DeserializeOwned>(kind: &str, document: &serde_json::Value) -> Result<T, DecodeError> {
    let mut object = as_object(document)?.clone();
    object.remove("kind");
    serde_json::from_value(serde_json::Value::Object(object)).map_err(|err| DecodeError::invalid(kind, err.to_string()))
}

/// Reject any field other than `kind`.
pub(crate) fn no_fields(kind: &str, document: &serde_json::Value) -> Result<(), DecodeError> {
    match as_object(document)?.keys().find(|key| *key != "kind") {
        Some(key) => Err(DecodeError::invalid(kind, format!("unknown field `{key}`"))),
        None => Ok(()),
    }
}

fn as_object(document: &serde_json::Value) -> Result<&serde_json::Map<String, serde_json::Value>, DecodeError> {
    document.as_object().ok_or_else(|| DecodeError::NotAnObject {
        found: json_kind(document).to_string(),
    })
}

fn json_kind(document: &serde_json::Value) -> &'static str {
    match document {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// The `kind` tag of an operation document.
pub fn kind_of(document: &serde_json::Value) -> Result<&str, DecodeError> {
    as_object(document)?
        .get("kind")
        .and_then(serde_json::Value::as_str)
        .ok_or(DecodeError::MissingKind)
}

type Decoder<T> = fn(&OperationCatalog, &serde_json::Value) -> Result<Box<T>, DecodeError>;

struct Entry<T: ?Sized> {
    declaration: &'static str,
    decode: Decoder<T>,
}

impl<T: ?Sized> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            declaration: self.declaration,
            decode: self.decode,
        }
    }
}

fn decode_function<T: Catalogued + Function + 'static>(
    catalog: &OperationCatalog,
    document: &serde_json::Value,
) -> Result<Box<dyn Function>, DecodeError> {
    Ok(Box::new(T::decode(catalog, document)?))
}

fn decode_predicate<T: Catalogued + Predicate + 'static>(
    catalog: &OperationCatalog,
    document: &serde_json::Value,
) -> Result<Box<dyn Predicate>, DecodeError> {
    Ok(Box::new(T::decode(catalog, document)?))
}

fn decode_operator<T: Catalogued + BinaryOperator + 'static>(
    catalog: &OperationCatalog,
    document: &serde_json::Value,
) -> Result<Box<dyn BinaryOperator>, DecodeError> {
    Ok(Box::new(T::decode(catalog, document)?))
}

/// One registered operation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindInfo {
    pub capability: Capability,
    pub kind: &'static str,
    pub declaration: &'static str,
}

/// Registered operation kinds and the type registry they declare into.
#[derive(Clone)]
pub struct OperationCatalog {
    registry: Arc<TypeRegistry>,
    functions: BTreeMap<&'static str, Entry<dyn Function>>,
    predicates: BTreeMap<&'static str, Entry<dyn Predicate>>,
    operators: BTreeMap<&'static str, Entry<dyn BinaryOperator>>,
}

impl OperationCatalog {
    /// Catalog with the builtin hierarchy declared and no operations registered.
    pub fn empty() -> Self {
        Self {
            registry: Arc::new(TypeRegistry::with_builtins()),
            functions: BTreeMap::new(),
            predicates: BTreeMap::new(),
            operators: BTreeMap::new(),
        }
    }

    /// Catalog with every operation shipped in this crate.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog
            .register_builtins()
            .expect("builtin operation declarations are valid");
        catalog
    }

    fn register_builtins(&mut self) -> Result<(), DecodeError> {
        self.register_function::<FunctionComposite>()?;
        self.register_function::<TupleAdaptedFunction>()?;
        self.register_function::<functions::Identity>()?;
        self.register_function::<functions::ToString>()?;
        self.register_function::<functions::ToLong>()?;
        self.register_function::<functions::MultiplyBy>()?;
        self.register_function::<functions::ToIterable>()?;
        self.register_function::<functions::IterableFunction>()?;
        self.register_function::<functions::FunctionMap>()?;
        self.register_function::<functions::Concat>()?;
        self.register_function::<functions::CsvLinesToMaps>()?;

        self.register_predicate::<And>()?;
        self.register_predicate::<Or>()?;
        self.register_predicate::<Not>()?;
        self.register_predicate::<TupleAdaptedPredicate>()?;
        self.register_predicate::<predicates::Exists>()?;
        self.register_predicate::<predicates::IsEqual>()?;
        self.register_predicate::<predicates::IsMoreThan>()?;
        self.register_predicate::<predicates::IsLessThan>()?;
        self.register_predicate::<predicates::Regex>()?;
        self.register_predicate::<predicates::CollectionContains>()?;
        self.register_predicate::<predicates::IsA>()?;
        self.register_predicate::<predicates::AreEqual>()?;
        self.register_predicate::<predicates::IsXMoreThanY>()?;

        self.register_operator::<TupleAdaptedBinaryOperator>()?;
        self.register_operator::<binary_operators::Sum>()?;
        self.register_operator::<binary_operators::Max>()?;
        self.register_operator::<binary_operators::Min>()?;
        self.register_operator::<binary_operators::StringConcat>()?;
        self.register_operator::<binary_operators::CollectionConcat>()?;
        Ok(())
    }

    fn check_new(&self, kind: &'static str) -> Result<(), DecodeError> {
        if self.functions.contains_key(kind) || self.predicates.contains_key(kind) || self.operators.contains_key(kind)
        {
            return Err(DecodeError::DuplicateKind { kind: kind.to_string() });
        }
        Ok(())
    }

    pub fn register_function<T: Catalogued + Function + 'static>(&mut self) -> Result<(), DecodeError> {
        self.check_new(T::TYPE_NAME)?;
        self.registry.declare_str(T::DECLARATION)?;
        self.functions.insert(
            T::TYPE_NAME,
            Entry {
                declaration: T::DECLARATION,
                decode: decode_function::<T>,
            },
        );
        Ok(())
    }

    pub fn register_predicate<T: Catalogued + Predicate + 'static>(&mut self) -> Result<(), DecodeError> {
        self.check_new(T::TYPE_NAME)?;
        self.registry.declare_str(T::DECLARATION)?;
        self.predicates.insert(
            T::TYPE_NAME,
            Entry {
                declaration: T::DECLARATION,
                decode: decode_predicate::<T>,
            },
        );
        Ok(())
    }

    pub fn register_operator<T: Catalogued + BinaryOperator + 'static>(&mut self) -> Result<(), DecodeError> {
        self.check_new(T::TYPE_NAME)?;
        self.registry.declare_str(T::DECLARATION)?;
        self.operators.insert(
            T::TYPE_NAME,
            Entry {
                declaration: T::DECLARATION,
                decode: decode_operator::<T>,
            },
        );
        Ok(())
    }

    pub fn decode_function(&self, document: &serde_json::Value) -> Result<Box<dyn Function>, DecodeError> {
        let kind = kind_of(document)?;
        let entry = self.functions.get(kind).ok_or_else(|| DecodeError::UnknownKind {
            capability: Capability::Function,
            kind: kind.to_string(),
        })?;
        (entry.decode)(self, document)
    }

    pub fn decode_predicate(&self, document: &serde_json::Value) -> Result<Box<dyn Predicate>, DecodeError> {
        let kind = kind_of(document)?;
        let entry = self.predicates.get(kind).ok_or_else(|| DecodeError::UnknownKind {
            capability: Capability::Predicate,
            kind: kind.to_string(),
        })?;
        (entry.decode)(self, document)
    }

    pub fn decode_operator(&self, document: &serde_json::Value) -> Result<Box<dyn BinaryOperator>, DecodeError> {
        let kind = kind_of(document)?;
        let entry = self.operators.get(kind).ok_or_else(|| DecodeError::UnknownKind {
            capability: Capability::BinaryOperator,
            kind: kind.to_string(),
        })?;
        (entry.decode)(self, document)
    }

    /// Capability of a registered kind.
    pub fn capability_of(&self, kind: &str) -> Option<Capability> {
        if self.functions.contains_key(kind) {
            Some(Capability::Function)
        } else if self.predicates.contains_key(kind) {
            Some(Capability::Predicate)
        } else if self.operators.contains_key(kind) {
            Some(Capability::BinaryOperator)
        } else {
            None
        }
    }

    /// Every registered kind, grouped by capability and sorted by name.
    pub fn kinds(&self) -> Vec<KindInfo> {
        fn list<T: ?Sized>(capability: Capability, entries: &BTreeMap<&'static str, Entry<T>>) -> Vec<KindInfo> {
            entries
                .iter()
                .map(|(&kind, entry)| KindInfo {
                    capability,
                    kind,
                    declaration: entry.declaration,
                })
                .collect()
        }

        let mut kinds = list(Capability::Function, &self.functions);
        kinds.extend(list(Capability::Predicate, &self.predicates));
        kinds.extend(list(Capability::BinaryOperator, &self.operators));
        kinds
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> SignatureResolver<'_> {
        SignatureResolver::new(&self.registry)
    }

    /// Copy of this catalog whose registry additionally declares `declarations`.
    ///
    /// The receiver's registry is left untouched.
    pub fn fork_with_types<S: AsRef<str>>(&self, declarations: &[S]) -> Result<Self, DecodeError> {
        let registry = self.registry.snapshot();
        registry.declare_all(declarations.iter().map(AsRef::as_ref))?;
        Ok(Self {
            registry: Arc::new(registry),
            ..self.clone()
        })
    }
}

impl Default for OperationCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for OperationCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationCatalog")
            .field("functions", &self.functions.len())
            .field("predicates", &self.predicates.len())
            .field("operators", &self.operators.len())
            .field("types", &self.registry.len())
            .finish()
    }
}

// Composites and adapters decode their members through the catalog.

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FunctionList {
    functions: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PredicateList {
    #[serde(default)]
    predicates: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct OptionalPredicate {
    #[serde(default)]
    predicate: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AdaptedFunction {
    function: serde_json::Value,
    selection: Vec<usize>,
    #[serde(default)]
    projection: Vec<usize>,
    record: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AdaptedPredicate {
    predicate: serde_json::Value,
    selection: Vec<usize>,
    record: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AdaptedOperator {
    operator: serde_json::Value,
    selection: Vec<usize>,
    record: Vec<String>,
}

impl Catalogued for FunctionComposite {
    const DECLARATION: &'static str = "class FunctionComposite<I, O> implements Function<I, O>";

    fn decode(catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        let FunctionList { functions } = fields(Self::TYPE_NAME, document)?;
        let functions = functions
            .iter()
            .map(|function| catalog.decode_function(function))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FunctionComposite::build(&catalog.resolver(), functions)?)
    }
}

fn decode_members(
    catalog: &OperationCatalog,
    kind: &str,
    document: &serde_json::Value,
) -> Result<Vec<Box<dyn Predicate>>, DecodeError> {
    let PredicateList { predicates } = fields(kind, document)?;
    predicates
        .iter()
        .map(|predicate| catalog.decode_predicate(predicate))
        .collect()
}

impl Catalogued for And {
    const DECLARATION: &'static str = "class And<I> implements Predicate<I>";

    fn decode(catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        let predicates = decode_members(catalog, Self::TYPE_NAME, document)?;
        Ok(And::build(&catalog.resolver(), predicates)?)
    }
}

impl Catalogued for Or {
    const DECLARATION: &'static str = "class Or<I> implements Predicate<I>";

    fn decode(catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        let predicates = decode_members(catalog, Self::TYPE_NAME, document)?;
        Ok(Or::build(&catalog.resolver(), predicates)?)
    }
}

impl Catalogued for Not {
    const DECLARATION: &'static str = "class Not<I> implements Predicate<I>";

    fn decode(catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        let OptionalPredicate { predicate } = fields(Self::TYPE_NAME, document)?;
        let predicate = predicate
            .map(|predicate| catalog.decode_predicate(&predicate))
            .transpose()?;
        Ok(Not::new(predicate))
    }
}

fn decode_record(kind: &str, record: &[String]) -> Result<opchain_resolver::Signature, DecodeError> {
    record_signature(record).map_err(|err| DecodeError::invalid(kind, err.to_string()))
}

impl Catalogued for TupleAdaptedFunction {
    const DECLARATION: &'static str = "class TupleAdaptedFunction<I, O> implements Function<I, O>";

    fn decode(catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        let fields: AdaptedFunction = fields(Self::TYPE_NAME, document)?;
        let record = decode_record(Self::TYPE_NAME, &fields.record)?;
        let function = catalog.decode_function(&fields.function)?;
        Ok(TupleAdaptedFunction::build(
            &catalog.resolver(),
            function,
            fields.selection,
            fields.projection,
            &record,
        )?)
    }
}

impl Catalogued for TupleAdaptedPredicate {
    const DECLARATION: &'static str = "class TupleAdaptedPredicate<I> implements Predicate<I>";

    fn decode(catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        let fields: AdaptedPredicate = fields(Self::TYPE_NAME, document)?;
        let record = decode_record(Self::TYPE_NAME, &fields.record)?;
        let predicate = catalog.decode_predicate(&fields.predicate)?;
        Ok(TupleAdaptedPredicate::build(
            &catalog.resolver(),
            predicate,
            fields.selection,
            &record,
        )?)
    }
}

impl Catalogued for TupleAdaptedBinaryOperator {
    const DECLARATION: &'static str = "class TupleAdaptedBinaryOperator<T> implements BinaryOperator<T>";

    fn decode(catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        let fields: AdaptedOperator = fields(Self::TYPE_NAME, document)?;
        let record = decode_record(Self::TYPE_NAME, &fields.record)?;
        let operator = catalog.decode_operator(&fields.operator)?;
        Ok(TupleAdaptedBinaryOperator::build(
            &catalog.resolver(),
            operator,
            fields.selection,
            &record,
        )?)
    }
}
