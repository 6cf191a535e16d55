//! Leaf functions.

use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::string::ToString as _;

use opchain_resolver::{Capability, Operation};
use opchain_types::{Nominal, TypeDescriptor, Value};

use crate::catalog::{fields, no_fields, Catalogued, OperationCatalog};
use crate::errors::{DecodeError, OperationError};
use crate::operation::{pair, Function};

macro_rules! function_operation {
    ($name:ident) => {
        impl Nominal for $name {
            const TYPE_NAME: &'static str = stringify!($name);
        }

        impl Operation for $name {
            fn type_descriptor(&self) -> TypeDescriptor {
                TypeDescriptor::of::<Self>()
            }

            fn capability(&self) -> Capability {
                Capability::Function
            }
        }
    };
}

/// Returns its input. Generic over its input type, so its signature stays unresolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

function_operation!(Identity);

impl Catalogued for Identity {
    const DECLARATION: &'static str = "class Identity<T> implements Function<T, T>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        no_fields(Self::TYPE_NAME, document)?;
        Ok(Identity)
    }
}

impl Function for Identity {
    fn apply(&self, input: Value) -> Result<Value, OperationError> {
        Ok(input)
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME })
    }
}

/// Text rendering of the input. Null stays null.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToString;

function_operation!(ToString);

impl Catalogued for ToString {
    const DECLARATION: &'static str = "class ToString implements Function<Object, String>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        no_fields(Self::TYPE_NAME, document)?;
        Ok(ToString)
    }
}

impl Function for ToString {
    fn apply(&self, input: Value) -> Result<Value, OperationError> {
        Ok(match input {
            Value::Null => Value::Null,
            Value::String(text) => Value::String(text),
            other => Value::String(other.render()),
        })
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME })
    }
}

/// Converts numbers, numeric strings and booleans to a long. Doubles are truncated.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToLong;

function_operation!(ToLong);

impl Catalogued for ToLong {
    const DECLARATION: &'static str = "class ToLong implements Function<Object, Long>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        no_fields(Self::TYPE_NAME, document)?;
        Ok(ToLong)
    }
}

fn truncate(operation: &'static str, value: f64) -> Result<i64, OperationError> {
    let truncated = value.trunc();
    if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(OperationError::Overflow { operation });
    }
    Ok(truncated as i64)
}

impl Function for ToLong {
    fn apply(&self, input: Value) -> Result<Value, OperationError> {
        let n = match &input {
            Value::Null => return Ok(Value::Null),
            Value::Long(n) => *n,
            Value::Double(d) => truncate(Self::TYPE_NAME, *d)?,
            Value::Bool(b) => i64::from(*b),
            Value::String(text) => {
                let text = text.trim();
                match text.parse::<i64>() {
                    Ok(n) => n,
                    Err(_) => match text.parse::<f64>() {
                        Ok(d) => truncate(Self::TYPE_NAME, d)?,
                        Err(_) => {
                            return Err(OperationError::Unsupported {
                                operation: Self::TYPE_NAME,
                                message: format!("`{text}` is not a number"),
                            })
                        }
                    },
                }
            }
            other => return Err(OperationError::type_mismatch(Self::TYPE_NAME, "a number", other)),
        };
        Ok(Value::Long(n))
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME })
    }
}

/// Multiplies a number by a constant factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultiplyBy {
    #[serde(default = "default_factor")]
    pub by: i64,
}

fn default_factor() -> i64 {
    1
}

function_operation!(MultiplyBy);

impl Catalogued for MultiplyBy {
    const DECLARATION: &'static str = "class MultiplyBy implements Function<Number, Number>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        fields(Self::TYPE_NAME, document)
    }
}

impl Function for MultiplyBy {
    fn apply(&self, input: Value) -> Result<Value, OperationError> {
        match input {
            Value::Null => Ok(Value::Null),
            Value::Long(n) => n
                .checked_mul(self.by)
                .map(Value::Long)
                .ok_or(OperationError::Overflow {
                    operation: Self::TYPE_NAME,
                }),
            Value::Double(d) => {
                let product = d * self.by as f64;
                if product.is_finite() {
                    Ok(Value::Double(product))
                } else {
                    Err(OperationError::Overflow {
                        operation: Self::TYPE_NAME,
                    })
                }
            }
            other => Err(OperationError::type_mismatch(Self::TYPE_NAME, "a number", &other)),
        }
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME, "by": self.by })
    }
}

/// Wraps its input in a list: null is empty, a list is unchanged, anything else is a
/// singleton. Bytes are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToIterable;

function_operation!(ToIterable);

impl Catalogued for ToIterable {
    const DECLARATION: &'static str = "class ToIterable implements Function<Object, Iterable<Object>>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        no_fields(Self::TYPE_NAME, document)?;
        Ok(ToIterable)
    }
}

impl Function for ToIterable {
    fn apply(&self, input: Value) -> Result<Value, OperationError> {
        match input {
            Value::Null => Ok(Value::List(Vec::new())),
            Value::List(items) => Ok(Value::List(items)),
            Value::Bytes(_) => Err(OperationError::Unsupported {
                operation: Self::TYPE_NAME,
                message: "byte arrays cannot be converted to a list".into(),
            }),
            other => Ok(Value::List(vec![other])),
        }
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NestedFunction {
    function: serde_json::Value,
}

/// Applies a nested function to every item of a list.
#[derive(Debug)]
pub struct IterableFunction {
    function: Box<dyn Function>,
}

function_operation!(IterableFunction);

impl IterableFunction {
    pub fn new(function: Box<dyn Function>) -> Self {
        Self { function }
    }
}

impl Catalogued for IterableFunction {
    const DECLARATION: &'static str =
        "class IterableFunction implements Function<Iterable<Object>, List<Object>>";

    fn decode(catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        let NestedFunction { function } = fields(Self::TYPE_NAME, document)?;
        Ok(Self::new(catalog.decode_function(&function)?))
    }
}

impl Function for IterableFunction {
    fn apply(&self, input: Value) -> Result<Value, OperationError> {
        match input {
            Value::Null => Ok(Value::Null),
            Value::List(items) => items
                .into_iter()
                .map(|item| self.function.apply(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            other => Err(OperationError::type_mismatch(Self::TYPE_NAME, "a list", &other)),
        }
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME, "function": self.function.to_document() })
    }
}

/// Applies a nested function to every value of a map; keys are kept.
#[derive(Debug)]
pub struct FunctionMap {
    function: Box<dyn Function>,
}

function_operation!(FunctionMap);

impl FunctionMap {
    pub fn new(function: Box<dyn Function>) -> Self {
        Self { function }
    }
}

impl Catalogued for FunctionMap {
    const DECLARATION: &'static str =
        "class FunctionMap implements Function<Map<Object, Object>, Map<Object, Object>>";

    fn decode(catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        let NestedFunction { function } = fields(Self::TYPE_NAME, document)?;
        Ok(Self::new(catalog.decode_function(&function)?))
    }
}

impl Function for FunctionMap {
    fn apply(&self, input: Value) -> Result<Value, OperationError> {
        match input {
            Value::Null => Ok(Value::Null),
            Value::Map(entries) => entries
                .into_iter()
                .map(|(key, value)| Ok((key, self.function.apply(value)?)))
                .collect::<Result<BTreeMap<_, _>, OperationError>>()
                .map(Value::Map),
            other => Err(OperationError::type_mismatch(Self::TYPE_NAME, "a map", &other)),
        }
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME, "function": self.function.to_document() })
    }
}

fn default_separator() -> String {
    ",".into()
}

/// Joins the text of two slots with a separator. A null slot yields the other slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Concat {
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Default for Concat {
    fn default() -> Self {
        Self {
            separator: default_separator(),
        }
    }
}

function_operation!(Concat);

impl Catalogued for Concat {
    const DECLARATION: &'static str = "class Concat implements Function2<Object, Object, String>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        fields(Self::TYPE_NAME, document)
    }
}

impl Function for Concat {
    fn apply(&self, input: Value) -> Result<Value, OperationError> {
        let (first, second) = pair(Self::TYPE_NAME, &input)?;
        Ok(match (first, second) {
            (Value::Null, Value::Null) => Value::Null,
            (Value::Null, other) | (other, Value::Null) => Value::String(other.render()),
            (first, second) => Value::String(format!("{}{}{}", first.render(), self.separator, second.render())),
        })
    }

    fn to_document(&self) -> serde_json::Value {
        json!({ "kind": Self::TYPE_NAME, "separator": self.separator })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct CsvFields {
    #[serde(default)]
    header: Vec<String>,
    #[serde(default)]
    first_row: usize,
    #[serde(default = "default_delimiter")]
    delimiter: char,
    #[serde(default = "default_quote_char")]
    quote_char: char,
    #[serde(default)]
    quoted: bool,
}

fn default_delimiter() -> char {
    ','
}

fn default_quote_char() -> char {
    '"'
}

/// Parses CSV lines into maps keyed by `header`.
///
/// Each input line gives at most one map. The first `firstRow` lines are skipped and
/// blank lines give none. Fields beyond the header are ignored and
/// missing trailing fields are left out of the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvLinesToMaps {
    header: Vec<String>,
    first_row: usize,
    delimiter: u8,
    quote_char: u8,
    quoted: bool,
}

function_operation!(CsvLinesToMaps);

impl CsvLinesToMaps {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            first_row: 0,
            delimiter: b',',
            quote_char: b'"',
            quoted: false,
        }
    }

    pub fn first_row(mut self, first_row: usize) -> Self {
        self.first_row = first_row;
        self
    }

    pub fn quoted(mut self, quote_char: u8) -> Self {
        self.quoted = true;
        self.quote_char = quote_char;
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Skip the first `first_row` lines, then parse every remaining line on its own.
    /// Blank lines yield no map.
    fn parse<'a, I>(&self, lines: I) -> Result<Vec<Value>, OperationError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut rows = Vec::new();
        for (index, line) in lines.into_iter().enumerate().skip(self.first_row) {
            if let Some(row) = self.parse_line(line)? {
                rows.push(row);
            } else {
                tracing::trace!(line = index, "blank csv line");
            }
        }
        Ok(rows)
    }

    fn parse_line(&self, line: &str) -> Result<Option<Value>, OperationError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.quote_char)
            .quoting(self.quoted)
            .from_reader(line.as_bytes());

        let Some(record) = reader.records().next() else {
            return Ok(None);
        };
        let record = record.map_err(|err| OperationError::Csv {
            message: err.to_string(),
        })?;
        let row: BTreeMap<String, Value> = self
            .header
            .iter()
            .zip(record.iter())
            .map(|(name, field)| (name.clone(), Value::String(field.to_string())))
            .collect();
        Ok(Some(Value::Map(row)))
    }
}

fn ascii_byte(name: &str, c: char) -> Result<u8, DecodeError> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| DecodeError::invalid(CsvLinesToMaps::TYPE_NAME, format!("{name} must be ASCII, got `{c}`")))
}

impl Catalogued for CsvLinesToMaps {
    const DECLARATION: &'static str =
        "class CsvLinesToMaps implements Function<Iterable<String>, List<Map<String, String>>>";

    fn decode(_catalog: &OperationCatalog, document: &serde_json::Value) -> Result<Self, DecodeError> {
        let fields: CsvFields = fields(Self::TYPE_NAME, document)?;
        Ok(Self {
            header: fields.header,
            first_row: fields.first_row,
            delimiter: ascii_byte("delimiter", fields.delimiter)?,
            quote_char: ascii_byte("quoteChar", fields.quote_char)?,
            quoted: fields.quoted,
        })
    }
}

impl Function for CsvLinesToMaps {
    fn apply(&self, input: Value) -> Result<Value, OperationError> {
        let lines: Vec<&str> = match &input {
            Value::Null => return Ok(Value::Null),
            Value::String(text) => text.lines().collect(),
            Value::List(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .ok_or_else(|| OperationError::type_mismatch(Self::TYPE_NAME, "a list of strings", item))
                })
                .collect::<Result<_, _>>()?,
            other => return Err(OperationError::type_mismatch(Self::TYPE_NAME, "a list of strings", other)),
        };
        self.parse(lines).map(Value::List)
    }

    fn to_document(&self) -> serde_json::Value {
        json!({
            "kind": Self::TYPE_NAME,
            "header": self.header,
            "firstRow": self.first_row,
            "delimiter": char::from(self.delimiter).to_string(),
            "quoteChar": char::from(self.quote_char).to_string(),
            "quoted": self.quoted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::ToString as ToText;
    use opchain_resolver::Signature;

    fn pair_of(a: Value, b: Value) -> Value {
        Value::List(vec![a, b])
    }

    #[test]
    fn test_to_string_and_to_long() {
        assert_eq!(ToText.apply(Value::Long(7)).unwrap(), Value::from("7"));
        assert_eq!(ToText.apply(Value::Null).unwrap(), Value::Null);

        assert_eq!(ToLong.apply(Value::from(" 42 ")).unwrap(), Value::Long(42));
        assert_eq!(ToLong.apply(Value::Double(-2.9)).unwrap(), Value::Long(-2));
        assert_eq!(ToLong.apply(Value::from("2.5")).unwrap(), Value::Long(2));
        assert!(matches!(
            ToLong.apply(Value::from("abc")),
            Err(OperationError::Unsupported { .. })
        ));
        assert!(matches!(
            ToLong.apply(Value::Double(f64::INFINITY)),
            Err(OperationError::Overflow { .. })
        ));
    }

    #[test]
    fn test_multiply_by() {
        let double = MultiplyBy { by: 2 };
        assert_eq!(double.apply(Value::Long(21)).unwrap(), Value::Long(42));
        assert_eq!(double.apply(Value::Double(1.5)).unwrap(), Value::Double(3.0));
        assert_eq!(
            double.apply(Value::Long(i64::MAX)).unwrap_err(),
            OperationError::Overflow { operation: "MultiplyBy" }
        );
        assert_eq!(
            double.apply(Value::Double(f64::MAX)).unwrap_err(),
            OperationError::Overflow { operation: "MultiplyBy" }
        );
        assert!(double.apply(Value::from("x")).is_err());
    }

    #[test]
    fn test_to_iterable() {
        assert_eq!(ToIterable.apply(Value::Null).unwrap(), Value::List(vec![]));
        assert_eq!(
            ToIterable.apply(Value::Long(1)).unwrap(),
            Value::List(vec![Value::Long(1)])
        );
        let list = Value::List(vec![Value::Long(1), Value::Long(2)]);
        assert_eq!(ToIterable.apply(list.clone()).unwrap(), list);
        assert!(matches!(
            ToIterable.apply(Value::Bytes(vec![1])),
            Err(OperationError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_nested_functions() {
        let doubled = IterableFunction::new(Box::new(MultiplyBy { by: 2 }));
        assert_eq!(
            doubled
                .apply(Value::List(vec![Value::Long(1), Value::Long(2)]))
                .unwrap(),
            Value::List(vec![Value::Long(2), Value::Long(4)])
        );

        let mapped = FunctionMap::new(Box::new(ToLong));
        let input = Value::Map(BTreeMap::from([(String::from("a"), Value::from("5"))]));
        assert_eq!(
            mapped.apply(input).unwrap(),
            Value::Map(BTreeMap::from([(String::from("a"), Value::Long(5))]))
        );
    }

    #[test]
    fn test_concat() {
        let concat = Concat::default();
        assert_eq!(
            concat.apply(pair_of(Value::from("a"), Value::Long(1))).unwrap(),
            Value::from("a,1")
        );
        assert_eq!(
            concat.apply(pair_of(Value::Null, Value::from("b"))).unwrap(),
            Value::from("b")
        );
        assert_eq!(concat.apply(pair_of(Value::Null, Value::Null)).unwrap(), Value::Null);
        assert!(concat.apply(Value::from("a")).is_err());
    }

    #[test]
    fn test_csv_lines_to_maps() {
        let csv = CsvLinesToMaps::new(vec!["name".into(), "age".into()]).first_row(1);
        let lines = Value::List(vec![
            Value::from("name,age"),
            Value::from("ann,31,extra"),
            Value::from("bob"),
        ]);
        let rows = csv.apply(lines).unwrap();
        let rows = rows.as_list().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_map().unwrap()["age"], Value::from("31"));
        assert_eq!(rows[0].as_map().unwrap().len(), 2);
        assert_eq!(rows[1].as_map().unwrap().len(), 1);
        assert_eq!(csv.apply(Value::Null).unwrap(), Value::Null);
    }

    fn column(rows: &Value, name: &str) -> Vec<Value> {
        rows.as_list()
            .unwrap()
            .iter()
            .map(|row| row.as_map().unwrap()[name].clone())
            .collect()
    }

    #[test]
    fn test_csv_first_row_counts_input_lines() {
        let csv = CsvLinesToMaps::new(vec!["h".into()]).first_row(1);
        let rows = csv
            .apply(Value::List(vec![Value::from(""), Value::from("skipme"), Value::from("keep")]))
            .unwrap();
        assert_eq!(column(&rows, "h"), vec![Value::from("skipme"), Value::from("keep")]);

        let rows = CsvLinesToMaps::new(vec!["h".into()])
            .apply(Value::List(vec![Value::from("a"), Value::from(""), Value::from("b")]))
            .unwrap();
        assert_eq!(column(&rows, "h"), vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn test_csv_unbalanced_quote_stays_on_its_line() {
        let csv = CsvLinesToMaps::new(vec!["a".into(), "b".into()]).quoted(b'"');
        let rows = csv
            .apply(Value::List(vec![Value::from("\"x,1"), Value::from("y,2"), Value::from("z,3")]))
            .unwrap();
        assert_eq!(rows.as_list().unwrap().len(), 3);
        assert_eq!(column(&rows, "a"), vec![Value::from("x,1"), Value::from("y"), Value::from("z")]);
        assert_eq!(rows.as_list().unwrap()[0].as_map().unwrap().len(), 1);
    }

    #[test]
    fn test_csv_text_input_is_split_into_lines() {
        let rows = CsvLinesToMaps::new(vec!["n".into()])
            .first_row(1)
            .apply(Value::from("n\n1\n2"))
            .unwrap();
        assert_eq!(column(&rows, "n"), vec![Value::from("1"), Value::from("2")]);
    }

    #[test]
    fn test_csv_quoted_fields() {
        let csv = CsvLinesToMaps::new(vec!["a".into(), "b".into()])
            .delimiter(b'|')
            .quoted(b'\'');
        let rows = csv.apply(Value::from("'x|y'|z")).unwrap();
        let row = rows.as_list().unwrap()[0].as_map().unwrap().clone();
        assert_eq!(row["a"], Value::from("x|y"));
        assert_eq!(row["b"], Value::from("z"));
    }

    #[test]
    fn test_declared_signatures() {
        let catalog = OperationCatalog::builtin();
        let resolver = catalog.resolver();
        let shape = resolver.resolve_shape(&Identity).unwrap();
        assert!(shape.input.is_unknown() && shape.output.is_unknown());

        let shape = resolver.resolve_shape(&Concat::default()).unwrap();
        assert_eq!(shape.input.to_string(), "(Object, Object)");
        assert_eq!(shape.output, Signature::single("String"));
    }
}
