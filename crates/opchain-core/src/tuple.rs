//! Tuple adapters.
//!
//! An adapter wraps an operation so it reads from, and optionally writes to, chosen
//! positions of a positional record. A record travels as a `Value::List` whose width is
//! fixed by the record signature (`Signature::Tuple`) the adapter is built against.
//!
//! Construction validates everything that can be known up front: indices within the
//! record, no repeated output index, index counts matching the wrapped operation's
//! arity, and selected slot types fitting the wrapped operation's input.
//!
//! A single selected index passes the bare value to the wrapped operation; several
//! indices pass a list in selection order.

use serde_json::json;
use std::collections::HashSet;

use opchain_resolver::{
    AssignabilityChecker, Capability, Operation, ResolveError, Shape, Signature, SignatureResolver,
    SlotType,
};
use opchain_types::{builtin, parse_descriptor, Nominal, TypeDescriptor, TypeParseError, Value};

use crate::errors::{CompositionError, OperationError};
use crate::operation::{BinaryOperator, Function, Predicate};

/// Marker for a record slot of unknown type in documents.
pub const UNKNOWN_SLOT: &str = "?";

/// Record signature from a list of type expressions; `?` marks an unknown slot.
///
/// Always a `Signature::Tuple`, including for width 1.
pub fn record_signature<S: AsRef<str>>(types: &[S]) -> Result<Signature, TypeParseError> {
    let slots = types
        .iter()
        .map(|ty| match ty.as_ref().trim() {
            UNKNOWN_SLOT => Ok(SlotType::Unknown),
            expr => parse_descriptor(expr).map(SlotType::Known),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Signature::Tuple(slots.into_iter().collect()))
}

/// Inverse of [`record_signature`].
pub fn record_document(record: &Signature) -> Vec<String> {
    record.slots().iter().map(ToString::to_string).collect()
}

fn record_width(record: &Signature) -> Result<usize, CompositionError> {
    match record {
        Signature::Tuple(slots) => Ok(slots.len()),
        other => Err(CompositionError::UnknownRecordWidth {
            record: other.to_string(),
        }),
    }
}

fn check_in_range(indices: &[usize], width: usize) -> Result<(), CompositionError> {
    match indices.iter().find(|&&index| index >= width) {
        Some(&index) => Err(CompositionError::IndexOutOfRange { index, width }),
        None => Ok(()),
    }
}

fn check_unique(indices: &[usize]) -> Result<(), CompositionError> {
    let mut seen = HashSet::new();
    match indices.iter().find(|&&index| !seen.insert(index)) {
        Some(&index) => Err(CompositionError::DuplicateOutputIndex { index }),
        None => Ok(()),
    }
}

/// The index count must equal the slot count; unknown arity accepts any non-empty mapping.
fn check_mapping_arity(
    side: &'static str,
    signature: &Signature,
    indices: &[usize],
) -> Result<(), CompositionError> {
    let mismatch = match signature.arity() {
        Some(expected) => expected != indices.len(),
        None => indices.is_empty(),
    };
    if mismatch {
        return Err(CompositionError::MappingArity {
            side,
            expected: signature.arity().unwrap_or(1),
            actual: indices.len(),
        });
    }
    Ok(())
}

/// Signature of the selected record slots, shaped like an operation input.
fn selected_signature(record: &Signature, selection: &[usize]) -> Signature {
    Signature::from_slots(
        selection
            .iter()
            .map(|&index| record.slot(index).unwrap_or(SlotType::Unknown)),
    )
}

fn check_fits(
    checker: &AssignabilityChecker<'_>,
    selected: &Signature,
    input: &Signature,
) -> Result<(), CompositionError> {
    let result = checker.check_assignable(selected, input);
    if result.valid {
        return Ok(());
    }
    Err(CompositionError::RecordSlotMismatch {
        reason: format!(
            "selected `{selected}` for input `{input}`: {}",
            result.explanation().unwrap_or_default()
        ),
    })
}

/// Validate a selection over `record` feeding an operation with input `input`.
fn validate_selection(
    checker: &AssignabilityChecker<'_>,
    record: &Signature,
    selection: &[usize],
    input: &Signature,
) -> Result<usize, CompositionError> {
    let width = record_width(record)?;
    check_in_range(selection, width)?;
    check_mapping_arity("input", input, selection)?;
    check_fits(checker, &selected_signature(record, selection), input)?;
    Ok(width)
}

/// Record with the projected slots replaced by the slots of `output`.
fn projected_record(record: &Signature, projection: &[usize], output: &Signature) -> Signature {
    let mut slots: Vec<SlotType> = record.slots().into_iter().collect();
    for (position, &index) in projection.iter().enumerate() {
        if let Some(slot) = slots.get_mut(index) {
            *slot = output.slot(position).unwrap_or(SlotType::Unknown);
        }
    }
    Signature::Tuple(slots.into_iter().collect())
}

fn record_values(input: &Value, width: usize) -> Result<&[Value], OperationError> {
    match input.as_list() {
        Some(values) if values.len() == width => Ok(values),
        Some(values) => Err(OperationError::RecordWidth {
            expected: width,
            actual: values.len().to_string(),
        }),
        None => Err(OperationError::RecordWidth {
            expected: width,
            actual: input.kind_name().to_string(),
        }),
    }
}

fn gather(values: &[Value], selection: &[usize]) -> Value {
    if let [index] = selection {
        return values.get(*index).cloned().unwrap_or_default();
    }
    Value::List(
        selection
            .iter()
            .map(|&index| values.get(index).cloned().unwrap_or_default())
            .collect(),
    )
}

fn scatter(values: &mut [Value], projection: &[usize], output: Value) -> Result<(), OperationError> {
    if let [index] = projection {
        if let Some(slot) = values.get_mut(*index) {
            *slot = output;
        }
        return Ok(());
    }
    match output {
        Value::List(items) if items.len() == projection.len() => {
            for (&index, item) in projection.iter().zip(items) {
                if let Some(slot) = values.get_mut(index) {
                    *slot = item;
                }
            }
            Ok(())
        }
        other => Err(OperationError::RecordWidth {
            expected: projection.len(),
            actual: match other.as_list() {
                Some(items) => items.len().to_string(),
                None => other.kind_name().to_string(),
            },
        }),
    }
}

/// A function reading selected record slots and writing its result to projected slots.
///
/// With an empty projection the function's raw output is returned instead of the record.
#[derive(Debug)]
pub struct TupleAdaptedFunction {
    function: Box<dyn Function>,
    selection: Box<[usize]>,
    projection: Box<[usize]>,
    record: Signature,
    shape: Shape,
}

impl Nominal for TupleAdaptedFunction {
    const TYPE_NAME: &'static str = "TupleAdaptedFunction";
}

impl TupleAdaptedFunction {
    pub fn build(
        resolver: &SignatureResolver<'_>,
        function: Box<dyn Function>,
        selection: Vec<usize>,
        projection: Vec<usize>,
        record: &Signature,
    ) -> Result<Self, CompositionError> {
        let inner = resolver.resolve_shape(&function)?;
        let width = validate_selection(&resolver.checker(), record, &selection, &inner.input)?;

        let output = if projection.is_empty() {
            inner.output.clone()
        } else {
            check_in_range(&projection, width)?;
            check_unique(&projection)?;
            check_mapping_arity("output", &inner.output, &projection)?;
            projected_record(record, &projection, &inner.output)
        };

        Ok(Self {
            function,
            selection: selection.into_boxed_slice(),
            projection: projection.into_boxed_slice(),
            record: record.clone(),
            shape: Shape::new(record.clone(), output),
        })
    }

    pub fn selection(&self) -> &[usize] {
        &self.selection
    }

    pub fn projection(&self) -> &[usize] {
        &self.projection
    }
}

impl Operation for TupleAdaptedFunction {
    fn type_descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::of::<Self>()
    }

    fn capability(&self) -> Capability {
        Capability::Function
    }

    fn declared_shape(&self, _resolver: &SignatureResolver<'_>) -> Result<Option<Shape>, ResolveError> {
        Ok(Some(self.shape.clone()))
    }
}

impl Function for TupleAdaptedFunction {
    fn apply(&self, input: Value) -> Result<Value, OperationError> {
        let width = self.record.arity().unwrap_or_default();
        let values = record_values(&input, width)?;
        let output = self.function.apply(gather(values, &self.selection))?;
        if self.projection.is_empty() {
            return Ok(output);
        }
        let mut record = values.to_vec();
        scatter(&mut record, &self.projection, output)?;
        Ok(Value::List(record))
    }

    fn to_document(&self) -> serde_json::Value {
        json!({
            "kind": Self::TYPE_NAME,
            "function": self.function.to_document(),
            "selection": self.selection,
            "projection": self.projection,
            "record": record_document(&self.record),
        })
    }
}

/// A predicate testing selected record slots. Inputs that are not records test false.
#[derive(Debug)]
pub struct TupleAdaptedPredicate {
    predicate: Box<dyn Predicate>,
    selection: Box<[usize]>,
    record: Signature,
}

impl Nominal for TupleAdaptedPredicate {
    const TYPE_NAME: &'static str = "TupleAdaptedPredicate";
}

impl TupleAdaptedPredicate {
    pub fn build(
        resolver: &SignatureResolver<'_>,
        predicate: Box<dyn Predicate>,
        selection: Vec<usize>,
        record: &Signature,
    ) -> Result<Self, CompositionError> {
        let input = resolver.resolve_input_signature(&predicate)?;
        validate_selection(&resolver.checker(), record, &selection, &input)?;
        Ok(Self {
            predicate,
            selection: selection.into_boxed_slice(),
            record: record.clone(),
        })
    }

    pub fn selection(&self) -> &[usize] {
        &self.selection
    }
}

impl Operation for TupleAdaptedPredicate {
    fn type_descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::of::<Self>()
    }

    fn capability(&self) -> Capability {
        Capability::Predicate
    }

    fn declared_shape(&self, _resolver: &SignatureResolver<'_>) -> Result<Option<Shape>, ResolveError> {
        Ok(Some(Shape::new(
            self.record.clone(),
            Signature::single(builtin::BOOLEAN),
        )))
    }
}

impl Predicate for TupleAdaptedPredicate {
    fn test(&self, input: &Value) -> bool {
        let width = self.record.arity().unwrap_or_default();
        match record_values(input, width) {
            Ok(values) => self.predicate.test(&gather(values, &self.selection)),
            Err(err) => {
                tracing::trace!(error = %err, "input is not a record; predicate is false");
                false
            }
        }
    }

    fn to_document(&self) -> serde_json::Value {
        json!({
            "kind": Self::TYPE_NAME,
            "predicate": self.predicate.to_document(),
            "selection": self.selection,
            "record": record_document(&self.record),
        })
    }
}

/// Aggregates two records by folding their selected slots with a binary operator and
/// writing the result back into the same slots of the state record.
#[derive(Debug)]
pub struct TupleAdaptedBinaryOperator {
    operator: Box<dyn BinaryOperator>,
    selection: Box<[usize]>,
    record: Signature,
    output_record: Signature,
}

impl Nominal for TupleAdaptedBinaryOperator {
    const TYPE_NAME: &'static str = "TupleAdaptedBinaryOperator";
}

impl TupleAdaptedBinaryOperator {
    pub fn build(
        resolver: &SignatureResolver<'_>,
        operator: Box<dyn BinaryOperator>,
        selection: Vec<usize>,
        record: &Signature,
    ) -> Result<Self, CompositionError> {
        let inner = resolver.resolve_shape(&operator)?;
        let width = record_width(record)?;
        check_in_range(&selection, width)?;
        check_unique(&selection)?;
        if selection.is_empty() {
            return Err(CompositionError::MappingArity {
                side: "input",
                expected: 1,
                actual: 0,
            });
        }

        // Both operands share the element type of the operator's first slot.
        let element = Signature::from_slots([inner.input.slot(0).unwrap_or(SlotType::Unknown)]);
        let selected = if selection.len() == 1 {
            selected_signature(record, &selection)
        } else {
            Signature::single(builtin::LIST)
        };
        check_fits(&resolver.checker(), &selected, &element)?;

        let written = if selection.len() == 1 {
            inner.output.clone()
        } else {
            Signature::Tuple(selection.iter().map(|_| SlotType::Unknown).collect())
        };
        let output_record = projected_record(record, &selection, &written);

        Ok(Self {
            operator,
            selection: selection.into_boxed_slice(),
            record: record.clone(),
            output_record,
        })
    }

    pub fn selection(&self) -> &[usize] {
        &self.selection
    }

    /// Record shape after aggregation.
    pub fn output_record(&self) -> &Signature {
        &self.output_record
    }
}

impl Operation for TupleAdaptedBinaryOperator {
    fn type_descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::of::<Self>()
    }

    fn capability(&self) -> Capability {
        Capability::BinaryOperator
    }

    fn declared_shape(&self, _resolver: &SignatureResolver<'_>) -> Result<Option<Shape>, ResolveError> {
        let list = TypeDescriptor::named(builtin::LIST);
        Ok(Some(Shape::new(
            Signature::tuple([list.clone(), list.clone()]),
            Signature::Single(list),
        )))
    }
}

impl BinaryOperator for TupleAdaptedBinaryOperator {
    fn combine(&self, state: Value, input: Value) -> Result<Value, OperationError> {
        let width = self.record.arity().unwrap_or_default();
        let state_values = record_values(&state, width)?;
        let input_values = record_values(&input, width)?;

        let combined = self.operator.apply(
            gather(state_values, &self.selection),
            gather(input_values, &self.selection),
        )?;

        let mut record = state_values.to_vec();
        scatter(&mut record, &self.selection, combined)?;
        Ok(Value::List(record))
    }

    fn to_document(&self) -> serde_json::Value {
        json!({
            "kind": Self::TYPE_NAME,
            "operator": self.operator.to_document(),
            "selection": self.selection,
            "record": record_document(&self.record),
        })
    }
}
