//! Composites: ordered sequences of same-capability operations that are themselves
//! operations.
//!
//! - [`FunctionComposite`] pipes its input left to right through every function.
//! - [`And`] passes the same input to every predicate and stops at the first `false`.
//! - [`Or`] stops at the first `true`.
//! - [`Not`] inverts a single delegate.
//!
//! Children are moved into an owned boxed slice at construction, where every
//! compatibility check happens once. Composites are immutable afterwards.

use serde_json::json;

use opchain_resolver::{
    AssignabilityChecker, Capability, Operation, ResolveError, Shape, Signature, SignatureResolver,
};
use opchain_types::{builtin, Nominal, TypeDescriptor, Value};

use crate::errors::{CompositionError, OperationError};
use crate::operation::{Function, Predicate};

/// Functions applied in sequence, each consuming the previous output.
#[derive(Debug)]
pub struct FunctionComposite {
    functions: Box<[Box<dyn Function>]>,
    shape: Shape,
}

impl Nominal for FunctionComposite {
    const TYPE_NAME: &'static str = "FunctionComposite";
}

impl FunctionComposite {
    /// Chain `functions`, checking that each output may feed the next input.
    ///
    /// Fails when `functions` is empty, when any signature cannot be resolved, or when
    /// an adjacent pair is not assignable.
    pub fn build(
        resolver: &SignatureResolver<'_>,
        functions: Vec<Box<dyn Function>>,
    ) -> Result<Self, CompositionError> {
        if functions.is_empty() {
            return Err(CompositionError::Empty {
                capability: Capability::Function,
            });
        }

        let shapes = functions
            .iter()
            .map(|function| resolver.resolve_shape(function))
            .collect::<Result<Vec<_>, _>>()?;

        let checker = resolver.checker();
        for (index, pair) in shapes.windows(2).enumerate() {
            let result = checker.check_assignable(&pair[0].output, &pair[1].input);
            if !result.valid {
                return Err(CompositionError::IncompatibleLink {
                    index,
                    producer: pair[0].output.to_string(),
                    consumer: pair[1].input.to_string(),
                    reason: result.explanation().unwrap_or_default(),
                });
            }
        }

        let shape = Shape::new(
            shapes[0].input.clone(),
            shapes[shapes.len() - 1].output.clone(),
        );
        tracing::debug!(len = functions.len(), %shape, "built function composite");

        Ok(Self {
            functions: functions.into_boxed_slice(),
            shape,
        })
    }

    pub fn functions(&self) -> &[Box<dyn Function>] {
        &self.functions
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

impl Operation for FunctionComposite {
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

impl Function for FunctionComposite {
    fn apply(&self, input: Value) -> Result<Value, OperationError> {
        let mut value = input;
        for (step, function) in self.functions.iter().enumerate() {
            tracing::trace!(step, kind = %function.type_descriptor(), "applying function");
            value = function.apply(value)?;
        }
        Ok(value)
    }

    fn to_document(&self) -> serde_json::Value {
        let functions: Vec<_> = self.functions.iter().map(|f| f.to_document()).collect();
        json!({ "kind": Self::TYPE_NAME, "functions": functions })
    }
}

/// Input signature of a predicate composite: the member input every other member
/// input is assignable from.
fn member_input(
    checker: &AssignabilityChecker<'_>,
    inputs: &[Signature],
) -> Result<Signature, CompositionError> {
    let known: Vec<&Signature> = inputs.iter().filter(|input| !input.is_unknown()).collect();
    let Some(first) = known.first() else {
        return Ok(Signature::Unknown);
    };

    if let Some(other) = known.iter().find(|input| input.arity() != first.arity()) {
        return Err(CompositionError::IncompatibleMembers {
            reason: format!("member inputs `{first}` and `{other}` differ in arity"),
        });
    }

    for candidate in &known {
        if known
            .iter()
            .all(|other| checker.check_assignable(candidate, other).valid)
        {
            return Ok((*candidate).clone());
        }
    }

    let listed: Vec<String> = known.iter().map(|input| format!("`{input}`")).collect();
    Err(CompositionError::IncompatibleMembers {
        reason: format!("no input among {} fits every member", listed.join(", ")),
    })
}

fn build_members(
    resolver: &SignatureResolver<'_>,
    predicates: &[Box<dyn Predicate>],
) -> Result<Shape, CompositionError> {
    let inputs = predicates
        .iter()
        .map(|predicate| resolver.resolve_input_signature(predicate))
        .collect::<Result<Vec<_>, _>>()?;
    let input = member_input(&resolver.checker(), &inputs)?;
    Ok(Shape::new(input, Signature::single(builtin::BOOLEAN)))
}

macro_rules! predicate_composite {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug)]
        pub struct $name {
            predicates: Box<[Box<dyn Predicate>]>,
            shape: Shape,
        }

        impl Nominal for $name {
            const TYPE_NAME: &'static str = stringify!($name);
        }

        impl $name {
            /// Combine `predicates`; their inputs must share a most specific member.
            pub fn build(
                resolver: &SignatureResolver<'_>,
                predicates: Vec<Box<dyn Predicate>>,
            ) -> Result<Self, CompositionError> {
                let shape = build_members(resolver, &predicates)?;
                tracing::debug!(
                    kind = Self::TYPE_NAME,
                    len = predicates.len(),
                    %shape,
                    "built predicate composite"
                );
                Ok(Self {
                    predicates: predicates.into_boxed_slice(),
                    shape,
                })
            }

            pub fn predicates(&self) -> &[Box<dyn Predicate>] {
                &self.predicates
            }
        }

        impl Operation for $name {
            fn type_descriptor(&self) -> TypeDescriptor {
                TypeDescriptor::of::<Self>()
            }

            fn capability(&self) -> Capability {
                Capability::Predicate
            }

            fn declared_shape(
                &self,
                _resolver: &SignatureResolver<'_>,
            ) -> Result<Option<Shape>, ResolveError> {
                Ok(Some(self.shape.clone()))
            }
        }
    };
}

predicate_composite!(
    And,
    "Logical AND of its members. Empty is `true`."
);

predicate_composite!(
    Or,
    "Logical OR of its members. Empty is `false`."
);

impl Predicate for And {
    fn test(&self, input: &Value) -> bool {
        self.predicates.iter().all(|predicate| predicate.test(input))
    }

    fn to_document(&self) -> serde_json::Value {
        let predicates: Vec<_> = self.predicates.iter().map(|p| p.to_document()).collect();
        json!({ "kind": Self::TYPE_NAME, "predicates": predicates })
    }
}

impl Predicate for Or {
    fn test(&self, input: &Value) -> bool {
        self.predicates.iter().any(|predicate| predicate.test(input))
    }

    fn to_document(&self) -> serde_json::Value {
        let predicates: Vec<_> = self.predicates.iter().map(|p| p.to_document()).collect();
        json!({ "kind": Self::TYPE_NAME, "predicates": predicates })
    }
}

/// Inverts its delegate. Without a delegate it tests `false`.
#[derive(Debug, Default)]
pub struct Not {
    predicate: Option<Box<dyn Predicate>>,
}

impl Nominal for Not {
    const TYPE_NAME: &'static str = "Not";
}

impl Not {
    pub fn new(predicate: Option<Box<dyn Predicate>>) -> Self {
        Self { predicate }
    }

    pub fn predicate(&self) -> Option<&dyn Predicate> {
        self.predicate.as_deref()
    }
}

impl Operation for Not {
    fn type_descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::of::<Self>()
    }

    fn capability(&self) -> Capability {
        Capability::Predicate
    }

    fn declared_shape(&self, resolver: &SignatureResolver<'_>) -> Result<Option<Shape>, ResolveError> {
        let input = match &self.predicate {
            Some(predicate) => resolver.resolve_input_signature(predicate)?,
            None => Signature::Unknown,
        };
        Ok(Some(Shape::new(input, Signature::single(builtin::BOOLEAN))))
    }
}

impl Predicate for Not {
    fn test(&self, input: &Value) -> bool {
        match &self.predicate {
            Some(predicate) => !predicate.test(input),
            None => false,
        }
    }

    fn to_document(&self) -> serde_json::Value {
        match &self.predicate {
            Some(predicate) => json!({ "kind": Self::TYPE_NAME, "predicate": predicate.to_document() }),
            None => json!({ "kind": Self::TYPE_NAME }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opchain_types::TypeRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Fixed {
        ty: &'static str,
        result: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Operation for Fixed {
        fn type_descriptor(&self) -> TypeDescriptor {
            TypeDescriptor::named(self.ty)
        }

        fn capability(&self) -> Capability {
            Capability::Predicate
        }
    }

    impl Predicate for Fixed {
        fn test(&self, _input: &Value) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
        }

        fn to_document(&self) -> serde_json::Value {
            json!({ "kind": self.ty })
        }
    }

    #[derive(Debug)]
    struct Step {
        ty: &'static str,
        add: i64,
    }

    impl Operation for Step {
        fn type_descriptor(&self) -> TypeDescriptor {
            TypeDescriptor::named(self.ty)
        }

        fn capability(&self) -> Capability {
            Capability::Function
        }
    }

    impl Function for Step {
        fn apply(&self, input: Value) -> Result<Value, OperationError> {
            let n = input
                .as_i64()
                .ok_or_else(|| OperationError::type_mismatch("Step", "long", &input))?;
            Ok(Value::Long(n + self.add))
        }

        fn to_document(&self) -> serde_json::Value {
            json!({ "kind": self.ty, "add": self.add })
        }
    }

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::with_builtins();
        registry
            .declare_all([
                "class AlwaysTrue implements Predicate<Object>",
                "class AlwaysFalse implements Predicate<Object>",
                "class LongCheck implements Predicate<Long>",
                "class NumberCheck implements Predicate<Number>",
                "class StringCheck implements Predicate<String>",
                "class PairCheck implements Predicate2<Long, Long>",
                "class MakeNumber implements Function<Long, Number>",
                "class UseNumber implements Function<Number, Long>",
                "class UseString implements Function<String, Long>",
            ])
            .unwrap();
        registry
    }

    fn fixed(ty: &'static str, result: bool, calls: &Arc<AtomicUsize>) -> Box<dyn Predicate> {
        Box::new(Fixed {
            ty,
            result,
            calls: calls.clone(),
        })
    }

    #[test]
    fn test_empty_and_is_true() {
        let registry = registry();
        let and = And::build(&SignatureResolver::new(&registry), Vec::new()).unwrap();
        assert!(and.test(&Value::Null));
        assert_eq!(
            SignatureResolver::new(&registry).resolve_input_signature(&and).unwrap(),
            Signature::Unknown
        );
    }

    #[test]
    fn test_and_short_circuits_on_first_false() {
        let registry = registry();
        let calls = Arc::new(AtomicUsize::new(0));
        let and = And::build(
            &SignatureResolver::new(&registry),
            vec![
                fixed("AlwaysTrue", true, &calls),
                fixed("AlwaysFalse", false, &calls),
                fixed("AlwaysTrue", true, &calls),
            ],
        )
        .unwrap();

        assert!(!and.test(&Value::Long(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_or_short_circuits_on_first_true() {
        let registry = registry();
        let calls = Arc::new(AtomicUsize::new(0));
        let or = Or::build(
            &SignatureResolver::new(&registry),
            vec![fixed("AlwaysTrue", true, &calls), fixed("AlwaysFalse", false, &calls)],
        )
        .unwrap();
        assert!(or.test(&Value::Null));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let empty = Or::build(&SignatureResolver::new(&registry), Vec::new()).unwrap();
        assert!(!empty.test(&Value::Null));
    }

    #[test]
    fn test_and_input_is_most_specific_member() {
        let registry = registry();
        let resolver = SignatureResolver::new(&registry);
        let calls = Arc::new(AtomicUsize::new(0));
        let and = And::build(
            &resolver,
            vec![
                fixed("NumberCheck", true, &calls),
                fixed("LongCheck", true, &calls),
                fixed("AlwaysTrue", true, &calls),
            ],
        )
        .unwrap();
        assert_eq!(resolver.resolve_input_signature(&and).unwrap(), Signature::single("Long"));
        assert_eq!(resolver.resolve_output_signature(&and).unwrap(), Signature::single("Boolean"));
    }

    #[test]
    fn test_and_rejects_incompatible_members() {
        let registry = registry();
        let resolver = SignatureResolver::new(&registry);
        let calls = Arc::new(AtomicUsize::new(0));

        let err = And::build(
            &resolver,
            vec![fixed("LongCheck", true, &calls), fixed("StringCheck", true, &calls)],
        )
        .unwrap_err();
        assert!(matches!(err, CompositionError::IncompatibleMembers { .. }));

        let err = And::build(
            &resolver,
            vec![fixed("LongCheck", true, &calls), fixed("PairCheck", true, &calls)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("arity"));
    }

    #[test]
    fn test_not_without_delegate_is_false() {
        let not = Not::new(None);
        assert!(!not.test(&Value::Null));
        assert!(!not.test(&Value::Bool(false)));
        assert_eq!(not.to_document(), json!({ "kind": "Not" }));
    }

    #[test]
    fn test_not_inverts_and_takes_delegate_input() {
        let registry = registry();
        let resolver = SignatureResolver::new(&registry);
        let calls = Arc::new(AtomicUsize::new(0));
        let not = Not::new(Some(fixed("LongCheck", false, &calls)));
        assert!(not.test(&Value::Long(3)));
        assert_eq!(resolver.resolve_input_signature(&not).unwrap(), Signature::single("Long"));
    }

    #[test]
    fn test_function_composite_must_not_be_empty() {
        let registry = registry();
        let err = FunctionComposite::build(&SignatureResolver::new(&registry), Vec::new()).unwrap_err();
        assert!(matches!(err, CompositionError::Empty { .. }));
    }

    #[test]
    fn test_number_output_composes_into_number_input() {
        let registry = registry();
        let resolver = SignatureResolver::new(&registry);
        let composite = FunctionComposite::build(
            &resolver,
            vec![
                Box::new(Step { ty: "MakeNumber", add: 1 }),
                Box::new(Step { ty: "UseNumber", add: 10 }),
            ],
        )
        .unwrap();

        assert_eq!(composite.apply(Value::Long(1)).unwrap(), Value::Long(12));
        assert_eq!(composite.shape().input, Signature::single("Long"));
        assert_eq!(composite.shape().output, Signature::single("Long"));
        assert_eq!(composite.len(), 2);
    }

    #[test]
    fn test_number_output_into_string_input_fails() {
        let registry = registry();
        let err = FunctionComposite::build(
            &SignatureResolver::new(&registry),
            vec![
                Box::new(Step { ty: "MakeNumber", add: 1 }),
                Box::new(Step { ty: "UseString", add: 1 }),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, CompositionError::IncompatibleLink { index: 0, .. }));
    }

    #[test]
    fn test_undeclared_member_is_a_configuration_error() {
        let registry = registry();
        let err = FunctionComposite::build(
            &SignatureResolver::new(&registry),
            vec![Box::new(Step { ty: "Nowhere", add: 1 })],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CompositionError::Resolve(ResolveError::UndeclaredType { .. })
        ));
    }

    #[test]
    fn test_composites_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FunctionComposite>();
        assert_send_sync::<And>();
        assert_send_sync::<Not>();
    }
}
