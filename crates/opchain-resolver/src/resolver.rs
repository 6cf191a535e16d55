//! Signature resolution.
//!
//! Recovers the concrete slot types of an operation by walking its declared ancestry
//! breadth-first (superclass edge before interface edges), substituting each parent's
//! type parameters with the arguments supplied at that edge, until the capability's
//! defining interface is reached.
//!
//! Resolution is structural and local to one operation:
//! - a parameter still unbound when the interface is reached yields an unknown slot
//! - when the interface is reachable along several paths, the nearest ones win
//! - equal-distance paths that disagree on a slot make that slot unknown
//! - equal-distance paths reaching *different* capability interfaces make the whole
//!   shape unknown

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use opchain_types::{builtin, TypeDescriptor, TypeRef, TypeRegistry};

use crate::assignability::{AssignabilityChecker, AssignabilityResult};
use crate::capability::{Capability, CapabilityInterface, SlotSource};
use crate::operation::{Operation, Shape};
use crate::signature::{Signature, SlotType};

/// Errors raised when an operation's type is misconfigured.
///
/// Unresolvable slots are not errors; they degrade to [`Signature::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("operation type `{ty}` is not declared in the type registry")]
    UndeclaredType { ty: String },

    #[error("operation type `{ty}` does not implement any {capability} interface")]
    CapabilityNotImplemented { ty: String, capability: Capability },

    #[error("operation `{ty}` has an inconsistent shape: {reason}")]
    InconsistentShape { ty: String, reason: String },
}

/// Binding of one type parameter along an ancestry path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Binding {
    Concrete(TypeDescriptor),
    Unbound,
}

type Env = HashMap<Arc<str>, Binding>;

/// A capability interface reached during the walk.
#[derive(Debug)]
struct Hit {
    interface: &'static CapabilityInterface,
    depth: usize,
    env: Env,
}

/// Resolves operation signatures against a [`TypeRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct SignatureResolver<'r> {
    registry: &'r TypeRegistry,
}

impl Default for SignatureResolver<'static> {
    fn default() -> Self {
        Self::new(TypeRegistry::global())
    }
}

impl<'r> SignatureResolver<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// Checker sharing this resolver's registry.
    pub fn checker(&self) -> AssignabilityChecker<'r> {
        AssignabilityChecker::new(self.registry)
    }

    pub fn resolve_input_signature<O: Operation + ?Sized>(&self, op: &O) -> Result<Signature, ResolveError> {
        Ok(self.resolve_shape(op)?.input)
    }

    pub fn resolve_output_signature<O: Operation + ?Sized>(&self, op: &O) -> Result<Signature, ResolveError> {
        Ok(self.resolve_shape(op)?.output)
    }

    /// Input and output signatures of `op`.
    pub fn resolve_shape<O: Operation + ?Sized>(&self, op: &O) -> Result<Shape, ResolveError> {
        if let Some(shape) = op.declared_shape(self)? {
            check_declared_shape(&op.type_descriptor(), op.capability(), &shape)?;
            return Ok(shape);
        }
        self.resolve_type(&op.type_descriptor(), op.capability())
    }

    /// Check that `producer`'s output may feed `consumer`'s input.
    pub fn check_edge<P, C>(&self, producer: &P, consumer: &C) -> Result<AssignabilityResult, ResolveError>
    where
        P: Operation + ?Sized,
        C: Operation + ?Sized,
    {
        let produced = self.resolve_output_signature(producer)?;
        let consumed = self.resolve_input_signature(consumer)?;
        Ok(self.checker().check_assignable(&produced, &consumed))
    }

    /// Shape of the declared type `ty` viewed through `capability`.
    pub fn resolve_type(&self, ty: &TypeDescriptor, capability: Capability) -> Result<Shape, ResolveError> {
        let decl = self
            .registry
            .get(ty)
            .ok_or_else(|| ResolveError::UndeclaredType { ty: ty.to_string() })?;

        let start_env: Env = decl
            .params
            .iter()
            .map(|param| (param.clone(), Binding::Unbound))
            .collect();

        let hits = self.collect_hits(ty, start_env, capability);
        let Some(min_depth) = hits.iter().map(|hit| hit.depth).min() else {
            return Err(ResolveError::CapabilityNotImplemented {
                ty: ty.to_string(),
                capability,
            });
        };
        let nearest: Vec<&Hit> = hits.iter().filter(|hit| hit.depth == min_depth).collect();

        let interface = nearest[0].interface;
        if nearest.iter().any(|hit| hit.interface.name != interface.name) {
            tracing::debug!(
                ty = %ty,
                depth = min_depth,
                "several {capability} interfaces at equal distance; shape is unknown"
            );
            return Ok(Shape::unknown());
        }

        let input = Signature::from_slots(
            interface
                .inputs
                .iter()
                .map(|param| agreed_slot(ty, param, &nearest)),
        );
        let output = match interface.output {
            SlotSource::Param(param) => Signature::from_slots([agreed_slot(ty, param, &nearest)]),
            SlotSource::Fixed(name) => Signature::Single(TypeDescriptor::named(name)),
        };

        tracing::trace!(ty = %ty, interface = interface.name, %input, %output, "resolved shape");
        Ok(Shape::new(input, output))
    }

    /// Breadth-first walk recording every capability interface reached.
    fn collect_hits(&self, start: &TypeDescriptor, start_env: Env, capability: Capability) -> Vec<Hit> {
        let mut hits = Vec::new();
        let mut queue: VecDeque<(TypeDescriptor, Env, usize)> = VecDeque::new();
        queue.push_back((start.clone(), start_env, 0));

        while let Some((ty, env, depth)) = queue.pop_front() {
            tracing::trace!(ty = %ty, depth, "visiting ancestor");

            if let Some(interface) = capability.interface(ty.name()) {
                hits.push(Hit {
                    interface,
                    depth,
                    env,
                });
                continue;
            }

            let Some(decl) = self.registry.get(&ty) else {
                continue;
            };
            for edge in decl.parents() {
                let Some(parent) = self.registry.get(&edge.target) else {
                    continue;
                };
                let parent_env: Env = parent
                    .params
                    .iter()
                    .zip(&edge.args)
                    .map(|(param, arg)| {
                        let binding = match arg {
                            TypeRef::Concrete(descriptor) => Binding::Concrete(descriptor.clone()),
                            TypeRef::Var(var) => env.get(var).cloned().unwrap_or(Binding::Unbound),
                        };
                        (param.clone(), binding)
                    })
                    .collect();
                queue.push_back((edge.target.clone(), parent_env, depth + 1));
            }
        }

        hits
    }
}

/// The binding every nearest hit agrees on for `param`, or unknown.
/// A declared shape must still fit its capability: predicates produce `Boolean`, binary
/// operators take two slots and produce the slot type. Unknown parts are accepted.
fn check_declared_shape(ty: &TypeDescriptor, capability: Capability, shape: &Shape) -> Result<(), ResolveError> {
    let inconsistent = |reason: String| ResolveError::InconsistentShape {
        ty: ty.to_string(),
        reason,
    };
    match capability {
        Capability::Function => Ok(()),
        Capability::Predicate => match &shape.output {
            Signature::Single(output) if *output != TypeDescriptor::named(builtin::BOOLEAN) => {
                Err(inconsistent(format!("predicate output is `{output}`, not `Boolean`")))
            }
            Signature::Tuple(_) => Err(inconsistent(format!(
                "predicate output is the tuple `{}`",
                shape.output
            ))),
            _ => Ok(()),
        },
        Capability::BinaryOperator => {
            match shape.input.arity() {
                None | Some(2) => {}
                Some(arity) => {
                    return Err(inconsistent(format!(
                        "binary operator input `{}` has {arity} slot(s), expected 2",
                        shape.input
                    )))
                }
            }
            if matches!(shape.output, Signature::Tuple(_)) {
                return Err(inconsistent(format!(
                    "binary operator output is the tuple `{}`",
                    shape.output
                )));
            }
            let output = shape.output.slot(0).unwrap_or(SlotType::Unknown);
            for index in 0..2 {
                let slot = shape.input.slot(index).unwrap_or(SlotType::Unknown);
                if let (SlotType::Known(expected), SlotType::Known(actual)) = (&slot, &output) {
                    if expected != actual {
                        return Err(inconsistent(format!(
                            "binary operator output `{actual}` differs from input slot {index} `{expected}`"
                        )));
                    }
                }
            }
            Ok(())
        }
    }
}

fn agreed_slot(ty: &TypeDescriptor, param: &str, hits: &[&Hit]) -> SlotType {
    let mut agreed: Option<&TypeDescriptor> = None;
    for hit in hits {
        match hit.env.get(param) {
            Some(Binding::Concrete(descriptor)) => match agreed {
                None => agreed = Some(descriptor),
                Some(existing) if existing == descriptor => {}
                Some(existing) => {
                    tracing::debug!(
                        ty = %ty,
                        param,
                        first = %existing,
                        second = %descriptor,
                        "conflicting bindings at equal distance; slot is unknown"
                    );
                    return SlotType::Unknown;
                }
            },
            Some(Binding::Unbound) | None => {
                tracing::debug!(ty = %ty, param, "type parameter is unbound; slot is unknown");
                return SlotType::Unknown;
            }
        }
    }
    agreed.map_or(SlotType::Unknown, |descriptor| SlotType::Known(descriptor.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SignatureKind;

    #[derive(Debug)]
    struct Stub {
        ty: &'static str,
        capability: Capability,
    }

    impl Operation for Stub {
        fn type_descriptor(&self) -> TypeDescriptor {
            TypeDescriptor::named(self.ty)
        }

        fn capability(&self) -> Capability {
            self.capability
        }
    }

    #[derive(Debug)]
    struct Explicit;

    impl Operation for Explicit {
        fn type_descriptor(&self) -> TypeDescriptor {
            TypeDescriptor::named("Explicit")
        }

        fn capability(&self) -> Capability {
            Capability::Function
        }

        fn declared_shape(&self, _resolver: &SignatureResolver<'_>) -> Result<Option<Shape>, ResolveError> {
            Ok(Some(Shape::new(Signature::single("String"), Signature::single("Long"))))
        }
    }

    /// Operation reporting a fixed shape under a chosen capability.
    #[derive(Debug)]
    struct Declared {
        capability: Capability,
        shape: Shape,
    }

    impl Operation for Declared {
        fn type_descriptor(&self) -> TypeDescriptor {
            TypeDescriptor::named("Declared")
        }

        fn capability(&self) -> Capability {
            self.capability
        }

        fn declared_shape(&self, _resolver: &SignatureResolver<'_>) -> Result<Option<Shape>, ResolveError> {
            Ok(Some(self.shape.clone()))
        }
    }

    fn declared(capability: Capability, input: Signature, output: Signature) -> Declared {
        Declared {
            capability,
            shape: Shape::new(input, output),
        }
    }

    fn function(ty: &'static str) -> Stub {
        Stub {
            ty,
            capability: Capability::Function,
        }
    }

    fn registry(decls: &[&str]) -> TypeRegistry {
        let registry = TypeRegistry::with_builtins();
        registry.declare_all(decls.iter().copied()).unwrap();
        registry
    }

    #[test]
    fn test_direct_predicate() {
        let registry = registry(&["class IsPositive implements Predicate<Long>"]);
        let resolver = SignatureResolver::new(&registry);
        let op = Stub {
            ty: "IsPositive",
            capability: Capability::Predicate,
        };
        assert_eq!(resolver.resolve_input_signature(&op).unwrap(), Signature::single("Long"));
        assert_eq!(resolver.resolve_output_signature(&op).unwrap(), Signature::single("Boolean"));
    }

    #[test]
    fn test_bindings_flow_through_superclass() {
        let registry = registry(&[
            "class Base<X> implements Function<X, String>",
            "class Derived extends Base<Long>",
        ]);
        let shape = SignatureResolver::new(&registry)
            .resolve_shape(&function("Derived"))
            .unwrap();
        assert_eq!(shape, Shape::new(Signature::single("Long"), Signature::single("String")));
    }

    #[test]
    fn test_bindings_flow_through_interfaces() {
        let registry = registry(&[
            "interface LongFunction<R> extends Function<Long, R>",
            "class Middle<A> implements LongFunction<A>",
            "class LongToString extends Middle<String>",
        ]);
        let shape = SignatureResolver::new(&registry)
            .resolve_shape(&function("LongToString"))
            .unwrap();
        assert_eq!(shape.input, Signature::single("Long"));
        assert_eq!(shape.output, Signature::single("String"));
    }

    #[test]
    fn test_unbound_parameters_are_unknown() {
        let registry = registry(&["class Passthrough<T> implements Function<T, T>"]);
        let shape = SignatureResolver::new(&registry)
            .resolve_shape(&function("Passthrough"))
            .unwrap();
        assert_eq!(shape, Shape::unknown());
    }

    #[test]
    fn test_partially_bound() {
        let registry = registry(&["class Stringify<T> implements Function<T, String>"]);
        let shape = SignatureResolver::new(&registry)
            .resolve_shape(&function("Stringify"))
            .unwrap();
        assert_eq!(shape.input, Signature::Unknown);
        assert_eq!(shape.output, Signature::single("String"));
    }

    #[test]
    fn test_multi_parameter_interfaces_give_tuples() {
        let registry = registry(&[
            "class Joiner implements Function2<String, Long, String>",
            "class SumLongs implements BinaryOperator<Long>",
            "class Between implements Predicate2<Long, Double>",
        ]);
        let resolver = SignatureResolver::new(&registry);

        let joiner = resolver.resolve_shape(&function("Joiner")).unwrap();
        assert_eq!(joiner.input.kind(), SignatureKind::Tuple(2));
        assert_eq!(joiner.input.to_string(), "(String, Long)");
        assert_eq!(joiner.output, Signature::single("String"));

        let sum = resolver
            .resolve_shape(&Stub {
                ty: "SumLongs",
                capability: Capability::BinaryOperator,
            })
            .unwrap();
        assert_eq!(sum.input.to_string(), "(Long, Long)");
        assert_eq!(sum.output, Signature::single("Long"));

        let between = resolver
            .resolve_shape(&Stub {
                ty: "Between",
                capability: Capability::Predicate,
            })
            .unwrap();
        assert_eq!(between.input.to_string(), "(Long, Double)");
    }

    #[test]
    fn test_diamond_conflict_degrades_slot() {
        let registry = registry(&[
            "interface FromLong extends Function<Long, String>",
            "interface FromDouble extends Function<Double, String>",
            "class Diamond implements FromLong, FromDouble",
        ]);
        let shape = SignatureResolver::new(&registry)
            .resolve_shape(&function("Diamond"))
            .unwrap();
        assert_eq!(shape.input, Signature::Unknown);
        assert_eq!(shape.output, Signature::single("String"));
    }

    #[test]
    fn test_diamond_agreement_keeps_binding() {
        let registry = registry(&[
            "interface Left extends Function<Long, String>",
            "interface Right extends Function<Long, String>",
            "class Agreeing implements Left, Right",
        ]);
        let shape = SignatureResolver::new(&registry)
            .resolve_shape(&function("Agreeing"))
            .unwrap();
        assert_eq!(shape, Shape::new(Signature::single("Long"), Signature::single("String")));
    }

    #[test]
    fn test_nearest_binding_wins() {
        let registry = registry(&[
            "interface FarAway extends Function<Double, Double>",
            "class Near implements Function<Long, Long>, FarAway",
        ]);
        let shape = SignatureResolver::new(&registry)
            .resolve_shape(&function("Near"))
            .unwrap();
        assert_eq!(shape, Shape::new(Signature::single("Long"), Signature::single("Long")));
    }

    #[test]
    fn test_different_interfaces_at_equal_distance() {
        let registry = registry(&["class Both implements Function<Long, Long>, Function2<Long, Long, Long>"]);
        let shape = SignatureResolver::new(&registry)
            .resolve_shape(&function("Both"))
            .unwrap();
        assert_eq!(shape, Shape::unknown());
    }

    #[test]
    fn test_configuration_errors() {
        let registry = registry(&["class NotAFunction implements Predicate<Long>"]);
        let resolver = SignatureResolver::new(&registry);
        assert!(matches!(
            resolver.resolve_shape(&function("Missing")),
            Err(ResolveError::UndeclaredType { .. })
        ));
        assert!(matches!(
            resolver.resolve_shape(&function("NotAFunction")),
            Err(ResolveError::CapabilityNotImplemented { .. })
        ));
    }

    #[test]
    fn test_declared_shape_takes_precedence() {
        let registry = TypeRegistry::with_builtins();
        let shape = SignatureResolver::new(&registry).resolve_shape(&Explicit).unwrap();
        assert_eq!(shape.input, Signature::single("String"));
    }

    #[test]
    fn test_declared_shape_must_fit_capability() {
        let registry = TypeRegistry::with_builtins();
        let resolver = SignatureResolver::new(&registry);
        let long = || Signature::single("Long");
        let pair = |a: &str, b: &str| Signature::tuple([TypeDescriptor::named(a), TypeDescriptor::named(b)]);

        let inconsistent = [
            declared(Capability::Predicate, long(), long()),
            declared(Capability::BinaryOperator, long(), long()),
            declared(Capability::BinaryOperator, pair("Long", "Long"), Signature::single("String")),
            declared(Capability::BinaryOperator, pair("Long", "Long"), pair("Long", "Long")),
        ];
        for op in &inconsistent {
            let err = resolver.resolve_shape(op).unwrap_err();
            assert!(
                matches!(err, ResolveError::InconsistentShape { .. }),
                "{op:?} gave {err:?}"
            );
        }

        let consistent = [
            declared(Capability::Predicate, long(), Signature::single("Boolean")),
            declared(Capability::Predicate, Signature::Unknown, Signature::Unknown),
            declared(Capability::BinaryOperator, pair("List", "List"), Signature::single("List")),
            declared(Capability::BinaryOperator, Signature::Unknown, long()),
            declared(Capability::Function, long(), pair("Long", "String")),
        ];
        for op in &consistent {
            assert!(resolver.resolve_shape(op).is_ok(), "{op:?}");
        }

        let err = resolver
            .resolve_shape(&declared(Capability::Predicate, long(), long()))
            .unwrap_err();
        assert!(err.to_string().contains("predicate output is `Long`"));
    }

    #[test]
    fn test_check_edge() {
        let registry = registry(&[
            "class MakeNumber implements Function<String, Number>",
            "class UseNumber implements Function<Number, String>",
            "class UseString implements Function<String, String>",
        ]);
        let resolver = SignatureResolver::new(&registry);
        assert!(resolver
            .check_edge(&function("MakeNumber"), &function("UseNumber"))
            .unwrap()
            .valid);
        assert!(!resolver
            .check_edge(&function("MakeNumber"), &function("UseString"))
            .unwrap()
            .valid);
    }

    #[test]
    fn test_resolving_twice_is_equal() {
        let registry = registry(&["class Stable implements Function<String, Long>"]);
        let resolver = SignatureResolver::new(&registry);
        let op = function("Stable");
        assert_eq!(
            resolver.resolve_input_signature(&op).unwrap(),
            resolver.resolve_input_signature(&op).unwrap()
        );
        let boxed: Box<dyn Operation> = Box::new(function("Stable"));
        assert_eq!(
            resolver.resolve_shape(&boxed).unwrap(),
            resolver.resolve_shape(&op).unwrap()
        );
    }
}
