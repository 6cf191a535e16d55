//! Assignability between signatures and concrete types.
//!
//! - `assignable_from`: every candidate may be *supplied* to its slot (the candidate is
//!   a subtype of the slot).
//! - `assignable_to`: every slot may be *accepted* by its candidate (the slot is a
//!   subtype of the candidate).
//!
//! Unknown signatures and slots are always valid. Arity must match exactly; arrays are
//! invariant.

use std::fmt;

use opchain_types::{TypeDescriptor, TypeRegistry};

use crate::signature::{Signature, SlotType};

/// Why an assignability check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    Arity {
        expected: usize,
        actual: usize,
    },
    Slot {
        index: usize,
        expected: TypeDescriptor,
        actual: TypeDescriptor,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Arity { expected, actual } => {
                write!(f, "expected {expected} slot(s), got {actual}")
            }
            Mismatch::Slot {
                index,
                expected,
                actual,
            } => write!(f, "slot {index}: `{actual}` is not assignable to `{expected}`"),
        }
    }
}

/// Outcome of an assignability check, with the first mismatch when invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignabilityResult {
    pub valid: bool,
    pub mismatch: Option<Mismatch>,
}

impl AssignabilityResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            mismatch: None,
        }
    }

    pub fn invalid(mismatch: Mismatch) -> Self {
        Self {
            valid: false,
            mismatch: Some(mismatch),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Human-readable explanation of the first mismatch.
    pub fn explanation(&self) -> Option<String> {
        self.mismatch.as_ref().map(ToString::to_string)
    }
}

impl fmt::Display for AssignabilityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mismatch {
            None => f.write_str("assignable"),
            Some(mismatch) => write!(f, "not assignable: {mismatch}"),
        }
    }
}

/// Variance rules over a [`TypeRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct AssignabilityChecker<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> AssignabilityChecker<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    /// Whether each candidate may be supplied to the matching slot of `signature`.
    pub fn assignable_from(&self, signature: &Signature, candidates: &[TypeDescriptor]) -> AssignabilityResult {
        self.check_slots(signature, candidates, |slot, candidate| {
            self.is_subtype(candidate, slot)
        })
    }

    /// Whether each slot of `signature` may be accepted where its candidate is expected.
    pub fn assignable_to(&self, signature: &Signature, candidates: &[TypeDescriptor]) -> AssignabilityResult {
        self.check_slots(signature, candidates, |slot, candidate| {
            self.is_subtype(slot, candidate)
        })
    }

    /// Whether a value shaped like `producer` may be fed to an input shaped like `consumer`.
    ///
    /// This is the edge check for chaining: `consumer.input` assignable from
    /// `producer.output`. Unknown on either side, or in any slot, is accepted.
    pub fn check_assignable(&self, producer: &Signature, consumer: &Signature) -> AssignabilityResult {
        let (Some(expected), Some(actual)) = (consumer.arity(), producer.arity()) else {
            return AssignabilityResult::valid();
        };
        if expected != actual {
            return AssignabilityResult::invalid(Mismatch::Arity { expected, actual });
        }

        for (index, (wanted, offered)) in consumer.slots().iter().zip(producer.slots().iter()).enumerate() {
            let (SlotType::Known(wanted), SlotType::Known(offered)) = (wanted, offered) else {
                continue;
            };
            if !self.is_subtype(offered, wanted) {
                return AssignabilityResult::invalid(Mismatch::Slot {
                    index,
                    expected: wanted.clone(),
                    actual: offered.clone(),
                });
            }
        }
        AssignabilityResult::valid()
    }

    fn check_slots<F>(&self, signature: &Signature, candidates: &[TypeDescriptor], accepts: F) -> AssignabilityResult
    where
        F: Fn(&TypeDescriptor, &TypeDescriptor) -> bool,
    {
        let Some(arity) = signature.arity() else {
            return AssignabilityResult::valid();
        };
        if arity != candidates.len() {
            return AssignabilityResult::invalid(Mismatch::Arity {
                expected: arity,
                actual: candidates.len(),
            });
        }

        for (index, (slot, candidate)) in signature.slots().iter().zip(candidates).enumerate() {
            let SlotType::Known(slot) = slot else {
                continue;
            };
            if !accepts(slot, candidate) {
                return AssignabilityResult::invalid(Mismatch::Slot {
                    index,
                    expected: slot.clone(),
                    actual: candidate.clone(),
                });
            }
        }
        AssignabilityResult::valid()
    }

    fn is_subtype(&self, sub: &TypeDescriptor, sup: &TypeDescriptor) -> bool {
        if sub == sup || sup.is_root() {
            return true;
        }
        if !self.registry.contains(sub) {
            tracing::warn!(ty = %sub, "type is not declared; only Object is assumed as its ancestor");
        }
        self.registry.is_subtype(sub, sup)
    }
}
