//! Input/output signatures.

use smallvec::SmallVec;
use std::fmt;

use opchain_types::TypeDescriptor;

/// One slot of a tuple signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotType {
    Known(TypeDescriptor),
    /// The slot's type could not be recovered; it accepts anything.
    Unknown,
}

impl SlotType {
    pub fn known(&self) -> Option<&TypeDescriptor> {
        match self {
            SlotType::Known(descriptor) => Some(descriptor),
            SlotType::Unknown => None,
        }
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotType::Known(descriptor) => write!(f, "{descriptor}"),
            SlotType::Unknown => f.write_str("?"),
        }
    }
}

impl From<TypeDescriptor> for SlotType {
    fn from(descriptor: TypeDescriptor) -> Self {
        SlotType::Known(descriptor)
    }
}

/// Shape of one side (input or output) of an operation.
///
/// `Unknown` is assignable from and to anything. Signatures are immutable values;
/// resolving the same operation twice yields equal signatures.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Signature {
    Single(TypeDescriptor),
    Tuple(SmallVec<[SlotType; 4]>),
    Unknown,
}

/// Discriminant of a [`Signature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureKind {
    Single,
    Tuple(usize),
    Unknown,
}

impl Signature {
    /// Build a signature from capability slots in declaration order.
    ///
    /// A single known slot is `Single`, a single unknown slot is `Unknown`, and
    /// anything wider is a `Tuple`.
    pub fn from_slots<I>(slots: I) -> Self
    where
        I: IntoIterator<Item = SlotType>,
    {
        let mut slots: SmallVec<[SlotType; 4]> = slots.into_iter().collect();
        match slots.len() {
            0 => Signature::Unknown,
            1 => match slots.remove(0) {
                SlotType::Known(descriptor) => Signature::Single(descriptor),
                SlotType::Unknown => Signature::Unknown,
            },
            _ => Signature::Tuple(slots),
        }
    }

    /// Tuple signature with every slot known.
    pub fn tuple<I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = TypeDescriptor>,
    {
        Signature::Tuple(descriptors.into_iter().map(SlotType::Known).collect())
    }

    pub fn single(name: &str) -> Self {
        Signature::Single(TypeDescriptor::named(name))
    }

    pub fn kind(&self) -> SignatureKind {
        match self {
            Signature::Single(_) => SignatureKind::Single,
            Signature::Tuple(slots) => SignatureKind::Tuple(slots.len()),
            Signature::Unknown => SignatureKind::Unknown,
        }
    }

    /// Number of slots, `None` when unknown.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Signature::Single(_) => Some(1),
            Signature::Tuple(slots) => Some(slots.len()),
            Signature::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Signature::Unknown)
    }

    /// Whether the whole signature or any tuple slot is unknown.
    pub fn has_unknown(&self) -> bool {
        match self {
            Signature::Single(_) => false,
            Signature::Tuple(slots) => slots.iter().any(|slot| *slot == SlotType::Unknown),
            Signature::Unknown => true,
        }
    }

    /// Slots in order. `Unknown` has none.
    pub fn slots(&self) -> SmallVec<[SlotType; 4]> {
        match self {
            Signature::Single(descriptor) => SmallVec::from_elem(SlotType::Known(descriptor.clone()), 1),
            Signature::Tuple(slots) => slots.clone(),
            Signature::Unknown => SmallVec::new(),
        }
    }

    pub fn slot(&self, index: usize) -> Option<SlotType> {
        match self {
            Signature::Single(descriptor) if index == 0 => Some(SlotType::Known(descriptor.clone())),
            Signature::Single(_) => None,
            Signature::Tuple(slots) => slots.get(index).cloned(),
            Signature::Unknown => Some(SlotType::Unknown),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signature::Single(descriptor) => write!(f, "{descriptor}"),
            Signature::Tuple(slots) => {
                f.write_str("(")?;
                for (i, slot) in slots.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{slot}")?;
                }
                f.write_str(")")
            }
            Signature::Unknown => f.write_str("?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slots_collapses_single() {
        let long = TypeDescriptor::named("Long");
        assert_eq!(
            Signature::from_slots([SlotType::Known(long.clone())]),
            Signature::Single(long)
        );
        assert_eq!(Signature::from_slots([SlotType::Unknown]), Signature::Unknown);
        assert_eq!(Signature::from_slots(Vec::new()), Signature::Unknown);
        assert_eq!(
            Signature::from_slots([SlotType::Unknown, SlotType::Unknown]).kind(),
            SignatureKind::Tuple(2)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Signature::single("Number").to_string(), "Number");
        let tuple = Signature::from_slots([
            SlotType::Known(TypeDescriptor::named("Long")),
            SlotType::Unknown,
        ]);
        assert_eq!(tuple.to_string(), "(Long, ?)");
        assert_eq!(Signature::Unknown.to_string(), "?");
    }

    #[test]
    fn test_arity_and_slots() {
        let pair = Signature::tuple([TypeDescriptor::named("Long"), TypeDescriptor::named("String")]);
        assert_eq!(pair.arity(), Some(2));
        assert_eq!(pair.slot(1), Some(SlotType::Known(TypeDescriptor::named("String"))));
        assert_eq!(pair.slot(2), None);
        assert!(!pair.has_unknown());
        assert_eq!(Signature::Unknown.arity(), None);
        assert_eq!(Signature::Unknown.slot(7), Some(SlotType::Unknown));
        assert_eq!(Signature::single("Long").slots().len(), 1);
    }
}
