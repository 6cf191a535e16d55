//! The introspection surface every operation exposes to the resolver.

use std::fmt;

use opchain_types::TypeDescriptor;

use crate::capability::Capability;
use crate::resolver::{ResolveError, SignatureResolver};
use crate::signature::Signature;

/// Input and output signatures of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    pub input: Signature,
    pub output: Signature,
}

impl Shape {
    pub fn new(input: Signature, output: Signature) -> Self {
        Self { input, output }
    }

    pub fn unknown() -> Self {
        Self::new(Signature::Unknown, Signature::Unknown)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.input, self.output)
    }
}

/// An operation whose signatures can be resolved.
///
/// Most operations only name their runtime type; the resolver recovers their slots
/// from that type's declared ancestry. Wrappers whose shape depends on their children
/// (composites, adapters, negation) override [`Operation::declared_shape`].
pub trait Operation: fmt::Debug + Send + Sync {
    /// Most specific runtime type of this instance.
    fn type_descriptor(&self) -> TypeDescriptor;

    fn capability(&self) -> Capability;

    /// Explicit shape, bypassing ancestry resolution.
    fn declared_shape(&self, _resolver: &SignatureResolver<'_>) -> Result<Option<Shape>, ResolveError> {
        Ok(None)
    }
}

impl<O: Operation + ?Sized> Operation for Box<O> {
    fn type_descriptor(&self) -> TypeDescriptor {
        (**self).type_descriptor()
    }

    fn capability(&self) -> Capability {
        (**self).capability()
    }

    fn declared_shape(&self, resolver: &SignatureResolver<'_>) -> Result<Option<Shape>, ResolveError> {
        (**self).declared_shape(resolver)
    }
}
