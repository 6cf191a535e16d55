//! Declared-supertype registry.
//!
//! Generic bindings are not recoverable from Rust values at runtime, so every nominal
//! type records its ancestry explicitly: its type parameters, an optional superclass and
//! the interfaces it implements, each with the type arguments supplied at that edge.
//!
//! Declarations are validated on insert. Parents must already be declared, which makes
//! cyclic ancestry impossible by construction.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::builtin::BUILTIN_DECLARATIONS;
use crate::descriptor::TypeDescriptor;
use crate::type_parsing::{parse_declaration, TypeParseError};

static GLOBAL_REGISTRY: LazyLock<TypeRegistry> = LazyLock::new(TypeRegistry::with_builtins);

/// A type argument supplied at an inheritance edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A concrete type.
    Concrete(TypeDescriptor),
    /// A type parameter of the declaring type.
    Var(Arc<str>),
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Concrete(descriptor) => write!(f, "{descriptor}"),
            TypeRef::Var(name) => write!(f, "{name}"),
        }
    }
}

/// One inheritance edge: the parent type and the arguments bound to its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub target: TypeDescriptor,
    pub args: Vec<TypeRef>,
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(ToString::to_string).collect();
            write!(f, "<{}>", args.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Class,
    Interface,
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclKind::Class => f.write_str("class"),
            DeclKind::Interface => f.write_str("interface"),
        }
    }
}

/// The declared shape of one nominal type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub kind: DeclKind,
    pub descriptor: TypeDescriptor,
    pub params: Vec<Arc<str>>,
    /// Explicit superclass. Classes without one extend the root implicitly.
    pub superclass: Option<ParentRef>,
    pub interfaces: Vec<ParentRef>,
}

impl TypeDecl {
    /// Direct parents, superclass first.
    pub fn parents(&self) -> impl Iterator<Item = &ParentRef> {
        self.superclass.iter().chain(self.interfaces.iter())
    }

    fn root() -> Self {
        Self {
            kind: DeclKind::Class,
            descriptor: TypeDescriptor::root(),
            params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
        }
    }
}

impl fmt::Display for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.descriptor)?;
        if !self.params.is_empty() {
            let params: Vec<&str> = self.params.iter().map(|p| &**p).collect();
            write!(f, "<{}>", params.join(", "))?;
        }
        let join = |parents: &[ParentRef]| {
            parents
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self.kind {
            DeclKind::Class => {
                if let Some(superclass) = &self.superclass {
                    write!(f, " extends {superclass}")?;
                }
                if !self.interfaces.is_empty() {
                    write!(f, " implements {}", join(&self.interfaces))?;
                }
            }
            DeclKind::Interface => {
                if !self.interfaces.is_empty() {
                    write!(f, " extends {}", join(&self.interfaces))?;
                }
            }
        }
        Ok(())
    }
}

/// Errors raised while declaring or looking up types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Parse(#[from] TypeParseError),

    #[error("type `{ty}` is not declared")]
    UnknownType { ty: String },

    #[error("`{ty}` inherits from undeclared type `{parent}`")]
    UnknownParent { ty: String, parent: String },

    #[error("`{ty}` uses undeclared type `{arg}` as a type argument")]
    UnknownArgument { ty: String, arg: String },

    #[error("`{ty}` supplies {actual} type argument(s) to `{parent}`, which takes {expected}")]
    ParentArity {
        ty: String,
        parent: String,
        expected: usize,
        actual: usize,
    },

    #[error("`{ty}` refers to type variable `{var}`, which it does not declare")]
    UnboundVariable { ty: String, var: String },

    #[error("`{ty}` declares type parameter `{param}` twice")]
    DuplicateParameter { ty: String, param: String },

    #[error("`{ty}` cannot inherit from `{parent}`: {reason}")]
    KindMismatch {
        ty: String,
        parent: String,
        reason: &'static str,
    },

    #[error("`{ty}` is already declared differently")]
    Conflict { ty: String },

    #[error("array type `{ty}` cannot be declared; arrays derive from their element type")]
    ArrayDeclaration { ty: String },
}

/// Registry of declared types and their direct parents.
///
/// Reads vastly outnumber writes, so the map sits behind a `parking_lot::RwLock`.
/// Declarations are stored as `Arc<TypeDecl>` so traversals never hold the lock.
pub struct TypeRegistry {
    decls: RwLock<HashMap<TypeDescriptor, Arc<TypeDecl>>>,
}

impl TypeRegistry {
    /// A registry containing only the universal root type.
    pub fn new() -> Self {
        let root = TypeDecl::root();
        let mut decls = HashMap::new();
        decls.insert(root.descriptor.clone(), Arc::new(root));
        Self {
            decls: RwLock::new(decls),
        }
    }

    /// A registry pre-populated with the builtin hierarchy.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry
            .declare_all(BUILTIN_DECLARATIONS.iter().copied())
            .expect("builtin declarations are well formed");
        registry
    }

    /// Process-wide registry holding the builtin hierarchy.
    pub fn global() -> &'static TypeRegistry {
        &GLOBAL_REGISTRY
    }

    /// Independent copy of the current declarations.
    pub fn snapshot(&self) -> TypeRegistry {
        Self {
            decls: RwLock::new(self.decls.read().clone()),
        }
    }

    /// Parse and declare one textual declaration.
    pub fn declare_str(&self, source: &str) -> Result<Arc<TypeDecl>, RegistryError> {
        let decl = parse_declaration(source)?;
        self.declare(decl)
    }

    /// Declare several textual declarations in order. Returns how many were processed.
    pub fn declare_all<I, S>(&self, sources: I) -> Result<usize, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut count = 0;
        for source in sources {
            self.declare_str(source.as_ref())?;
            count += 1;
        }
        Ok(count)
    }

    /// Declare a type. Redeclaring an identical type is a no-op.
    pub fn declare(&self, decl: TypeDecl) -> Result<Arc<TypeDecl>, RegistryError> {
        let mut decls = self.decls.write();

        if let Some(existing) = decls.get(&decl.descriptor) {
            if **existing == decl {
                return Ok(existing.clone());
            }
            return Err(RegistryError::Conflict {
                ty: decl.descriptor.to_string(),
            });
        }

        validate(&decls, &decl)?;
        tracing::trace!(decl = %decl, "declared type");

        let decl = Arc::new(decl);
        decls.insert(decl.descriptor.clone(), decl.clone());
        Ok(decl)
    }

    pub fn get(&self, ty: &TypeDescriptor) -> Option<Arc<TypeDecl>> {
        self.decls.read().get(ty).cloned()
    }

    /// Look up a declaration by name.
    pub fn get_named(&self, name: &str) -> Option<Arc<TypeDecl>> {
        self.get(&TypeDescriptor::named(name))
    }

    /// Whether the type is known. Arrays are known when their element type is.
    pub fn contains(&self, ty: &TypeDescriptor) -> bool {
        let decls = self.decls.read();
        contains_in(&decls, ty)
    }

    pub fn len(&self) -> usize {
        self.decls.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.read().is_empty()
    }

    /// Every declared descriptor, sorted by name.
    pub fn descriptors(&self) -> Vec<TypeDescriptor> {
        let mut all: Vec<_> = self.decls.read().keys().cloned().collect();
        all.sort();
        all
    }

    /// Lazy upward traversal of `ty`'s ancestry.
    ///
    /// Yields `ty` itself, then its superclass chain, then every interface reachable
    /// from those (breadth-first, each once), and finally the root. Arrays yield
    /// themselves and the root only.
    pub fn ancestors(&self, ty: &TypeDescriptor) -> Result<Ancestors<'_>, RegistryError> {
        if !self.contains(ty) {
            return Err(RegistryError::UnknownType { ty: ty.to_string() });
        }
        Ok(Ancestors::new(self, ty.clone()))
    }

    /// Whether `sub` is `sup` or one of its descendants.
    ///
    /// Undeclared types are only subtypes of themselves and the root.
    pub fn is_subtype(&self, sub: &TypeDescriptor, sup: &TypeDescriptor) -> bool {
        if sub == sup || sup.is_root() {
            return true;
        }
        match self.ancestors(sub) {
            Ok(mut ancestors) => ancestors.any(|ancestor| &ancestor == sup),
            Err(_) => false,
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.len())
            .finish()
    }
}

fn contains_in(decls: &HashMap<TypeDescriptor, Arc<TypeDecl>>, ty: &TypeDescriptor) -> bool {
    if ty.is_array() {
        return decls.contains_key(&TypeDescriptor::named(ty.name()));
    }
    decls.contains_key(ty)
}

fn validate(
    decls: &HashMap<TypeDescriptor, Arc<TypeDecl>>,
    decl: &TypeDecl,
) -> Result<(), RegistryError> {
    let ty = decl.descriptor.to_string();

    if decl.descriptor.is_array() {
        return Err(RegistryError::ArrayDeclaration { ty });
    }

    let mut seen_params = HashSet::new();
    for param in &decl.params {
        if !seen_params.insert(param.clone()) {
            return Err(RegistryError::DuplicateParameter {
                ty,
                param: param.to_string(),
            });
        }
    }

    if let Some(superclass) = &decl.superclass {
        if decl.kind == DeclKind::Interface {
            return Err(RegistryError::KindMismatch {
                ty,
                parent: superclass.target.to_string(),
                reason: "interfaces have no superclass",
            });
        }
        let parent = validate_edge(decls, decl, superclass)?;
        if parent.kind != DeclKind::Class {
            return Err(RegistryError::KindMismatch {
                ty,
                parent: superclass.target.to_string(),
                reason: "a class can only extend another class",
            });
        }
    }

    for interface in &decl.interfaces {
        let parent = validate_edge(decls, decl, interface)?;
        if parent.kind != DeclKind::Interface {
            let reason = match decl.kind {
                DeclKind::Class => "only interfaces can be implemented",
                DeclKind::Interface => "an interface can only extend interfaces",
            };
            return Err(RegistryError::KindMismatch {
                ty: ty.clone(),
                parent: interface.target.to_string(),
                reason,
            });
        }
    }

    Ok(())
}

fn validate_edge(
    decls: &HashMap<TypeDescriptor, Arc<TypeDecl>>,
    decl: &TypeDecl,
    edge: &ParentRef,
) -> Result<Arc<TypeDecl>, RegistryError> {
    let ty = decl.descriptor.to_string();
    let parent = decls
        .get(&edge.target)
        .cloned()
        .ok_or_else(|| RegistryError::UnknownParent {
            ty: ty.clone(),
            parent: edge.target.to_string(),
        })?;

    if parent.params.len() != edge.args.len() {
        return Err(RegistryError::ParentArity {
            ty,
            parent: edge.target.to_string(),
            expected: parent.params.len(),
            actual: edge.args.len(),
        });
    }

    for arg in &edge.args {
        match arg {
            TypeRef::Var(var) => {
                if !decl.params.contains(var) {
                    return Err(RegistryError::UnboundVariable {
                        ty,
                        var: var.to_string(),
                    });
                }
            }
            TypeRef::Concrete(arg) => {
                // `class Long implements Comparable<Long>` refers to itself.
                let self_reference = arg.name() == decl.descriptor.name();
                if !self_reference && !contains_in(decls, arg) {
                    return Err(RegistryError::UnknownArgument {
                        ty,
                        arg: arg.to_string(),
                    });
                }
            }
        }
    }

    Ok(parent)
}

/// Lazy, non-restartable ancestry traversal produced by [`TypeRegistry::ancestors`].
pub struct Ancestors<'r> {
    registry: &'r TypeRegistry,
    start: Option<TypeDescriptor>,
    next_class: Option<TypeDescriptor>,
    interfaces: VecDeque<TypeDescriptor>,
    seen: HashSet<TypeDescriptor>,
    root_pending: bool,
}

impl<'r> Ancestors<'r> {
    fn new(registry: &'r TypeRegistry, start: TypeDescriptor) -> Self {
        let root_pending = !start.is_root();
        Self {
            registry,
            start: Some(start),
            next_class: None,
            interfaces: VecDeque::new(),
            seen: HashSet::new(),
            root_pending,
        }
    }

    /// Queue the parents of `ty` and return its superclass, if any.
    fn expand(&mut self, ty: &TypeDescriptor) -> Option<TypeDescriptor> {
        if ty.is_array() {
            return None;
        }
        let decl = self.registry.get(ty)?;
        for interface in &decl.interfaces {
            self.interfaces.push_back(interface.target.clone());
        }
        decl.superclass
            .as_ref()
            .map(|superclass| superclass.target.clone())
    }
}

impl Iterator for Ancestors<'_> {
    type Item = TypeDescriptor;

    fn next(&mut self) -> Option<TypeDescriptor> {
        if let Some(start) = self.start.take() {
            self.next_class = self.expand(&start);
            self.seen.insert(start.clone());
            return Some(start);
        }

        while let Some(class) = self.next_class.take() {
            self.next_class = self.expand(&class);
            if class.is_root() || !self.seen.insert(class.clone()) {
                continue;
            }
            return Some(class);
        }

        while let Some(interface) = self.interfaces.pop_front() {
            if !self.seen.insert(interface.clone()) {
                continue;
            }
            self.expand(&interface);
            return Some(interface);
        }

        if self.root_pending {
            self.root_pending = false;
            return Some(TypeDescriptor::root());
        }
        None
    }
}
