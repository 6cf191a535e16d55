//! Type descriptors.
//!
//! A [`TypeDescriptor`] is the identity of one concrete type: its nominal name plus
//! an array depth. Descriptors carry no ancestry themselves; the declared supertypes
//! of a name live in a [`TypeRegistry`](crate::TypeRegistry) and are looked up lazily
//! when a traversal needs them.
//!
//! Names are interned process-wide, and descriptors for Rust types implementing
//! [`Nominal`] are cached per [`TypeId`]. Both caches are append-only: entries are
//! inserted once (read-lock fast path, write-lock insert-if-absent) and never evicted.

use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Name of the universal root type every other type descends from.
pub const ROOT_TYPE: &str = "Object";

static INTERNED_NAMES: LazyLock<RwLock<HashSet<Arc<str>>>> =
    LazyLock::new(|| RwLock::new(HashSet::new()));

static DESCRIPTORS_BY_TYPE: LazyLock<RwLock<HashMap<TypeId, TypeDescriptor>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// A Rust type that stands for a nominal type in the registry.
///
/// Leaf operations implement this so their runtime descriptor can be obtained
/// without a registry lookup.
pub trait Nominal: 'static {
    /// Registry name of the type.
    const TYPE_NAME: &'static str;
}

/// Comparable identifier for a concrete type.
///
/// Two descriptors are equal iff their names and array depths are equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeDescriptor {
    name: Arc<str>,
    array_depth: u8,
}

impl TypeDescriptor {
    /// Descriptor for a non-array type with the given name.
    pub fn named(name: &str) -> Self {
        Self {
            name: intern(name),
            array_depth: 0,
        }
    }

    /// Descriptor of the universal root type.
    pub fn root() -> Self {
        Self::named(ROOT_TYPE)
    }

    /// Descriptor for the Rust type `T`, cached for the process lifetime.
    pub fn of<T: Nominal>() -> Self {
        let key = TypeId::of::<T>();
        if let Some(found) = DESCRIPTORS_BY_TYPE.read().get(&key) {
            return found.clone();
        }
        DESCRIPTORS_BY_TYPE
            .write()
            .entry(key)
            .or_insert_with(|| Self::named(T::TYPE_NAME))
            .clone()
    }

    /// Descriptor of an instance's most specific runtime type.
    pub fn of_instance<T: Nominal>(_instance: &T) -> Self {
        Self::of::<T>()
    }

    /// Array of this type (one more level of array depth).
    pub fn array_of(&self) -> Self {
        Self {
            name: self.name.clone(),
            array_depth: self.array_depth.saturating_add(1),
        }
    }

    /// Element type of an array descriptor, `None` for non-arrays.
    pub fn element_type(&self) -> Option<Self> {
        if self.array_depth == 0 {
            return None;
        }
        Some(Self {
            name: self.name.clone(),
            array_depth: self.array_depth - 1,
        })
    }

    /// Nominal name, without array suffixes.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn array_depth(&self) -> u8 {
        self.array_depth
    }

    pub fn is_array(&self) -> bool {
        self.array_depth > 0
    }

    /// Whether this is the universal root type (arrays of the root are not).
    pub fn is_root(&self) -> bool {
        self.array_depth == 0 && &*self.name == ROOT_TYPE
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for _ in 0..self.array_depth {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDescriptor({self})")
    }
}

fn intern(name: &str) -> Arc<str> {
    if let Some(existing) = INTERNED_NAMES.read().get(name) {
        return existing.clone();
    }
    let mut names = INTERNED_NAMES.write();
    if let Some(existing) = names.get(name) {
        return existing.clone();
    }
    let interned: Arc<str> = Arc::from(name);
    names.insert(interned.clone());
    interned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct Marker;

    impl Nominal for Marker {
        const TYPE_NAME: &'static str = "test.Marker";
    }

    #[test]
    fn test_equality_is_name_and_depth() {
        let a = TypeDescriptor::named("Long");
        let b = TypeDescriptor::named("Long");
        assert_eq!(a, b);
        assert_ne!(a, a.array_of());
        assert_eq!(a.array_of(), b.array_of());
        assert_ne!(a, TypeDescriptor::named("Double"));
    }

    #[test]
    fn test_names_are_interned() {
        let a = TypeDescriptor::named("test.Interned");
        let b = TypeDescriptor::named("test.Interned");
        assert!(Arc::ptr_eq(&a.name, &b.name));
    }

    #[test]
    fn test_array_element_round_trip() {
        let string = TypeDescriptor::named("String");
        let matrix = string.array_of().array_of();
        assert_eq!(matrix.to_string(), "String[][]");
        assert_eq!(matrix.element_type(), Some(string.array_of()));
        assert_eq!(string.element_type(), None);
        assert!(!TypeDescriptor::root().array_of().is_root());
    }

    #[test]
    fn test_of_is_cached_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(TypeDescriptor::of::<Marker>))
            .collect();
        let descriptors: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread panicked"))
            .collect();

        assert!(descriptors.iter().all(|d| d.name() == "test.Marker"));
        assert!(descriptors
            .windows(2)
            .all(|pair| Arc::ptr_eq(&pair[0].name, &pair[1].name)));
        assert_eq!(TypeDescriptor::of_instance(&Marker), descriptors[0]);
    }
}
