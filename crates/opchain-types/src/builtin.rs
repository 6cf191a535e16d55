//! Builtin type hierarchy.
//!
//! Value types, collection interfaces and the capability interfaces operations
//! implement. Declarations are listed parents first.

pub const OBJECT: &str = crate::descriptor::ROOT_TYPE;
pub const COMPARABLE: &str = "Comparable";
pub const CHAR_SEQUENCE: &str = "CharSequence";
pub const NUMBER: &str = "Number";
pub const INTEGER: &str = "Integer";
pub const LONG: &str = "Long";
pub const DOUBLE: &str = "Double";
pub const STRING: &str = "String";
pub const BOOLEAN: &str = "Boolean";
pub const BYTE: &str = "byte";
pub const ITERABLE: &str = "Iterable";
pub const COLLECTION: &str = "Collection";
pub const LIST: &str = "List";
pub const SET: &str = "Set";
pub const MAP: &str = "Map";

pub const FUNCTION: &str = "Function";
pub const FUNCTION2: &str = "Function2";
pub const FUNCTION3: &str = "Function3";
pub const PREDICATE: &str = "Predicate";
pub const PREDICATE2: &str = "Predicate2";
pub const BI_FUNCTION: &str = "BiFunction";
pub const BINARY_OPERATOR: &str = "BinaryOperator";

pub const BUILTIN_DECLARATIONS: &[&str] = &[
    "interface Comparable<T>",
    "interface CharSequence",
    "class Number",
    "class Integer extends Number implements Comparable<Integer>",
    "class Long extends Number implements Comparable<Long>",
    "class Double extends Number implements Comparable<Double>",
    "class String implements CharSequence, Comparable<String>",
    "class Boolean implements Comparable<Boolean>",
    "class byte",
    "interface Iterable<T>",
    "interface Collection<T> extends Iterable<T>",
    "interface List<T> extends Collection<T>",
    "interface Set<T> extends Collection<T>",
    "interface Map<K, V>",
    "interface Function<I, O>",
    "interface Function2<I1, I2, O>",
    "interface Function3<I1, I2, I3, O>",
    "interface Predicate<I>",
    "interface Predicate2<I1, I2>",
    "interface BiFunction<T, U, R>",
    "interface BinaryOperator<T> extends BiFunction<T, T, T>",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TypeDescriptor, TypeRegistry};

    #[test]
    fn test_builtins_declare_cleanly() {
        let registry = TypeRegistry::new();
        let count = registry.declare_all(BUILTIN_DECLARATIONS.iter().copied()).unwrap();
        assert_eq!(count, BUILTIN_DECLARATIONS.len());
        assert_eq!(registry.len(), BUILTIN_DECLARATIONS.len() + 1);
    }

    #[test]
    fn test_numeric_types_are_numbers() {
        let registry = TypeRegistry::global();
        let number = TypeDescriptor::named(NUMBER);
        for name in [INTEGER, LONG, DOUBLE] {
            assert!(registry.is_subtype(&TypeDescriptor::named(name), &number), "{name}");
        }
    }

    #[test]
    fn test_list_is_iterable() {
        let registry = TypeRegistry::global();
        assert!(registry.is_subtype(
            &TypeDescriptor::named(LIST),
            &TypeDescriptor::named(ITERABLE)
        ));
        assert!(!registry.is_subtype(
            &TypeDescriptor::named(MAP),
            &TypeDescriptor::named(ITERABLE)
        ));
    }
}
