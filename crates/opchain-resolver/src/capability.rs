//! Operation capabilities and the interfaces that define their slots.

use std::fmt;

use opchain_types::builtin;

/// Where a capability interface takes one of its slot types from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSource {
    /// Bound from the named type parameter of the interface.
    Param(&'static str),
    /// Always the named type, whatever the bindings.
    Fixed(&'static str),
}

/// A generic interface whose parameters define a capability's slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityInterface {
    pub name: &'static str,
    /// Input parameters in declaration order.
    pub inputs: &'static [&'static str],
    pub output: SlotSource,
}

const FUNCTION_INTERFACES: &[CapabilityInterface] = &[
    CapabilityInterface {
        name: builtin::FUNCTION,
        inputs: &["I"],
        output: SlotSource::Param("O"),
    },
    CapabilityInterface {
        name: builtin::FUNCTION2,
        inputs: &["I1", "I2"],
        output: SlotSource::Param("O"),
    },
    CapabilityInterface {
        name: builtin::FUNCTION3,
        inputs: &["I1", "I2", "I3"],
        output: SlotSource::Param("O"),
    },
];

const PREDICATE_INTERFACES: &[CapabilityInterface] = &[
    CapabilityInterface {
        name: builtin::PREDICATE,
        inputs: &["I"],
        output: SlotSource::Fixed(builtin::BOOLEAN),
    },
    CapabilityInterface {
        name: builtin::PREDICATE2,
        inputs: &["I1", "I2"],
        output: SlotSource::Fixed(builtin::BOOLEAN),
    },
];

const BINARY_OPERATOR_INTERFACES: &[CapabilityInterface] = &[CapabilityInterface {
    name: builtin::BI_FUNCTION,
    inputs: &["T", "U"],
    output: SlotSource::Param("R"),
}];

/// What an operation does with its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Maps an input to an output.
    Function,
    /// Tests an input, producing `Boolean`.
    Predicate,
    /// Folds two values of the same type into one.
    BinaryOperator,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::Function,
        Capability::Predicate,
        Capability::BinaryOperator,
    ];

    /// Interfaces defining this capability's slots.
    pub fn interfaces(self) -> &'static [CapabilityInterface] {
        match self {
            Capability::Function => FUNCTION_INTERFACES,
            Capability::Predicate => PREDICATE_INTERFACES,
            Capability::BinaryOperator => BINARY_OPERATOR_INTERFACES,
        }
    }

    /// The capability interface with the given name, if any.
    pub fn interface(self, name: &str) -> Option<&'static CapabilityInterface> {
        self.interfaces().iter().find(|interface| interface.name == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::Function => "function",
            Capability::Predicate => "predicate",
            Capability::BinaryOperator => "binary_operator",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opchain_types::TypeRegistry;

    #[test]
    fn test_interfaces_match_registry_params() {
        let registry = TypeRegistry::global();
        for capability in Capability::ALL {
            for interface in capability.interfaces() {
                let decl = registry.get_named(interface.name).unwrap();
                for param in interface.inputs {
                    assert!(decl.params.iter().any(|p| &**p == *param), "{}", interface.name);
                }
                if let SlotSource::Param(param) = interface.output {
                    assert!(decl.params.iter().any(|p| &**p == param), "{}", interface.name);
                }
            }
        }
    }

    #[test]
    fn test_interface_lookup() {
        assert!(Capability::Predicate.interface("Predicate2").is_some());
        assert!(Capability::Predicate.interface("Function").is_none());
        assert_eq!(Capability::BinaryOperator.to_string(), "binary_operator");
    }
}
