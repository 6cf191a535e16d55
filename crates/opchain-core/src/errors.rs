//! Error codes and error types for operation composition and execution.
//!
//! # Error Taxonomy
//!
//! | Phase | Purpose | Error Codes |
//! |-------|---------|-------------|
//! | Resolution | Recover operation signatures | E101-E104 |
//! | Composition | Wire operations together | E201-E208 |
//! | Decoding | Read operation documents | E301-E305 |
//! | Execution | Run operations on values | E401-E405 |
//!
//! Unresolvable slots and arity mismatches are not errors: they degrade to an unknown
//! signature or an invalid assignability result respectively. Everything here is
//! deterministic, so no error is retryable.

use serde::{Deserialize, Serialize};
use std::fmt;

use opchain_resolver::{Capability, ResolveError};
use opchain_types::RegistryError;

/// Phase of the operation lifecycle an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Resolution,
    Composition,
    Decoding,
    Execution,
}

impl Phase {
    /// Numeric prefix for this phase (1xx, 2xx, etc.)
    pub fn code_prefix(&self) -> u16 {
        match self {
            Phase::Resolution => 100,
            Phase::Composition => 200,
            Phase::Decoding => 300,
            Phase::Execution => 400,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Phase::Resolution => "resolution",
            Phase::Composition => "composition",
            Phase::Decoding => "decoding",
            Phase::Execution => "execution",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Specific error codes within each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // =========================================================================
    // Resolution Errors (1xx)
    // =========================================================================
    /// E101: Operation type is not declared in the registry
    #[serde(rename = "E101")]
    UndeclaredType,

    /// E102: Operation type does not implement its capability interface
    #[serde(rename = "E102")]
    CapabilityNotImplemented,

    /// E103: Operation reports an inconsistent shape
    #[serde(rename = "E103")]
    InconsistentShape,

    /// E104: A type declaration was rejected by the registry
    #[serde(rename = "E104")]
    InvalidDeclaration,

    // =========================================================================
    // Composition Errors (2xx)
    // =========================================================================
    /// E201: Composite built from no operations
    #[serde(rename = "E201")]
    EmptyComposite,

    /// E202: Adjacent operations are not assignable
    #[serde(rename = "E202")]
    IncompatibleLink,

    /// E203: Composite members accept incompatible inputs
    #[serde(rename = "E203")]
    IncompatibleMembers,

    /// E204: Tuple index outside the record
    #[serde(rename = "E204")]
    IndexOutOfRange,

    /// E205: Tuple output index used twice
    #[serde(rename = "E205")]
    DuplicateOutputIndex,

    /// E206: Index count does not match the wrapped operation's arity
    #[serde(rename = "E206")]
    MappingArity,

    /// E207: Selected record slots do not fit the wrapped operation
    #[serde(rename = "E207")]
    RecordSlotMismatch,

    /// E208: Tuple adapter over a record of unknown width
    #[serde(rename = "E208")]
    UnknownRecordWidth,

    // =========================================================================
    // Decoding Errors (3xx)
    // =========================================================================
    /// E301: Document names an unregistered operation kind
    #[serde(rename = "E301")]
    UnknownKind,

    /// E302: Document has no `kind` tag
    #[serde(rename = "E302")]
    MissingKind,

    /// E303: Document field is missing or malformed
    #[serde(rename = "E303")]
    InvalidField,

    /// E304: Document is not a JSON object
    #[serde(rename = "E304")]
    NotAnObject,

    /// E305: Operation kind registered twice
    #[serde(rename = "E305")]
    DuplicateKind,

    // =========================================================================
    // Execution Errors (4xx)
    // =========================================================================
    /// E401: Value of the wrong type reached an operation
    #[serde(rename = "E401")]
    ValueTypeMismatch,

    /// E402: Record of the wrong width reached a tuple adapter
    #[serde(rename = "E402")]
    RecordWidth,

    /// E403: Operation cannot handle this input
    #[serde(rename = "E403")]
    Unsupported,

    /// E404: CSV input could not be parsed
    #[serde(rename = "E404")]
    CsvParse,

    /// E405: Arithmetic overflow
    #[serde(rename = "E405")]
    Overflow,
}

impl ErrorCode {
    /// Numeric code (e.g., 101, 201, etc.)
    pub fn numeric_code(&self) -> u16 {
        match self {
            // Resolution (1xx)
            ErrorCode::UndeclaredType => 101,
            ErrorCode::CapabilityNotImplemented => 102,
            ErrorCode::InconsistentShape => 103,
            ErrorCode::InvalidDeclaration => 104,
            // Composition (2xx)
            ErrorCode::EmptyComposite => 201,
            ErrorCode::IncompatibleLink => 202,
            ErrorCode::IncompatibleMembers => 203,
            ErrorCode::IndexOutOfRange => 204,
            ErrorCode::DuplicateOutputIndex => 205,
            ErrorCode::MappingArity => 206,
            ErrorCode::RecordSlotMismatch => 207,
            ErrorCode::UnknownRecordWidth => 208,
            // Decoding (3xx)
            ErrorCode::UnknownKind => 301,
            ErrorCode::MissingKind => 302,
            ErrorCode::InvalidField => 303,
            ErrorCode::NotAnObject => 304,
            ErrorCode::DuplicateKind => 305,
            // Execution (4xx)
            ErrorCode::ValueTypeMismatch => 401,
            ErrorCode::RecordWidth => 402,
            ErrorCode::Unsupported => 403,
            ErrorCode::CsvParse => 404,
            ErrorCode::Overflow => 405,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.numeric_code() / 100 {
            1 => Phase::Resolution,
            2 => Phase::Composition,
            3 => Phase::Decoding,
            _ => Phase::Execution,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::UndeclaredType => "operation type is not declared",
            ErrorCode::CapabilityNotImplemented => "operation type does not implement its capability",
            ErrorCode::InconsistentShape => "operation shape is inconsistent",
            ErrorCode::InvalidDeclaration => "type declaration rejected",
            ErrorCode::EmptyComposite => "composite has no operations",
            ErrorCode::IncompatibleLink => "adjacent operations are not assignable",
            ErrorCode::IncompatibleMembers => "composite members accept incompatible inputs",
            ErrorCode::IndexOutOfRange => "tuple index out of range",
            ErrorCode::DuplicateOutputIndex => "duplicate tuple output index",
            ErrorCode::MappingArity => "tuple mapping does not match operation arity",
            ErrorCode::RecordSlotMismatch => "record slots do not fit the operation",
            ErrorCode::UnknownRecordWidth => "record width is unknown",
            ErrorCode::UnknownKind => "unknown operation kind",
            ErrorCode::MissingKind => "operation document has no kind",
            ErrorCode::InvalidField => "operation document field is invalid",
            ErrorCode::NotAnObject => "operation document is not an object",
            ErrorCode::DuplicateKind => "operation kind registered twice",
            ErrorCode::ValueTypeMismatch => "value has the wrong type",
            ErrorCode::RecordWidth => "record has the wrong width",
            ErrorCode::Unsupported => "input not supported by operation",
            ErrorCode::CsvParse => "CSV parsing failed",
            ErrorCode::Overflow => "arithmetic overflow",
        }
    }

    /// String code (e.g., "E101", "E201", etc.)
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric_code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.description())
    }
}

impl From<&ResolveError> for ErrorCode {
    fn from(err: &ResolveError) -> Self {
        match err {
            ResolveError::UndeclaredType { .. } => ErrorCode::UndeclaredType,
            ResolveError::CapabilityNotImplemented { .. } => ErrorCode::CapabilityNotImplemented,
            ResolveError::InconsistentShape { .. } => ErrorCode::InconsistentShape,
        }
    }
}

/// Construction-time failures wiring operations together.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompositionError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{capability} composite requires at least one operation")]
    Empty { capability: Capability },

    #[error("output of operation {index} (`{producer}`) cannot feed operation {next} (`{consumer}`): {reason}", next = .index + 1)]
    IncompatibleLink {
        index: usize,
        producer: String,
        consumer: String,
        reason: String,
    },

    #[error("composite members accept incompatible inputs: {reason}")]
    IncompatibleMembers { reason: String },

    #[error("tuple index {index} is out of range for a record of width {width}")]
    IndexOutOfRange { index: usize, width: usize },

    #[error("tuple output index {index} is used more than once")]
    DuplicateOutputIndex { index: usize },

    #[error("{side} mapping has {actual} index(es) but the operation takes {expected}")]
    MappingArity {
        side: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("selected record slots do not fit the operation: {reason}")]
    RecordSlotMismatch { reason: String },

    #[error("tuple adapter requires a record of known width, got `{record}`")]
    UnknownRecordWidth { record: String },
}

impl CompositionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CompositionError::Resolve(err) => err.into(),
            CompositionError::Empty { .. } => ErrorCode::EmptyComposite,
            CompositionError::IncompatibleLink { .. } => ErrorCode::IncompatibleLink,
            CompositionError::IncompatibleMembers { .. } => ErrorCode::IncompatibleMembers,
            CompositionError::IndexOutOfRange { .. } => ErrorCode::IndexOutOfRange,
            CompositionError::DuplicateOutputIndex { .. } => ErrorCode::DuplicateOutputIndex,
            CompositionError::MappingArity { .. } => ErrorCode::MappingArity,
            CompositionError::RecordSlotMismatch { .. } => ErrorCode::RecordSlotMismatch,
            CompositionError::UnknownRecordWidth { .. } => ErrorCode::UnknownRecordWidth,
        }
    }
}

/// Failures reading operation documents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("operation document must be a JSON object, got {found}")]
    NotAnObject { found: String },

    #[error("operation document has no string `kind` field")]
    MissingKind,

    #[error("unknown {capability} kind `{kind}`")]
    UnknownKind { capability: Capability, kind: String },

    #[error("invalid `{kind}` document: {message}")]
    InvalidField { kind: String, message: String },

    #[error("operation kind `{kind}` is already registered")]
    DuplicateKind { kind: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Composition(#[from] CompositionError),
}

impl DecodeError {
    pub fn invalid(kind: &str, message: impl Into<String>) -> Self {
        DecodeError::InvalidField {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            DecodeError::NotAnObject { .. } => ErrorCode::NotAnObject,
            DecodeError::MissingKind => ErrorCode::MissingKind,
            DecodeError::UnknownKind { .. } => ErrorCode::UnknownKind,
            DecodeError::InvalidField { .. } => ErrorCode::InvalidField,
            DecodeError::DuplicateKind { .. } => ErrorCode::DuplicateKind,
            DecodeError::Registry(_) => ErrorCode::InvalidDeclaration,
            DecodeError::Composition(err) => err.code(),
        }
    }
}

/// Failures applying an operation to a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error("{operation} expected {expected}, got {actual}")]
    TypeMismatch {
        operation: &'static str,
        expected: &'static str,
        actual: String,
    },

    #[error("expected a record of width {expected}, got {actual}")]
    RecordWidth { expected: usize, actual: String },

    #[error("{operation}: {message}")]
    Unsupported {
        operation: &'static str,
        message: String,
    },

    #[error("CSV parsing failed: {message}")]
    Csv { message: String },

    #[error("{operation}: arithmetic overflow")]
    Overflow { operation: &'static str },
}

impl OperationError {
    pub fn type_mismatch(operation: &'static str, expected: &'static str, actual: &opchain_types::Value) -> Self {
        OperationError::TypeMismatch {
            operation,
            expected,
            actual: actual.kind_name().to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            OperationError::TypeMismatch { .. } => ErrorCode::ValueTypeMismatch,
            OperationError::RecordWidth { .. } => ErrorCode::RecordWidth,
            OperationError::Unsupported { .. } => ErrorCode::Unsupported,
            OperationError::Csv { .. } => ErrorCode::CsvParse,
            OperationError::Overflow { .. } => ErrorCode::Overflow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_phases() {
        assert_eq!(ErrorCode::UndeclaredType.phase(), Phase::Resolution);
        assert_eq!(ErrorCode::DuplicateOutputIndex.phase(), Phase::Composition);
        assert_eq!(ErrorCode::UnknownKind.phase(), Phase::Decoding);
        assert_eq!(ErrorCode::Overflow.phase(), Phase::Execution);
        for code in [ErrorCode::InvalidDeclaration, ErrorCode::UnknownRecordWidth, ErrorCode::CsvParse] {
            assert_eq!(code.numeric_code() / 100 * 100, code.phase().code_prefix());
        }
    }

    #[test]
    fn test_code_serialises_as_code_string() {
        let json = serde_json::to_string(&ErrorCode::IncompatibleLink).unwrap();
        assert_eq!(json, "\"E202\"");
        assert_eq!(ErrorCode::IncompatibleLink.code_string(), "E202");
        assert_eq!(
            ErrorCode::EmptyComposite.to_string(),
            "E201: composite has no operations"
        );
    }

    #[test]
    fn test_nested_errors_keep_inner_code() {
        let resolve = ResolveError::UndeclaredType {
            ty: "Ghost".to_string(),
        };
        let composition = CompositionError::from(resolve);
        assert_eq!(composition.code(), ErrorCode::UndeclaredType);

        let decode = DecodeError::from(CompositionError::DuplicateOutputIndex { index: 0 });
        assert_eq!(decode.code(), ErrorCode::DuplicateOutputIndex);
    }

    #[test]
    fn test_incompatible_link_message() {
        let err = CompositionError::IncompatibleLink {
            index: 0,
            producer: "Number".to_string(),
            consumer: "String".to_string(),
            reason: "slot 0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "output of operation 0 (`Number`) cannot feed operation 1 (`String`): slot 0"
        );
    }
}
