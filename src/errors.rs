//! Error types for the scriptfn crate.
//!
//! Failures are grouped by where they arise:
//!
//! - `ValidationError`: a caller passed a bad index, length or separator
//! - `ConvertError`: an expression tree could not be turned into a callable
//! - `CompilationError`: the expression loader rejected a definition
//! - `VectorAssemblyError`: one element of a vector function could not be built
//! - `EvaluationError`: a compiled function was called with wrongly sized buffers
//!
//! `FunctionError` wraps all of them so that `?` composes across the crate.

use thiserror::Error;

/// Errors raised synchronously by setters and indexed accessors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Index outside `[0, len)`
    #[error("index {index} is out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },
    /// A list does not have the number of entries the current dimension requires
    #[error("{what} must have {expected} entries, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    /// A name list separator was empty
    #[error("name list separator must not be empty")]
    EmptySeparator,
}

/// Errors that can occur while turning an evalexpr operator tree into a closure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// Operator that has no numeric meaning here (comparisons, assignments, ...)
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),
    /// Function call that is not in the builtin table
    #[error("unsupported function: {0}")]
    UnsupportedFunction(String),
    /// Function called with the wrong number of arguments
    #[error("function {name} expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
    /// Constant that is not a number
    #[error("expected numeric constant: {0}")]
    NonNumericConstant(String),
    /// Identifier that is neither a parameter nor a known constant
    #[error("unknown variable: {0}")]
    UnknownVariable(String),
    /// Root node with more than one child, i.e. a statement chain
    #[error("expected a single expression")]
    MultipleExpressions,
}

/// Errors reported by an [`ExpressionLoader`](crate::loader::ExpressionLoader).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompilationError {
    /// Required expression is missing or blank
    #[error("missing definition: {0}")]
    MissingDefinition(String),
    /// evalexpr failed to parse the expression
    #[error("failed to parse `{expression}`: {message}")]
    Parse { expression: String, message: String },
    /// The parsed expression could not be converted into a callable
    #[error("failed to compile `{expression}`")]
    Convert {
        expression: String,
        #[source]
        source: ConvertError,
    },
    /// Two parameters share a name
    #[error("duplicate parameter name: {0}")]
    DuplicateParameter(String),
    /// A parameter name is blank
    #[error("parameter {0} has an empty name")]
    EmptyParameterName(usize),
    /// Gradient list length differs from the number of parameters
    #[error("expected {expected} gradient expressions, got {got}")]
    GradientLength { expected: usize, got: usize },
    /// Rejection reported by a custom loader
    #[error("{0}")]
    Rejected(String),
}

/// Errors raised while assembling a vector function from its elements.
#[derive(Error, Debug)]
pub enum VectorAssemblyError {
    /// The element slot is empty; call `synchronize` to fill it
    #[error("element {index} is not defined")]
    MissingElement { index: usize },
    /// The element dimension differs from the vector's parameter count
    #[error("element {index} has dimension {got}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },
    /// The element failed to compile
    #[error("element {index} failed to compile")]
    Element {
        index: usize,
        #[source]
        source: Box<FunctionError>,
    },
}

impl VectorAssemblyError {
    /// Index of the element that could not be built.
    pub fn index(&self) -> usize {
        match self {
            Self::MissingElement { index }
            | Self::DimensionMismatch { index, .. }
            | Self::Element { index, .. } => *index,
        }
    }
}

/// Errors raised when calling a compiled function.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// Error when the input length is not the number of parameters
    #[error("Invalid input length: expected {expected}, got {got}")]
    InvalidInputLength { expected: usize, got: usize },
    /// Error when the output buffer length is not the number of values
    #[error("Invalid output length: expected {expected}, got {got}")]
    InvalidOutputLength { expected: usize, got: usize },
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum FunctionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Compilation(#[from] CompilationError),
    #[error(transparent)]
    VectorAssembly(#[from] VectorAssemblyError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    /// State or configuration could not be (de)serialized
    #[error("serialization failed")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembly_error_index() {
        let err = VectorAssemblyError::Element {
            index: 3,
            source: Box::new(CompilationError::MissingDefinition("value".into()).into()),
        };
        assert_eq!(err.index(), 3);
        assert_eq!(err.to_string(), "element 3 failed to compile");
        assert_eq!(VectorAssemblyError::MissingElement { index: 1 }.index(), 1);
    }

    #[test]
    fn test_validation_message() {
        let err = ValidationError::IndexOutOfRange { index: 4, len: 2 };
        assert_eq!(err.to_string(), "index 4 is out of range (length 2)");
    }
}
