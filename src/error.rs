//! Query compilation and execution errors.

use thiserror::Error;

/// Result type for compilation and list operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while compiling or running a list/aggregate request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// A filter, sort or aggregation references a column that cannot be
    /// resolved against the model, directly or through a relation chain.
    #[error("field '{field}' not found")]
    FieldNotFound { field: String },

    /// The aggregation is not legal for the column's type.
    #[error("aggregation '{aggregation}' is not available for column type {uidt}")]
    AggregationNotAvailable { aggregation: String, uidt: String },

    /// Metadata inconsistency: dangling foreign key or missing junction model.
    #[error("cannot resolve relation for column '{column}': {reason}")]
    UnresolvableRelation { column: String, reason: String },

    /// The formula sub-compiler rejected a formula column.
    #[error("formula column '{column}' failed to compile: {message}")]
    FormulaCompile { column: String, message: String },

    /// A lookup/relation chain is deeper than the configured bound.
    #[error("relation chain for column '{column}' exceeds maximum depth {max_depth}")]
    DepthExceeded { column: String, max_depth: usize },

    /// A combination the compiler knows about but cannot emit for this dialect.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Malformed where-string, or an operator not allowed for the column type.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The metadata store failed.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// The database driver failed.
    #[error("execution error: {0}")]
    Execution(String),
}

impl QueryError {
    pub fn field_not_found(field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            field: field.into(),
        }
    }

    pub fn unresolvable(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnresolvableRelation {
            column: column.into(),
            reason: reason.into(),
        }
    }

    pub fn formula(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FormulaCompile {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this error is an unresolvable field reference.
    pub fn is_field_not_found(&self) -> bool {
        matches!(self, Self::FieldNotFound { .. })
    }

    /// Check if this error came from the formula sub-compiler.
    pub fn is_formula_error(&self) -> bool {
        matches!(self, Self::FormulaCompile { .. })
    }

    /// Check if lenient compilation may skip the offending term.
    pub fn is_recoverable(&self) -> bool {
        self.is_field_not_found()
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Metadata(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = QueryError::field_not_found("cl_123");
        assert_eq!(err.to_string(), "field 'cl_123' not found");

        let err = QueryError::AggregationNotAvailable {
            aggregation: "earliestDate".into(),
            uidt: "Number".into(),
        };
        assert_eq!(
            err.to_string(),
            "aggregation 'earliestDate' is not available for column type Number"
        );
    }

    #[test]
    fn test_predicates() {
        assert!(QueryError::field_not_found("x").is_recoverable());
        assert!(!QueryError::unresolvable("x", "missing model").is_recoverable());
        assert!(QueryError::formula("f", "bad").is_formula_error());
        assert!(!QueryError::Execution("boom".into()).is_formula_error());
        assert!(!QueryError::DepthExceeded {
            column: "l".into(),
            max_depth: 32
        }
        .is_recoverable());
    }
}
