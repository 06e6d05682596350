use thiserror::Error;

use crate::evaluator::EvalError;

/// Errors that stop a query from being built.
///
/// Every variant means "this query cannot be expressed"; nothing here is
/// retried.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Expression node kind the translator has no rendering for
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// Method call outside the supported query surface
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// Operator that cannot be applied to the given operand shapes
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// Supported method called with arguments of the wrong shape
    #[error("malformed call to {method}: {reason}")]
    MalformedCall { method: String, reason: String },

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl QueryError {
    pub(crate) fn malformed(method: &str, reason: impl Into<String>) -> Self {
        QueryError::MalformedCall {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while converting projections to and from JSON.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("projection is not valid JSON after conversion: {0}")]
    Json(#[from] serde_json::Error),

    #[error("projection did not convert to an object: {0}")]
    NotAnObject(String),

    #[error("invalid include path: {0}")]
    IncludePath(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;
