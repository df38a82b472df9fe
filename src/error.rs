use std::path::PathBuf;

use thiserror::Error;

/// Why a formula could not produce a number.
///
/// These never escape [`crate::formula::evaluate_formula`]; they are
/// rendered into the outcome's `error` field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("custom formula has no expression")]
    MissingExpression,
    #[error("expression is longer than {limit} bytes")]
    TooLong { limit: usize },
    #[error("unexpected character '{found}' at byte {position}")]
    UnexpectedCharacter { found: char, position: usize },
    #[error("invalid number '{text}' at byte {position}")]
    InvalidNumber { text: String, position: usize },
    #[error("expected {expected} at byte {position}")]
    UnexpectedToken {
        expected: &'static str,
        position: usize,
    },
    #[error("unknown variable '{0}'; use grades or assignments")]
    UnknownVariable(String),
    #[error("unknown function '{0}'; use sum, average, max, min, or count")]
    UnknownFunction(String),
    #[error("'{variable}' has no field '{field}'")]
    UnknownField { variable: String, field: String },
    #[error("expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },
    #[error("{operation} needs a number but got a list")]
    ExpectedNumber { operation: &'static str },
    #[error("division by zero")]
    DivisionByZero,
    #[error("{function} of an empty list is undefined")]
    EmptyList { function: &'static str },
    #[error("result is a list; reduce it with sum, average, max, min, or count")]
    ListResult,
    #[error("result is not a finite number")]
    NonFinite,
    #[error("evaluation exceeded the budget of {limit} steps")]
    BudgetExhausted { limit: usize },
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot is not valid JSON")]
    Json(#[from] serde_json::Error),
}
