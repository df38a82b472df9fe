//! Weighted-category grade calculation and class analytics.
//!
//! The engine is pure and synchronous: every entry point takes typed
//! records and returns a typed result. Data problems never surface as
//! `Err`; they show up as ungraded records, validation findings, or a
//! formula outcome's `error` field.

pub mod analytics;
pub mod config;
pub mod error;
pub mod filter;
pub mod formula;
pub mod grading;
pub mod letter;
pub mod models;
pub mod report;
pub mod rounding;
pub mod snapshot;
pub mod telemetry;
pub mod terms;
pub mod validation;

pub use analytics::{analyze_gradebook, grade_distribution, PoolStatistics};
pub use error::{FormulaError, SnapshotError};
pub use filter::{
    dataset_version, filter_options, FilterCache, FilterContext, FilterOptions, GradeFilter,
    ScoreBand,
};
pub use formula::{
    describe_formula, evaluate_formula, evaluate_formula_with_budget, EvaluationBudget,
    FormulaDetail, FormulaOutcome,
};
pub use grading::{aggregate_category, compose_final_grade, rank_students, student_summary};
pub use letter::{letter_grade, letter_rank, GradingScale, PerformanceLevel};
pub use models::*;
pub use rounding::{round, RoundingMethod};
pub use validation::{validate_config, validate_formula};
