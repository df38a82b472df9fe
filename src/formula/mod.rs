//! User-authored aggregation formulas.

mod eval;
mod parser;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use eval::FormulaScope;
pub use parser::CompiledExpression;

use crate::error::FormulaError;
use crate::grading::aggregate_records;
use crate::letter::NOT_AVAILABLE;
use crate::models::{
    AssignmentIndex, AssignmentRef, DisplayFormat, FormulaDefinition, FormulaParameters,
    FormulaType, GradeRecord,
};
use crate::rounding::RoundingMethod;

/// Resource limits for CUSTOM expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationBudget {
    pub max_steps: usize,
    pub max_depth: usize,
    /// Measured in bytes.
    pub max_length: usize,
}

impl Default for EvaluationBudget {
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            max_depth: 64,
            max_length: 2_048,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum FormulaDetail {
    Sum {
        earned_points: f64,
        total_points: f64,
        percentage: f64,
    },
    Average {
        count: usize,
    },
    WeightedAverage {
        total_weight: f64,
        weighted_sum: f64,
    },
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaOutcome {
    pub result: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub detail: FormulaDetail,
}

impl FormulaOutcome {
    fn value(result: f64, detail: FormulaDetail) -> Self {
        Self {
            result,
            error: None,
            detail,
        }
    }

    fn failed(error: &FormulaError) -> Self {
        Self {
            result: 0.0,
            error: Some(error.to_string()),
            detail: FormulaDetail::Custom,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Formats the result with the formula's rounding method and display
    /// format. Failed outcomes render as `N/A`.
    pub fn display(&self, formula: &FormulaDefinition) -> String {
        if self.error.is_some() {
            return NOT_AVAILABLE.to_string();
        }
        let rounded = formula.rounding_method.apply(self.result);
        match formula.display_format {
            DisplayFormat::Percentage => format!("{rounded}%"),
            DisplayFormat::Points => format!("{rounded} pts"),
            DisplayFormat::Decimal => format!("{}", rounded / 100.0),
        }
    }
}

pub fn evaluate_formula(
    formula: &FormulaDefinition,
    records: &[GradeRecord],
    assignments: &[AssignmentRef],
) -> FormulaOutcome {
    evaluate_formula_with_budget(formula, records, assignments, &EvaluationBudget::default())
}

/// Evaluates a formula. Never fails: problems come back in the outcome's
/// `error` field with a result of 0.
pub fn evaluate_formula_with_budget(
    formula: &FormulaDefinition,
    records: &[GradeRecord],
    assignments: &[AssignmentRef],
    budget: &EvaluationBudget,
) -> FormulaOutcome {
    let index = AssignmentIndex::new(assignments);
    let params = &formula.parameters;

    let outcome = match formula.formula_type {
        FormulaType::Sum => sum_formula(params, records, &index),
        FormulaType::Average => average_formula(params, records, &index),
        FormulaType::WeightedAverage => {
            weighted_average_formula(params, records, &index, formula.rounding_method)
        }
        FormulaType::Custom => {
            custom_formula(formula.expression.as_deref(), records, assignments, budget)
        }
    };

    match &outcome.error {
        Some(error) => warn!(formula = %formula.name, %error, "formula evaluation failed"),
        None => debug!(formula = %formula.name, result = outcome.result, "evaluated formula"),
    }
    outcome
}

/// Graded records whose assignment passes the category and assignment
/// restrictions. An empty restriction list admits everything.
fn selected<'r, 'a>(
    params: &'r FormulaParameters,
    records: &'r [GradeRecord],
    index: &'r AssignmentIndex<'a>,
) -> impl Iterator<Item = (f64, &'a AssignmentRef)> + 'r {
    records.iter().filter_map(move |record| {
        let score = record.graded_score()?;
        let assignment = index.for_record(record)?;
        let category_ok =
            params.categories.is_empty() || params.categories.contains(&assignment.category);
        let assignment_ok =
            params.assignments.is_empty() || params.assignments.contains(&assignment.id);
        (category_ok && assignment_ok).then_some((score, assignment))
    })
}

fn sum_formula(
    params: &FormulaParameters,
    records: &[GradeRecord],
    index: &AssignmentIndex<'_>,
) -> FormulaOutcome {
    let mut earned_points = 0.0;
    let mut total_points = 0.0;
    for (score, assignment) in selected(params, records, index) {
        earned_points += score;
        if assignment.max_points.is_finite() {
            total_points += assignment.max_points;
        }
    }
    let percentage = if total_points > 0.0 {
        earned_points / total_points * 100.0
    } else {
        0.0
    };

    FormulaOutcome::value(
        earned_points,
        FormulaDetail::Sum {
            earned_points,
            total_points,
            percentage,
        },
    )
}

fn average_formula(
    params: &FormulaParameters,
    records: &[GradeRecord],
    index: &AssignmentIndex<'_>,
) -> FormulaOutcome {
    let scores: Vec<f64> = selected(params, records, index)
        .map(|(score, _)| score)
        .collect();
    let count = scores.len();
    let result = if count > 0 {
        scores.iter().sum::<f64>() / count as f64
    } else {
        0.0
    };
    FormulaOutcome::value(result, FormulaDetail::Average { count })
}

fn weighted_average_formula(
    params: &FormulaParameters,
    records: &[GradeRecord],
    index: &AssignmentIndex<'_>,
    rounding: RoundingMethod,
) -> FormulaOutcome {
    let mut total_weight = 0.0;
    let mut weighted_sum = 0.0;

    for (category, weight) in &params.weights {
        if !weight.is_finite() {
            continue;
        }
        let scoped = records
            .iter()
            .filter(|record| index.category_of(record) == Some(category.as_str()));
        let aggregate = aggregate_records(scoped, index, rounding);
        total_weight += weight;
        weighted_sum += aggregate.percentage * weight / 100.0;
    }

    let result = if total_weight > 0.0 {
        weighted_sum / total_weight * 100.0
    } else {
        0.0
    };
    FormulaOutcome::value(
        result,
        FormulaDetail::WeightedAverage {
            total_weight,
            weighted_sum,
        },
    )
}

fn custom_formula(
    expression: Option<&str>,
    records: &[GradeRecord],
    assignments: &[AssignmentRef],
    budget: &EvaluationBudget,
) -> FormulaOutcome {
    let evaluated = expression
        .ok_or(FormulaError::MissingExpression)
        .and_then(|source| CompiledExpression::compile(source, budget))
        .and_then(|compiled| {
            let scope = FormulaScope::new(records, assignments);
            eval::evaluate(&compiled.root, &scope, budget.max_steps)
        });

    match evaluated {
        Ok(result) => FormulaOutcome::value(result, FormulaDetail::Custom),
        Err(error) => FormulaOutcome::failed(&error),
    }
}

/// One-line human preview of what a formula computes.
pub fn describe_formula(formula: &FormulaDefinition) -> String {
    let params = &formula.parameters;
    let selection = if !params.categories.is_empty() {
        params.categories.join(", ")
    } else if !params.assignments.is_empty() {
        format!("{} selected assignments", params.assignments.len())
    } else {
        "all grades".to_string()
    };

    match formula.formula_type {
        FormulaType::Sum => format!("Sum of {selection}"),
        FormulaType::Average => format!("Average of {selection}"),
        FormulaType::WeightedAverage if params.weights.is_empty() => {
            "Weighted average with no category weights".to_string()
        }
        FormulaType::WeightedAverage => {
            let terms: Vec<String> = params
                .weights
                .iter()
                .map(|(category, weight)| format!("{category} ({weight}%)"))
                .collect();
            format!("Weighted average of {}", terms.join(" + "))
        }
        FormulaType::Custom => match formula.expression.as_deref().map(str::trim) {
            Some(expression) if !expression.is_empty() => format!("Custom: {expression}"),
            _ => "Custom formula with no expression".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignments() -> Vec<AssignmentRef> {
        vec![
            AssignmentRef::new("hw1", "Worksheet 1", "Homework", 10.0, "Math"),
            AssignmentRef::new("hw2", "Worksheet 2", "Homework", 30.0, "Math"),
            AssignmentRef::new("quiz1", "Quiz 1", "Quiz", 20.0, "Math"),
            AssignmentRef::new("test1", "Unit Test", "Test", 50.0, "Math"),
        ]
    }

    fn records() -> Vec<GradeRecord> {
        vec![
            GradeRecord::new("s1", "hw1", Some(100.0)),
            GradeRecord::new("s1", "hw2", Some(50.0)),
            GradeRecord::new("s1", "quiz1", Some(80.0)),
            GradeRecord::new("s1", "test1", None),
        ]
    }

    fn formula(formula_type: FormulaType) -> FormulaDefinition {
        FormulaDefinition::new("check", formula_type)
    }

    #[test]
    fn sum_skips_ungraded_and_filters_by_category() {
        let mut sum = formula(FormulaType::Sum);
        let outcome = evaluate_formula(&sum, &records(), &assignments());
        assert_eq!(outcome.result, 230.0);
        assert_eq!(
            outcome.detail,
            FormulaDetail::Sum {
                earned_points: 230.0,
                total_points: 60.0,
                percentage: 230.0 / 60.0 * 100.0,
            }
        );

        sum.parameters.categories = vec!["Quiz".to_string()];
        assert_eq!(evaluate_formula(&sum, &records(), &assignments()).result, 80.0);
    }

    #[test]
    fn average_over_selected_assignments() {
        let mut average = formula(FormulaType::Average);
        average.parameters.assignments = vec!["hw1".to_string(), "hw2".to_string()];
        let outcome = evaluate_formula(&average, &records(), &assignments());
        assert_eq!(outcome.result, 75.0);
        assert_eq!(outcome.detail, FormulaDetail::Average { count: 2 });

        let outcome = evaluate_formula(&average, &[], &assignments());
        assert_eq!(outcome.result, 0.0);
        assert!(outcome.is_ok());
    }

    #[test]
    fn weighted_average_normalises_by_map_weight() {
        let mut weighted = formula(FormulaType::WeightedAverage);
        weighted.parameters.weights.insert("Homework".to_string(), 20.0);
        weighted.parameters.weights.insert("Quiz".to_string(), 20.0);
        let outcome = evaluate_formula(&weighted, &records(), &assignments());
        // Homework (10 + 15) / 40 = 62.5 -> 63, Quiz 80.
        assert!((outcome.result - 71.5).abs() < 1e-9);
        match outcome.detail {
            FormulaDetail::WeightedAverage {
                total_weight,
                weighted_sum,
            } => {
                assert_eq!(total_weight, 40.0);
                assert!((weighted_sum - 28.6).abs() < 1e-9);
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn custom_division_by_zero_is_an_error_outcome() {
        let outcome = evaluate_formula(
            &FormulaDefinition::custom("broken", "1/0"),
            &records(),
            &assignments(),
        );
        assert_eq!(outcome.result, 0.0);
        assert!(outcome.error.as_deref().is_some_and(|e| !e.is_empty()));
    }

    #[test]
    fn custom_expression_sees_grades_and_assignments() {
        let custom = FormulaDefinition::custom("mean", "sum(grades) / count(grades)");
        let outcome = evaluate_formula(&custom, &records(), &assignments());
        assert!(outcome.is_ok());
        assert_eq!(outcome.result, 230.0 / 3.0);

        let missing = FormulaDefinition::new("empty", FormulaType::Custom);
        let outcome = evaluate_formula(&missing, &records(), &assignments());
        assert_eq!(outcome.error.as_deref(), Some("custom formula has no expression"));
    }

    #[test]
    fn tight_budget_surfaces_as_error() {
        let custom = FormulaDefinition::custom("busy", "sum(grades, grades, grades)");
        let budget = EvaluationBudget {
            max_steps: 5,
            ..EvaluationBudget::default()
        };
        let outcome = evaluate_formula_with_budget(&custom, &records(), &assignments(), &budget);
        assert_eq!(outcome.result, 0.0);
        assert!(outcome.error.is_some_and(|e| e.contains("budget")));
    }

    #[test]
    fn display_applies_rounding_and_format() {
        let mut average = formula(FormulaType::Average);
        let outcome = FormulaOutcome::value(86.6, FormulaDetail::Average { count: 1 });
        assert_eq!(outcome.display(&average), "87%");
        average.display_format = DisplayFormat::Points;
        assert_eq!(outcome.display(&average), "87 pts");
        average.display_format = DisplayFormat::Decimal;
        assert_eq!(outcome.display(&average), "0.87");

        let failed = FormulaOutcome::failed(&FormulaError::DivisionByZero);
        assert_eq!(failed.display(&average), "N/A");
    }

    #[test]
    fn descriptions_summarise_parameters() {
        let mut sum = formula(FormulaType::Sum);
        assert_eq!(describe_formula(&sum), "Sum of all grades");
        sum.parameters.categories = vec!["Homework".into(), "Quiz".into()];
        assert_eq!(describe_formula(&sum), "Sum of Homework, Quiz");

        let mut weighted = formula(FormulaType::WeightedAverage);
        weighted.parameters.weights.insert("Quiz".into(), 40.0);
        weighted.parameters.weights.insert("Homework".into(), 60.0);
        assert_eq!(
            describe_formula(&weighted),
            "Weighted average of Homework (60%) + Quiz (40%)"
        );
        assert_eq!(
            describe_formula(&FormulaDefinition::custom("c", " max(grades) ")),
            "Custom: max(grades)"
        );
    }
}
