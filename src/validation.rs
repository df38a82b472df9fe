use std::collections::HashSet;

use crate::formula::{CompiledExpression, EvaluationBudget};
use crate::models::{FormulaDefinition, FormulaType, GradeBookConfig, ValidationResult};

const WEIGHT_TOLERANCE: f64 = 0.01;

/// Checks a gradebook configuration. Weights that do not add up to 100 are
/// a warning only, since the composer normalises by the configured total.
pub fn validate_config(config: &GradeBookConfig) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if config.categories.is_empty() {
        errors.push("No categories defined for gradebook".to_string());
        return ValidationResult::from_findings(errors, warnings);
    }

    for category in &config.categories {
        if category.name.trim().is_empty() {
            errors.push("Category names must not be blank".to_string());
        }
        if !category.weight.is_finite() || !(0.0..=100.0).contains(&category.weight) {
            errors.push(format!(
                "Category '{}' has weight {} outside 0-100",
                category.name, category.weight
            ));
        }
    }

    let mut seen = HashSet::new();
    if !config
        .categories
        .iter()
        .all(|category| seen.insert(category.name.as_str()))
    {
        errors.push("Duplicate category names found".to_string());
    }

    let total: f64 = config
        .categories
        .iter()
        .map(|category| category.weight)
        .filter(|weight| weight.is_finite())
        .sum();
    if total == 0.0 {
        warnings.push("All category weights are set to 0".to_string());
    } else if (total - 100.0).abs() > WEIGHT_TOLERANCE {
        warnings.push(format!("Category weights sum to {total}% instead of 100%"));
    }

    ValidationResult::from_findings(errors, warnings)
}

/// Checks a formula before it is saved alongside `existing` ones. The
/// formula itself may appear in `existing`; only another entry with the
/// same name counts as a clash.
pub fn validate_formula(
    formula: &FormulaDefinition,
    existing: &[FormulaDefinition],
) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let name = formula.name.trim();
    if name.is_empty() {
        errors.push("Formula name is required".to_string());
    } else if existing
        .iter()
        .filter(|other| !std::ptr::eq(*other, formula))
        .any(|other| other.name.trim().eq_ignore_ascii_case(name))
    {
        errors.push("Formula name must be unique".to_string());
    }

    if formula.description.trim().is_empty() {
        errors.push("Description is required".to_string());
    }

    match formula.formula_type {
        FormulaType::Custom => match formula.expression.as_deref() {
            Some(expression) if !expression.trim().is_empty() => {
                if let Err(error) =
                    CompiledExpression::compile(expression, &EvaluationBudget::default())
                {
                    errors.push(format!("Invalid expression: {error}"));
                }
            }
            _ => errors.push("Custom formulas need an expression".to_string()),
        },
        FormulaType::WeightedAverage => {
            let weights = &formula.parameters.weights;
            if weights.is_empty() {
                errors.push("At least one category weight is required".to_string());
            } else {
                let total: f64 = weights.values().sum();
                if !total.is_finite() || (total - 100.0).abs() > WEIGHT_TOLERANCE {
                    errors.push("Category weights must sum to 100%".to_string());
                }
            }
        }
        FormulaType::Sum | FormulaType::Average => {
            if formula.expression.is_some() {
                warnings.push("Expression is ignored for non-custom formulas".to_string());
            }
        }
    }

    ValidationResult::from_findings(errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::compose_final_grade;
    use crate::models::{AssignmentRef, CategoryDefinition, GradeRecord};

    fn config(weights: &[(&str, f64)]) -> GradeBookConfig {
        GradeBookConfig::with_categories(
            weights
                .iter()
                .map(|(name, weight)| CategoryDefinition::new(*name, *weight))
                .collect(),
        )
    }

    #[test]
    fn empty_config_is_an_error() {
        let result = validate_config(&GradeBookConfig::default());
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["No categories defined for gradebook"]);
    }

    #[test]
    fn partial_weights_only_warn() {
        let result = validate_config(&config(&[("Homework", 20.0), ("Quiz", 40.0)]));
        assert!(result.is_valid);
        assert_eq!(
            result.warnings,
            vec!["Category weights sum to 60% instead of 100%"]
        );
    }

    #[test]
    fn zero_weights_warn_once() {
        let result = validate_config(&config(&[("Homework", 0.0), ("Quiz", 0.0)]));
        assert!(result.is_valid);
        assert_eq!(result.warnings, vec!["All category weights are set to 0"]);
    }

    #[test]
    fn duplicates_and_bad_weights_are_errors() {
        let result = validate_config(&config(&[
            ("Homework", 50.0),
            ("Homework", 50.0),
            ("Quiz", f64::NAN),
            ("Test", 120.0),
        ]));
        assert!(!result.is_valid);
        assert!(result.errors.contains(&"Duplicate category names found".to_string()));
        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn names_differing_only_by_case_are_distinct() {
        let result = validate_config(&config(&[("Quiz", 50.0), ("quiz", 50.0)]));
        assert!(result.is_valid, "{:?}", result.errors);

        let assignments = vec![
            AssignmentRef::new("q1", "Pop Quiz", "Quiz", 10.0, "Math"),
            AssignmentRef::new("q2", "Vocab Quiz", "quiz", 10.0, "English"),
        ];
        let records = vec![
            GradeRecord::new("s1", "q1", Some(100.0)),
            GradeRecord::new("s1", "q2", Some(50.0)),
        ];
        let grade = compose_final_grade(
            &config(&[("Quiz", 50.0), ("quiz", 50.0)]),
            &records,
            &assignments,
        );
        assert_eq!(grade.final_grade, 75.0);
    }

    #[test]
    fn balanced_config_is_clean() {
        let result = validate_config(&config(&[
            ("Homework", 20.0),
            ("Quiz", 30.0),
            ("Test", 50.0),
        ]));
        assert_eq!(result, ValidationResult::from_findings(Vec::new(), Vec::new()));
    }

    fn described(mut formula: FormulaDefinition) -> FormulaDefinition {
        formula.description = "Checks things".to_string();
        formula
    }

    #[test]
    fn formula_name_must_be_present_and_unique() {
        let existing = vec![described(FormulaDefinition::new("Total", FormulaType::Sum))];

        let unnamed = described(FormulaDefinition::new("  ", FormulaType::Sum));
        assert_eq!(
            validate_formula(&unnamed, &existing).errors,
            vec!["Formula name is required"]
        );

        let clash = described(FormulaDefinition::new("total", FormulaType::Average));
        assert_eq!(
            validate_formula(&clash, &existing).errors,
            vec!["Formula name must be unique"]
        );

        assert!(validate_formula(&existing[0], &existing).is_valid);
    }

    #[test]
    fn description_is_required() {
        let formula = FormulaDefinition::new("Mean", FormulaType::Average);
        assert_eq!(
            validate_formula(&formula, &[]).errors,
            vec!["Description is required"]
        );
    }

    #[test]
    fn custom_expression_must_parse() {
        let ok = described(FormulaDefinition::custom("Mean", "average(grades)"));
        assert!(validate_formula(&ok, &[]).is_valid);

        let broken = described(FormulaDefinition::custom("Broken", "average(grades"));
        let result = validate_formula(&broken, &[]);
        assert!(!result.is_valid);
        assert!(result.errors[0].starts_with("Invalid expression"));

        let empty = described(FormulaDefinition::new("Empty", FormulaType::Custom));
        assert_eq!(
            validate_formula(&empty, &[]).errors,
            vec!["Custom formulas need an expression"]
        );
    }

    #[test]
    fn weighted_formula_weights_must_total_one_hundred() {
        let mut formula =
            described(FormulaDefinition::new("Weighted", FormulaType::WeightedAverage));
        assert_eq!(
            validate_formula(&formula, &[]).errors,
            vec!["At least one category weight is required"]
        );

        formula.parameters.weights.insert("Homework".into(), 40.0);
        formula.parameters.weights.insert("Quiz".into(), 50.0);
        assert_eq!(
            validate_formula(&formula, &[]).errors,
            vec!["Category weights must sum to 100%"]
        );

        formula.parameters.weights.insert("Test".into(), 10.0);
        assert!(validate_formula(&formula, &[]).is_valid);
    }
}
