use std::fmt::Write;

use chrono::NaiveDate;

use crate::formula::{describe_formula, FormulaOutcome};
use crate::grading::rank_students;
use crate::letter::PerformanceLevel;
use crate::models::{FormulaDefinition, GradebookAnalytics};

/// Students per performance level, in level order. Only graded students
/// (final grade above zero) are counted.
pub fn summarize_by_level(analytics: &GradebookAnalytics) -> Vec<(PerformanceLevel, usize)> {
    PerformanceLevel::ALL
        .iter()
        .map(|level| {
            let count = analytics
                .student_summaries
                .iter()
                .filter(|summary| summary.grade.final_grade > 0.0)
                .filter(|summary| {
                    PerformanceLevel::for_percentage(summary.grade.final_grade) == *level
                })
                .count();
            (*level, count)
        })
        .collect()
}

pub fn build_report(
    scope: Option<&str>,
    generated_on: NaiveDate,
    analytics: &GradebookAnalytics,
    formulas: &[(FormulaDefinition, FormulaOutcome)],
) -> String {
    let mut output = String::new();
    let scope_label = scope.unwrap_or("all grades");

    let _ = writeln!(output, "# Gradebook Report");
    let _ = writeln!(output, "Generated for {} on {}", scope_label, generated_on);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Class Summary");
    let _ = writeln!(
        output,
        "- Students: {} ({} graded)",
        analytics.total_students, analytics.graded_students
    );

    if analytics.graded_students == 0 {
        let _ = writeln!(output, "- No graded work in this selection.");
    } else {
        let _ = writeln!(output, "- Average: {}", analytics.average_grade);
        let _ = writeln!(output, "- Median: {}", analytics.median_grade);
        let _ = writeln!(
            output,
            "- Range: {} to {}",
            analytics.lowest_grade, analytics.highest_grade
        );
        let _ = writeln!(
            output,
            "- Standard deviation: {}",
            analytics.standard_deviation
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grade Distribution");
    let occupied: Vec<_> = analytics
        .grade_distribution
        .iter()
        .filter(|bucket| bucket.count > 0)
        .collect();
    if occupied.is_empty() {
        let _ = writeln!(output, "No students in this selection.");
    } else {
        for bucket in occupied {
            let _ = writeln!(output, "- {}: {}", bucket.label, bucket.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Performance Levels");
    for (level, count) in summarize_by_level(analytics) {
        let _ = writeln!(output, "- {}: {}", level.label(), count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Categories");
    if analytics.category_analytics.is_empty() {
        let _ = writeln!(output, "No graded work in any category.");
    } else {
        let _ = writeln!(output, "| Category | Average | High | Low | Graded |");
        let _ = writeln!(output, "| --- | --- | --- | --- | --- |");
        for stats in &analytics.category_analytics {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {}/{} |",
                stats.category,
                stats.average,
                stats.highest,
                stats.lowest,
                stats.count,
                stats.total_assignments
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Student Ranking");
    let ranked = rank_students(analytics.student_summaries.clone());
    if ranked.is_empty() {
        let _ = writeln!(output, "No students in this selection.");
    } else {
        for summary in ranked.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} {} ({}) with {}/{} assignments graded",
                summary.student_name,
                summary.grade.final_grade,
                summary.grade.letter_grade,
                summary.completed_assignments,
                summary.total_assignments
            );
        }
    }

    if !formulas.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Formulas");
        for (formula, outcome) in formulas {
            match &outcome.error {
                Some(error) => {
                    let _ = writeln!(output, "- {}: failed ({})", formula.name, error);
                }
                None => {
                    let _ = writeln!(
                        output,
                        "- {}: {} ({})",
                        formula.name,
                        outcome.display(formula),
                        describe_formula(formula)
                    );
                }
            }
        }
    }

    output
}
