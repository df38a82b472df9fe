use tracing::debug;

use crate::letter::{letter_grade, NOT_AVAILABLE};
use crate::models::{
    AssignmentIndex, AssignmentRef, CategoryAggregate, CategoryContribution, FinalGradeResult,
    GradeBookConfig, GradeRecord, StudentGradeSummary, StudentRef,
};
use crate::rounding::RoundingMethod;

/// Reduces one category's records to earned/possible points.
///
/// Scores are percentages, so earned points are back-derived from each
/// assignment's `max_points`. Ungraded records only count toward
/// `total_assignments`; graded records whose assignment is missing or worth
/// zero points count toward `count` but not toward the point totals.
pub fn aggregate_category(
    records: &[GradeRecord],
    assignments: &[AssignmentRef],
    rounding: RoundingMethod,
) -> CategoryAggregate {
    let index = AssignmentIndex::new(assignments);
    aggregate_records(records, &index, rounding)
}

pub(crate) fn aggregate_records<'r>(
    records: impl IntoIterator<Item = &'r GradeRecord>,
    assignments: &AssignmentIndex<'_>,
    rounding: RoundingMethod,
) -> CategoryAggregate {
    let mut aggregate = CategoryAggregate::default();

    for record in records {
        aggregate.total_assignments += 1;
        let Some(score) = record.graded_score() else {
            continue;
        };
        aggregate.count += 1;

        let Some(assignment) = assignments.for_record(record) else {
            continue;
        };
        let max_points = assignment.max_points;
        if max_points.is_finite() && max_points > 0.0 {
            aggregate.total_points += max_points;
            aggregate.earned_points += (score / 100.0) * max_points;
        }
    }

    aggregate.percentage = if aggregate.total_points > 0.0 {
        rounding.apply(aggregate.earned_points / aggregate.total_points * 100.0)
    } else {
        0.0
    };

    aggregate
}

/// Weighted final grade across every configured category.
///
/// The weighted sum is normalised by the weight actually configured, so a
/// gradebook whose weights total 60 still grades on a 0-100 scale.
pub fn compose_final_grade(
    config: &GradeBookConfig,
    records: &[GradeRecord],
    assignments: &[AssignmentRef],
) -> FinalGradeResult {
    let index = AssignmentIndex::new(assignments);
    let refs: Vec<&GradeRecord> = records.iter().collect();
    compose_indexed(config, &refs, &index)
}

pub(crate) fn compose_indexed(
    config: &GradeBookConfig,
    records: &[&GradeRecord],
    assignments: &AssignmentIndex<'_>,
) -> FinalGradeResult {
    if config.categories.is_empty() {
        return FinalGradeResult {
            final_grade: 0.0,
            letter_grade: NOT_AVAILABLE.to_string(),
            category_breakdown: Vec::new(),
            total_weight: 0.0,
            weighted_sum: 0.0,
        };
    }

    let mut breakdown = Vec::with_capacity(config.categories.len());
    let mut total_weight = 0.0;
    let mut weighted_sum = 0.0;

    for category in &config.categories {
        let scoped = records
            .iter()
            .copied()
            .filter(|record| assignments.category_of(record) == Some(category.name.as_str()));
        let aggregate = aggregate_records(scoped, assignments, config.category_rounding(category));
        let contribution = aggregate.percentage * category.weight / 100.0;

        total_weight += category.weight;
        weighted_sum += contribution;

        breakdown.push(CategoryContribution {
            category: category.name.clone(),
            weight: category.weight,
            average: aggregate.percentage,
            earned_points: aggregate.earned_points,
            total_points: aggregate.total_points,
            count: aggregate.count,
            total_assignments: aggregate.total_assignments,
            weighted_contribution: contribution,
        });
    }

    let final_grade = if total_weight > 0.0 {
        config
            .rounding_method
            .apply(weighted_sum / total_weight * 100.0)
    } else {
        0.0
    };

    debug!(
        categories = breakdown.len(),
        total_weight, weighted_sum, final_grade, "composed final grade"
    );

    FinalGradeResult {
        final_grade,
        letter_grade: letter_grade(final_grade, config.grading_scale).to_string(),
        category_breakdown: breakdown,
        total_weight,
        weighted_sum,
    }
}

/// Final grade plus completion counts for one student.
pub fn student_summary(
    student: &StudentRef,
    config: &GradeBookConfig,
    records: &[GradeRecord],
    assignments: &[AssignmentRef],
) -> StudentGradeSummary {
    let index = AssignmentIndex::new(assignments);
    let own: Vec<&GradeRecord> = records
        .iter()
        .filter(|record| record.student_id == student.id)
        .collect();
    summarize_student(student, config, &own, &index)
}

pub(crate) fn summarize_student(
    student: &StudentRef,
    config: &GradeBookConfig,
    records: &[&GradeRecord],
    assignments: &AssignmentIndex<'_>,
) -> StudentGradeSummary {
    let grade = compose_indexed(config, records, assignments);
    let completed_assignments = records
        .iter()
        .filter(|record| record.score.is_some())
        .count();

    StudentGradeSummary {
        student_id: student.id.clone(),
        student_name: student.name.clone(),
        grade,
        total_assignments: records.len(),
        completed_assignments,
    }
}

/// Summaries ranked best first; ties keep roster order.
pub fn rank_students(mut summaries: Vec<StudentGradeSummary>) -> Vec<StudentGradeSummary> {
    summaries.sort_by(|a, b| {
        b.grade
            .final_grade
            .partial_cmp(&a.grade.final_grade)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    summaries
}
