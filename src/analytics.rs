use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::grading::summarize_student;
use crate::letter::LETTER_LABELS;
use crate::models::{
    AssignmentIndex, AssignmentRef, CategoryStatistics, GradeBookConfig, GradeBucket,
    GradeRecord, GradebookAnalytics, StudentGradeSummary, StudentRef,
};
use crate::rounding::RoundingMethod;

/// Summary statistics over a pool of final grades.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoolStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub highest: f64,
    pub lowest: f64,
    /// Population standard deviation (divides by `count`, not `count - 1`).
    pub standard_deviation: f64,
}

impl PoolStatistics {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let highest = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lowest = values.iter().copied().fold(f64::INFINITY, f64::min);
        let variance = values
            .iter()
            .map(|value| (value - mean).powi(2))
            .sum::<f64>()
            / count as f64;

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let middle = count / 2;
        let median = if count % 2 == 0 {
            (sorted[middle - 1] + sorted[middle]) / 2.0
        } else {
            sorted[middle]
        };

        Self {
            count,
            mean,
            median,
            highest,
            lowest,
            standard_deviation: variance.sqrt(),
        }
    }
}

/// Class-wide statistics for a gradebook.
///
/// Students whose final grade is not above zero are left out of the
/// statistics pool but still count toward `total_students` and the letter
/// distribution.
#[instrument(skip_all, fields(students = students.len(), records = records.len()))]
pub fn analyze_gradebook(
    config: &GradeBookConfig,
    records: &[GradeRecord],
    assignments: &[AssignmentRef],
    students: &[StudentRef],
) -> GradebookAnalytics {
    let index = AssignmentIndex::new(assignments);

    let mut by_student: HashMap<&str, Vec<&GradeRecord>> = HashMap::new();
    for record in records {
        by_student
            .entry(record.student_id.as_str())
            .or_default()
            .push(record);
    }

    let summaries: Vec<StudentGradeSummary> = students
        .iter()
        .map(|student| {
            let own = by_student
                .get(student.id.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            summarize_student(student, config, own, &index)
        })
        .collect();

    let pool: Vec<f64> = summaries
        .iter()
        .map(|summary| summary.grade.final_grade)
        .filter(|grade| *grade > 0.0)
        .collect();
    let stats = PoolStatistics::from_values(&pool);
    let rounding = config.rounding_method;

    debug!(
        pool = stats.count,
        mean = stats.mean,
        standard_deviation = stats.standard_deviation,
        "computed class statistics"
    );

    GradebookAnalytics {
        total_students: students.len(),
        graded_students: stats.count,
        average_grade: rounding.apply(stats.mean),
        median_grade: rounding.apply(stats.median),
        highest_grade: stats.highest,
        lowest_grade: stats.lowest,
        standard_deviation: rounding.apply(stats.standard_deviation),
        grade_distribution: grade_distribution(&summaries),
        category_analytics: category_statistics(config, records, &index, rounding),
        student_summaries: summaries,
    }
}

/// Histogram over every letter label, zero-filled.
pub fn grade_distribution(summaries: &[StudentGradeSummary]) -> Vec<GradeBucket> {
    let mut buckets: Vec<GradeBucket> = LETTER_LABELS
        .iter()
        .map(|label| GradeBucket {
            label: label.to_string(),
            count: 0,
        })
        .collect();

    for summary in summaries {
        if let Some(bucket) = buckets
            .iter_mut()
            .find(|bucket| bucket.label == summary.grade.letter_grade)
        {
            bucket.count += 1;
        }
    }

    buckets
}

/// Raw-score statistics per configured category, independent of weights.
/// Categories without a single graded record are omitted.
fn category_statistics(
    config: &GradeBookConfig,
    records: &[GradeRecord],
    assignments: &AssignmentIndex<'_>,
    rounding: RoundingMethod,
) -> Vec<CategoryStatistics> {
    config
        .categories
        .iter()
        .filter_map(|category| {
            let scoped: Vec<&GradeRecord> = records
                .iter()
                .filter(|record| assignments.category_of(record) == Some(category.name.as_str()))
                .collect();
            let scores: Vec<f64> = scoped
                .iter()
                .filter_map(|record| record.graded_score())
                .collect();
            if scores.is_empty() {
                return None;
            }

            let stats = PoolStatistics::from_values(&scores);
            Some(CategoryStatistics {
                category: category.name.clone(),
                average: rounding.apply(stats.mean),
                highest: stats.highest,
                lowest: stats.lowest,
                count: stats.count,
                total_assignments: scoped.len(),
            })
        })
        .collect()
}
