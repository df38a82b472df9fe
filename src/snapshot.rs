//! Gradebook snapshot files.
//!
//! Snapshots are JSON exports of the document store. Rows arrive in loose
//! shapes (numbers as strings, `points` instead of `maxPoints`, dates with
//! or without a time) and are converted to typed models here, so the rest
//! of the crate can assume well-formed input. Rows that cannot be salvaged
//! are dropped with a warning.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::SnapshotError;
use crate::letter::GradingScale;
use crate::models::{
    AssignmentRef, CategoryDefinition, FormulaDefinition, FormulaType, GradeBookConfig,
    GradeDisplay, GradeRecord, StudentRef,
};
use crate::rounding::RoundingMethod;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradebookSnapshot {
    pub config: GradeBookConfig,
    pub assignments: Vec<AssignmentRef>,
    pub grades: Vec<GradeRecord>,
    pub students: Vec<StudentRef>,
    pub formulas: Vec<FormulaDefinition>,
}

impl GradebookSnapshot {
    /// The stored roster, or one inferred from the grades when none was
    /// exported.
    pub fn roster(&self) -> Vec<StudentRef> {
        if self.students.is_empty() {
            StudentRef::roster_from(&self.grades)
        } else {
            self.students.clone()
        }
    }

    pub fn formula(&self, name: &str) -> Option<&FormulaDefinition> {
        self.formulas
            .iter()
            .find(|formula| formula.name.eq_ignore_ascii_case(name.trim()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    #[serde(default)]
    config: RawConfig,
    #[serde(default)]
    assignments: Vec<RawAssignment>,
    #[serde(default)]
    grades: Vec<RawGrade>,
    #[serde(default)]
    students: Vec<RawStudent>,
    #[serde(default)]
    formulas: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default)]
    categories: Vec<RawCategory>,
    #[serde(default)]
    rounding_method: RoundingMethod,
    #[serde(default)]
    grading_scale: GradingScale,
    #[serde(default)]
    grade_display: GradeDisplay,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCategory {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    weight: Value,
    #[serde(default)]
    rounding_method: Option<RoundingMethod>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAssignment {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, alias = "points")]
    max_points: Value,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGrade {
    #[serde(default)]
    student_id: Value,
    #[serde(default)]
    assignment_id: Value,
    #[serde(default)]
    score: Value,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default, alias = "date")]
    submitted_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStudent {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

pub fn load_snapshot(path: &Path) -> Result<GradebookSnapshot, SnapshotError> {
    let text = std::fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_snapshot(&text)
}

pub fn parse_snapshot(text: &str) -> Result<GradebookSnapshot, SnapshotError> {
    let raw: RawSnapshot = serde_json::from_str(text)?;
    Ok(ingest(raw))
}

pub fn write_snapshot(path: &Path, snapshot: &GradebookSnapshot) -> Result<(), SnapshotError> {
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json).map_err(|source| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn ingest(raw: RawSnapshot) -> GradebookSnapshot {
    let categories = raw
        .config
        .categories
        .into_iter()
        .enumerate()
        .filter_map(|(row, category)| {
            let Some(name) = category.name.filter(|name| !name.trim().is_empty()) else {
                warn!(row, "dropping category without a name");
                return None;
            };
            let Some(weight) = loose_number(&category.weight) else {
                warn!(row, category = %name, "dropping category with a non-numeric weight");
                return None;
            };
            Some(CategoryDefinition {
                name,
                weight,
                rounding_method: category.rounding_method,
                color: category.color,
                description: category.description,
            })
        })
        .collect();

    let config = GradeBookConfig {
        categories,
        rounding_method: raw.config.rounding_method,
        grading_scale: raw.config.grading_scale,
        grade_display: raw.config.grade_display,
    };

    let assignments: Vec<AssignmentRef> = raw
        .assignments
        .into_iter()
        .enumerate()
        .filter_map(|(row, assignment)| {
            let Some(id) = loose_id(&assignment.id) else {
                warn!(row, "dropping assignment without an id");
                return None;
            };
            let max_points = loose_number(&assignment.max_points).unwrap_or_else(|| {
                debug!(assignment = %id, "assignment has no usable point value");
                0.0
            });
            Some(AssignmentRef {
                name: assignment.name.unwrap_or_else(|| id.clone()),
                category: assignment.category.unwrap_or_default(),
                max_points,
                subject: assignment.subject.unwrap_or_default(),
                due_date: assignment.due_date.as_deref().and_then(parse_date),
                id,
            })
        })
        .collect();

    let grades: Vec<GradeRecord> = raw
        .grades
        .into_iter()
        .enumerate()
        .filter_map(|(row, grade)| {
            let (Some(student_id), Some(assignment_id)) =
                (loose_id(&grade.student_id), loose_id(&grade.assignment_id))
            else {
                warn!(row, "dropping grade without student and assignment ids");
                return None;
            };
            let score = loose_number(&grade.score);
            if score.is_none() && !grade.score.is_null() {
                debug!(row, student = %student_id, "non-numeric score treated as ungraded");
            }
            Some(GradeRecord {
                student_id,
                assignment_id,
                score,
                comment: grade.comment,
                submitted_at: grade.submitted_at.as_deref().and_then(parse_timestamp),
            })
        })
        .collect();

    let students: Vec<StudentRef> = raw
        .students
        .into_iter()
        .enumerate()
        .filter_map(|(row, student)| {
            let Some(id) = loose_id(&student.id) else {
                warn!(row, "dropping student without an id");
                return None;
            };
            let name = student
                .name
                .filter(|name| !name.trim().is_empty())
                .or_else(|| {
                    let joined = [student.first_name, student.last_name]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join(" ");
                    (!joined.trim().is_empty()).then_some(joined)
                })
                .unwrap_or_else(|| id.clone());
            Some(StudentRef { id, name })
        })
        .collect();

    let formulas: Vec<FormulaDefinition> = raw
        .formulas
        .into_iter()
        .enumerate()
        .filter_map(|(row, value)| match serde_json::from_value(value) {
            Ok(formula) => Some(formula),
            Err(error) => {
                warn!(row, %error, "dropping malformed formula");
                None
            }
        })
        .collect();

    debug!(
        categories = config.categories.len(),
        assignments = assignments.len(),
        grades = grades.len(),
        students = students.len(),
        formulas = formulas.len(),
        "ingested snapshot"
    );

    GradebookSnapshot {
        config,
        assignments,
        grades,
        students,
        formulas,
    }
}

/// Finite numbers, including numeric strings.
fn loose_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|number| number.is_finite())
}

fn loose_id(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// RFC 3339 timestamps or bare `YYYY-MM-DD` dates (taken as midnight UTC).
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(text).map(|timestamp| timestamp.date_naive()))
}

/// A small but realistic gradebook: three students, two subjects, and one
/// student with nothing graded yet.
pub fn sample_snapshot() -> GradebookSnapshot {
    let students = vec![
        StudentRef::new(
            Uuid::from_u128(0x3d7f5d6f_24f7_4e8e_8b4b_3e7e44b4a7b2).to_string(),
            "Avery Lee",
        ),
        StudentRef::new(
            Uuid::from_u128(0x0c22f1f1_9184_4fd4_9b21_28c68a6a89dc).to_string(),
            "Jules Moreno",
        ),
        StudentRef::new(
            Uuid::from_u128(0xd5a0a1a2_2a3c_44c2_8f73_60b7897a9dd2).to_string(),
            "Kiara Patel",
        ),
    ];

    let plan = [
        ("Fractions Worksheet", "Homework", 10.0, "Math", (2025, 9, 12)),
        ("Ratios Worksheet", "Homework", 10.0, "Math", (2025, 10, 3)),
        ("Fractions Quiz", "Quiz", 20.0, "Math", (2025, 9, 19)),
        ("Cells Quiz", "Quiz", 20.0, "Science", (2025, 12, 5)),
        ("Unit 1 Test", "Test", 50.0, "Math", (2025, 10, 10)),
        ("Ecosystems Test", "Test", 100.0, "Science", (2026, 2, 6)),
    ];
    let assignments: Vec<AssignmentRef> = plan
        .iter()
        .map(|(name, category, points, subject, (year, month, day))| AssignmentRef {
            due_date: NaiveDate::from_ymd_opt(*year, *month, *day),
            ..AssignmentRef::new(Uuid::new_v4().to_string(), *name, *category, *points, *subject)
        })
        .collect();

    let scores: [[Option<f64>; 6]; 3] = [
        [Some(100.0), Some(100.0), Some(80.0), Some(80.0), Some(90.0), Some(90.0)],
        [Some(70.0); 6],
        [None, None, None, None, None, None],
    ];

    let mut grades = Vec::new();
    for (student, row) in students.iter().zip(scores) {
        for (assignment, score) in assignments.iter().zip(row) {
            let mut record = GradeRecord::new(&student.id, &assignment.id, score);
            if score.is_some() {
                if let Some(due) = assignment.due_date {
                    record = record
                        .with_submitted_at(Utc.from_utc_datetime(&due.and_time(NaiveTime::MIN)));
                }
            }
            grades.push(record);
        }
    }
    if let Some(first) = grades.first_mut() {
        first.comment = Some("Clear working shown".to_string());
    }

    let config = GradeBookConfig::with_categories(vec![
        CategoryDefinition::new("Homework", 20.0),
        CategoryDefinition::new("Quiz", 30.0),
        CategoryDefinition::new("Test", 50.0),
    ]);

    let mut homework_total = FormulaDefinition::new("Homework Total", FormulaType::Sum);
    homework_total.description = "Raw points earned on homework".to_string();
    homework_total.parameters.categories = vec!["Homework".to_string()];

    let mut quiz_average = FormulaDefinition::new("Quiz Average", FormulaType::Average);
    quiz_average.description = "Mean quiz score".to_string();
    quiz_average.parameters.categories = vec!["Quiz".to_string()];

    let mut assessments = FormulaDefinition::new("Assessments", FormulaType::WeightedAverage);
    assessments.description = "Quizzes and tests only".to_string();
    assessments.parameters.weights.insert("Quiz".to_string(), 40.0);
    assessments.parameters.weights.insert("Test".to_string(), 60.0);

    let mut spread = FormulaDefinition::custom("Score Spread", "max(grades) - min(grades)");
    spread.description = "Gap between best and worst score".to_string();

    GradebookSnapshot {
        config,
        assignments,
        grades,
        students,
        formulas: vec![homework_total, quiz_average, assessments, spread],
    }
}
