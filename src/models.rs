use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::letter::GradingScale;
use crate::rounding::RoundingMethod;

/// One student's result on one assignment. Scores are stored as 0-100
/// percentages and are never clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub student_id: String,
    pub assignment_id: String,
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl GradeRecord {
    pub fn new(
        student_id: impl Into<String>,
        assignment_id: impl Into<String>,
        score: Option<f64>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            assignment_id: assignment_id.into(),
            score,
            comment: None,
            submitted_at: None,
        }
    }

    pub fn with_submitted_at(mut self, submitted_at: DateTime<Utc>) -> Self {
        self.submitted_at = Some(submitted_at);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// The score when it is present and finite.
    pub fn graded_score(&self) -> Option<f64> {
        self.score.filter(|score| score.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRef {
    pub id: String,
    pub name: String,
    pub category: String,
    pub max_points: f64,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl AssignmentRef {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        max_points: f64,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            max_points,
            subject: subject.into(),
            due_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRef {
    pub id: String,
    pub name: String,
}

impl StudentRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Roster inferred from the records when no student list is supplied.
    /// Ids are listed in first-seen order and double as names.
    pub fn roster_from(records: &[GradeRecord]) -> Vec<StudentRef> {
        let mut seen = std::collections::HashSet::new();
        records
            .iter()
            .filter(|record| seen.insert(record.student_id.as_str()))
            .map(|record| StudentRef::new(&record.student_id, &record.student_id))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDefinition {
    pub name: String,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounding_method: Option<RoundingMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CategoryDefinition {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            rounding_method: None,
            color: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum GradeDisplay {
    #[default]
    Percentage,
    Points,
    Letter,
}

impl From<String> for GradeDisplay {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "points" => Self::Points,
            "letter" => Self::Letter,
            _ => Self::Percentage,
        }
    }
}

impl From<GradeDisplay> for &'static str {
    fn from(display: GradeDisplay) -> Self {
        match display {
            GradeDisplay::Percentage => "percentage",
            GradeDisplay::Points => "points",
            GradeDisplay::Letter => "letter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBookConfig {
    #[serde(default)]
    pub categories: Vec<CategoryDefinition>,
    #[serde(default)]
    pub rounding_method: RoundingMethod,
    #[serde(default)]
    pub grading_scale: GradingScale,
    /// Presentation only; never consulted by the computations.
    #[serde(default)]
    pub grade_display: GradeDisplay,
}

impl GradeBookConfig {
    pub fn with_categories(categories: Vec<CategoryDefinition>) -> Self {
        Self {
            categories,
            ..Self::default()
        }
    }

    pub fn category_rounding(&self, category: &CategoryDefinition) -> RoundingMethod {
        category.rounding_method.unwrap_or(self.rounding_method)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaType {
    #[serde(alias = "SUM")]
    Sum,
    #[serde(alias = "AVERAGE")]
    Average,
    #[serde(alias = "WEIGHTED_AVERAGE")]
    WeightedAverage,
    #[serde(alias = "CUSTOM")]
    Custom,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaParameters {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub assignments: Vec<String>,
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum DisplayFormat {
    #[default]
    Percentage,
    Points,
    Decimal,
}

impl From<String> for DisplayFormat {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "points" => Self::Points,
            "decimal" => Self::Decimal,
            _ => Self::Percentage,
        }
    }
}

impl From<DisplayFormat> for &'static str {
    fn from(format: DisplayFormat) -> Self {
        match format {
            DisplayFormat::Percentage => "percentage",
            DisplayFormat::Points => "points",
            DisplayFormat::Decimal => "decimal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub formula_type: FormulaType,
    #[serde(default)]
    pub parameters: FormulaParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default)]
    pub rounding_method: RoundingMethod,
    #[serde(default)]
    pub display_format: DisplayFormat,
}

impl FormulaDefinition {
    pub fn new(name: impl Into<String>, formula_type: FormulaType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            formula_type,
            parameters: FormulaParameters::default(),
            expression: None,
            rounding_method: RoundingMethod::default(),
            display_format: DisplayFormat::default(),
        }
    }

    pub fn custom(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            expression: Some(expression.into()),
            ..Self::new(name, FormulaType::Custom)
        }
    }
}

/// Earned/possible/percentage reduction of one category's records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAggregate {
    pub earned_points: f64,
    pub total_points: f64,
    pub percentage: f64,
    pub count: usize,
    pub total_assignments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryContribution {
    pub category: String,
    pub weight: f64,
    pub average: f64,
    pub earned_points: f64,
    pub total_points: f64,
    pub count: usize,
    pub total_assignments: usize,
    pub weighted_contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalGradeResult {
    pub final_grade: f64,
    pub letter_grade: String,
    pub category_breakdown: Vec<CategoryContribution>,
    pub total_weight: f64,
    pub weighted_sum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGradeSummary {
    pub student_id: String,
    pub student_name: String,
    pub grade: FinalGradeResult,
    pub total_assignments: usize,
    pub completed_assignments: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeBucket {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStatistics {
    pub category: String,
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
    pub count: usize,
    pub total_assignments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradebookAnalytics {
    pub total_students: usize,
    pub graded_students: usize,
    pub average_grade: f64,
    pub median_grade: f64,
    pub highest_grade: f64,
    pub lowest_grade: f64,
    pub standard_deviation: f64,
    pub grade_distribution: Vec<GradeBucket>,
    pub student_summaries: Vec<StudentGradeSummary>,
    pub category_analytics: Vec<CategoryStatistics>,
}

impl GradebookAnalytics {
    pub fn bucket(&self, label: &str) -> usize {
        self.grade_distribution
            .iter()
            .find(|bucket| bucket.label == label)
            .map(|bucket| bucket.count)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Id lookup over a slice of assignments. The first assignment with a
/// given id wins.
#[derive(Debug, Clone, Default)]
pub struct AssignmentIndex<'a> {
    by_id: HashMap<&'a str, &'a AssignmentRef>,
}

impl<'a> AssignmentIndex<'a> {
    pub fn new(assignments: &'a [AssignmentRef]) -> Self {
        let mut by_id = HashMap::with_capacity(assignments.len());
        for assignment in assignments {
            by_id.entry(assignment.id.as_str()).or_insert(assignment);
        }
        Self { by_id }
    }

    pub fn get(&self, id: &str) -> Option<&'a AssignmentRef> {
        self.by_id.get(id).copied()
    }

    pub fn for_record(&self, record: &GradeRecord) -> Option<&'a AssignmentRef> {
        self.get(&record.assignment_id)
    }

    pub fn category_of(&self, record: &GradeRecord) -> Option<&'a str> {
        self.for_record(record).map(|assignment| assignment.category.as_str())
    }
}
