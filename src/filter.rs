//! Record filtering ahead of aggregation.

use std::collections::hash_map::{DefaultHasher, Entry, RandomState};
use std::collections::{BTreeSet, HashMap};
use std::hash::{BuildHasher, Hash, Hasher};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::letter::PerformanceLevel;
use crate::models::{AssignmentIndex, AssignmentRef, GradeRecord, StudentRef};
use crate::terms::{Quarter, Semester};

/// Score window over the stored percentage: `min` inclusive, `max`
/// exclusive, either side open.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreBand {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ScoreBand {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Ten-point band for a simple letter (`A` is 90 and up, `F` below 60).
    pub fn for_letter(letter: &str) -> Option<Self> {
        let band = match letter.trim().to_ascii_uppercase().as_str() {
            "A" => Self::new(Some(90.0), None),
            "B" => Self::new(Some(80.0), Some(90.0)),
            "C" => Self::new(Some(70.0), Some(80.0)),
            "D" => Self::new(Some(60.0), Some(70.0)),
            "F" => Self::new(None, Some(60.0)),
            _ => return None,
        };
        Some(band)
    }

    pub fn contains(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value < max)
    }
}

impl ScoreBand {
    fn bits(&self) -> (Option<u64>, Option<u64>) {
        (self.min.map(f64::to_bits), self.max.map(f64::to_bits))
    }
}

// Bitwise so equality agrees with `Hash` and filters can key the cache.
impl PartialEq for ScoreBand {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for ScoreBand {}

impl Hash for ScoreBand {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

/// Conjunction of optional predicates over grade records. Unset and empty
/// string fields match everything.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeFilter {
    pub subject: Option<String>,
    pub category: Option<String>,
    pub student: Option<String>,
    pub assignment: Option<String>,
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub band: Option<ScoreBand>,
    pub performance: Option<PerformanceLevel>,
    pub quarter: Option<Quarter>,
    pub semester: Option<Semester>,
    pub search: Option<String>,
}

/// Lookups a filter needs to resolve a record's assignment and student.
#[derive(Debug, Clone)]
pub struct FilterContext<'a> {
    assignments: AssignmentIndex<'a>,
    student_names: HashMap<&'a str, &'a str>,
}

impl<'a> FilterContext<'a> {
    pub fn new(assignments: &'a [AssignmentRef], students: &'a [StudentRef]) -> Self {
        Self {
            assignments: AssignmentIndex::new(assignments),
            student_names: students
                .iter()
                .map(|student| (student.id.as_str(), student.name.as_str()))
                .collect(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

impl GradeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject;
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn with_student(mut self, student: Option<String>) -> Self {
        self.student = student;
        self
    }

    pub fn with_assignment(mut self, assignment: Option<String>) -> Self {
        self.assignment = assignment;
        self
    }

    pub fn with_date_range(mut self, since: Option<NaiveDate>, until: Option<NaiveDate>) -> Self {
        self.since = since;
        self.until = until;
        self
    }

    pub fn with_band(mut self, band: Option<ScoreBand>) -> Self {
        self.band = band;
        self
    }

    pub fn with_performance(mut self, performance: Option<PerformanceLevel>) -> Self {
        self.performance = performance;
        self
    }

    pub fn with_quarter(mut self, quarter: Option<Quarter>) -> Self {
        self.quarter = quarter;
        self
    }

    pub fn with_semester(mut self, semester: Option<Semester>) -> Self {
        self.semester = semester;
        self
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search;
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply(&self, records: &[GradeRecord], ctx: &FilterContext<'_>) -> Vec<GradeRecord> {
        records
            .iter()
            .filter(|record| self.matches(record, ctx))
            .cloned()
            .collect()
    }

    pub fn matches(&self, record: &GradeRecord, ctx: &FilterContext<'_>) -> bool {
        let assignment = ctx.assignments.for_record(record);

        if let Some(student) = non_empty(&self.student) {
            if record.student_id != student {
                return false;
            }
        }

        if let Some(id) = non_empty(&self.assignment) {
            if record.assignment_id != id {
                return false;
            }
        }

        if let Some(subject) = non_empty(&self.subject) {
            if assignment.map(|a| a.subject.as_str()) != Some(subject) {
                return false;
            }
        }

        if let Some(category) = non_empty(&self.category) {
            if assignment.map(|a| a.category.as_str()) != Some(category) {
                return false;
            }
        }

        if !self.matches_dates(record) {
            return false;
        }

        if !self.matches_score(record) {
            return false;
        }

        self.matches_search(record, assignment, ctx)
    }

    fn matches_dates(&self, record: &GradeRecord) -> bool {
        let dated = self.since.is_some()
            || self.until.is_some()
            || self.quarter.is_some()
            || self.semester.is_some();
        if !dated {
            return true;
        }

        let Some(date) = record.submitted_at.map(|at| at.date_naive()) else {
            return false;
        };

        self.since.map_or(true, |since| date >= since)
            && self.until.map_or(true, |until| date <= until)
            && self.quarter.map_or(true, |quarter| Quarter::of(date) == quarter)
            && self.semester.map_or(true, |semester| Semester::of(date) == semester)
    }

    fn matches_score(&self, record: &GradeRecord) -> bool {
        if self.band.is_none() && self.performance.is_none() {
            return true;
        }

        let Some(score) = record.graded_score() else {
            return false;
        };

        self.band.map_or(true, |band| band.contains(score))
            && self
                .performance
                .map_or(true, |level| PerformanceLevel::for_percentage(score) == level)
    }

    fn matches_search(
        &self,
        record: &GradeRecord,
        assignment: Option<&AssignmentRef>,
        ctx: &FilterContext<'_>,
    ) -> bool {
        let Some(term) = non_empty(&self.search) else {
            return true;
        };
        let term = term.to_lowercase();
        let hit = |text: &str| text.to_lowercase().contains(&term);

        assignment.is_some_and(|a| hit(&a.name) || hit(&a.subject) || hit(&a.category))
            || ctx
                .student_names
                .get(record.student_id.as_str())
                .is_some_and(|name| hit(*name))
            || record.comment.as_deref().is_some_and(hit)
    }
}

/// Stable fingerprint of a record set, suitable as a cache version.
pub fn dataset_version(records: &[GradeRecord]) -> u64 {
    let mut hasher = DefaultHasher::new();
    records.len().hash(&mut hasher);
    for record in records {
        record.student_id.hash(&mut hasher);
        record.assignment_id.hash(&mut hasher);
        record.score.map(f64::to_bits).hash(&mut hasher);
        record.comment.hash(&mut hasher);
        record.submitted_at.hash(&mut hasher);
    }
    hasher.finish()
}

/// Memoised filter results owned by the caller.
///
/// Entries are keyed by (dataset version, filter); bump the version or call
/// [`FilterCache::clear`] when the underlying records change.
#[derive(Debug, Default)]
pub struct FilterCache<S = RandomState> {
    entries: HashMap<(u64, GradeFilter), Vec<GradeRecord>, S>,
    hits: u64,
    misses: u64,
}

impl FilterCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: BuildHasher> FilterCache<S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            entries: HashMap::with_hasher(hasher),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get_or_apply(
        &mut self,
        dataset_version: u64,
        filter: &GradeFilter,
        records: &[GradeRecord],
        ctx: &FilterContext<'_>,
    ) -> &[GradeRecord] {
        match self.entries.entry((dataset_version, filter.clone())) {
            Entry::Occupied(entry) => {
                self.hits += 1;
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                self.misses += 1;
                entry.insert(filter.apply(records, ctx))
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// Distinct values present in a dataset, for populating filter choices.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterOptions {
    pub subjects: Vec<String>,
    pub categories: Vec<String>,
    pub students: Vec<String>,
    pub assignments: Vec<String>,
}

pub fn filter_options(records: &[GradeRecord], assignments: &[AssignmentRef]) -> FilterOptions {
    let index = AssignmentIndex::new(assignments);
    let mut subjects = BTreeSet::new();
    let mut categories = BTreeSet::new();
    let mut students = BTreeSet::new();
    let mut assignment_ids = BTreeSet::new();

    for record in records {
        students.insert(record.student_id.clone());
        assignment_ids.insert(record.assignment_id.clone());
        if let Some(assignment) = index.for_record(record) {
            if !assignment.subject.is_empty() {
                subjects.insert(assignment.subject.clone());
            }
            if !assignment.category.is_empty() {
                categories.insert(assignment.category.clone());
            }
        }
    }

    FilterOptions {
        subjects: subjects.into_iter().collect(),
        categories: categories.into_iter().collect(),
        students: students.into_iter().collect(),
        assignments: assignment_ids.into_iter().collect(),
    }
}
