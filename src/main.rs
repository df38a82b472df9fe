use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{ArgGroup, Args, Parser, Subcommand};

use gradebook_engine::analytics::analyze_gradebook;
use gradebook_engine::config::AppConfig;
use gradebook_engine::filter::{FilterContext, GradeFilter, ScoreBand};
use gradebook_engine::formula::{describe_formula, evaluate_formula_with_budget, EvaluationBudget};
use gradebook_engine::grading::rank_students;
use gradebook_engine::models::{FormulaDefinition, GradeRecord, GradebookAnalytics, StudentRef};
use gradebook_engine::report;
use gradebook_engine::snapshot::{self, GradebookSnapshot};
use gradebook_engine::telemetry;
use gradebook_engine::validation::{validate_config, validate_formula};

#[derive(Parser)]
#[command(name = "gradebook")]
#[command(about = "Weighted-category gradebook calculator and class analytics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a realistic sample gradebook snapshot
    Seed {
        #[arg(long, default_value = "gradebook.json")]
        out: PathBuf,
    },
    /// Check the gradebook configuration and stored formulas
    Validate {
        #[arg(long)]
        snapshot: PathBuf,
    },
    /// Final grades per student, best first
    Grades {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        student: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Class-wide statistics
    Analyze {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Evaluate a stored formula or an ad-hoc expression
    #[command(group(
        ArgGroup::new("source")
            .args(["name", "expression"])
            .required(true)
            .multiple(false)
    ))]
    Formula {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        expression: Option<String>,
        #[arg(long)]
        student: Option<String>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[command(flatten)]
        filters: FilterArgs,
    },
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    #[arg(long)]
    subject: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    student: Option<String>,
    /// Earliest submission date (YYYY-MM-DD)
    #[arg(long)]
    since: Option<NaiveDate>,
    /// Latest submission date (YYYY-MM-DD)
    #[arg(long)]
    until: Option<NaiveDate>,
    /// Keep scores inside a letter band such as B or C
    #[arg(long)]
    band: Option<String>,
    #[arg(long)]
    search: Option<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> anyhow::Result<GradeFilter> {
        let band = match self.band.as_deref() {
            Some(letter) => Some(
                ScoreBand::for_letter(letter)
                    .with_context(|| format!("unknown grade band '{letter}'"))?,
            ),
            None => None,
        };

        Ok(GradeFilter::new()
            .with_subject(self.subject.clone())
            .with_category(self.category.clone())
            .with_student(self.student.clone())
            .with_date_range(self.since, self.until)
            .with_band(band)
            .with_search(self.search.clone()))
    }

    fn label(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(subject) = &self.subject {
            parts.push(format!("subject {subject}"));
        }
        if let Some(category) = &self.category {
            parts.push(format!("category {category}"));
        }
        if let Some(student) = &self.student {
            parts.push(format!("student {student}"));
        }
        if let Some(since) = self.since {
            parts.push(format!("since {since}"));
        }
        if let Some(until) = self.until {
            parts.push(format!("until {until}"));
        }
        if let Some(band) = &self.band {
            parts.push(format!("band {band}"));
        }
        if let Some(search) = &self.search {
            parts.push(format!("matching \"{search}\""));
        }
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().context("invalid gradebook configuration in environment")?;
    telemetry::init(&config.telemetry).context("failed to initialise logging")?;

    match cli.command {
        Commands::Seed { out } => {
            snapshot::write_snapshot(&out, &snapshot::sample_snapshot())
                .context("failed to write sample snapshot")?;
            println!("Sample gradebook written to {}.", out.display());
        }
        Commands::Validate { snapshot } => {
            let data = load(&snapshot)?;
            let mut valid = print_validation("Configuration", validate_config(&data.config));
            for formula in &data.formulas {
                let result = validate_formula(formula, &data.formulas);
                valid &= print_validation(&format!("Formula '{}'", formula.name), result);
            }
            if !valid {
                bail!("gradebook has validation errors");
            }
            println!("Gradebook is valid.");
        }
        Commands::Grades {
            snapshot,
            student,
            limit,
            json,
        } => {
            let data = load(&snapshot)?;
            let roster = select_roster(&data, student.as_deref())?;
            let analytics =
                analyze_gradebook(&data.config, &data.grades, &data.assignments, &roster);
            let ranked = rank_students(analytics.student_summaries);
            let shown = &ranked[..ranked.len().min(limit)];

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(shown).context("failed to encode grades")?
                );
                return Ok(());
            }

            if shown.is_empty() {
                println!("No students found.");
                return Ok(());
            }

            println!("Final grades:");
            for summary in shown {
                println!(
                    "- {} {} ({}) with {}/{} assignments graded",
                    summary.student_name,
                    summary.grade.final_grade,
                    summary.grade.letter_grade,
                    summary.completed_assignments,
                    summary.total_assignments
                );
            }
        }
        Commands::Analyze {
            snapshot,
            json,
            filters,
        } => {
            let data = load(&snapshot)?;
            let (records, roster) = apply_filters(&data, &filters)?;
            let analytics =
                analyze_gradebook(&data.config, &records, &data.assignments, &roster);

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&analytics)
                        .context("failed to encode analytics")?
                );
            } else {
                print_analytics(&analytics);
            }
        }
        Commands::Formula {
            snapshot,
            name,
            expression,
            student,
        } => {
            let data = load(&snapshot)?;
            let formula = match (name, expression) {
                (Some(name), _) => data
                    .formula(&name)
                    .cloned()
                    .with_context(|| format!("no formula named '{name}' in snapshot"))?,
                (None, Some(expression)) => FormulaDefinition::custom("Expression", expression),
                (None, None) => bail!("either --name or --expression is required"),
            };

            let records: Vec<GradeRecord> = match student.as_deref() {
                Some(id) => data
                    .grades
                    .iter()
                    .filter(|record| record.student_id == id)
                    .cloned()
                    .collect(),
                None => data.grades.clone(),
            };

            let outcome = evaluate_formula_with_budget(
                &formula,
                &records,
                &data.assignments,
                &config.formula,
            );
            if let Some(error) = &outcome.error {
                bail!("formula '{}' failed: {error}", formula.name);
            }
            println!("{}: {}", formula.name, outcome.display(&formula));
            println!("{}", describe_formula(&formula));
        }
        Commands::Report {
            snapshot,
            out,
            filters,
        } => {
            let data = load(&snapshot)?;
            let (records, roster) = apply_filters(&data, &filters)?;
            let analytics =
                analyze_gradebook(&data.config, &records, &data.assignments, &roster);
            let formulas = evaluate_all(&data, &records, &config.formula);
            let generated_on = chrono::Local::now().date_naive();
            let report = report::build_report(
                filters.label().as_deref(),
                generated_on,
                &analytics,
                &formulas,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write report to {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn load(path: &Path) -> anyhow::Result<GradebookSnapshot> {
    snapshot::load_snapshot(path)
        .with_context(|| format!("failed to load snapshot {}", path.display()))
}

fn select_roster(
    data: &GradebookSnapshot,
    student: Option<&str>,
) -> anyhow::Result<Vec<StudentRef>> {
    let roster = data.roster();
    let Some(id) = student else {
        return Ok(roster);
    };
    let selected: Vec<StudentRef> = roster.into_iter().filter(|s| s.id == id).collect();
    if selected.is_empty() {
        bail!("no student with id '{id}' in snapshot");
    }
    Ok(selected)
}

fn apply_filters(
    data: &GradebookSnapshot,
    filters: &FilterArgs,
) -> anyhow::Result<(Vec<GradeRecord>, Vec<StudentRef>)> {
    let filter = filters.to_filter()?;
    let roster = select_roster(data, filters.student.as_deref())?;
    let records = {
        let ctx = FilterContext::new(&data.assignments, &roster);
        filter.apply(&data.grades, &ctx)
    };
    Ok((records, roster))
}

fn evaluate_all(
    data: &GradebookSnapshot,
    records: &[GradeRecord],
    budget: &EvaluationBudget,
) -> Vec<(FormulaDefinition, gradebook_engine::formula::FormulaOutcome)> {
    data.formulas
        .iter()
        .map(|formula| {
            let outcome = evaluate_formula_with_budget(formula, records, &data.assignments, budget);
            (formula.clone(), outcome)
        })
        .collect()
}

fn print_validation(subject: &str, result: gradebook_engine::models::ValidationResult) -> bool {
    for error in &result.errors {
        println!("{subject}: error: {error}");
    }
    for warning in &result.warnings {
        println!("{subject}: warning: {warning}");
    }
    result.is_valid
}

fn print_analytics(analytics: &GradebookAnalytics) {
    println!(
        "Students: {} ({} graded)",
        analytics.total_students, analytics.graded_students
    );
    println!(
        "Average {} / median {} / high {} / low {} / std dev {}",
        analytics.average_grade,
        analytics.median_grade,
        analytics.highest_grade,
        analytics.lowest_grade,
        analytics.standard_deviation
    );

    let distribution: Vec<String> = analytics
        .grade_distribution
        .iter()
        .filter(|bucket| bucket.count > 0)
        .map(|bucket| format!("{} {}", bucket.label, bucket.count))
        .collect();
    if distribution.is_empty() {
        println!("Distribution: none");
    } else {
        println!("Distribution: {}", distribution.join(", "));
    }

    if analytics.category_analytics.is_empty() {
        println!("No graded work in any category.");
        return;
    }
    println!("Categories:");
    for stats in &analytics.category_analytics {
        println!(
            "- {}: average {} (high {}, low {}) with {}/{} graded",
            stats.category,
            stats.average,
            stats.highest,
            stats.lowest,
            stats.count,
            stats.total_assignments
        );
    }
}
