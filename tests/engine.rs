use gradebook_engine::filter::{dataset_version, FilterCache, FilterContext, GradeFilter};
use gradebook_engine::snapshot::sample_snapshot;
use gradebook_engine::{
    analyze_gradebook, compose_final_grade, evaluate_formula, letter_grade, letter_rank,
    validate_config, validate_formula, AssignmentRef, CategoryDefinition, FormulaDefinition,
    GradeBookConfig, GradeRecord, GradingScale, RoundingMethod, StudentRef,
};

fn weighted(weights: &[(&str, f64)]) -> GradeBookConfig {
    GradeBookConfig::with_categories(
        weights
            .iter()
            .map(|(name, weight)| CategoryDefinition::new(*name, *weight))
            .collect(),
    )
}

fn assignments() -> Vec<AssignmentRef> {
    vec![
        AssignmentRef::new("hw1", "Worksheet", "Homework", 10.0, "Math"),
        AssignmentRef::new("quiz1", "Quiz", "Quiz", 20.0, "Math"),
        AssignmentRef::new("test1", "Unit Test", "Test", 50.0, "Math"),
    ]
}

#[test]
fn homework_quiz_test_reference_is_b_plus() {
    let records = vec![
        GradeRecord::new("s1", "hw1", Some(100.0)),
        GradeRecord::new("s1", "quiz1", Some(80.0)),
        GradeRecord::new("s1", "test1", Some(90.0)),
    ];
    let result = compose_final_grade(
        &weighted(&[("Homework", 20.0), ("Quiz", 30.0), ("Test", 50.0)]),
        &records,
        &assignments(),
    );
    assert_eq!(result.final_grade, 89.0);
    assert_eq!(result.letter_grade, "B+");
}

#[test]
fn weights_need_not_sum_to_one_hundred() {
    let config = weighted(&[("Homework", 10.0), ("Test", 30.0)]);
    let validation = validate_config(&config);
    assert!(validation.is_valid);
    assert_eq!(validation.warnings.len(), 1);

    let records = vec![
        GradeRecord::new("s1", "hw1", Some(80.0)),
        GradeRecord::new("s1", "test1", Some(80.0)),
    ];
    let result = compose_final_grade(&config, &records, &assignments());
    assert_eq!(result.total_weight, 40.0);
    assert_eq!(result.final_grade, 80.0);
}

#[test]
fn sample_gradebook_analytics() {
    let sample = sample_snapshot();
    let analytics = analyze_gradebook(
        &sample.config,
        &sample.grades,
        &sample.assignments,
        &sample.roster(),
    );

    assert_eq!(analytics.total_students, 3);
    assert_eq!(analytics.graded_students, 2);
    assert_eq!(analytics.average_grade, 80.0);
    assert_eq!(analytics.highest_grade, 89.0);
    assert_eq!(analytics.lowest_grade, 70.0);
    assert_eq!(analytics.bucket("B+"), 1);
    assert_eq!(analytics.bucket("C-"), 1);
    assert_eq!(analytics.bucket("F"), 1);

    let kiara = analytics
        .student_summaries
        .iter()
        .find(|summary| summary.student_name == "Kiara Patel")
        .expect("kiara summarised");
    assert_eq!(kiara.completed_assignments, 0);
    assert_eq!(kiara.total_assignments, 6);
}

#[test]
fn analytics_serialise_with_camel_case_fields() {
    let sample = sample_snapshot();
    let analytics = analyze_gradebook(
        &sample.config,
        &sample.grades,
        &sample.assignments,
        &sample.roster(),
    );
    let json = serde_json::to_value(&analytics).expect("serialises");
    assert_eq!(json["totalStudents"], 3);
    assert!(json["gradeDistribution"].is_array());
    assert!(json["studentSummaries"][0]["grade"]["finalGrade"].is_number());
}

#[test]
fn filtered_analytics_reuse_the_cache() {
    let sample = sample_snapshot();
    let roster = sample.roster();
    let ctx = FilterContext::new(&sample.assignments, &roster);
    let version = dataset_version(&sample.grades);
    let math = GradeFilter::new().with_subject(Some("Math".to_string()));
    let mut cache = FilterCache::new();

    let records = cache
        .get_or_apply(version, &math, &sample.grades, &ctx)
        .to_vec();
    assert_eq!(records.len(), 12);
    cache.get_or_apply(version, &math, &sample.grades, &ctx);
    assert_eq!(cache.hits(), 1);

    let analytics = analyze_gradebook(&sample.config, &records, &sample.assignments, &roster);
    let avery = analytics
        .student_summaries
        .iter()
        .find(|summary| summary.student_name == "Avery Lee")
        .expect("avery summarised");
    assert_eq!(avery.grade.final_grade, 89.0);
    assert_eq!(avery.total_assignments, 4);
}

#[test]
fn sample_formulas_are_valid_and_evaluate() {
    let sample = sample_snapshot();
    for formula in &sample.formulas {
        let validation = validate_formula(formula, &sample.formulas);
        assert!(validation.is_valid, "{}: {:?}", formula.name, validation.errors);

        let outcome = evaluate_formula(formula, &sample.grades, &sample.assignments);
        assert!(outcome.is_ok(), "{}: {:?}", formula.name, outcome.error);
    }

    let assessments = sample.formula("Assessments").expect("stored formula");
    let outcome = evaluate_formula(assessments, &sample.grades, &sample.assignments);
    // Quiz 60/80 = 75, Test 240/300 = 80.
    assert!((outcome.result - 78.0).abs() < 1e-9);
    assert_eq!(outcome.display(assessments), "78%");

    let quiz = sample.formula("Quiz Average").expect("stored formula");
    assert_eq!(
        evaluate_formula(quiz, &sample.grades, &sample.assignments).result,
        75.0
    );
}

#[test]
fn custom_division_by_zero_falls_back_to_zero() {
    let outcome = evaluate_formula(&FormulaDefinition::custom("x", "1/0"), &[], &[]);
    assert_eq!(outcome.result, 0.0);
    assert!(outcome.error.is_some_and(|error| !error.is_empty()));
}

#[test]
fn rounding_is_idempotent_for_every_method() {
    for method in RoundingMethod::ALL {
        for step in -2_000..=12_000 {
            let value = step as f64 * 0.0137;
            let once = method.apply(value);
            assert_eq!(method.apply(once), once, "{method:?} at {value}");
        }
    }
}

#[test]
fn letters_never_improve_as_scores_fall() {
    for scale in GradingScale::ALL {
        let mut previous = 0;
        for step in (0..=1_100).rev() {
            let label = letter_grade(step as f64 / 10.0, scale);
            let rank = letter_rank(label).expect("known label");
            assert!(rank >= previous, "{scale:?} at {}", step as f64 / 10.0);
            previous = rank;
        }
    }
}

#[test]
fn students_without_records_still_appear() {
    let roster = vec![StudentRef::new("s9", "New Student")];
    let analytics = analyze_gradebook(
        &weighted(&[("Homework", 100.0)]),
        &[],
        &assignments(),
        &roster,
    );
    assert_eq!(analytics.total_students, 1);
    assert_eq!(analytics.graded_students, 0);
    assert_eq!(analytics.average_grade, 0.0);
}
