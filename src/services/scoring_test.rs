use super::*;

// =============================================================================
// score_answer — multiple choice
// =============================================================================

#[test]
fn multiple_choice_exact_match_scores_full_points() {
    assert_eq!(score_answer(QuestionKind::MultipleChoice, Some("Paris"), 5, "Paris"), 5);
}

#[test]
fn multiple_choice_mismatch_scores_zero() {
    assert_eq!(score_answer(QuestionKind::MultipleChoice, Some("Paris"), 5, "Lyon"), 0);
}

#[test]
fn multiple_choice_comparison_is_exact() {
    assert_eq!(score_answer(QuestionKind::MultipleChoice, Some("Paris"), 5, "paris"), 0);
    assert_eq!(score_answer(QuestionKind::MultipleChoice, Some("Paris"), 5, "Paris "), 0);
}

#[test]
fn missing_key_scores_zero() {
    assert_eq!(score_answer(QuestionKind::MultipleChoice, None, 5, "Paris"), 0);
}

// =============================================================================
// score_answer — checkboxes
// =============================================================================

#[test]
fn checkboxes_same_set_any_order_scores_full_points() {
    let key = r#"["a","c"]"#;
    assert_eq!(score_answer(QuestionKind::MultipleCheckboxes, Some(key), 4, r#"["c","a"]"#), 4);
    assert_eq!(score_answer(QuestionKind::MultipleCheckboxes, Some(key), 4, r#"["a","c","a"]"#), 4);
}

#[test]
fn checkboxes_partial_or_extra_selection_scores_zero() {
    let key = r#"["a","c"]"#;
    assert_eq!(score_answer(QuestionKind::MultipleCheckboxes, Some(key), 4, r#"["a"]"#), 0);
    assert_eq!(score_answer(QuestionKind::MultipleCheckboxes, Some(key), 4, r#"["a","b","c"]"#), 0);
}

#[test]
fn checkboxes_unparseable_answer_scores_zero() {
    assert_eq!(score_answer(QuestionKind::MultipleCheckboxes, Some(r#"["a"]"#), 4, "a"), 0);
    assert_eq!(score_answer(QuestionKind::MultipleCheckboxes, Some(r#"["a"]"#), 4, ""), 0);
}

// =============================================================================
// score_answer — essay
// =============================================================================

#[test]
fn essay_always_scores_zero() {
    assert_eq!(score_answer(QuestionKind::Essay, Some("anything"), 10, "anything"), 0);
    assert_eq!(score_answer(QuestionKind::Essay, None, 10, "a long answer"), 0);
}

// =============================================================================
// aggregate / percentage / letter grades
// =============================================================================

#[test]
fn aggregate_sums_scores() {
    assert_eq!(aggregate([5, 0, 3]), 8);
    assert_eq!(aggregate(Vec::<i32>::new()), 0);
}

#[test]
fn percentage_handles_zero_max() {
    assert!((percentage(5, 0)).abs() < f64::EPSILON);
    assert!((percentage(15, 20) - 75.0).abs() < f64::EPSILON);
}

#[test]
fn passed_is_inclusive() {
    assert!(passed(60.0, 60));
    assert!(!passed(59.9, 60));
}

#[test]
fn letter_grade_buckets() {
    assert_eq!(LetterGrade::from_percentage(100.0), LetterGrade::A);
    assert_eq!(LetterGrade::from_percentage(90.0), LetterGrade::A);
    assert_eq!(LetterGrade::from_percentage(89.99), LetterGrade::B);
    assert_eq!(LetterGrade::from_percentage(70.0), LetterGrade::C);
    assert_eq!(LetterGrade::from_percentage(60.0), LetterGrade::D);
    assert_eq!(LetterGrade::from_percentage(59.0), LetterGrade::F);
    assert_eq!(LetterGrade::from_percentage(0.0).as_str(), "F");
}

#[test]
fn parse_selection_dedupes() {
    let parsed = parse_selection(r#"["b","a","b"]"#).unwrap();
    assert_eq!(parsed.into_iter().collect::<Vec<_>>(), vec!["a".to_owned(), "b".to_owned()]);
    assert!(parse_selection("{}").is_none());
}
