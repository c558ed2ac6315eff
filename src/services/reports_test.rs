use super::*;
use crate::services::exam::QuestionRow;

fn question(points: i32, kind: QuestionKind) -> QuestionRow {
    QuestionRow {
        id: Uuid::new_v4(),
        exam_id: Uuid::nil(),
        kind,
        prompt: "Q".into(),
        options: Vec::new(),
        correct_answer: None,
        points,
        position: 0,
    }
}

fn count_for(summary: &ScoreSummary, grade: LetterGrade) -> usize {
    summary.grade_distribution.iter().find(|g| g.grade == grade).map_or(0, |g| g.count)
}

// =============================================================================
// summarize
// =============================================================================

#[test]
fn summarize_empty_is_all_zero_with_full_distribution() {
    let summary = summarize(&[], 20, 60);
    assert_eq!(summary.submission_count, 0);
    assert_eq!(summary.pass_count, 0);
    assert!(summary.average_percent.abs() < f64::EPSILON);
    assert_eq!(summary.grade_distribution.len(), 5);
    assert!(summary.grade_distribution.iter().all(|g| g.count == 0));
}

#[test]
fn summarize_computes_percent_extremes_and_average() {
    let summary = summarize(&[20, 10, 15], 20, 60);
    assert_eq!(summary.submission_count, 3);
    assert!((summary.highest_percent - 100.0).abs() < 1e-9);
    assert!((summary.lowest_percent - 50.0).abs() < 1e-9);
    assert!((summary.average_percent - 75.0).abs() < 1e-9);
}

#[test]
fn summarize_counts_passes_at_threshold() {
    // 12/20 = 60% passes a 60% mark; 11/20 = 55% does not.
    let summary = summarize(&[12, 11], 20, 60);
    assert_eq!(summary.pass_count, 1);
    assert!((summary.pass_rate - 50.0).abs() < 1e-9);
}

#[test]
fn summarize_buckets_letter_grades() {
    let summary = summarize(&[100, 95, 85, 72, 61, 10], 100, 60);
    assert_eq!(count_for(&summary, LetterGrade::A), 2);
    assert_eq!(count_for(&summary, LetterGrade::B), 1);
    assert_eq!(count_for(&summary, LetterGrade::C), 1);
    assert_eq!(count_for(&summary, LetterGrade::D), 1);
    assert_eq!(count_for(&summary, LetterGrade::F), 1);
}

#[test]
fn summarize_with_zero_max_scores_everyone_zero() {
    let summary = summarize(&[0, 0], 0, 50);
    assert_eq!(summary.pass_count, 0);
    assert_eq!(count_for(&summary, LetterGrade::F), 2);
}

// =============================================================================
// question_stats
// =============================================================================

#[test]
fn question_stats_counts_answers_and_full_marks() {
    let mc = question(5, QuestionKind::MultipleChoice);
    let essay = question(10, QuestionKind::Essay);
    let answers = [
        AnswerScore { question_id: mc.id, score: 5 },
        AnswerScore { question_id: mc.id, score: 0 },
        AnswerScore { question_id: mc.id, score: 5 },
        AnswerScore { question_id: essay.id, score: 7 },
    ];

    let stats = question_stats(&[mc.clone(), essay.clone()], &answers);
    assert_eq!(stats.len(), 2);

    assert_eq!(stats[0].question_id, mc.id);
    assert_eq!(stats[0].answered, 3);
    assert_eq!(stats[0].correct, 2);
    assert!((stats[0].average_points - 10.0 / 3.0).abs() < 1e-9);

    assert_eq!(stats[1].answered, 1);
    assert_eq!(stats[1].correct, 0);
    assert!((stats[1].average_points - 7.0).abs() < 1e-9);
}

#[test]
fn question_stats_for_unanswered_question_is_zero() {
    let q = question(3, QuestionKind::MultipleChoice);
    let stats = question_stats(std::slice::from_ref(&q), &[]);
    assert_eq!(stats[0].answered, 0);
    assert!(stats[0].average_points.abs() < f64::EPSILON);
}
