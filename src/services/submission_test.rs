use super::*;
use time::Duration;

// =============================================================================
// SubmissionStatus
// =============================================================================

#[test]
fn status_round_trips() {
    for status in [SubmissionStatus::InProgress, SubmissionStatus::Submitted, SubmissionStatus::Graded] {
        assert_eq!(SubmissionStatus::parse(status.as_str()), Some(status));
    }
    assert!(SubmissionStatus::decode("abandoned").is_err());
}

#[test]
fn after_scoring_waits_for_essays() {
    assert_eq!(SubmissionStatus::after_scoring(0), SubmissionStatus::Graded);
    assert_eq!(SubmissionStatus::after_scoring(2), SubmissionStatus::Submitted);
}

#[test]
fn status_serializes_snake_case() {
    assert_eq!(serde_json::to_value(SubmissionStatus::InProgress).unwrap(), "in_progress");
}

// =============================================================================
// remaining_seconds
// =============================================================================

#[test]
fn remaining_is_full_duration_at_start() {
    let start = OffsetDateTime::now_utc();
    assert_eq!(remaining_seconds(30, start, start), 1800);
}

#[test]
fn remaining_counts_down_with_wall_clock() {
    let start = OffsetDateTime::now_utc();
    assert_eq!(remaining_seconds(30, start, start + Duration::seconds(95)), 1705);
}

#[test]
fn remaining_clamps_at_zero_after_deadline() {
    let start = OffsetDateTime::now_utc();
    assert_eq!(remaining_seconds(30, start, start + Duration::minutes(30)), 0);
    assert_eq!(remaining_seconds(30, start, start + Duration::hours(5)), 0);
}

#[test]
fn remaining_never_exceeds_duration_when_clock_skews_backwards() {
    let start = OffsetDateTime::now_utc();
    assert_eq!(remaining_seconds(10, start, start - Duration::minutes(3)), 600);
}

// =============================================================================
// error conversion
// =============================================================================

#[test]
fn exam_not_found_maps_to_exam_not_found() {
    let id = Uuid::new_v4();
    assert!(matches!(SubmissionError::from(ExamError::NotFound(id)), SubmissionError::ExamNotFound(got) if got == id));
}

#[test]
fn other_exam_errors_are_wrapped() {
    let err = SubmissionError::from(ExamError::Invalid("bad".into()));
    assert!(matches!(err, SubmissionError::Exam(ExamError::Invalid(_))));
}

// =============================================================================
// Live database
// =============================================================================

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::config::AppConfig;
    use crate::services::test_support;
    use crate::services::user::Role;

    async fn live_state() -> AppState {
        let pool = test_support::integration_pool().await;
        AppState::new(pool, AppConfig::with_database_url("postgres://live"))
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn starting_the_same_exam_twice_yields_one_submission_row() {
        let state = live_state().await;
        let admin = test_support::seed_user(&state.pool, "a@example.com", Role::Admin).await;
        let student = test_support::seed_user(&state.pool, "s@example.com", Role::Student).await;
        let (exam_id, _, _) = test_support::seed_published_exam(&state.pool, admin, 30).await;

        let (first, second) = tokio::join!(
            claim_submission(&state.pool, exam_id, student),
            claim_submission(&state.pool, exam_id, student),
        );
        let (first, _) = first.expect("first claim");
        let (second, _) = second.expect("second claim");
        assert_eq!(first.id, second.id);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exam_submissions WHERE exam_id = $1")
            .bind(exam_id)
            .fetch_one(&state.pool)
            .await
            .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn submit_flushes_pending_answers_then_scores() {
        let state = live_state().await;
        let admin = test_support::seed_user(&state.pool, "a@example.com", Role::Admin).await;
        let student = test_support::seed_user(&state.pool, "s@example.com", Role::Student).await;
        let (exam_id, mc_id, essay_id) = test_support::seed_published_exam(&state.pool, admin, 30).await;

        let session = start_exam(&state, exam_id, student).await.expect("start");
        let submission_id = session.submission.id;
        assert_eq!(session.remaining_seconds, 1800);
        assert_eq!(session.questions.len(), 2);

        save_answer(&state, submission_id, student, mc_id, "Lyon".into()).await.expect("save");
        save_answer(&state, submission_id, student, mc_id, "Paris".into()).await.expect("save");
        save_answer(&state, submission_id, student, essay_id, "Long river.".into()).await.expect("save");

        let submitted = submit(&state, submission_id, student).await.expect("submit");
        assert_eq!(submitted.total_score, 5);
        assert_eq!(submitted.status, SubmissionStatus::Submitted);
        assert!(autosave::pending_for(&state, submission_id).await.is_empty());

        let again = submit(&state, submission_id, student).await;
        assert!(matches!(again, Err(SubmissionError::NotInProgress(_))));
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn expired_attempt_is_auto_submitted() {
        let state = live_state().await;
        let admin = test_support::seed_user(&state.pool, "a@example.com", Role::Admin).await;
        let student = test_support::seed_user(&state.pool, "s@example.com", Role::Student).await;
        let (exam_id, mc_id, _) = test_support::seed_published_exam(&state.pool, admin, 1).await;

        let (submission, _) = claim_submission(&state.pool, exam_id, student).await.expect("claim");
        sqlx::query("UPDATE exam_submissions SET started_at = now() - interval '2 minutes' WHERE id = $1")
            .bind(submission.id)
            .execute(&state.pool)
            .await
            .expect("age attempt");

        let late = save_answer(&state, submission.id, student, mc_id, "Paris".into()).await;
        assert!(matches!(late, Err(SubmissionError::TimeExpired(_))));

        assert_eq!(auto_submit_expired(&state).await.expect("sweep"), 0);
        let session = start_exam(&state, exam_id, student).await.expect("resume");
        assert_ne!(session.submission.status, SubmissionStatus::InProgress);
        assert_eq!(session.remaining_seconds, 0);
    }
}
