//! Autosave service — debounced answer writes.
//!
//! DESIGN
//! ======
//! Every answer edit replaces the pending entry for its
//! `(submission_id, question_id)` pair in memory and returns immediately.
//! A background worker wakes every tick, snapshots the entries that have been
//! quiet for at least the debounce window, and upserts them keyed on
//! `(submission_id, question_id)`, so repeated edits overwrite one row.
//!
//! ERROR HANDLING
//! ==============
//! Entries are removed only after a successful write, and only if no newer
//! edit arrived while the write was in flight (revision check). A failed
//! flush keeps everything for the next tick.
//!
//! ORDERING
//! ========
//! Every write takes `FOR SHARE` on its submission row and skips submissions
//! that are no longer in progress. Submit holds `FOR UPDATE` on the same row
//! while it writes the buffer and scores, so a worker pass that snapshotted
//! an older edit either lands before submit's write or is dropped after it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sqlx::{PgConnection, PgPool};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::state::{AppState, PendingAnswer};

type AnswerKey = (Uuid, Uuid);

/// One pending answer captured for a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FlushEntry {
    pub(crate) submission_id: Uuid,
    pub(crate) question_id: Uuid,
    pub(crate) answer: String,
    pub(crate) revision: u64,
}

/// Record an answer edit. Later edits to the same question replace it.
pub async fn record(state: &AppState, submission_id: Uuid, question_id: Uuid, answer: String) {
    let now = Instant::now();
    let mut buffer = state.autosave.write().await;
    match buffer.get_mut(&(submission_id, question_id)) {
        Some(pending) => {
            pending.answer = answer;
            pending.revision += 1;
            pending.touched = now;
        }
        None => {
            buffer.insert((submission_id, question_id), PendingAnswer { answer, revision: 1, touched: now });
        }
    }
}

/// Unflushed answers for one submission, keyed by question.
pub async fn pending_for(state: &AppState, submission_id: Uuid) -> HashMap<Uuid, String> {
    let buffer = state.autosave.read().await;
    buffer
        .iter()
        .filter(|((sid, _), _)| *sid == submission_id)
        .map(|((_, qid), pending)| (*qid, pending.answer.clone()))
        .collect()
}

/// Drop every pending edit for a submission without writing it.
pub async fn discard_submission(state: &AppState, submission_id: Uuid) {
    let mut buffer = state.autosave.write().await;
    buffer.retain(|(sid, _), _| *sid != submission_id);
}

pub(crate) fn collect_due(
    buffer: &HashMap<AnswerKey, PendingAnswer>,
    debounce: Duration,
    now: Instant,
) -> Vec<FlushEntry> {
    buffer
        .iter()
        .filter(|(_, pending)| now.saturating_duration_since(pending.touched) >= debounce)
        .map(|(key, pending)| to_entry(*key, pending))
        .collect()
}

fn to_entry((submission_id, question_id): AnswerKey, pending: &PendingAnswer) -> FlushEntry {
    FlushEntry { submission_id, question_id, answer: pending.answer.clone(), revision: pending.revision }
}

async fn snapshot_submission(state: &AppState, submission_id: Uuid) -> Vec<FlushEntry> {
    let buffer = state.autosave.read().await;
    buffer
        .iter()
        .filter(|((sid, _), _)| *sid == submission_id)
        .map(|(key, pending)| to_entry(*key, pending))
        .collect()
}

async fn ack_flushed(state: &AppState, flushed: &[FlushEntry]) {
    let mut buffer = state.autosave.write().await;
    for entry in flushed {
        let key = (entry.submission_id, entry.question_id);
        // EDGE: keep the entry if it was edited again after the snapshot.
        if buffer.get(&key).is_some_and(|p| p.revision == entry.revision) {
            buffer.remove(&key);
        }
    }
}

/// Write answers on an open connection. Each submission row is locked
/// `FOR SHARE` first; writes for submissions that are no longer in progress
/// are skipped. Returns how many answers were written.
async fn write_answers(conn: &mut PgConnection, entries: &[FlushEntry]) -> Result<usize, sqlx::Error> {
    let mut ordered: Vec<&FlushEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| (e.submission_id, e.question_id));

    let mut open: HashMap<Uuid, bool> = HashMap::new();
    let mut written = 0;
    for entry in ordered {
        let writable = match open.get(&entry.submission_id) {
            Some(&writable) => writable,
            None => {
                let status: Option<String> =
                    sqlx::query_scalar("SELECT status FROM exam_submissions WHERE id = $1 FOR SHARE")
                        .bind(entry.submission_id)
                        .fetch_optional(&mut *conn)
                        .await?;
                let writable = status.as_deref() == Some("in_progress");
                open.insert(entry.submission_id, writable);
                writable
            }
        };
        if !writable {
            continue;
        }

        sqlx::query(
            r"INSERT INTO exam_answers (submission_id, question_id, answer)
              VALUES ($1, $2, $3)
              ON CONFLICT (submission_id, question_id)
              DO UPDATE SET answer = EXCLUDED.answer, updated_at = now()",
        )
        .bind(entry.submission_id)
        .bind(entry.question_id)
        .bind(&entry.answer)
        .execute(&mut *conn)
        .await?;
        written += 1;
    }
    Ok(written)
}

/// Upsert answers in one transaction.
pub(crate) async fn upsert_answers(pool: &PgPool, entries: &[FlushEntry]) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let written = write_answers(tx.as_mut(), entries).await?;
    tx.commit().await?;
    Ok(written)
}

async fn flush_entries(state: &AppState, entries: &[FlushEntry]) -> Result<(), sqlx::Error> {
    if entries.is_empty() {
        return Ok(());
    }
    let written = upsert_answers(&state.pool, entries).await?;
    ack_flushed(state, entries).await;
    debug!(count = entries.len(), written, "autosave flushed");
    Ok(())
}

/// Write every pending answer that has been idle for the debounce window.
pub async fn flush_due(state: &AppState) {
    let due = {
        let buffer = state.autosave.read().await;
        collect_due(&buffer, state.config.autosave_debounce, Instant::now())
    };
    if let Err(e) = flush_entries(state, &due).await {
        error!(error = %e, count = due.len(), "autosave flush failed");
    }
}

/// Write every pending answer for one submission on `conn`, debounce or not.
///
/// Entries stay buffered; the caller drops them once its transaction has
/// committed.
///
/// # Errors
///
/// Returns a database error.
pub async fn flush_submission(
    state: &AppState,
    conn: &mut PgConnection,
    submission_id: Uuid,
) -> Result<usize, sqlx::Error> {
    let entries = snapshot_submission(state, submission_id).await;
    if entries.is_empty() {
        return Ok(0);
    }
    write_answers(conn, &entries).await
}

/// Spawn the background autosave worker. Returns a handle for shutdown.
pub fn spawn_autosave_worker(state: AppState) -> JoinHandle<()> {
    let tick = state.config.autosave_tick;
    info!(
        tick_ms = tick.as_millis(),
        debounce_ms = state.config.autosave_debounce.as_millis(),
        "autosave worker configured"
    );
    tokio::spawn(async move {
        loop {
            flush_due(&state).await;
            tokio::time::sleep(tick).await;
        }
    })
}

#[cfg(test)]
pub(crate) async fn flush_due_for_tests(state: &AppState) {
    flush_due(state).await;
}

#[cfg(test)]
#[path = "autosave_test.rs"]
mod tests;
