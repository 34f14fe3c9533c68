pub mod postgres;

#[cfg(test)]
pub mod memory;

use crate::types::tables::{
    ContestRecord, NewContestRecord, NewSubmissionRecord, Student, SubmissionRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use postgres::PgStore;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database operation failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("student {0} not found")]
    StudentNotFound(i64),
    #[error("codeforces handle {0} is already bound to another student")]
    HandleTaken(String),
}

/// Ratings derived from a student's contest history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratings {
    pub current_rating: i32,
    pub max_rating: i32,
}

/// Keyed lookup and insert access to students and their contest/submission history.
///
/// Both `insert_*` methods enforce the natural key of the record and report
/// whether a row was written (`false` means the key already existed).
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn list_students(&self) -> Result<Vec<Student>>;

    async fn find_student(&self, student_id: i64) -> Result<Option<Student>>;

    /// Students with a non-blank handle that did not opt out of reminders.
    async fn list_reminder_candidates(&self) -> Result<Vec<Student>>;

    async fn insert_contest(&self, record: &NewContestRecord) -> Result<bool>;

    async fn insert_submission(&self, record: &NewSubmissionRecord) -> Result<bool>;

    /// Stores the outcome of a sync attempt.
    ///
    /// `ratings` is `None` when no contest history was available; the stored
    /// ratings are then left untouched. `max_rating` never decreases and
    /// `last_sync_time` never moves backwards.
    async fn record_sync(
        &self,
        student_id: i64,
        ratings: Option<Ratings>,
        synced_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Increments the reminder counter and returns the new value.
    async fn increment_reminder_count(&self, student_id: i64) -> Result<i32>;

    async fn latest_accepted_submission_time(
        &self,
        student_id: i64,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Replaces the handle and deletes every contest and submission of the student.
    ///
    /// Ratings go back to 0 and `last_sync_time` is cleared because they
    /// described the previous handle.
    async fn rebind_handle(&self, student_id: i64, handle: Option<&str>) -> Result<()>;

    /// Contests participated at or after `since` (all when `None`), oldest first.
    async fn contests_since(
        &self,
        student_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ContestRecord>>;

    /// Accepted submissions made at or after `since` (all when `None`), oldest first.
    async fn accepted_submissions_since(
        &self,
        student_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SubmissionRecord>>;
}
