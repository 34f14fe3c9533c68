use cf_progress_libs::{
    codeforces::model::{RatingChange, Submission, ACCEPTED_VERDICT},
    FieldList,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, FieldList)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub codeforces_handle: Option<String>,
    pub current_rating: i32,
    pub max_rating: i32,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub reminder_count: i32,
    pub notifications_disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    /// The handle to query the upstream with. A blank handle counts as no handle.
    pub fn handle(&self) -> Option<&str> {
        self.codeforces_handle
            .as_deref()
            .map(str::trim)
            .filter(|handle| !handle.is_empty())
    }

    pub fn accepts_reminders(&self) -> bool {
        self.handle().is_some() && !self.notifications_disabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, FieldList)]
pub struct ContestRecord {
    pub id: i64,
    pub student_id: i64,
    pub contest_id: i64,
    pub contest_name: String,
    pub rank: i64,
    pub old_rating: i32,
    pub new_rating: i32,
    pub rating_change: i32,
    pub participation_time: DateTime<Utc>,
    pub unsolved_problems: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContestRecord {
    pub student_id: i64,
    pub contest_id: i64,
    pub contest_name: String,
    pub rank: i64,
    pub old_rating: i32,
    pub new_rating: i32,
    pub rating_change: i32,
    pub participation_time: DateTime<Utc>,
    // the rating feed carries no standings, so this stays at 0
    pub unsolved_problems: i32,
}

impl NewContestRecord {
    pub fn new(student_id: i64, change: &RatingChange) -> Self {
        Self {
            student_id,
            contest_id: change.contest_id,
            contest_name: change.contest_name.clone(),
            rank: change.rank,
            old_rating: change.old_rating,
            new_rating: change.new_rating,
            rating_change: change.rating_change(),
            participation_time: change.updated_at(),
            unsolved_problems: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, FieldList)]
pub struct SubmissionRecord {
    pub id: i64,
    pub student_id: i64,
    pub submission_id: i64,
    pub problem_id: String,
    pub problem_name: String,
    pub problem_rating: i32,
    pub verdict: String,
    pub submission_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmissionRecord {
    pub student_id: i64,
    pub submission_id: i64,
    pub problem_id: String,
    pub problem_name: String,
    pub problem_rating: i32,
    pub verdict: String,
    pub submission_time: DateTime<Utc>,
}

impl NewSubmissionRecord {
    /// Builds the record for an accepted submission, `None` for any other verdict.
    pub fn accepted(student_id: i64, submission: &Submission) -> Option<Self> {
        if !submission.is_accepted() {
            return None;
        }

        Some(Self {
            student_id,
            submission_id: submission.id,
            problem_id: submission.problem.problem_id(),
            problem_name: submission.problem.name.clone(),
            problem_rating: submission.problem.rating.unwrap_or(0),
            verdict: ACCEPTED_VERDICT.to_string(),
            submission_time: submission.submitted_at(),
        })
    }
}
