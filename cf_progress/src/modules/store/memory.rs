use crate::modules::store::{Ratings, Result, Store, StoreError};
use crate::types::tables::{
    ContestRecord, NewContestRecord, NewSubmissionRecord, Student, SubmissionRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Default)]
struct Tables {
    students: Vec<Student>,
    contests: Vec<ContestRecord>,
    submissions: Vec<SubmissionRecord>,
    next_id: i64,
}

/// Store kept in process memory, with the same key constraints as the database schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    // student ids whose writes fail, to exercise per-student failure paths
    broken: Mutex<HashSet<i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_student(&self, name: &str, handle: Option<&str>) -> Student {
        let mut tables = self.tables.lock().unwrap();
        tables.next_id += 1;
        let now = Utc::now();
        let student = Student {
            id: tables.next_id,
            name: name.to_string(),
            email: format!("{}@example.com", name),
            phone_number: None,
            codeforces_handle: handle.map(String::from),
            current_rating: 0,
            max_rating: 0,
            last_sync_time: None,
            reminder_count: 0,
            notifications_disabled: false,
            created_at: now,
            updated_at: now,
        };
        tables.students.push(student.clone());
        student
    }

    pub fn update_student(&self, student_id: i64, update: impl FnOnce(&mut Student)) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(student) = tables.students.iter_mut().find(|s| s.id == student_id) {
            update(student);
        }
    }

    pub fn student(&self, student_id: i64) -> Student {
        let tables = self.tables.lock().unwrap();
        tables
            .students
            .iter()
            .find(|s| s.id == student_id)
            .cloned()
            .unwrap()
    }

    pub fn contests_of(&self, student_id: i64) -> Vec<ContestRecord> {
        let tables = self.tables.lock().unwrap();
        tables
            .contests
            .iter()
            .filter(|c| c.student_id == student_id)
            .cloned()
            .collect()
    }

    pub fn submissions_of(&self, student_id: i64) -> Vec<SubmissionRecord> {
        let tables = self.tables.lock().unwrap();
        tables
            .submissions
            .iter()
            .filter(|s| s.student_id == student_id)
            .cloned()
            .collect()
    }

    pub fn break_student(&self, student_id: i64) {
        self.broken.lock().unwrap().insert(student_id);
    }

    fn check_writable(&self, student_id: i64) -> Result<()> {
        if self.broken.lock().unwrap().contains(&student_id) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        Ok(self.tables.lock().unwrap().students.clone())
    }

    async fn find_student(&self, student_id: i64) -> Result<Option<Student>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.students.iter().find(|s| s.id == student_id).cloned())
    }

    async fn list_reminder_candidates(&self) -> Result<Vec<Student>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .students
            .iter()
            .filter(|s| s.accepts_reminders())
            .cloned()
            .collect())
    }

    async fn insert_contest(&self, record: &NewContestRecord) -> Result<bool> {
        self.check_writable(record.student_id)?;
        let mut tables = self.tables.lock().unwrap();
        if tables
            .contests
            .iter()
            .any(|c| c.student_id == record.student_id && c.contest_id == record.contest_id)
        {
            return Ok(false);
        }

        tables.next_id += 1;
        let id = tables.next_id;
        tables.contests.push(ContestRecord {
            id,
            student_id: record.student_id,
            contest_id: record.contest_id,
            contest_name: record.contest_name.clone(),
            rank: record.rank,
            old_rating: record.old_rating,
            new_rating: record.new_rating,
            rating_change: record.rating_change,
            participation_time: record.participation_time,
            unsolved_problems: record.unsolved_problems,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn insert_submission(&self, record: &NewSubmissionRecord) -> Result<bool> {
        self.check_writable(record.student_id)?;
        let mut tables = self.tables.lock().unwrap();
        if tables.submissions.iter().any(|s| {
            s.student_id == record.student_id
                && s.submission_id == record.submission_id
                && s.problem_id == record.problem_id
        }) {
            return Ok(false);
        }

        tables.next_id += 1;
        let id = tables.next_id;
        tables.submissions.push(SubmissionRecord {
            id,
            student_id: record.student_id,
            submission_id: record.submission_id,
            problem_id: record.problem_id.clone(),
            problem_name: record.problem_name.clone(),
            problem_rating: record.problem_rating,
            verdict: record.verdict.clone(),
            submission_time: record.submission_time,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn record_sync(
        &self,
        student_id: i64,
        ratings: Option<Ratings>,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        self.check_writable(student_id)?;
        let mut tables = self.tables.lock().unwrap();
        let student = tables
            .students
            .iter_mut()
            .find(|s| s.id == student_id)
            .ok_or(StoreError::StudentNotFound(student_id))?;

        if let Some(ratings) = ratings {
            student.current_rating = ratings.current_rating;
            student.max_rating = student.max_rating.max(ratings.max_rating);
        }
        student.last_sync_time = Some(match student.last_sync_time {
            Some(previous) => previous.max(synced_at),
            None => synced_at,
        });
        Ok(())
    }

    async fn increment_reminder_count(&self, student_id: i64) -> Result<i32> {
        self.check_writable(student_id)?;
        let mut tables = self.tables.lock().unwrap();
        let student = tables
            .students
            .iter_mut()
            .find(|s| s.id == student_id)
            .ok_or(StoreError::StudentNotFound(student_id))?;

        student.reminder_count += 1;
        Ok(student.reminder_count)
    }

    async fn latest_accepted_submission_time(
        &self,
        student_id: i64,
    ) -> Result<Option<DateTime<Utc>>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .submissions
            .iter()
            .filter(|s| s.student_id == student_id && s.verdict == "OK")
            .map(|s| s.submission_time)
            .max())
    }

    async fn rebind_handle(&self, student_id: i64, handle: Option<&str>) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(handle) = handle {
            if tables
                .students
                .iter()
                .any(|s| s.id != student_id && s.codeforces_handle.as_deref() == Some(handle))
            {
                return Err(StoreError::HandleTaken(handle.to_string()));
            }
        }

        let student = tables
            .students
            .iter_mut()
            .find(|s| s.id == student_id)
            .ok_or(StoreError::StudentNotFound(student_id))?;
        student.codeforces_handle = handle.map(String::from);
        student.current_rating = 0;
        student.max_rating = 0;
        student.last_sync_time = None;

        tables.contests.retain(|c| c.student_id != student_id);
        tables.submissions.retain(|s| s.student_id != student_id);
        Ok(())
    }

    async fn contests_since(
        &self,
        student_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ContestRecord>> {
        let mut contests: Vec<ContestRecord> = self
            .contests_of(student_id)
            .into_iter()
            .filter(|c| since.map_or(true, |since| c.participation_time >= since))
            .collect();
        contests.sort_by_key(|c| (c.participation_time, c.id));
        Ok(contests)
    }

    async fn accepted_submissions_since(
        &self,
        student_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SubmissionRecord>> {
        let mut submissions: Vec<SubmissionRecord> = self
            .submissions_of(student_id)
            .into_iter()
            .filter(|s| s.verdict == "OK")
            .filter(|s| since.map_or(true, |since| s.submission_time >= since))
            .collect();
        submissions.sort_by_key(|s| (s.submission_time, s.id));
        Ok(submissions)
    }
}
