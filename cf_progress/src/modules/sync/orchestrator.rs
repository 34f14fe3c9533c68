use crate::modules::store::{Store, StoreError};
use crate::modules::sync::{fetcher::Fetcher, merger::Merger};
use crate::types::tables::Student;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Why the sync of a single student stopped.
#[derive(Debug, Error)]
pub enum SyncFailure {
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub handle: String,
    pub rating_history_available: bool,
    pub submissions_available: bool,
    pub new_contests: usize,
    pub new_submissions: usize,
}

#[derive(Debug)]
pub enum StudentOutcome {
    Synced(SyncSummary),
    SkippedNoHandle,
    Failed(SyncFailure),
}

#[derive(Debug)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Outcomes keyed by student id, in roster order.
    pub outcomes: Vec<(i64, StudentOutcome)>,
}

impl CycleReport {
    pub fn synced(&self) -> usize {
        self.count(|outcome| matches!(outcome, StudentOutcome::Synced(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, StudentOutcome::SkippedNoHandle))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, StudentOutcome::Failed(_)))
    }

    pub fn outcome_of(&self, student_id: i64) -> Option<&StudentOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| *id == student_id)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, predicate: impl Fn(&StudentOutcome) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| predicate(outcome))
            .count()
    }
}

pub struct SyncOrchestrator {
    store: Arc<dyn Store>,
    fetcher: Fetcher,
    merger: Merger,
    // held while one student is synced or rebound; a rebind never interleaves with a sync
    student_lock: Mutex<()>,
}

impl SyncOrchestrator {
    pub fn new(store: Arc<dyn Store>, fetcher: Fetcher) -> Self {
        Self {
            merger: Merger::new(store.clone()),
            store,
            fetcher,
            student_lock: Mutex::new(()),
        }
    }

    /// Syncs every student of a roster snapshot taken at the start of the cycle.
    ///
    /// Students are processed one after another and a failing student never
    /// stops the others. Each student is read again right before its sync, so
    /// a handle changed during the cycle is honoured.
    pub async fn run_sync_cycle(&self) -> Result<CycleReport, StoreError> {
        let started_at = Utc::now();
        tracing::info!("Start to synchronize codeforces data.");

        let roster = self.store.list_students().await.map_err(|e| {
            tracing::error!("failed to read the student roster: {}", e);
            e
        })?;

        let mut outcomes = Vec::with_capacity(roster.len());
        for student in roster.iter() {
            let outcome = match self.sync_student(student.id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("failed to read student {}: {}", student.name, e);
                    StudentOutcome::Failed(SyncFailure::Persistence(e))
                }
            };
            outcomes.push((student.id, outcome));
        }

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        tracing::info!(
            "Finished codeforces data synchronization: {} synced, {} skipped, {} failed.",
            report.synced(),
            report.skipped(),
            report.failed()
        );

        Ok(report)
    }

    /// Syncs a single student by id.
    pub async fn sync_student(&self, student_id: i64) -> Result<StudentOutcome, StoreError> {
        let _guard = self.student_lock.lock().await;
        let student = self
            .store
            .find_student(student_id)
            .await?
            .ok_or(StoreError::StudentNotFound(student_id))?;

        Ok(self.sync(&student).await)
    }

    /// Binds a new handle (or none) to the student.
    ///
    /// Contest and submission history of the old handle is deleted. When a new
    /// handle is set it is synced right away. Returns `None` if the handle did
    /// not change. Waits for a sync of the same student that is in flight.
    pub async fn rebind_handle(
        &self,
        student_id: i64,
        handle: Option<&str>,
    ) -> Result<Option<StudentOutcome>, StoreError> {
        let _guard = self.student_lock.lock().await;
        let student = self
            .store
            .find_student(student_id)
            .await?
            .ok_or(StoreError::StudentNotFound(student_id))?;

        let handle = handle.map(str::trim).filter(|handle| !handle.is_empty());
        if student.handle() == handle {
            return Ok(None);
        }

        tracing::info!(
            "Codeforces handle of student {} changed from {:?} to {:?}, clearing history.",
            student_id,
            student.handle(),
            handle
        );
        self.store.rebind_handle(student_id, handle).await?;

        let rebound = self
            .store
            .find_student(student_id)
            .await?
            .ok_or(StoreError::StudentNotFound(student_id))?;
        Ok(Some(self.sync(&rebound).await))
    }

    async fn sync(&self, student: &Student) -> StudentOutcome {
        let handle = match student.handle() {
            Some(handle) => handle,
            None => {
                tracing::info!("Student {} has no codeforces handle. Skip sync.", student.name);
                return StudentOutcome::SkippedNoHandle;
            }
        };

        match self.sync_handle(student, handle).await {
            Ok(summary) => {
                tracing::info!(
                    "Synced {}: {} new contests, {} new accepted submissions.",
                    handle,
                    summary.new_contests,
                    summary.new_submissions
                );
                StudentOutcome::Synced(summary)
            }
            Err(e) => {
                tracing::error!("an error occurred while syncing {}: {}", handle, e);
                StudentOutcome::Failed(e)
            }
        }
    }

    async fn sync_handle(&self, student: &Student, handle: &str) -> Result<SyncSummary, SyncFailure> {
        let ratings = self.fetcher.fetch_rating_history(handle).await;
        let submissions = self.fetcher.fetch_submissions(handle).await;

        let contest_merge = self.merger.merge_contests(student, ratings.events()).await?;
        let submission_merge = self
            .merger
            .merge_submissions(student, submissions.events())
            .await?;
        self.merger
            .complete(student, contest_merge.ratings, Utc::now())
            .await?;

        Ok(SyncSummary {
            handle: handle.to_string(),
            rating_history_available: ratings.is_available(),
            submissions_available: submissions.is_available(),
            new_contests: contest_merge.inserted,
            new_submissions: submission_merge.inserted,
        })
    }
}
