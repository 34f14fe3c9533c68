//! Idempotent merge of full upstream histories into the store.
//!
//! The upstream never sends deltas, so every sync replays the whole history
//! and relies on the natural keys to skip what is already stored. Stored
//! records are never updated.
use crate::modules::store::{Ratings, Store, StoreError};
use crate::types::tables::{NewContestRecord, NewSubmissionRecord, Student};
use cf_progress_libs::codeforces::model::{RatingChange, Submission};
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContestMerge {
    pub inserted: usize,
    pub skipped: usize,
    /// `None` when there were no events, the stored ratings must then stay as they are.
    pub ratings: Option<Ratings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubmissionMerge {
    pub inserted: usize,
    pub skipped: usize,
    pub rejected: usize,
}

pub struct Merger {
    store: Arc<dyn Store>,
}

impl Merger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn merge_contests(
        &self,
        student: &Student,
        events: &[RatingChange],
    ) -> Result<ContestMerge, StoreError> {
        let mut merge = ContestMerge {
            ratings: updated_ratings(student, events),
            ..Default::default()
        };

        for event in events.iter() {
            let record = NewContestRecord::new(student.id, event);
            if self.store.insert_contest(&record).await? {
                merge.inserted += 1;
            } else {
                merge.skipped += 1;
            }
        }

        Ok(merge)
    }

    pub async fn merge_submissions(
        &self,
        student: &Student,
        events: &[Submission],
    ) -> Result<SubmissionMerge, StoreError> {
        let mut merge = SubmissionMerge::default();

        for event in events.iter() {
            let record = match NewSubmissionRecord::accepted(student.id, event) {
                Some(record) => record,
                None => {
                    merge.rejected += 1;
                    continue;
                }
            };
            if self.store.insert_submission(&record).await? {
                merge.inserted += 1;
            } else {
                merge.skipped += 1;
            }
        }

        Ok(merge)
    }

    /// Marks the sync attempt as completed, storing the new ratings if there are any.
    pub async fn complete(
        &self,
        student: &Student,
        ratings: Option<Ratings>,
        synced_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.store.record_sync(student.id, ratings, synced_at).await
    }
}

/// Ratings after applying `events` to what is known about the student.
///
/// The current rating comes from the chronologically last event (the last one
/// in upstream order on ties), the maximum never drops below the stored one.
pub fn updated_ratings(student: &Student, events: &[RatingChange]) -> Option<Ratings> {
    let latest = events
        .iter()
        .max_by_key(|event| event.rating_update_time_seconds)?;
    let highest = events.iter().map(|event| event.new_rating).max()?;

    Some(Ratings {
        current_rating: latest.new_rating,
        max_rating: student.max_rating.max(highest),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::modules::store::memory::MemoryStore;
    use crate::modules::sync::fetcher::test::{rating_change, submission};

    fn setup() -> (Arc<MemoryStore>, Merger, Student) {
        let store = Arc::new(MemoryStore::new());
        let student = store.add_student("alice", Some("alice"));
        let merger = Merger::new(store.clone());
        (store, merger, student)
    }

    #[tokio::test]
    async fn test_merge_contests_twice_is_idempotent() {
        let (store, merger, student) = setup();
        let events = vec![
            rating_change(1, 0, 1200, 1_000),
            rating_change(2, 1200, 1350, 2_000),
        ];

        let first = merger.merge_contests(&student, &events).await.unwrap();
        let before = store.contests_of(student.id);
        let second = merger.merge_contests(&student, &events).await.unwrap();
        let after = store.contests_of(student.id);

        assert_eq!(first.inserted, 2);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(before, after);
        assert_eq!(first.ratings, second.ratings);
    }

    #[tokio::test]
    async fn test_merge_contests_superset_counts_unique_keys() {
        let (store, merger, student) = setup();
        let run1 = vec![rating_change(1, 0, 1200, 1_000)];
        let run2 = vec![
            rating_change(1, 0, 1200, 1_000),
            rating_change(2, 1200, 1100, 2_000),
            rating_change(3, 1100, 1250, 3_000),
        ];

        merger.merge_contests(&student, &run1).await.unwrap();
        merger.merge_contests(&student, &run2).await.unwrap();

        assert_eq!(store.contests_of(student.id).len(), 3);
    }

    #[tokio::test]
    async fn test_existing_contest_is_not_overwritten() {
        let (store, merger, student) = setup();
        merger
            .merge_contests(&student, &[rating_change(1, 0, 1200, 1_000)])
            .await
            .unwrap();

        let mut revised = rating_change(1, 0, 1300, 1_000);
        revised.contest_name = String::from("Renamed Round");
        merger.merge_contests(&student, &[revised]).await.unwrap();

        let contests = store.contests_of(student.id);
        assert_eq!(contests.len(), 1);
        assert_eq!(contests[0].new_rating, 1200);
        assert_eq!(contests[0].contest_name, "Codeforces Round 1");
    }

    #[tokio::test]
    async fn test_rating_change_is_derived() {
        let (store, merger, student) = setup();
        let mut event = rating_change(5, 1500, 1420, 1_000);
        event.handle = String::from("alice");
        merger.merge_contests(&student, &[event]).await.unwrap();

        let contests = store.contests_of(student.id);
        assert_eq!(contests[0].rating_change, -80);
        assert_eq!(contests[0].unsolved_problems, 0);
    }

    #[test]
    fn test_updated_ratings() {
        let store = MemoryStore::new();
        let mut student = store.add_student("bob", Some("bob"));

        assert_eq!(updated_ratings(&student, &[]), None);

        let events = vec![
            rating_change(1, 0, 1600, 1_000),
            rating_change(2, 1600, 1450, 2_000),
        ];
        assert_eq!(
            updated_ratings(&student, &events),
            Some(Ratings {
                current_rating: 1450,
                max_rating: 1600
            })
        );

        // upstream order is not trusted, the latest update time wins
        let shuffled = vec![events[1].clone(), events[0].clone()];
        assert_eq!(
            updated_ratings(&student, &shuffled).map(|r| r.current_rating),
            Some(1450)
        );

        student.max_rating = 1900;
        assert_eq!(
            updated_ratings(&student, &events).map(|r| r.max_rating),
            Some(1900)
        );
    }

    #[tokio::test]
    async fn test_merge_submissions_keeps_only_accepted() {
        let (store, merger, student) = setup();
        let events = vec![
            submission(10, Some(100), "A", "OK", 1_000),
            submission(11, Some(100), "B", "WRONG_ANSWER", 1_100),
            submission(12, Some(100), "B", "TIME_LIMIT_EXCEEDED", 1_200),
            submission(13, None, "C", "OK", 1_300),
        ];

        let merge = merger.merge_submissions(&student, &events).await.unwrap();

        assert_eq!(merge.inserted, 2);
        assert_eq!(merge.rejected, 2);
        let stored = store.submissions_of(student.id);
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|s| s.verdict == "OK"));
        assert!(stored.iter().any(|s| s.problem_id == "noContest_C"));
    }

    #[tokio::test]
    async fn test_merge_submissions_twice_is_idempotent() {
        let (store, merger, student) = setup();
        let run1 = vec![submission(10, Some(100), "A", "OK", 1_000)];
        let run2 = vec![
            submission(10, Some(100), "A", "OK", 1_000),
            submission(14, Some(100), "A", "OK", 1_500),
            submission(15, Some(101), "D", "OK", 2_000),
        ];

        merger.merge_submissions(&student, &run1).await.unwrap();
        merger.merge_submissions(&student, &run2).await.unwrap();
        let second = merger.merge_submissions(&student, &run2).await.unwrap();

        assert_eq!(second.inserted, 0);
        assert_eq!(store.submissions_of(student.id).len(), 3);
    }
}
