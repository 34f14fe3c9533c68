use crate::modules::store::{Ratings, Result, Store, StoreError};
use crate::types::tables::{
    ContestRecord, NewContestRecord, NewSubmissionRecord, Student, SubmissionRecord,
};
use async_trait::async_trait;
use cf_progress_libs::{codeforces::model::ACCEPTED_VERDICT, FieldList};
use chrono::{DateTime, Utc};
use sqlx::{postgres::Postgres, Pool};

const UNIQUE_VIOLATION: &str = "23505";

pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        let sql = format!(
            r#"SELECT {} FROM "students" ORDER BY "id""#,
            Student::field_list()
        );
        let students = sqlx::query_as::<_, Student>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(students)
    }

    async fn find_student(&self, student_id: i64) -> Result<Option<Student>> {
        let sql = format!(
            r#"SELECT {} FROM "students" WHERE "id" = $1"#,
            Student::field_list()
        );
        let student = sqlx::query_as::<_, Student>(&sql)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(student)
    }

    async fn list_reminder_candidates(&self) -> Result<Vec<Student>> {
        let sql = format!(
            r#"
            SELECT {} FROM "students"
            WHERE
                "codeforces_handle" IS NOT NULL
                AND btrim("codeforces_handle") <> ''
                AND "notifications_disabled" = FALSE
            ORDER BY "id"
            "#,
            Student::field_list()
        );
        let students = sqlx::query_as::<_, Student>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(students)
    }

    async fn insert_contest(&self, record: &NewContestRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO "contests" (
                "student_id",
                "contest_id",
                "contest_name",
                "rank",
                "old_rating",
                "new_rating",
                "rating_change",
                "participation_time",
                "unsolved_problems"
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT ("student_id", "contest_id") DO NOTHING
            "#,
        )
        .bind(record.student_id)
        .bind(record.contest_id)
        .bind(&record.contest_name)
        .bind(record.rank)
        .bind(record.old_rating)
        .bind(record.new_rating)
        .bind(record.rating_change)
        .bind(record.participation_time)
        .bind(record.unsolved_problems)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_submission(&self, record: &NewSubmissionRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO "submissions" (
                "student_id",
                "submission_id",
                "problem_id",
                "problem_name",
                "problem_rating",
                "verdict",
                "submission_time"
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT ("student_id", "submission_id", "problem_id") DO NOTHING
            "#,
        )
        .bind(record.student_id)
        .bind(record.submission_id)
        .bind(&record.problem_id)
        .bind(&record.problem_name)
        .bind(record.problem_rating)
        .bind(&record.verdict)
        .bind(record.submission_time)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_sync(
        &self,
        student_id: i64,
        ratings: Option<Ratings>,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        // GREATEST skips NULL arguments, which covers both a missing rating
        // and a student that was never synced
        let result = sqlx::query(
            r#"
            UPDATE "students"
            SET
                "current_rating" = COALESCE($2, "current_rating"),
                "max_rating" = GREATEST("max_rating", $3),
                "last_sync_time" = GREATEST("last_sync_time", $4),
                "updated_at" = CURRENT_TIMESTAMP
            WHERE "id" = $1
            "#,
        )
        .bind(student_id)
        .bind(ratings.map(|ratings| ratings.current_rating))
        .bind(ratings.map(|ratings| ratings.max_rating))
        .bind(synced_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::StudentNotFound(student_id));
        }

        Ok(())
    }

    async fn increment_reminder_count(&self, student_id: i64) -> Result<i32> {
        sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE "students"
            SET
                "reminder_count" = "reminder_count" + 1,
                "updated_at" = CURRENT_TIMESTAMP
            WHERE "id" = $1
            RETURNING "reminder_count"
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::StudentNotFound(student_id))
    }

    async fn latest_accepted_submission_time(
        &self,
        student_id: i64,
    ) -> Result<Option<DateTime<Utc>>> {
        let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            r#"
            SELECT MAX("submission_time") FROM "submissions"
            WHERE "student_id" = $1 AND "verdict" = $2
            "#,
        )
        .bind(student_id)
        .bind(ACCEPTED_VERDICT)
        .fetch_one(&self.pool)
        .await?;

        Ok(latest)
    }

    async fn rebind_handle(&self, student_id: i64, handle: Option<&str>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE "students"
            SET
                "codeforces_handle" = $2,
                "current_rating" = 0,
                "max_rating" = 0,
                "last_sync_time" = NULL,
                "updated_at" = CURRENT_TIMESTAMP
            WHERE "id" = $1
            "#,
        )
        .bind(student_id)
        .bind(handle)
        .execute(&mut tx)
        .await;

        let updated = match updated {
            Ok(updated) => updated,
            Err(e) => {
                tx.rollback().await?;
                return Err(match e {
                    sqlx::Error::Database(ref db)
                        if db.code().as_deref() == Some(UNIQUE_VIOLATION) =>
                    {
                        StoreError::HandleTaken(handle.unwrap_or_default().to_string())
                    }
                    e => StoreError::Database(e),
                });
            }
        };
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::StudentNotFound(student_id));
        }

        sqlx::query(r#"DELETE FROM "contests" WHERE "student_id" = $1"#)
            .bind(student_id)
            .execute(&mut tx)
            .await?;
        sqlx::query(r#"DELETE FROM "submissions" WHERE "student_id" = $1"#)
            .bind(student_id)
            .execute(&mut tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn contests_since(
        &self,
        student_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ContestRecord>> {
        let sql = format!(
            r#"
            SELECT {} FROM "contests"
            WHERE "student_id" = $1 AND ($2::TIMESTAMPTZ IS NULL OR "participation_time" >= $2)
            ORDER BY "participation_time", "id"
            "#,
            ContestRecord::field_list()
        );
        let contests = sqlx::query_as::<_, ContestRecord>(&sql)
            .bind(student_id)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        Ok(contests)
    }

    async fn accepted_submissions_since(
        &self,
        student_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SubmissionRecord>> {
        let sql = format!(
            r#"
            SELECT {} FROM "submissions"
            WHERE
                "student_id" = $1
                AND "verdict" = $2
                AND ($3::TIMESTAMPTZ IS NULL OR "submission_time" >= $3)
            ORDER BY "submission_time", "id"
            "#,
            SubmissionRecord::field_list()
        );
        let submissions = sqlx::query_as::<_, SubmissionRecord>(&sql)
            .bind(student_id)
            .bind(ACCEPTED_VERDICT)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        Ok(submissions)
    }
}
