//! PostgreSQL job store.
//!
//! One `jobs` table with JSONB payload columns; status is stored as text so
//! the schema needs no custom enum type. `write` is an upsert keyed by id
//! whose update arm refuses terminal rows, keeping finished jobs immutable
//! without a round trip.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE jobs (
//!     id UUID PRIMARY KEY,
//!     job_type TEXT NOT NULL,
//!     status TEXT NOT NULL,
//!     created TIMESTAMPTZ NOT NULL,
//!     updated TIMESTAMPTZ NOT NULL,
//!     completed TIMESTAMPTZ,
//!     progress SMALLINT NOT NULL DEFAULT 0,
//!     progress_step TEXT,
//!     progress_details JSONB,
//!     data JSONB NOT NULL DEFAULT 'null',
//!     result JSONB,
//!     error TEXT,
//!     message TEXT,
//!     event_id UUID
//! );
//! ```

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{Job, JobStatus, ProgressDetails};
use crate::kernel::traits::BaseJobStore;

pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct JobRow {
    id: Uuid,
    job_type: String,
    status: String,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    completed: Option<DateTime<Utc>>,
    progress: i16,
    progress_step: Option<String>,
    progress_details: Option<serde_json::Value>,
    data: serde_json::Value,
    result: Option<serde_json::Value>,
    error: Option<String>,
    message: Option<String>,
    event_id: Option<Uuid>,
}

impl TryFrom<JobRow> for Job {
    type Error = anyhow::Error;

    fn try_from(row: JobRow) -> Result<Self> {
        let status: JobStatus = row.status.parse()?;
        let progress_details: Option<ProgressDetails> = row
            .progress_details
            .map(serde_json::from_value)
            .transpose()?;

        Ok(Job {
            id: row.id,
            job_type: row.job_type,
            status,
            created: row.created,
            updated: row.updated,
            completed: row.completed,
            progress: row.progress.clamp(0, 100) as u8,
            progress_step: row.progress_step,
            progress_details,
            data: row.data,
            result: row.result,
            error: row.error,
            message: row.message,
            event_id: row.event_id,
        })
    }
}

const SELECT_COLUMNS: &str = "id, job_type, status, created, updated, completed, \
     progress, progress_step, progress_details, data, result, error, message, event_id";

#[async_trait]
impl BaseJobStore for PostgresJobStore {
    async fn read(&self, id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn write(&self, job: &Job) -> Result<bool> {
        let progress_details = job
            .progress_details
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        // The WHERE arm makes terminal rows immutable inside the statement;
        // rows_affected is 0 when the guard refuses the update
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (
                id, job_type, status, created, updated, completed,
                progress, progress_step, progress_details, data,
                result, error, message, event_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                updated = EXCLUDED.updated,
                completed = EXCLUDED.completed,
                progress = EXCLUDED.progress,
                progress_step = EXCLUDED.progress_step,
                progress_details = EXCLUDED.progress_details,
                data = EXCLUDED.data,
                result = EXCLUDED.result,
                error = EXCLUDED.error,
                message = EXCLUDED.message,
                event_id = EXCLUDED.event_id
            WHERE jobs.status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(job.id)
        .bind(&job.job_type)
        .bind(job.status.as_str())
        .bind(job.created)
        .bind(job.updated)
        .bind(job.completed)
        .bind(job.progress as i16)
        .bind(&job.progress_step)
        .bind(progress_details)
        .bind(&job.data)
        .bind(&job.result)
        .bind(&job.error)
        .bind(&job.message)
        .bind(job.event_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query_pending(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM jobs WHERE status = 'pending' ORDER BY created ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn count_processing(&self) -> Result<usize> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM jobs WHERE status = 'processing'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count as usize)
    }

    async fn prune_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let deleted = sqlx::query(
            "DELETE FROM jobs WHERE status IN ('completed', 'failed') AND updated < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deleted)
    }
}
