use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::pipeline::types::{Job, JobKind, JobStatus};

use super::{JobFilter, JobPatch, JobStore};

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: sqlx::sqlite::SqliteRow) -> Result<Job> {
        let kind: String = row.get("kind");
        let status: String = row.get("status");
        let engine: String = row.get("engine");
        let provider: Option<String> = row.get("provider");
        let result: Option<String> = row.get("result");
        let error: Option<String> = row.get("error");

        Ok(Job {
            id: row.get("id"),
            meeting_id: row.get("meeting_id"),
            kind: JobKind::try_from(kind).map_err(anyhow::Error::msg)?,
            status: JobStatus::try_from(status).map_err(anyhow::Error::msg)?,
            progress: row.get::<i64, _>("progress") as u8,
            engine: engine.parse().map_err(anyhow::Error::msg)?,
            provider: provider
                .map(|p| p.parse().map_err(anyhow::Error::msg))
                .transpose()?,
            result: result.map(|r| serde_json::from_str(&r)).transpose()?,
            error: error.map(|e| serde_json::from_str(&e)).transpose()?,
            created_at: DateTime::parse_from_rfc3339(row.get("created_at"))?.with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(row.get("updated_at"))?.with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create(&self, job: &Job) -> Result<()> {
        let result = job.result.as_ref().map(serde_json::to_string).transpose()?;
        let error = job.error.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO jobs
            (id, meeting_id, kind, status, progress, engine, provider, result, error, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.meeting_id)
        .bind(job.kind.to_string())
        .bind(job.status.to_string())
        .bind(job.progress as i64)
        .bind(job.engine.to_string())
        .bind(job.provider.map(|p| p.to_string()))
        .bind(result)
        .bind(error)
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_job).transpose()
    }

    async fn update(&self, job_id: &str, patch: &JobPatch) -> Result<()> {
        let result = patch.result.as_ref().map(serde_json::to_string).transpose()?;
        let error = patch.error.as_ref().map(serde_json::to_string).transpose()?;

        // single statement so the partial update is atomic
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = COALESCE(?, status),
                progress = COALESCE(?, progress),
                result = COALESCE(?, result),
                error = COALESCE(?, error),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(patch.status.map(|s| s.to_string()))
        .bind(patch.progress.map(|p| p as i64))
        .bind(result)
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let rows = match filter.status {
            Some(status) => {
                sqlx::query(
                    "SELECT * FROM jobs WHERE status = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(status.to_string())
                .bind(filter.limit)
                .bind(filter.offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM jobs ORDER BY created_at DESC LIMIT ? OFFSET ?")
                    .bind(filter.limit)
                    .bind(filter.offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(Self::row_to_job).collect()
    }

    async fn delete(&self, job_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
