pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::pipeline::types::{Job, JobError, JobResult, JobStatus};

pub use sqlite::SqliteJobStore;

/// Partial update applied atomically to one job record. Fields left `None`
/// keep their stored value; `updated_at` always advances.
#[derive(Debug, Default, Clone)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub result: Option<JobResult>,
    pub error: Option<JobError>,
}

impl JobPatch {
    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn result(mut self, result: JobResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn error(mut self, error: JobError) -> Self {
        self.error = Some(error);
        self
    }
}

#[derive(Debug, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }
}

#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    async fn create(&self, job: &Job) -> Result<()>;
    async fn get(&self, job_id: &str) -> Result<Option<Job>>;
    async fn update(&self, job_id: &str, patch: &JobPatch) -> Result<()>;
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>>;
    async fn delete(&self, job_id: &str) -> Result<()>;
}
