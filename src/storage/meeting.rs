use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::fmt::Display;
use uuid::Uuid;

use crate::pipeline::types::{SummaryResult, TranscriptResult};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Pending,
    Transcribing,
    Summarizing,
    Completed,
    Error,
}

impl Display for MeetingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeetingStatus::Pending => write!(f, "pending"),
            MeetingStatus::Transcribing => write!(f, "transcribing"),
            MeetingStatus::Summarizing => write!(f, "summarizing"),
            MeetingStatus::Completed => write!(f, "completed"),
            MeetingStatus::Error => write!(f, "error"),
        }
    }
}

impl TryFrom<String> for MeetingStatus {
    type Error = String;
    fn try_from(status: String) -> Result<Self, <MeetingStatus as TryFrom<String>>::Error> {
        match status.as_str() {
            "pending" => Ok(MeetingStatus::Pending),
            "transcribing" => Ok(MeetingStatus::Transcribing),
            "summarizing" => Ok(MeetingStatus::Summarizing),
            "completed" => Ok(MeetingStatus::Completed),
            "error" => Ok(MeetingStatus::Error),
            _ => Err(format!("Invalid meeting status: {}", status)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub audio_path: Option<String>,
    pub status: MeetingStatus,
    pub transcription: Option<TranscriptResult>,
    pub summary: Option<SummaryResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    pub fn new(title: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("meeting-{}", Uuid::new_v4()),
            title,
            description,
            audio_path: None,
            status: MeetingStatus::Pending,
            transcription: None,
            summary: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MeetingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<MeetingStatus>,
    pub audio_path: Option<String>,
    pub transcription: Option<TranscriptResult>,
    pub summary: Option<SummaryResult>,
    pub error: Option<String>,
}

impl MeetingPatch {
    pub fn title(mut self, title: String) -> Self {
        self.title = Some(title);
        self
    }

    pub fn description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    pub fn status(mut self, status: MeetingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn audio_path(mut self, path: String) -> Self {
        self.audio_path = Some(path);
        self
    }

    pub fn transcription(mut self, transcription: TranscriptResult) -> Self {
        self.transcription = Some(transcription);
        self
    }

    pub fn summary(mut self, summary: SummaryResult) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

#[async_trait]
pub trait MeetingStore: Send + Sync + 'static {
    async fn create(&self, meeting: &Meeting) -> Result<()>;
    async fn get(&self, meeting_id: &str) -> Result<Option<Meeting>>;
    async fn update(&self, meeting_id: &str, patch: &MeetingPatch) -> Result<()>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Meeting>>;
    async fn delete(&self, meeting_id: &str) -> Result<()>;
}

pub struct SqliteMeetingStore {
    pool: SqlitePool,
}

impl SqliteMeetingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_meeting(row: sqlx::sqlite::SqliteRow) -> Result<Meeting> {
        let status: String = row.get("status");
        let transcription: Option<String> = row.get("transcription");
        let summary: Option<String> = row.get("summary");

        Ok(Meeting {
            id: row.get("id"),
            title: row.get("title"),
            description: row.get("description"),
            audio_path: row.get("audio_path"),
            status: MeetingStatus::try_from(status).map_err(anyhow::Error::msg)?,
            transcription: transcription
                .map(|t| serde_json::from_str(&t))
                .transpose()?,
            summary: summary.map(|s| serde_json::from_str(&s)).transpose()?,
            error: row.get("error"),
            created_at: DateTime::parse_from_rfc3339(row.get("created_at"))?.with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(row.get("updated_at"))?.with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl MeetingStore for SqliteMeetingStore {
    async fn create(&self, meeting: &Meeting) -> Result<()> {
        let transcription = meeting
            .transcription
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let summary = meeting
            .summary
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO meetings
            (id, title, description, audio_path, status, transcription, summary, error, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&meeting.id)
        .bind(&meeting.title)
        .bind(&meeting.description)
        .bind(&meeting.audio_path)
        .bind(meeting.status.to_string())
        .bind(transcription)
        .bind(summary)
        .bind(&meeting.error)
        .bind(meeting.created_at.to_rfc3339())
        .bind(meeting.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, meeting_id: &str) -> Result<Option<Meeting>> {
        let row = sqlx::query("SELECT * FROM meetings WHERE id = ?")
            .bind(meeting_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_meeting).transpose()
    }

    async fn update(&self, meeting_id: &str, patch: &MeetingPatch) -> Result<()> {
        let transcription = patch
            .transcription
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let summary = patch
            .summary
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            UPDATE meetings
            SET title = COALESCE(?, title),
                description = COALESCE(?, description),
                status = COALESCE(?, status),
                audio_path = COALESCE(?, audio_path),
                transcription = COALESCE(?, transcription),
                summary = COALESCE(?, summary),
                error = COALESCE(?, error),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(patch.status.map(|s| s.to_string()))
        .bind(&patch.audio_path)
        .bind(transcription)
        .bind(summary)
        .bind(&patch.error)
        .bind(Utc::now().to_rfc3339())
        .bind(meeting_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Meeting>> {
        let rows = sqlx::query("SELECT * FROM meetings ORDER BY created_at DESC LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_meeting).collect()
    }

    async fn delete(&self, meeting_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM meetings WHERE id = ?")
            .bind(meeting_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage;

    async fn setup() -> anyhow::Result<(SqliteMeetingStore, tempfile::TempDir)> {
        let dir = tempfile::tempdir()?;
        let url = format!("sqlite://{}/meetings.db?mode=rwc", dir.path().display());
        let pool = storage::connect(&url).await?;
        Ok((SqliteMeetingStore::new(pool), dir))
    }

    #[tokio::test]
    async fn create_update_round_trip() -> anyhow::Result<()> {
        let (store, _dir) = setup().await?;
        let meeting = Meeting::new("Weekly sync".to_string(), Some("planning".to_string()));
        store.create(&meeting).await?;

        store
            .update(
                &meeting.id,
                &MeetingPatch::default()
                    .status(MeetingStatus::Transcribing)
                    .audio_path("/tmp/audio.wav".to_string()),
            )
            .await?;

        let loaded = store.get(&meeting.id).await?.unwrap();
        assert_eq!(loaded.status, MeetingStatus::Transcribing);
        assert_eq!(loaded.audio_path.as_deref(), Some("/tmp/audio.wav"));
        assert_eq!(loaded.title, "Weekly sync");

        // renaming leaves the other fields alone
        store
            .update(
                &meeting.id,
                &MeetingPatch::default().title("Weekly sync (moved)".to_string()),
            )
            .await?;
        let loaded = store.get(&meeting.id).await?.unwrap();
        assert_eq!(loaded.title, "Weekly sync (moved)");
        assert_eq!(loaded.status, MeetingStatus::Transcribing);

        store.delete(&meeting.id).await?;
        assert!(store.get(&meeting.id).await?.is_none());
        Ok(())
    }
}
