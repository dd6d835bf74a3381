use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, types::Json};
use thiserror::Error;
use utils::api::exports::{ExportFormat, ExportRecord, ExportStatus};
use uuid::Uuid;

pub const STORY_EXPORTED: &str = "story.exported";

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExportPayload {
    story_title: String,
    format: ExportFormat,
    status: ExportStatus,
}

#[derive(Debug, FromRow)]
struct ExportActivityRow {
    event_id: Uuid,
    story_id: Uuid,
    payload: Json<ExportPayload>,
    created_at: DateTime<Utc>,
}

impl ExportActivityRow {
    fn into_record(self) -> ExportRecord {
        let Json(payload) = self.payload;
        ExportRecord {
            id: self.event_id,
            story_id: self.story_id,
            story_title: payload.story_title,
            format: payload.format,
            status: payload.status,
            created_at: self.created_at,
        }
    }
}

/// Details of a single export, written once when the export is served.
pub struct NewExport<'s> {
    pub story_id: Uuid,
    pub story_title: &'s str,
    pub actor_login: Option<&'s str>,
    pub format: ExportFormat,
    pub status: ExportStatus,
}

pub struct ActivityRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ActivityRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn record_export(&self, export: NewExport<'_>) -> Result<ExportRecord, ActivityError> {
        let payload = ExportPayload {
            story_title: export.story_title.to_string(),
            format: export.format,
            status: export.status,
        };

        let row = sqlx::query_as::<_, ExportActivityRow>(
            r#"
            INSERT INTO activity (event_type, actor_login, story_id, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING event_id,
                      story_id,
                      payload,
                      created_at
            "#,
        )
        .bind(STORY_EXPORTED)
        .bind(export.actor_login)
        .bind(export.story_id)
        .bind(Json(payload))
        .fetch_one(self.pool)
        .await?;

        Ok(row.into_record())
    }

    /// Exports performed by `actor_login`, newest first.
    pub async fn list_exports(
        &self,
        actor_login: &str,
        limit: i64,
    ) -> Result<Vec<ExportRecord>, ActivityError> {
        let rows = sqlx::query_as::<_, ExportActivityRow>(
            r#"
            SELECT event_id,
                   story_id,
                   payload,
                   created_at
            FROM activity
            WHERE event_type = $1
              AND actor_login = $2
            ORDER BY seq DESC
            LIMIT $3
            "#,
        )
        .bind(STORY_EXPORTED)
        .bind(actor_login)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(ExportActivityRow::into_record).collect())
    }
}
