use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};
use thiserror::Error;
use utils::api::stories::{NewStory, RepositoryRef, Story, StoryEvent, StoryMetadata};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, FromRow)]
struct StoryRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    content: String,
    metadata: Option<Json<StoryMetadata>>,
    events: Option<Json<Vec<StoryEvent>>>,
    repository: Option<Json<RepositoryRef>>,
    created_at: DateTime<Utc>,
}

impl From<StoryRow> for Story {
    fn from(row: StoryRow) -> Self {
        Story {
            id: row.id,
            title: row.title,
            description: row.description,
            content: row.content,
            metadata: row.metadata.map(|Json(metadata)| metadata),
            events: row.events.map(|Json(events)| events),
            repository: row.repository.map(|Json(repository)| repository),
            created_at: row.created_at,
        }
    }
}

pub struct StoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoryRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// `Ok(None)` when no story has this id.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Story>, StoryError> {
        let row = sqlx::query_as::<_, StoryRow>(
            r#"
            SELECT id,
                   title,
                   description,
                   content,
                   metadata,
                   events,
                   repository,
                   created_at
            FROM stories
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Story::from))
    }

    pub async fn create(&self, story: NewStory) -> Result<Story, StoryError> {
        let row = sqlx::query_as::<_, StoryRow>(
            r#"
            INSERT INTO stories (title, description, content, metadata, events, repository)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id,
                      title,
                      description,
                      content,
                      metadata,
                      events,
                      repository,
                      created_at
            "#,
        )
        .bind(story.title)
        .bind(story.description)
        .bind(story.content)
        .bind(story.metadata.map(Json))
        .bind(story.events.map(Json))
        .bind(story.repository.map(Json))
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Newest first.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Story>, StoryError> {
        let rows = sqlx::query_as::<_, StoryRow>(
            r#"
            SELECT id,
                   title,
                   description,
                   content,
                   metadata,
                   events,
                   repository,
                   created_at
            FROM stories
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Story::from).collect())
    }
}
