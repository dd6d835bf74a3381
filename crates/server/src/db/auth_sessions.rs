use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use uuid::Uuid;

/// Sessions unused for longer than this are revoked on next use.
pub const MAX_SESSION_INACTIVITY_DURATION: Duration = Duration::days(30);

#[derive(Debug, Error)]
pub enum AuthSessionError {
    #[error("auth session not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, FromRow)]
pub struct AuthSession {
    pub id: Uuid,
    pub github_user_id: i64,
    pub github_login: String,
    pub encrypted_provider_token: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    pub fn inactivity_duration(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_used_at.unwrap_or(self.created_at)
    }
}

pub struct AuthSessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AuthSessionRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        github_user_id: i64,
        github_login: &str,
        encrypted_provider_token: &str,
    ) -> Result<AuthSession, AuthSessionError> {
        let session = sqlx::query_as::<_, AuthSession>(
            r#"
            INSERT INTO auth_sessions (github_user_id, github_login, encrypted_provider_token, last_used_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id,
                      github_user_id,
                      github_login,
                      encrypted_provider_token,
                      created_at,
                      last_used_at,
                      revoked_at
            "#,
        )
        .bind(github_user_id)
        .bind(github_login)
        .bind(encrypted_provider_token)
        .fetch_one(self.pool)
        .await?;

        Ok(session)
    }

    pub async fn get(&self, id: Uuid) -> Result<AuthSession, AuthSessionError> {
        sqlx::query_as::<_, AuthSession>(
            r#"
            SELECT id,
                   github_user_id,
                   github_login,
                   encrypted_provider_token,
                   created_at,
                   last_used_at,
                   revoked_at
            FROM auth_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(AuthSessionError::NotFound)
    }

    pub async fn touch(&self, id: Uuid) -> Result<(), AuthSessionError> {
        sqlx::query(
            r#"
            UPDATE auth_sessions
            SET last_used_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn revoke(&self, id: Uuid) -> Result<(), AuthSessionError> {
        sqlx::query(
            r#"
            UPDATE auth_sessions
            SET revoked_at = NOW()
            WHERE id = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
