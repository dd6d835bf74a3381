//! GitHub access for a single signed-in user.
//!
//! [`VcsProvider`] is the seam route handlers depend on; [`GitHubProvider`]
//! is the only implementation and talks to the REST API through `octocrab`.
//! Provider failures are passed through as-is: there is no retry and no
//! backoff, a failed call is reported to the caller.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::{Octocrab, service::middleware::retry::RetryConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use utils::api::github::{Commit, CommitAuthor, GitHubUser, Repository};

/// GitHub caps list endpoints at 100 items per page.
pub const PAGE_SIZE: u8 = 100;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("authentication required: {0}")]
    Authentication(String),
    #[error(transparent)]
    Provider(#[from] octocrab::Error),
}

impl VcsError {
    /// The token is missing, or GitHub answered 401 for it (revoked or expired).
    pub fn is_unauthorized(&self) -> bool {
        match self {
            VcsError::Authentication(_) => true,
            VcsError::Provider(octocrab::Error::GitHub { source, .. }) => {
                source.status_code.as_u16() == 401
            }
            VcsError::Provider(_) => false,
        }
    }
}

/// Capability interface over a version-control host.
#[async_trait]
pub trait VcsProvider: Send + Sync {
    /// Repositories visible to the token owner, most recently updated first.
    async fn list_repositories(&self) -> Result<Vec<Repository>, VcsError>;

    async fn get_repository(&self, owner: &str, repo: &str) -> Result<Repository, VcsError>;

    /// Most recent commits on the default branch, newest first.
    async fn list_commits(&self, owner: &str, repo: &str) -> Result<Vec<Commit>, VcsError>;

    async fn authenticated_user(&self) -> Result<GitHubUser, VcsError>;
}

#[derive(Clone)]
pub struct GitHubProvider {
    client: Octocrab,
}

impl fmt::Debug for GitHubProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubProvider").finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct PageQuery {
    per_page: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<&'static str>,
}

#[derive(Deserialize)]
struct OwnerPayload {
    login: String,
}

#[derive(Deserialize)]
struct RepositoryPayload {
    id: u64,
    name: String,
    full_name: String,
    owner: OwnerPayload,
    description: Option<String>,
    #[serde(default)]
    private: bool,
    html_url: String,
    updated_at: Option<DateTime<Utc>>,
}

impl From<RepositoryPayload> for Repository {
    fn from(payload: RepositoryPayload) -> Self {
        Repository {
            id: payload.id,
            name: payload.name,
            full_name: payload.full_name,
            owner: payload.owner.login,
            description: payload.description,
            private: payload.private,
            url: payload.html_url,
            updated_at: payload.updated_at,
        }
    }
}

#[derive(Deserialize)]
struct CommitAuthorPayload {
    name: Option<String>,
    email: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct CommitDetailPayload {
    author: Option<CommitAuthorPayload>,
    message: String,
}

#[derive(Deserialize)]
struct CommitPayload {
    sha: String,
    html_url: String,
    commit: CommitDetailPayload,
}

impl From<CommitPayload> for Commit {
    fn from(payload: CommitPayload) -> Self {
        let author = payload.commit.author.map_or_else(
            || CommitAuthor {
                name: "Unknown".to_string(),
                email: String::new(),
                date: None,
            },
            |author| CommitAuthor {
                name: author.name.unwrap_or_else(|| "Unknown".to_string()),
                email: author.email.unwrap_or_default(),
                date: author.date,
            },
        );

        Commit {
            sha: payload.sha,
            author,
            message: payload.commit.message,
            url: payload.html_url,
        }
    }
}

#[derive(Deserialize)]
struct UserPayload {
    id: i64,
    login: String,
    name: Option<String>,
    avatar_url: Option<String>,
}

impl GitHubProvider {
    /// Build a client for `token` against api.github.com.
    pub fn new(token: &str) -> Result<Self, VcsError> {
        Self::with_base_uri(token, None)
    }

    /// Build a client against a custom API root (GitHub Enterprise, tests).
    pub fn with_base_uri(token: &str, base_uri: Option<&str>) -> Result<Self, VcsError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(VcsError::Authentication(
                "GitHub access token is empty".to_string(),
            ));
        }

        let mut builder = Octocrab::builder()
            .personal_token(token.to_string())
            .add_retry_config(RetryConfig::None);
        if let Some(base_uri) = base_uri {
            builder = builder.base_uri(base_uri)?;
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    fn repo_path(owner: &str, repo: &str) -> String {
        format!(
            "/repos/{}/{}",
            urlencoding::encode(owner),
            urlencoding::encode(repo)
        )
    }
}

#[async_trait]
impl VcsProvider for GitHubProvider {
    #[instrument(name = "github.list_repositories", skip(self))]
    async fn list_repositories(&self) -> Result<Vec<Repository>, VcsError> {
        let query = PageQuery {
            per_page: PAGE_SIZE,
            sort: Some("updated"),
        };
        let payload: Vec<RepositoryPayload> =
            self.client.get("/user/repos", Some(&query)).await?;
        debug!(count = payload.len(), "fetched repositories");
        Ok(payload.into_iter().map(Repository::from).collect())
    }

    #[instrument(name = "github.get_repository", skip(self))]
    async fn get_repository(&self, owner: &str, repo: &str) -> Result<Repository, VcsError> {
        let payload: RepositoryPayload = self
            .client
            .get(Self::repo_path(owner, repo), None::<&()>)
            .await?;
        Ok(payload.into())
    }

    #[instrument(name = "github.list_commits", skip(self))]
    async fn list_commits(&self, owner: &str, repo: &str) -> Result<Vec<Commit>, VcsError> {
        let query = PageQuery {
            per_page: PAGE_SIZE,
            sort: None,
        };
        let route = format!("{}/commits", Self::repo_path(owner, repo));
        let payload: Vec<CommitPayload> = self.client.get(route, Some(&query)).await?;
        debug!(count = payload.len(), "fetched commits");
        Ok(payload.into_iter().map(Commit::from).collect())
    }

    #[instrument(name = "github.authenticated_user", skip(self))]
    async fn authenticated_user(&self) -> Result<GitHubUser, VcsError> {
        let payload: UserPayload = self.client.get("/user", None::<&()>).await?;
        Ok(GitHubUser {
            id: payload.id,
            login: payload.login,
            name: payload.name,
            avatar_url: payload.avatar_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_empty_token_constructs() {
        assert!(GitHubProvider::new("gho_example").is_ok());
    }

    #[tokio::test]
    async fn empty_token_is_an_authentication_error() {
        for token in ["", "   "] {
            match GitHubProvider::new(token) {
                Err(VcsError::Authentication(_)) => {}
                other => panic!("expected authentication error, got {other:?}"),
            }
        }
    }

    #[test]
    fn repo_path_escapes_segments() {
        assert_eq!(
            GitHubProvider::repo_path("octo cat", "hello/world"),
            "/repos/octo%20cat/hello%2Fworld"
        );
    }

    #[test]
    fn commit_without_author_falls_back_to_unknown() {
        let payload: CommitPayload = serde_json::from_value(serde_json::json!({
            "sha": "abc123",
            "html_url": "https://github.com/o/r/commit/abc123",
            "commit": { "author": null, "message": "Initial commit" }
        }))
        .unwrap();
        let commit = Commit::from(payload);
        assert_eq!(commit.author.name, "Unknown");
        assert!(commit.author.date.is_none());
    }
}
