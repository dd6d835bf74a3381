use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use axum_extra::extract::{WithRejection, cookie::CookieJar};
use serde::Deserialize;
use services::services::github::{VcsError, VcsProvider};
use tracing::instrument;
use utils::api::{
    github::{Commit, Repository},
    stories::RepoCoordinates,
};

use super::error::ErrorResponse;
use crate::{AppState, auth::cookies};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/github/repos", get(list_repositories))
        .route("/api/github/commits", get(list_commits))
}

#[derive(Debug, Deserialize)]
pub struct CommitsQuery {
    pub owner: Option<String>,
    pub repo: Option<String>,
}

/// Map a provider failure to the status the browser sees.
pub(crate) fn vcs_error_response(error: VcsError, context: &str) -> ErrorResponse {
    if error.is_unauthorized() {
        tracing::warn!(?error, "GitHub rejected the access token");
        return ErrorResponse::new(StatusCode::UNAUTHORIZED, "authentication required");
    }
    tracing::error!(?error, "{context}");
    ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, context)
}

fn provider_from_cookie(
    state: &AppState,
    jar: &CookieJar,
) -> Result<Arc<dyn VcsProvider>, ErrorResponse> {
    let token = cookies::github_token(jar)
        .ok_or_else(|| ErrorResponse::new(StatusCode::UNAUTHORIZED, "authentication required"))?;
    state
        .vcs_for(&token)
        .map_err(|error| vcs_error_response(error, "failed to create GitHub client"))
}

#[instrument(name = "github.list_repositories", skip(state, jar))]
async fn list_repositories(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Vec<Repository>>, ErrorResponse> {
    let provider = provider_from_cookie(&state, &jar)?;
    let repositories = provider
        .list_repositories()
        .await
        .map_err(|error| vcs_error_response(error, "failed to fetch repositories"))?;

    Ok(Json(repositories))
}

#[instrument(
    name = "github.list_commits",
    skip(state, jar, query),
    fields(owner = ?query.owner, repo = ?query.repo)
)]
async fn list_commits(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Query(query), _): WithRejection<Query<CommitsQuery>, ErrorResponse>,
) -> Result<Json<Vec<Commit>>, ErrorResponse> {
    let provider = provider_from_cookie(&state, &jar)?;
    let RepoCoordinates { owner, repo } =
        RepoCoordinates::parse(query.owner.as_deref(), query.repo.as_deref())
            .map_err(|message| ErrorResponse::new(StatusCode::BAD_REQUEST, message))?;

    let commits = provider
        .list_commits(&owner, &repo)
        .await
        .map_err(|error| vcs_error_response(error, "failed to fetch commits"))?;

    Ok(Json(commits))
}
