use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use services::services::{
    rate_limit::RateLimitDecision,
    story_composer::compose_story,
    story_view::{render_not_found_page, render_story_page},
};
use tracing::instrument;
use utils::api::{
    github::Commit,
    stories::{
        CreateStoryRequest, GenerateStoryRequest, ListStoriesResponse, Story, StoryStyle,
    },
};
use uuid::Uuid;

use super::{error::ErrorResponse, github::vcs_error_response};
use crate::{
    AppState,
    auth::RequestContext,
    db::stories::{StoryError, StoryRepository},
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/stories", get(list_stories))
        .route("/api/stories/{story_id}", get(get_story))
        .route("/stories/{story_id}", get(view_story))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/api/stories/generate", post(generate_story))
        .route("/api/stories", post(create_story))
}

#[derive(Debug, Deserialize)]
pub struct ListStoriesQuery {
    pub limit: Option<i64>,
}

/// Unparseable ids are reported the same way as unknown ones.
pub(crate) fn parse_story_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

/// Looks a story up, folding "absent" into `Ok(None)`.
pub(crate) async fn load_story(state: &AppState, raw_id: &str) -> Result<Option<Story>, StoryError> {
    match parse_story_id(raw_id) {
        Some(id) => StoryRepository::new(state.pool()).find_by_id(id).await,
        None => Ok(None),
    }
}

fn check_rate_limit(state: &AppState, ctx: &RequestContext) -> Result<(), ErrorResponse> {
    match state.rate_limiter().check(&ctx.rate_limit_key()) {
        RateLimitDecision::Allowed { .. } => Ok(()),
        RateLimitDecision::Limited { retry_after } => {
            tracing::warn!(login = %ctx.github_login, ?retry_after, "story request rate limited");
            Err(ErrorResponse::rate_limited(retry_after))
        }
    }
}

#[instrument(
    name = "stories.generate",
    skip(state, ctx, payload),
    fields(login = %ctx.github_login)
)]
async fn generate_story(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    WithRejection(Json(payload), _): WithRejection<Json<GenerateStoryRequest>, ErrorResponse>,
) -> Result<Json<Vec<Commit>>, ErrorResponse> {
    check_rate_limit(&state, &ctx)?;
    let coordinates = payload
        .coordinates()
        .map_err(|message| ErrorResponse::new(StatusCode::BAD_REQUEST, message))?;

    let provider = state
        .vcs_for(ctx.provider_token.expose_secret())
        .map_err(|error| vcs_error_response(error, "failed to create GitHub client"))?;
    let commits = provider
        .list_commits(&coordinates.owner, &coordinates.repo)
        .await
        .map_err(|error| vcs_error_response(error, "failed to fetch commits"))?;

    Ok(Json(commits))
}

#[instrument(
    name = "stories.create",
    skip(state, ctx, payload),
    fields(login = %ctx.github_login)
)]
async fn create_story(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateStoryRequest>, ErrorResponse>,
) -> Result<(StatusCode, Json<Story>), ErrorResponse> {
    check_rate_limit(&state, &ctx)?;
    let coordinates = payload
        .coordinates()
        .map_err(|message| ErrorResponse::new(StatusCode::BAD_REQUEST, message))?;
    let style = match payload.style.as_deref() {
        Some(raw) => raw
            .parse::<StoryStyle>()
            .map_err(|error| ErrorResponse::new(StatusCode::BAD_REQUEST, &error.to_string()))?,
        None => StoryStyle::default(),
    };

    let provider = state
        .vcs_for(ctx.provider_token.expose_secret())
        .map_err(|error| vcs_error_response(error, "failed to create GitHub client"))?;
    let repository = provider
        .get_repository(&coordinates.owner, &coordinates.repo)
        .await
        .map_err(|error| vcs_error_response(error, "failed to fetch repository"))?;
    let commits = provider
        .list_commits(&coordinates.owner, &coordinates.repo)
        .await
        .map_err(|error| vcs_error_response(error, "failed to fetch commits"))?;

    let new_story = compose_story(&repository, &commits, style, Utc::now());
    let story = StoryRepository::new(state.pool())
        .create(new_story)
        .await
        .map_err(|error| {
            tracing::error!(?error, "failed to store story");
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "failed to store story")
        })?;

    tracing::info!(story_id = %story.id, commits = commits.len(), %style, "story created");
    Ok((StatusCode::CREATED, Json(story)))
}

#[instrument(name = "stories.list", skip(state, query))]
async fn list_stories(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ListStoriesQuery>, ErrorResponse>,
) -> Result<Json<ListStoriesResponse>, ErrorResponse> {
    let config = state.config();
    let limit = query
        .limit
        .unwrap_or(config.stories_default_limit)
        .clamp(1, config.stories_max_limit);

    let stories = StoryRepository::new(state.pool())
        .list_recent(limit)
        .await
        .map_err(|error| {
            tracing::error!(?error, "failed to list stories");
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "failed to list stories")
        })?;

    Ok(Json(ListStoriesResponse { stories }))
}

#[instrument(name = "stories.get", skip(state), fields(story_id = %story_id))]
async fn get_story(
    State(state): State<AppState>,
    Path(story_id): Path<String>,
) -> Result<Json<Story>, ErrorResponse> {
    let story = load_story(&state, &story_id)
        .await
        .map_err(|error| {
            tracing::error!(?error, "failed to load story");
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "failed to load story")
        })?
        .ok_or_else(|| ErrorResponse::new(StatusCode::NOT_FOUND, "story not found"))?;

    Ok(Json(story))
}

#[instrument(name = "stories.view", skip(state), fields(story_id = %story_id))]
async fn view_story(State(state): State<AppState>, Path(story_id): Path<String>) -> Response {
    match load_story(&state, &story_id).await {
        Ok(Some(story)) => Html(render_story_page(&story)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Html(render_not_found_page())).into_response(),
        Err(error) => {
            tracing::error!(?error, "failed to load story");
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "failed to load story")
                .into_response()
        }
    }
}
