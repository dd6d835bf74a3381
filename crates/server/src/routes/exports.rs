use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::{WithRejection, cookie::CookieJar};
use serde::Deserialize;
use services::services::story_export::{MARKDOWN_CONTENT_TYPE, export_file_name, export_markdown};
use tracing::instrument;
use utils::api::exports::{ExportFormat, ExportStatus, ListExportsResponse};

use super::{error::ErrorResponse, stories::load_story};
use crate::{
    AppState,
    auth::{RequestContext, cookies},
    db::activity::{ActivityRepository, NewExport},
};

const DEFAULT_EXPORTS_LIMIT: i64 = 50;
const MAX_EXPORTS_LIMIT: i64 = 200;

pub fn public_router() -> Router<AppState> {
    Router::new().route("/api/stories/{story_id}/export", get(export_story))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/api/exports", get(list_exports))
}

#[derive(Debug, Deserialize)]
pub struct ListExportsQuery {
    pub limit: Option<i64>,
}

#[instrument(name = "exports.export_story", skip(state, jar), fields(story_id = %story_id))]
async fn export_story(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(story_id): Path<String>,
) -> Result<Response, ErrorResponse> {
    let story = load_story(&state, &story_id)
        .await
        .map_err(|error| {
            tracing::error!(?error, "failed to load story for export");
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "failed to load story")
        })?
        .ok_or_else(|| ErrorResponse::new(StatusCode::NOT_FOUND, "story not found"))?;

    let markdown = export_markdown(&story);
    let disposition = format!("attachment; filename=\"{}\"", export_file_name(&story));
    let disposition = HeaderValue::from_str(&disposition).map_err(|error| {
        tracing::error!(?error, "invalid content disposition");
        ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "failed to export story")
    })?;

    // The exporter may be anonymous; attribute the event when a session cookie decodes.
    let actor_login = cookies::session_token(&jar)
        .and_then(|token| state.jwt().decode_session_token(&token).ok())
        .map(|identity| identity.login);

    let recorded = ActivityRepository::new(state.pool())
        .record_export(NewExport {
            story_id: story.id,
            story_title: &story.title,
            actor_login: actor_login.as_deref(),
            format: ExportFormat::Markdown,
            status: ExportStatus::Completed,
        })
        .await;
    if let Err(error) = recorded {
        tracing::warn!(?error, "failed to record export activity");
    }

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(MARKDOWN_CONTENT_TYPE),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        markdown,
    )
        .into_response())
}

#[instrument(
    name = "exports.list",
    skip(state, ctx, query),
    fields(login = %ctx.github_login)
)]
async fn list_exports(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    WithRejection(Query(query), _): WithRejection<Query<ListExportsQuery>, ErrorResponse>,
) -> Result<Json<ListExportsResponse>, ErrorResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EXPORTS_LIMIT)
        .clamp(1, MAX_EXPORTS_LIMIT);

    let exports = ActivityRepository::new(state.pool())
        .list_exports(&ctx.github_login, limit)
        .await
        .map_err(|error| {
            tracing::error!(?error, "failed to list exports");
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "failed to list exports")
        })?;

    Ok(Json(ListExportsResponse { exports }))
}
