use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::{WithRejection, cookie::CookieJar};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use utils::api::auth::AuthStatusResponse;

use super::error::ErrorResponse;
use crate::{
    AppState,
    auth::{CallbackResult, HandoffError, cookies},
    db::auth_sessions::AuthSessionRepository,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login/{provider}", get(login))
        .route("/auth/callback", get(callback))
        .route("/auth/signout", post(signout))
        .route("/api/auth/status", get(status))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

fn login_error_redirect(reason: &str) -> Redirect {
    Redirect::to(&format!("/login?error={}", urlencoding::encode(reason)))
}

#[instrument(name = "oauth.login", skip(state, jar), fields(provider = %provider))]
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(provider): Path<String>,
) -> Response {
    match state.handoff().initiate(&provider) {
        Ok(request) => {
            let jar = jar.add(cookies::oauth_state_cookie(
                request.state,
                state.config().secure_cookies,
            ));
            (jar, Redirect::to(&request.authorize_url)).into_response()
        }
        Err(HandoffError::UnsupportedProvider(name)) => {
            warn!(provider = %name, "sign-in requested for unsupported provider");
            login_error_redirect("unsupported_provider").into_response()
        }
        Err(error) => {
            tracing::error!(?error, "failed to start oauth sign-in");
            login_error_redirect("oauth_initiation_failed").into_response()
        }
    }
}

#[instrument(name = "oauth.callback", skip(state, jar, query))]
async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Query(query), _): WithRejection<Query<CallbackQuery>, ErrorResponse>,
) -> Result<Response, ErrorResponse> {
    let expected_state = cookies::oauth_state(&jar);
    let result = state
        .handoff()
        .complete(
            query.code.as_deref(),
            query.state.as_deref(),
            expected_state.as_deref(),
        )
        .await
        .map_err(|error| match error {
            HandoffError::MissingCode => {
                ErrorResponse::new(StatusCode::BAD_REQUEST, "authorization code is required")
            }
            HandoffError::StateMismatch => {
                ErrorResponse::new(StatusCode::BAD_REQUEST, "oauth state does not match")
            }
            HandoffError::UnsupportedProvider(_) => {
                ErrorResponse::new(StatusCode::BAD_REQUEST, "unsupported provider")
            }
            HandoffError::Provider(error) => {
                tracing::error!(?error, "oauth token exchange failed");
                ErrorResponse::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to exchange authorization code",
                )
            }
        })?;

    let CallbackResult { provider, details } = result;
    let session_token = open_session(&state, &details.access_token, &details.user)
        .await
        .map_err(|message| ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, message))?;

    utils::sentry::configure_user_scope(&details.user.id.to_string(), Some(&details.user.login));
    info!(login = %details.user.login, provider, "user signed in");

    let secure = state.config().secure_cookies;
    let jar = jar
        .remove(cookies::removal(cookies::OAUTH_STATE_COOKIE))
        .add(cookies::github_token_cookie(
            details.access_token.expose_secret().to_string(),
            secure,
        ))
        .add(cookies::session_cookie(session_token, secure));

    Ok((jar, Redirect::to("/")).into_response())
}

/// Persist a session for the signed-in user and return its signed token.
async fn open_session(
    state: &AppState,
    access_token: &SecretString,
    user: &utils::api::github::GitHubUser,
) -> Result<String, &'static str> {
    let encrypted = state.token_cipher().encrypt(access_token).map_err(|error| {
        tracing::error!(?error, "failed to encrypt provider token");
        "failed to create session"
    })?;

    let session = AuthSessionRepository::new(state.pool())
        .create(user.id, &user.login, &encrypted)
        .await
        .map_err(|error| {
            tracing::error!(?error, "failed to store session");
            "failed to create session"
        })?;

    state
        .jwt()
        .encode_session_token(session.id, &user.login)
        .map_err(|error| {
            tracing::error!(?error, "failed to sign session token");
            "failed to create session"
        })
}

#[instrument(name = "oauth.signout", skip(state, jar))]
async fn signout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(token) = cookies::session_token(&jar) {
        match state.jwt().decode_session_token(&token) {
            Ok(identity) => {
                let repo = AuthSessionRepository::new(state.pool());
                if let Err(error) = repo.revoke(identity.session_id).await {
                    warn!(?error, "failed to revoke session on sign-out");
                }
            }
            Err(error) => warn!(?error, "ignoring undecodable session cookie on sign-out"),
        }
    }

    let jar = jar
        .remove(cookies::removal(cookies::GITHUB_TOKEN_COOKIE))
        .remove(cookies::removal(cookies::SESSION_COOKIE));
    (jar, Redirect::to("/")).into_response()
}

async fn status(jar: CookieJar) -> Json<AuthStatusResponse> {
    Json(AuthStatusResponse {
        authenticated: cookies::github_token(&jar).is_some(),
    })
}
