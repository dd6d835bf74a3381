use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use secrecy::SecretString;
use tracing::warn;

use super::cookies;
use crate::{
    AppState,
    db::auth_sessions::{AuthSessionError, AuthSessionRepository, MAX_SESSION_INACTIVITY_DURATION},
    routes::error::ErrorResponse,
};

/// Attached to requests that passed `require_session`.
#[derive(Clone)]
pub struct RequestContext {
    pub github_user_id: i64,
    pub github_login: String,
    pub provider_token: SecretString,
}

impl RequestContext {
    /// Key used for per-user rate limiting.
    pub fn rate_limit_key(&self) -> String {
        format!("github:{}", self.github_user_id)
    }
}

fn unauthorized() -> Response {
    ErrorResponse::new(StatusCode::UNAUTHORIZED, "authentication required").into_response()
}

pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    let Some(token) = cookies::session_token(&jar) else {
        return unauthorized();
    };

    let identity = match state.jwt().decode_session_token(&token) {
        Ok(identity) => identity,
        Err(error) => {
            warn!(?error, "failed to decode session token");
            return unauthorized();
        }
    };

    let session_repo = AuthSessionRepository::new(state.pool());
    let session = match session_repo.get(identity.session_id).await {
        Ok(session) => session,
        Err(AuthSessionError::NotFound) => {
            warn!("session `{}` not found", identity.session_id);
            return unauthorized();
        }
        Err(AuthSessionError::Database(error)) => {
            warn!(?error, "failed to load session");
            return ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "failed to load session")
                .into_response();
        }
    };

    if session.revoked_at.is_some() {
        warn!("session `{}` rejected (revoked)", session.id);
        return unauthorized();
    }

    if session.inactivity_duration(Utc::now()) > MAX_SESSION_INACTIVITY_DURATION {
        warn!("session `{}` expired due to inactivity; revoking", session.id);
        if let Err(error) = session_repo.revoke(session.id).await {
            warn!(?error, "failed to revoke inactive session");
        }
        return unauthorized();
    }

    let provider_token = match state.token_cipher().decrypt(&session.encrypted_provider_token) {
        Ok(token) => token,
        Err(error) => {
            warn!(?error, "session `{}` has an unreadable provider token", session.id);
            return unauthorized();
        }
    };

    utils::sentry::configure_user_scope(
        &session.github_user_id.to_string(),
        Some(&session.github_login),
    );
    req.extensions_mut().insert(RequestContext {
        github_user_id: session.github_user_id,
        github_login: session.github_login,
        provider_token,
    });

    if let Err(error) = session_repo.touch(session.id).await {
        warn!(?error, "failed to update session last-used timestamp");
    }

    next.run(req).await
}
