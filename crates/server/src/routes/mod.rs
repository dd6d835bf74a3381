use axum::{
    Router,
    body::Body,
    http::{Request, header::HeaderName},
    middleware,
    routing::get,
};
use sentry_tower::NewSentryLayer;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, field};

use crate::{AppState, auth::require_session};

pub mod error;
mod exports;
mod github;
pub mod health;
mod oauth;
mod stories;

pub fn router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let request_id = request
                .extensions()
                .get::<RequestId>()
                .and_then(|id| id.header_value().to_str().ok());
            let span = tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = field::Empty
            );
            if let Some(request_id) = request_id {
                span.record("request_id", field::display(request_id));
            }
            span
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO))
        .on_failure(DefaultOnFailure::new().level(Level::ERROR));

    let public = Router::<AppState>::new()
        .route("/health", get(health::health_check))
        .merge(oauth::router())
        .merge(github::router())
        .merge(stories::public_router())
        .merge(exports::public_router());

    let protected = Router::<AppState>::new()
        .merge(stories::protected_router())
        .merge(exports::protected_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    let mut app = Router::<AppState>::new().merge(public).merge(protected);
    if let Some(static_dir) = state.config().static_dir.clone() {
        app = app.fallback_service(ServeDir::new(static_dir));
    }

    app.layer(CorsLayer::permissive())
        .layer(trace_layer)
        .layer(NewSentryLayer::<Request<Body>>::new_from_top())
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            "x-request-id",
        )))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static("x-request-id"),
            MakeRequestUuid {},
        ))
        .with_state(state)
}
