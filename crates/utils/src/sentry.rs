use std::sync::OnceLock;

use sentry_tracing::{EventFilter, SentryLayer};
use tracing::Level;

static INIT_GUARD: OnceLock<sentry::ClientInitGuard> = OnceLock::new();

fn environment() -> &'static str {
    if cfg!(debug_assertions) {
        "dev"
    } else {
        "production"
    }
}

/// Initialize the Sentry client once. A blank DSN leaves reporting disabled.
pub fn init_once(dsn: &str) {
    if dsn.trim().is_empty() {
        return;
    }

    INIT_GUARD.get_or_init(|| {
        sentry::init((
            dsn.trim(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(environment().into()),
                ..Default::default()
            },
        ))
    });

    sentry::configure_scope(|scope| {
        scope.set_tag("source", "gitfables-server");
    });
}

pub fn is_enabled() -> bool {
    INIT_GUARD.get().is_some_and(|guard| guard.is_enabled())
}

/// Attach the signed-in GitHub user to events reported from the current hub.
///
/// The server gives every request its own hub (`NewSentryLayer`), so the user
/// does not outlive the request that set it.
pub fn configure_user_scope(user_id: &str, login: Option<&str>) {
    let sentry_user = sentry::User {
        id: Some(user_id.to_string()),
        username: login.map(str::to_string),
        ..Default::default()
    };

    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry_user));
    });
}

pub fn sentry_layer<S>() -> SentryLayer<S>
where
    S: tracing::Subscriber,
    S: for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    SentryLayer::default()
        .span_filter(|meta| {
            matches!(
                *meta.level(),
                Level::DEBUG | Level::INFO | Level::WARN | Level::ERROR
            )
        })
        .event_filter(|meta| match *meta.level() {
            Level::ERROR => EventFilter::Event,
            Level::DEBUG | Level::INFO | Level::WARN => EventFilter::Breadcrumb,
            Level::TRACE => EventFilter::Ignore,
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sentry::Hub;

    use super::*;

    #[test]
    fn user_scope_stays_on_the_request_hub() {
        let events = sentry::test::with_captured_events(|| {
            let request_hub = Arc::new(Hub::new_from_top(Hub::current()));
            Hub::run(request_hub, || {
                configure_user_scope("42", Some("octo"));
                sentry::capture_message("during request", sentry::Level::Error);
            });
            sentry::capture_message("after request", sentry::Level::Error);
        });

        assert_eq!(events.len(), 2);
        let user = events[0].user.as_ref().expect("request event carries the user");
        assert_eq!(user.id.as_deref(), Some("42"));
        assert_eq!(user.username.as_deref(), Some("octo"));
        assert!(events[1].user.is_none());
    }

    #[test]
    fn blank_dsn_leaves_reporting_disabled() {
        init_once("   ");
        assert!(!is_enabled());
    }
}
