use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

pub const GITHUB_TOKEN_COOKIE: &str = "github_token";
pub const SESSION_COOKIE: &str = "session";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

const LONG_LIVED_DAYS: i64 = 30;
const OAUTH_STATE_MINUTES: i64 = 10;

fn base(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .build()
}

pub fn github_token_cookie(token: String, secure: bool) -> Cookie<'static> {
    let mut cookie = base(GITHUB_TOKEN_COOKIE, token, secure);
    cookie.set_max_age(Duration::days(LONG_LIVED_DAYS));
    cookie
}

pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    let mut cookie = base(SESSION_COOKIE, token, secure);
    cookie.set_max_age(Duration::days(LONG_LIVED_DAYS));
    cookie
}

pub fn oauth_state_cookie(state: String, secure: bool) -> Cookie<'static> {
    let mut cookie = base(OAUTH_STATE_COOKIE, state, secure);
    cookie.set_max_age(Duration::minutes(OAUTH_STATE_MINUTES));
    cookie
}

/// Removal cookie matching the attributes the named cookie was set with.
pub fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").build()
}

pub fn github_token(jar: &CookieJar) -> Option<String> {
    non_empty(jar, GITHUB_TOKEN_COOKIE)
}

pub fn session_token(jar: &CookieJar) -> Option<String> {
    non_empty(jar, SESSION_COOKIE)
}

pub fn oauth_state(jar: &CookieJar) -> Option<String> {
    non_empty(jar, OAUTH_STATE_COOKIE)
}

fn non_empty(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|value| !value.is_empty())
}
