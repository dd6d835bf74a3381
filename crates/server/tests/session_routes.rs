//! Router tests that need PostgreSQL: sign-in, Markdown export and rate
//! limiting through a real session.
//!
//! # Running
//! ```bash
//! DATABASE_URL=postgres://... cargo test -p server --test session_routes
//! ```
//!
//! Note: Tests are skipped if DATABASE_URL is not set.

use axum::{
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use chrono::Utc;
use secrecy::SecretString;
use serde_json::{Value, json};
use server::{
    AppState,
    config::GitFablesConfig,
    db::{
        activity::ActivityRepository, auth_sessions::AuthSessionRepository, migrate,
        stories::StoryRepository,
    },
    routes,
};
use sqlx::PgPool;
use tower::ServiceExt;
use utils::api::stories::{NewStory, RepositoryRef, StoryMetadata, StoryStyle};
use uuid::Uuid;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const SECRET: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Skip test if database is not available.
macro_rules! skip_without_db {
    () => {
        if database_url().is_none() {
            eprintln!("Skipping test: DATABASE_URL not set");
            return;
        }
    };
}

async fn create_pool() -> PgPool {
    let url = database_url().expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&url)
        .await
        .expect("Failed to connect to database");
    migrate(&pool).await.expect("Failed to run migrations");
    pool
}

fn config(github_base: Option<&str>, rate_limit_max: &str) -> GitFablesConfig {
    let github_base = github_base.map(str::to_string);
    let database_url = database_url();
    let rate_limit_max = rate_limit_max.to_string();
    GitFablesConfig::from_lookup(move |key| match key {
        "DATABASE_URL" => database_url.clone(),
        "GITHUB_CLIENT_ID" => Some("client-id".into()),
        "GITHUB_CLIENT_SECRET" => Some("client-secret".into()),
        "GITFABLES_SESSION_SECRET" => Some(SECRET.into()),
        "GITFABLES_PUBLIC_BASE_URL" => Some("http://localhost:3000".into()),
        "GITFABLES_RATE_LIMIT_MAX" => Some(rate_limit_max.clone()),
        "GITHUB_OAUTH_BASE_URL" | "GITHUB_API_BASE_URL" => github_base.clone(),
        _ => None,
    })
    .expect("test config should be valid")
}

fn state(pool: PgPool, github_base: Option<&str>, rate_limit_max: &str) -> AppState {
    AppState::new(pool, config(github_base, rate_limit_max)).expect("state")
}

/// Store a session for a fresh GitHub user and return its cookie and login.
async fn sign_in(state: &AppState) -> (String, String) {
    let login = format!("octo-{}", Uuid::new_v4());
    let user_id = i64::from(Uuid::new_v4().as_fields().0 & 0x7fff_ffff);
    let sealed = state
        .token_cipher()
        .encrypt(&SecretString::from("gho_session".to_string()))
        .expect("encrypt");
    let session = AuthSessionRepository::new(state.pool())
        .create(user_id, &login, &sealed)
        .await
        .expect("create session");
    let token = state
        .jwt()
        .encode_session_token(session.id, &login)
        .expect("sign session");
    (format!("session={token}"), login)
}

fn post_json(uri: &str, cookie: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn successful_callback_sets_token_and_session_cookies() {
    skip_without_db!();
    let pool = create_pool().await;
    let github = MockServer::start().await;
    let login = format!("octo-{}", Uuid::new_v4());
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "gho_fresh",
            "token_type": "bearer",
            "scope": "read:user,repo"
        })))
        .expect(1)
        .mount(&github)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 4242,
            "login": login,
            "name": "Octo",
            "avatar_url": null
        })))
        .expect(1)
        .mount(&github)
        .await;

    let app = routes::router(state(pool.clone(), Some(&github.uri()), "10"));
    let request = Request::builder()
        .uri("/auth/callback?code=fresh&state=github.nonce")
        .header(header::COOKIE, "oauth_state=github.nonce")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");
    let cookies = set_cookies(&response);
    let token_cookie = cookies
        .iter()
        .find(|c| c.starts_with("github_token="))
        .expect("github_token cookie");
    assert!(token_cookie.starts_with("github_token=gho_fresh;"));
    assert!(token_cookie.contains("HttpOnly"));
    assert!(token_cookie.contains("SameSite=Lax"));
    assert!(token_cookie.contains("Max-Age=2592000"));
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("session=") && !c.starts_with("session=;"))
    );
    assert!(cookies.iter().any(|c| c.starts_with("oauth_state=;")));
}

#[tokio::test]
async fn export_downloads_markdown_and_records_activity() {
    skip_without_db!();
    let pool = create_pool().await;
    let state = state(pool.clone(), None, "10");
    let (cookie, login) = sign_in(&state).await;
    let story = StoryRepository::new(&pool)
        .create(NewStory {
            title: "The Story of parser".into(),
            description: Some("A tiny parser".into()),
            content: "It all began with a tokenizer.".into(),
            metadata: Some(StoryMetadata {
                generated_at: Some(Utc::now()),
                style: Some(StoryStyle::Narrative),
            }),
            events: Some(Vec::new()),
            repository: Some(RepositoryRef {
                name: Some("octo/parser".into()),
                description: None,
                url: Some("https://github.com/octo/parser".into()),
            }),
        })
        .await
        .expect("insert story");

    let request = Request::builder()
        .uri(format!("/api/stories/{}/export", story.id))
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = routes::router(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/markdown; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"the-story-of-parser.md\""
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let markdown = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(markdown.starts_with("# The Story of parser\n"));
    assert!(markdown.contains("No events recorded"));

    let exports = ActivityRepository::new(&pool)
        .list_exports(&login, 10)
        .await
        .expect("list exports");
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].story_id, story.id);
}

#[tokio::test]
async fn story_requests_over_the_limit_get_retry_after() {
    skip_without_db!();
    let pool = create_pool().await;
    let state = state(pool, None, "1");
    let (cookie, _) = sign_in(&state).await;
    let app = routes::router(state);

    // Validation runs after the limiter, so a rejected body still counts.
    let first = app
        .clone()
        .oneshot(post_json("/api/stories/generate", &cookie, "{}"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);

    let second = app
        .oneshot(post_json(
            "/api/stories/generate",
            &cookie,
            r#"{"owner":"octo","repo":"parser"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = second.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);
    assert_eq!(
        json_body(second).await,
        json!({ "error": "rate limit exceeded" })
    );
}

#[tokio::test]
async fn malformed_story_bodies_get_a_json_error() {
    skip_without_db!();
    let pool = create_pool().await;
    let state = state(pool, None, "10");
    let (cookie, _) = sign_in(&state).await;
    let app = routes::router(state);

    let response = app
        .clone()
        .oneshot(post_json("/api/stories", &cookie, "{not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());

    let request = Request::builder()
        .method("POST")
        .uri("/api/stories/generate")
        .header(header::COOKIE, &cookie)
        .body(Body::from(r#"{"owner":"octo","repo":"parser"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(json_body(response).await["error"].is_string());
}
