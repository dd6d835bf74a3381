use std::{path::PathBuf, time::Duration};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use secrecy::{ExposeSecret, SecretString};
use services::services::rate_limit::RateLimitConfig;
use thiserror::Error;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_GITHUB_OAUTH_BASE_URL: &str = "https://github.com";
const DEFAULT_GITHUB_SCOPE: &str = "read:user repo";
const MIN_SESSION_SECRET_BYTES: usize = 32;
const DEFAULT_STORIES_LIMIT: i64 = 20;
const MAX_STORIES_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable `{0}` is not set")]
    MissingVar(&'static str),
    #[error("invalid value for environment variable `{0}`: {1}")]
    InvalidVar(&'static str, String),
}

#[derive(Debug)]
pub struct GitHubOAuthConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    /// Root of the OAuth endpoints, e.g. `https://github.com`.
    pub oauth_base_url: String,
    /// Root of the REST API. `None` means api.github.com.
    pub api_base_url: Option<String>,
    pub scope: String,
}

impl GitHubOAuthConfig {
    pub fn authorize_url(&self) -> String {
        format!("{}/login/oauth/authorize", self.oauth_base_url)
    }

    pub fn token_url(&self) -> String {
        format!("{}/login/oauth/access_token", self.oauth_base_url)
    }
}

#[derive(Debug)]
pub struct GitFablesConfig {
    pub database_url: String,
    pub listen_addr: String,
    pub public_base_url: String,
    pub github: GitHubOAuthConfig,
    /// Base64 encoded; signs session tokens and derives the token cipher key.
    pub session_secret: SecretString,
    pub secure_cookies: bool,
    pub rate_limit: RateLimitConfig,
    pub static_dir: Option<PathBuf>,
    pub sentry_dsn: Option<String>,
    pub stories_default_limit: i64,
    pub stories_max_limit: i64,
}

impl GitFablesConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigError::MissingVar(key));

        let session_secret = require("GITFABLES_SESSION_SECRET")?;
        let decoded = BASE64.decode(&session_secret).map_err(|e| {
            ConfigError::InvalidVar("GITFABLES_SESSION_SECRET", format!("not base64: {e}"))
        })?;
        if decoded.len() < MIN_SESSION_SECRET_BYTES {
            return Err(ConfigError::InvalidVar(
                "GITFABLES_SESSION_SECRET",
                format!("must decode to at least {MIN_SESSION_SECRET_BYTES} bytes"),
            ));
        }

        let listen_addr =
            get("GITFABLES_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.into());
        let public_base_url = get("GITFABLES_PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://{listen_addr}"))
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&public_base_url)
            .map_err(|e| ConfigError::InvalidVar("GITFABLES_PUBLIC_BASE_URL", e.to_string()))?;

        let secure_cookies = match get("GITFABLES_SECURE_COOKIES") {
            Some(value) => parse_bool("GITFABLES_SECURE_COOKIES", &value)?,
            None => public_base_url.starts_with("https://"),
        };

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_requests: parse_or(
                "GITFABLES_RATE_LIMIT_MAX",
                get("GITFABLES_RATE_LIMIT_MAX"),
                defaults.max_requests,
            )?,
            window: Duration::from_secs(parse_or(
                "GITFABLES_RATE_LIMIT_WINDOW_SECS",
                get("GITFABLES_RATE_LIMIT_WINDOW_SECS"),
                defaults.window.as_secs(),
            )?),
        };

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            listen_addr,
            public_base_url,
            github: GitHubOAuthConfig {
                client_id: require("GITHUB_CLIENT_ID")?,
                client_secret: SecretString::from(require("GITHUB_CLIENT_SECRET")?),
                oauth_base_url: get("GITHUB_OAUTH_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GITHUB_OAUTH_BASE_URL.into())
                    .trim_end_matches('/')
                    .to_string(),
                api_base_url: get("GITHUB_API_BASE_URL"),
                scope: get("GITHUB_OAUTH_SCOPE").unwrap_or_else(|| DEFAULT_GITHUB_SCOPE.into()),
            },
            session_secret: SecretString::from(session_secret),
            secure_cookies,
            rate_limit,
            static_dir: get("GITFABLES_STATIC_DIR").map(PathBuf::from),
            sentry_dsn: get("GITFABLES_SENTRY_DSN"),
            stories_default_limit: DEFAULT_STORIES_LIMIT,
            stories_max_limit: MAX_STORIES_LIMIT,
        })
    }

    /// Where the provider sends the browser back after sign-in.
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/auth/callback", self.public_base_url)
    }

    pub fn session_secret_bytes(&self) -> Vec<u8> {
        // Validated in `from_lookup`.
        BASE64
            .decode(self.session_secret.expose_secret())
            .unwrap_or_default()
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidVar(
            key,
            format!("expected a boolean, got `{other}`"),
        )),
    }
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + From<u8>,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => {
            let parsed = raw
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidVar(key, e.to_string()))?;
            if parsed < T::from(1) {
                return Err(ConfigError::InvalidVar(key, "must be positive".into()));
            }
            Ok(parsed)
        }
    }
}
