use std::sync::Arc;

use services::services::{
    github::{GitHubProvider, VcsError, VcsProvider},
    rate_limit::RateLimiter,
};
use sqlx::PgPool;

use crate::{
    auth::{
        GitHubOAuthProvider, JwtService, OAuthHandoffService, ProviderError, ProviderRegistry,
        TokenCipher,
    },
    config::GitFablesConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<GitFablesConfig>,
    pub jwt: Arc<JwtService>,
    pub token_cipher: Arc<TokenCipher>,
    pub handoff: Arc<OAuthHandoffService>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(pool: PgPool, config: GitFablesConfig) -> Result<Self, ProviderError> {
        let secret = config.session_secret_bytes();

        let mut registry = ProviderRegistry::new();
        registry.register(GitHubOAuthProvider::new(&config.github)?);
        let handoff = OAuthHandoffService::new(Arc::new(registry), config.oauth_redirect_uri());

        Ok(Self {
            pool,
            jwt: Arc::new(JwtService::new(&secret)),
            token_cipher: Arc::new(TokenCipher::from_secret(&secret)),
            handoff: Arc::new(handoff),
            rate_limiter: RateLimiter::new(config.rate_limit),
            config: Arc::new(config),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &GitFablesConfig {
        &self.config
    }

    pub fn jwt(&self) -> Arc<JwtService> {
        Arc::clone(&self.jwt)
    }

    pub fn token_cipher(&self) -> Arc<TokenCipher> {
        Arc::clone(&self.token_cipher)
    }

    pub fn handoff(&self) -> Arc<OAuthHandoffService> {
        Arc::clone(&self.handoff)
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// GitHub client acting as the owner of `token`.
    pub fn vcs_for(&self, token: &str) -> Result<Arc<dyn VcsProvider>, VcsError> {
        let provider =
            GitHubProvider::with_base_uri(token, self.config.github.api_base_url.as_deref())?;
        Ok(Arc::new(provider))
    }
}
