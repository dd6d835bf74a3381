use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use services::services::github::{GitHubProvider, VcsError, VcsProvider};
use thiserror::Error;
use tracing::debug;
use url::Url;
use utils::api::github::GitHubUser;

use crate::config::GitHubOAuthConfig;

pub const GITHUB_PROVIDER: &str = "github";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("token exchange request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider rejected the authorization code: {0}")]
    Rejected(String),
    #[error("provider response did not include an access token")]
    MissingToken,
    #[error("invalid provider url: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Vcs(#[from] VcsError),
}

/// What the server learns about a user once the code has been exchanged.
pub struct ProviderTokenDetails {
    pub access_token: SecretString,
    pub user: GitHubUser,
}

#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> Result<Url, ProviderError>;

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SecretString, ProviderError>;

    async fn fetch_user(&self, access_token: &SecretString) -> Result<GitHubUser, ProviderError>;
}

pub struct GitHubOAuthProvider {
    client: Client,
    client_id: String,
    client_secret: SecretString,
    scope: String,
    authorize_endpoint: String,
    token_endpoint: String,
    api_base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl GitHubOAuthProvider {
    pub fn new(config: &GitHubOAuthConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(concat!("gitfables/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: config.scope.clone(),
            authorize_endpoint: config.authorize_url(),
            token_endpoint: config.token_url(),
            api_base_url: config.api_base_url.clone(),
        })
    }
}

#[async_trait]
impl AuthorizationProvider for GitHubOAuthProvider {
    fn name(&self) -> &'static str {
        GITHUB_PROVIDER
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.authorize_endpoint)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.scope)
            .append_pair("state", state);
        Ok(url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SecretString, ProviderError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .client
            .post(&self.token_endpoint)
            .header(header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?
            .error_for_status()?
            .json::<TokenResponse>()
            .await?;

        if let Some(error) = response.error {
            let detail = match response.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error,
            };
            return Err(ProviderError::Rejected(detail));
        }

        match response.access_token {
            Some(token) if !token.trim().is_empty() => {
                debug!("exchanged authorization code for access token");
                Ok(SecretString::from(token))
            }
            _ => Err(ProviderError::MissingToken),
        }
    }

    async fn fetch_user(&self, access_token: &SecretString) -> Result<GitHubUser, ProviderError> {
        let provider = GitHubProvider::with_base_uri(
            access_token.expose_secret(),
            self.api_base_url.as_deref(),
        )?;
        Ok(provider.authenticated_user().await?)
    }
}

#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn AuthorizationProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P>(&mut self, provider: P)
    where
        P: AuthorizationProvider + 'static,
    {
        self.providers.insert(provider.name(), Arc::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AuthorizationProvider>> {
        self.providers.get(name).cloned()
    }
}
