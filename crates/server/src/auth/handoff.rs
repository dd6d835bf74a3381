//! Browser sign-in handoff: build the authorize redirect, then turn the
//! callback's `code` into a provider token and a GitHub identity.
//!
//! The `state` parameter has the shape `{provider}.{nonce}` so the callback
//! can find the provider it was started with.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use thiserror::Error;
use tracing::{info, warn};

use super::provider::{GITHUB_PROVIDER, ProviderError, ProviderRegistry, ProviderTokenDetails};

const STATE_NONCE_BYTES: usize = 24;

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("unsupported provider `{0}`")]
    UnsupportedProvider(String),
    #[error("authorization code is required")]
    MissingCode,
    #[error("oauth state does not match")]
    StateMismatch,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub struct AuthorizationRequest {
    pub authorize_url: String,
    pub state: String,
}

pub struct CallbackResult {
    pub provider: &'static str,
    pub details: ProviderTokenDetails,
}

pub struct OAuthHandoffService {
    providers: Arc<ProviderRegistry>,
    redirect_uri: String,
}

impl OAuthHandoffService {
    pub fn new(providers: Arc<ProviderRegistry>, redirect_uri: String) -> Self {
        Self {
            providers,
            redirect_uri,
        }
    }

    pub fn initiate(&self, provider: &str) -> Result<AuthorizationRequest, HandoffError> {
        let provider = self
            .providers
            .get(provider)
            .ok_or_else(|| HandoffError::UnsupportedProvider(provider.to_string()))?;

        let state = format!("{}.{}", provider.name(), generate_nonce());
        let url = provider.authorize_url(&state, &self.redirect_uri)?;

        Ok(AuthorizationRequest {
            authorize_url: url.into(),
            state,
        })
    }

    /// `expected_state` is the value from the state cookie, when the browser
    /// still has it.
    pub async fn complete(
        &self,
        code: Option<&str>,
        state: Option<&str>,
        expected_state: Option<&str>,
    ) -> Result<CallbackResult, HandoffError> {
        let code = code
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .ok_or(HandoffError::MissingCode)?;

        if expected_state.is_some_and(|expected| state != Some(expected)) {
            warn!("oauth callback state did not match cookie");
            return Err(HandoffError::StateMismatch);
        }

        let provider_name = state
            .and_then(|state| state.split_once('.'))
            .map(|(provider, _)| provider)
            .unwrap_or(GITHUB_PROVIDER);
        let provider = self
            .providers
            .get(provider_name)
            .ok_or_else(|| HandoffError::UnsupportedProvider(provider_name.to_string()))?;

        let access_token = provider.exchange_code(code, &self.redirect_uri).await?;
        let user = provider.fetch_user(&access_token).await?;
        info!(login = %user.login, provider = provider.name(), "oauth handoff completed");

        Ok(CallbackResult {
            provider: provider.name(),
            details: ProviderTokenDetails { access_token, user },
        })
    }
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; STATE_NONCE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
