pub mod cookies;
mod handoff;
mod jwt;
mod middleware;
mod provider;
mod token_cipher;

pub use handoff::{AuthorizationRequest, CallbackResult, HandoffError, OAuthHandoffService};
pub use jwt::{JwtError, JwtService, SessionIdentity};
pub use middleware::{RequestContext, require_session};
pub use provider::{
    AuthorizationProvider, GITHUB_PROVIDER, GitHubOAuthProvider, ProviderError, ProviderRegistry,
    ProviderTokenDetails,
};
pub use token_cipher::{TokenCipher, TokenCipherError};
