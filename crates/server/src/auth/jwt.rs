//! Signed session tokens carried in the `session` cookie.
//!
//! The token only names a server-side session; revocation and inactivity are
//! enforced against the `auth_sessions` table by `require_session`.

use std::collections::HashSet;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Matches the cookie lifetime.
pub const SESSION_TOKEN_TTL_DAYS: i64 = 30;

const AUDIENCE: &str = "gitfables-session";

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid token")]
    InvalidToken,
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionClaims {
    sub: Uuid,
    login: String,
    iat: i64,
    exp: i64,
    aud: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub session_id: Uuid,
    pub login: String,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    pub fn encode_session_token(&self, session_id: Uuid, login: &str) -> Result<String, JwtError> {
        let now = Utc::now();
        let exp = now + ChronoDuration::days(SESSION_TOKEN_TTL_DAYS);
        let claims = SessionClaims {
            sub: session_id,
            login: login.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            aud: AUDIENCE.to_string(),
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    pub fn decode_session_token(&self, token: &str) -> Result<SessionIdentity, JwtError> {
        if token.trim().is_empty() {
            return Err(JwtError::InvalidToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[AUDIENCE]);
        validation.required_spec_claims = HashSet::from([
            "sub".to_string(),
            "exp".to_string(),
            "aud".to_string(),
        ]);
        validation.leeway = 30;

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)?.claims;

        Ok(SessionIdentity {
            session_id: claims.sub,
            login: claims.login,
        })
    }
}
