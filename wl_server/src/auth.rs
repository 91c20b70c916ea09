//! Access tokens.
//!
//! The store does not log anyone in. Tokens are issued by the identity provider and signed with the HS256 secret the
//! two services share. A token's claims carry the user id (`sub`), email and role; `exp` is mandatory.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use jwt_compact::{
    alg::{Hs256, Hs256Key},
    AlgorithmExt,
    Claims,
    Header,
    TimeOptions,
    UntrustedToken,
};
use log::*;
use serde::{Deserialize, Serialize};
use wl_engine::db_types::{Requester, Role};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
}

impl JwtClaims {
    pub fn new<S: Into<String>>(sub: S, email: S, role: Role) -> Self {
        Self { sub: sub.into(), email: email.into(), role }
    }

    pub fn requester(&self) -> Requester {
        Requester::new(self.sub.as_str(), self.email.as_str(), self.role)
    }
}

/// Handlers behind the ACL middleware take the caller's claims as an argument.
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or(AuthError::MissingToken.into());
        ready(claims)
    }
}

/// Checks the signature and expiry of a bearer token and returns its claims.
pub fn validate_token(token: &str, config: &AuthConfig) -> Result<JwtClaims, AuthError> {
    let untrusted = UntrustedToken::new(token).map_err(|e| AuthError::PoorlyFormattedToken(e.to_string()))?;
    let key = Hs256Key::new(config.jwt_secret.reveal().as_bytes());
    let token = Hs256
        .validator::<JwtClaims>(&key)
        .validate(&untrusted)
        .map_err(|e| AuthError::ValidationError(e.to_string()))?;
    let claims = token.claims();
    claims.validate_expiration(&TimeOptions::default()).map_err(|e| AuthError::ValidationError(e.to_string()))?;
    trace!("🔐️ Access token for {} validated", claims.custom.sub);
    Ok(claims.custom.clone())
}

/// Signs access tokens with the shared secret. The identity provider does this in production.
pub struct TokenIssuer {
    key: Hs256Key,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: Hs256Key::new(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn issue_token(&self, claims: JwtClaims, duration: chrono::Duration) -> Result<String, AuthError> {
        let header = Header::empty().with_token_type("JWT");
        let claims = Claims::new(claims).set_duration_and_issuance(&TimeOptions::default(), duration);
        Hs256.token(&header, &claims, &self.key).map_err(|e| AuthError::ValidationError(e.to_string()))
    }
}
