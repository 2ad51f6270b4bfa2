//! Token based authentication
//!
//! Azure DevOps accepts a PAT as the password of an HTTP Basic pair with an
//! empty user name, and Entra ID access tokens as a Bearer header.

use crate::auth::provider::{AuthHeader, AuthProvider};
use crate::error::AuthError;
use crate::util::SecretString;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Personal Access Token authentication provider
#[derive(Debug, Clone)]
pub struct PatProvider {
    encoded: SecretString,
}

impl PatProvider {
    /// Create a new PAT provider
    pub fn new(token: impl Into<SecretString>) -> Result<Self, AuthError> {
        let token = token.into();

        if token.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let encoded = STANDARD.encode(format!(":{}", token.expose_secret().trim()));
        Ok(Self {
            encoded: SecretString::new(encoded),
        })
    }
}

#[async_trait]
impl AuthProvider for PatProvider {
    async fn get_auth_header(&self) -> Result<AuthHeader, AuthError> {
        Ok(AuthHeader::Basic(self.encoded.expose_secret().to_string()))
    }

    fn auth_type(&self) -> &'static str {
        "Personal Access Token"
    }
}

/// OAuth bearer token provider
#[derive(Debug, Clone)]
pub struct BearerTokenProvider {
    token: SecretString,
}

impl BearerTokenProvider {
    pub fn new(token: impl Into<SecretString>) -> Result<Self, AuthError> {
        let token = token.into();

        if token.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(Self { token })
    }
}

#[async_trait]
impl AuthProvider for BearerTokenProvider {
    async fn get_auth_header(&self) -> Result<AuthHeader, AuthError> {
        Ok(AuthHeader::Bearer(
            self.token.expose_secret().trim().to_string(),
        ))
    }

    fn auth_type(&self) -> &'static str {
        "Bearer Token"
    }
}
