//! Authentication module
//!
//! Provides the credentials attached to every Azure DevOps request: personal
//! access tokens sent as HTTP Basic, or OAuth access tokens sent as Bearer.

pub mod provider;
pub mod token;

pub use provider::{AuthHeader, AuthProvider, BoxedAuthProvider};
pub use token::{BearerTokenProvider, PatProvider};

use crate::config::{AuthScheme, DevOpsConfig};
use crate::error::AuthError;

/// Create an auth provider from configuration
pub fn create_auth_provider(config: &DevOpsConfig) -> Result<BoxedAuthProvider, AuthError> {
    let token = config.token.as_ref().ok_or(AuthError::NotConfigured)?;

    match config.auth_scheme {
        AuthScheme::Basic => Ok(Box::new(PatProvider::new(token.clone())?)),
        AuthScheme::Bearer => Ok(Box::new(BearerTokenProvider::new(token.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::SecretString;

    #[test]
    fn test_create_provider_requires_token() {
        let config = DevOpsConfig::default();
        assert!(matches!(
            create_auth_provider(&config),
            Err(AuthError::NotConfigured)
        ));
    }

    #[test]
    fn test_create_provider_by_scheme() {
        let mut config = DevOpsConfig {
            token: Some(SecretString::new("secret")),
            ..Default::default()
        };
        assert_eq!(
            create_auth_provider(&config).unwrap().auth_type(),
            "Personal Access Token"
        );

        config.auth_scheme = AuthScheme::Bearer;
        assert_eq!(
            create_auth_provider(&config).unwrap().auth_type(),
            "Bearer Token"
        );
    }
}
