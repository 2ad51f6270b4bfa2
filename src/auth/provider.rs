//! Authentication provider trait

use crate::error::AuthError;
// async_trait required for dyn-compatibility with Box<dyn AuthProvider>
use async_trait::async_trait;

/// Authentication provider trait
///
/// Implementations supply the `Authorization` header for Azure DevOps
/// requests. The method is async so token sources that need a round trip
/// (for example a managed identity endpoint) fit behind the same trait.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Get the authentication header value
    async fn get_auth_header(&self) -> Result<AuthHeader, AuthError>;

    /// Get a description of the auth method (for logging)
    fn auth_type(&self) -> &'static str;
}

/// Authentication header to use with requests
#[derive(Debug, Clone)]
pub enum AuthHeader {
    /// Base64 encoded `user:password` pair
    Basic(String),
    /// OAuth access token
    Bearer(String),
}

impl AuthHeader {
    /// Get the header name for this auth type
    pub fn header_name(&self) -> &'static str {
        "Authorization"
    }

    /// Get the header value for this auth type
    pub fn header_value(&self) -> String {
        match self {
            AuthHeader::Basic(encoded) => format!("Basic {}", encoded),
            AuthHeader::Bearer(token) => format!("Bearer {}", token),
        }
    }
}

/// Box type alias for auth providers
pub type BoxedAuthProvider = Box<dyn AuthProvider>;
