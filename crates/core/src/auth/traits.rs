//! Authentication seam for the transport layer.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{AuthRequest, Identity, Role};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Authenticated, but missing the journal role the operation
    /// requires (e.g. manager for batch runs).
    #[error("Requires the {} role", .required.as_str())]
    RoleDenied { required: Role },

    #[error("Authentication service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Resolves the journal identity behind an incoming request.
///
/// Implementations decide who the caller is and which roles they
/// hold; role checks themselves live on [`Identity`].
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Name of this authentication method
    fn method_name(&self) -> &'static str;
}
