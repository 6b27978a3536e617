//! Pass-through authentication for trusted deployments.

use async_trait::async_trait;
use std::collections::HashMap;

use super::{AuthError, AuthRequest, Authenticator, Identity, Role};

/// Accepts every request. For installs where a reverse proxy in front
/// of the journal already gates access; the proxy may forward the
/// acting editor in `X-Forwarded-User`, otherwise the caller is
/// anonymous. Must be explicitly configured - the system won't default
/// to this.
pub struct NoneAuthenticator;

impl NoneAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoneAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        match request.headers.get("x-forwarded-user") {
            Some(user) if !user.is_empty() => Ok(Identity {
                user_id: user.clone(),
                method: "none".to_string(),
                roles: vec![Role::Manager, Role::Author],
                claims: HashMap::new(),
            }),
            _ => Ok(Identity::anonymous()),
        }
    }

    fn method_name(&self) -> &'static str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn make_request(headers: Vec<(&str, &str)>) -> AuthRequest {
        AuthRequest {
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                .collect(),
            source_ip: "127.0.0.1".parse::<IpAddr>().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_returns_anonymous_without_forwarded_user() {
        let auth = NoneAuthenticator::new();
        let identity = auth.authenticate(&make_request(vec![])).await.unwrap();

        assert_eq!(identity.user_id, "anonymous");
        assert_eq!(identity.method, "none");
        assert!(identity.has_role(Role::Manager));
    }

    #[tokio::test]
    async fn test_forwarded_user_becomes_identity() {
        let auth = NoneAuthenticator::new();
        let request = make_request(vec![("X-Forwarded-User", "editor@example.org")]);

        let identity = auth.authenticate(&request).await.unwrap();

        assert_eq!(identity.user_id, "editor@example.org");
        assert!(identity.has_role(Role::Manager));
        assert!(identity.has_role(Role::Author));
    }

    #[tokio::test]
    async fn test_empty_forwarded_user_falls_back_to_anonymous() {
        let auth = NoneAuthenticator::new();
        let request = make_request(vec![("X-Forwarded-User", "")]);

        let identity = auth.authenticate(&request).await.unwrap();
        assert_eq!(identity.user_id, "anonymous");
    }

    #[test]
    fn test_method_name() {
        let auth = NoneAuthenticator::default();
        assert_eq!(auth.method_name(), "none");
    }
}
