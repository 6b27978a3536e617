use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

/// Roles a caller can hold within a journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Journal manager; required to trigger batch conversions.
    Manager,
    /// Regular author; may trigger single-submission conversions.
    Author,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Manager => "manager",
            Role::Author => "author",
        }
    }
}

/// Authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
    pub roles: Vec<Role>,
    pub claims: HashMap<String, serde_json::Value>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
            // The none authenticator is for trusted deployments where
            // the reverse proxy already gates access.
            roles: vec![Role::Manager],
            claims: HashMap::new(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Gate an operation on a journal role.
    pub fn require_role(&self, role: Role) -> Result<(), super::AuthError> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(super::AuthError::RoleDenied { required: role })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_identity() {
        let identity = Identity::anonymous();
        assert_eq!(identity.user_id, "anonymous");
        assert_eq!(identity.method, "none");
        assert!(identity.has_role(Role::Manager));
        assert!(identity.claims.is_empty());
    }

    #[test]
    fn test_has_role() {
        let identity = Identity {
            user_id: "user123".to_string(),
            method: "api_key".to_string(),
            roles: vec![Role::Author],
            claims: HashMap::new(),
        };
        assert!(identity.has_role(Role::Author));
        assert!(!identity.has_role(Role::Manager));
    }

    #[test]
    fn test_require_role() {
        let identity = Identity {
            user_id: "user123".to_string(),
            method: "api_key".to_string(),
            roles: vec![Role::Author],
            claims: HashMap::new(),
        };
        assert!(identity.require_role(Role::Author).is_ok());
        let err = identity.require_role(Role::Manager).unwrap_err();
        assert!(matches!(
            err,
            crate::auth::AuthError::RoleDenied {
                required: Role::Manager
            }
        ));
    }

    #[test]
    fn test_identity_serialization() {
        let identity = Identity {
            user_id: "user123".to_string(),
            method: "api_key".to_string(),
            roles: vec![Role::Manager],
            claims: {
                let mut map = HashMap::new();
                map.insert("email".to_string(), serde_json::json!("user@example.com"));
                map
            },
        };

        let json = serde_json::to_string(&identity).unwrap();
        let deserialized: Identity = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.user_id, "user123");
        assert_eq!(deserialized.method, "api_key");
        assert_eq!(deserialized.roles, vec![Role::Manager]);
        assert_eq!(
            deserialized.claims.get("email"),
            Some(&serde_json::json!("user@example.com"))
        );
    }
}
