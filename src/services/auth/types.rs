use serde::Serialize;

/// Who the current request acts as.
///
/// Attached to request extensions by the auth middleware. The role gate
/// replaces it with a fresh value rather than mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedIdentity {
    #[serde(rename = "uid")]
    pub subject_id: String,
    #[serde(rename = "name")]
    pub subject_name: String,
    pub role: String,
}

impl AuthenticatedIdentity {
    pub fn new(subject_id: &str, subject_name: &str, role: &str) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            subject_name: subject_name.to_string(),
            role: role.to_string(),
        }
    }

    pub fn with_role(&self, role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wire_names() {
        let identity = AuthenticatedIdentity::new("U1", "Alice", "user");
        let json = serde_json::to_value(&identity).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"uid": "U1", "name": "Alice", "role": "user"})
        );
    }

    #[test]
    fn with_role_leaves_original_untouched() {
        let identity = AuthenticatedIdentity::new("U1", "Alice", "user");
        let promoted = identity.with_role("admin");

        assert_eq!(identity.role, "user");
        assert_eq!(promoted.role, "admin");
        assert_eq!(promoted.subject_id, "U1");
    }
}
