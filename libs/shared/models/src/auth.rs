use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<Value>,
    pub user_metadata: Option<Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

impl JwtClaims {
    /// Tenant the caller belongs to. `app_metadata` is server-controlled and wins
    /// over the user-editable `user_metadata`.
    pub fn tenant_id(&self) -> Option<String> {
        [&self.app_metadata, &self.user_metadata]
            .into_iter()
            .flatten()
            .find_map(|metadata| metadata.get("tenant_id"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub tenant_id: Option<String>,
    pub metadata: Option<Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }

    /// Doctors may read the calendar but never write it.
    pub fn can_write_schedule(&self) -> bool {
        !self.has_role("doctor")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(app_metadata: Option<Value>, user_metadata: Option<Value>) -> JwtClaims {
        JwtClaims {
            sub: "user-1".to_string(),
            exp: None,
            email: None,
            role: Some("admin".to_string()),
            app_metadata,
            user_metadata,
            aud: None,
            iat: None,
        }
    }

    #[test]
    fn test_tenant_prefers_app_metadata() {
        let claims = claims(
            Some(json!({ "tenant_id": "clinic-a" })),
            Some(json!({ "tenant_id": "clinic-b" })),
        );
        assert_eq!(claims.tenant_id().as_deref(), Some("clinic-a"));
    }

    #[test]
    fn test_tenant_falls_back_to_user_metadata() {
        let claims = claims(Some(json!({ "provider": "email" })), Some(json!({ "tenant_id": "clinic-b" })));
        assert_eq!(claims.tenant_id().as_deref(), Some("clinic-b"));
    }

    #[test]
    fn test_missing_tenant() {
        assert_eq!(claims(None, None).tenant_id(), None);
    }
}
