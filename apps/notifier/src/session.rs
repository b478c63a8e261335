use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Minimal identity mirrored from the portal's session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
}

/// Bearer token plus the identity it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub token: String,
    pub user: SessionUser,
}

/// Explicit presence/absence of a signed-in session.
/// `Absent` disables polling entirely; there is no partially-present state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionContext {
    Active(SessionCredentials),
    Absent,
}

impl SessionContext {
    /// Builds the context from the two stored values. A missing token, a
    /// missing user record, or an undecodable one all yield `Absent`.
    pub fn from_stored(token: Option<String>, user_json: Option<String>) -> Self {
        let (Some(token), Some(user_json)) = (token, user_json) else {
            return Self::Absent;
        };
        if token.trim().is_empty() {
            return Self::Absent;
        }
        match serde_json::from_str::<SessionUser>(&user_json) {
            Ok(user) => Self::Active(SessionCredentials { token, user }),
            Err(e) => {
                warn!("Stored session user is not valid JSON: {e}");
                Self::Absent
            }
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_json() -> String {
        format!(
            r#"{{"id":"{}","email":"ada@example.com","username":"ada"}}"#,
            Uuid::new_v4()
        )
    }

    #[test]
    fn test_both_values_present_is_active() {
        let ctx = SessionContext::from_stored(Some("tok".to_string()), Some(user_json()));
        assert!(ctx.is_active());
    }

    #[test]
    fn test_missing_token_is_absent() {
        let ctx = SessionContext::from_stored(None, Some(user_json()));
        assert_eq!(ctx, SessionContext::Absent);
    }

    #[test]
    fn test_missing_user_is_absent() {
        let ctx = SessionContext::from_stored(Some("tok".to_string()), None);
        assert_eq!(ctx, SessionContext::Absent);
    }

    #[test]
    fn test_blank_token_is_absent() {
        let ctx = SessionContext::from_stored(Some("   ".to_string()), Some(user_json()));
        assert_eq!(ctx, SessionContext::Absent);
    }

    #[test]
    fn test_malformed_user_is_absent() {
        let ctx = SessionContext::from_stored(Some("tok".to_string()), Some("not json".to_string()));
        assert_eq!(ctx, SessionContext::Absent);
    }
}
