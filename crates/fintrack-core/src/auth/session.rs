use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The authenticated identity held by the client for the duration of a login.
///
/// Only `token` is required. Whatever else the login response or the
/// caller supplied is kept in `extra` and round-trips through storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionData {
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            username: Some(username.into()),
            extra: Map::new(),
        }
    }

    /// A session is usable only with a non-blank bearer token.
    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }

    /// True if `other` is a different login (not just updated extras).
    pub fn is_different_identity(&self, other: &SessionData) -> bool {
        self.token != other.token || self.username != other.username
    }

    /// Identity that cached data is stamped with: the username, or a hash of
    /// the token for sessions without one. The token itself is never used.
    pub fn cache_owner(&self) -> String {
        match self.username.as_deref().map(str::trim) {
            Some(username) if !username.is_empty() => format!("user:{}", username),
            _ => {
                let mut hasher = DefaultHasher::new();
                self.token.hash(&mut hasher);
                format!("token:{:016x}", hasher.finish())
            }
        }
    }

    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("(unknown user)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extra_fields_round_trip() {
        let value = json!({"token": "t1", "username": "alice", "email": "a@example.com", "userId": 7});
        let session: SessionData = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(session.token, "t1");
        assert_eq!(session.username.as_deref(), Some("alice"));
        assert_eq!(session.extra.get("userId"), Some(&json!(7)));
        assert_eq!(serde_json::to_value(&session).unwrap(), value);
    }

    #[test]
    fn test_missing_token_parses_but_is_unusable() {
        let session: SessionData = serde_json::from_value(json!({"username": "bob"})).unwrap();
        assert!(!session.has_token());

        let blank = SessionData::new("   ", "bob");
        assert!(!blank.has_token());
        assert!(SessionData::new("abc", "bob").has_token());
    }

    #[test]
    fn test_is_different_identity() {
        let a = SessionData::new("t1", "alice");
        let mut a_with_extra = a.clone();
        a_with_extra.extra.insert("theme".into(), json!("dark"));
        assert!(!a.is_different_identity(&a_with_extra));
        assert!(a.is_different_identity(&SessionData::new("t2", "alice")));
        assert!(a.is_different_identity(&SessionData::new("t1", "bob")));
    }

    #[test]
    fn test_cache_owner() {
        assert_eq!(SessionData::new("t1", "alice").cache_owner(), "user:alice");
        assert_ne!(
            SessionData::new("t1", "alice").cache_owner(),
            SessionData::new("t1", "bob").cache_owner()
        );

        let anonymous: SessionData = serde_json::from_value(json!({"token": "t1"})).unwrap();
        let owner = anonymous.cache_owner();
        assert!(owner.starts_with("token:"));
        assert!(!owner.contains("t1"));
        assert_eq!(owner, anonymous.clone().cache_owner());

        let other: SessionData = serde_json::from_value(json!({"token": "t2"})).unwrap();
        assert_ne!(owner, other.cache_owner());
    }
}
