//! Session domain model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One authenticated login instance.
///
/// The serialized form is the user-facing shape: the secret, the owner
/// and the per-service tokens never leave the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session<Id, UserId> {
    pub id: Id,
    /// Bearer credential. Empty on every read path except deletion.
    #[serde(skip)]
    pub secret: String,
    #[serde(skip)]
    pub user_id: UserId,
    pub ip: Vec<String>,
    #[serde(rename = "la")]
    pub last_usage: DateTime<Utc>,
    #[serde(rename = "ua")]
    pub user_agent: String,
    #[serde(rename = "am")]
    pub auth_method: String,
    #[serde(skip)]
    pub tokens: BTreeMap<String, Vec<AdditionalToken>>,
}

impl<Id, UserId> Session<Id, UserId> {
    /// A fresh session with no IPs and no tokens, last used now.
    pub fn new(
        id: Id,
        user_id: UserId,
        secret: impl Into<String>,
        user_agent: impl Into<String>,
        auth_method: impl Into<String>,
    ) -> Self {
        Self {
            id,
            secret: secret.into(),
            user_id,
            ip: Vec::new(),
            last_usage: Utc::now(),
            user_agent: user_agent.into(),
            auth_method: auth_method.into(),
            tokens: BTreeMap::new(),
        }
    }

    /// Copy of this session with the secret cleared.
    pub fn redacted(mut self) -> Self {
        self.secret.clear();
        self
    }
}

/// Auxiliary credential scoped to one external service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalToken {
    pub value: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_form_hides_credentials() {
        let mut session = Session::new(7u64, 99u64, "s3cret", "curl/8.0", "password");
        session.ip.push("10.0.0.1".into());
        session.tokens.insert(
            "github".into(),
            vec![AdditionalToken {
                value: "gho_abc".into(),
                created_at: Utc::now(),
            }],
        );

        let json = serde_json::to_value(&session).unwrap();
        let obj = json.as_object().unwrap();

        assert_eq!(obj["id"], 7);
        assert_eq!(obj["ip"][0], "10.0.0.1");
        assert_eq!(obj["ua"], "curl/8.0");
        assert_eq!(obj["am"], "password");
        assert!(obj.contains_key("la"));
        assert!(!obj.contains_key("secret"));
        assert!(!obj.contains_key("user_id"));
        assert!(!obj.contains_key("tokens"));
        assert!(!json.to_string().contains("s3cret"));
    }

    #[test]
    fn redacted_clears_only_the_secret() {
        let session = Session::new("a".to_string(), "u".to_string(), "s", "ua", "am");
        let redacted = session.clone().redacted();
        assert!(redacted.secret.is_empty());
        assert_eq!(redacted.id, session.id);
        assert_eq!(redacted.user_agent, session.user_agent);
    }
}
