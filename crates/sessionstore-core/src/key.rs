//! Opaque record keys.
//!
//! Session ids and user ids are generic. The store persists them as
//! strings, so any key type only has to round-trip through a string.

use std::fmt::Debug;

use uuid::Uuid;

use crate::error::SessionError;

/// A key type usable as a session id or user id.
pub trait RecordKey: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// String form written to the backing store.
    fn to_key(&self) -> String;

    /// Parse a key previously produced by [`RecordKey::to_key`].
    fn from_key(raw: &str) -> Result<Self, SessionError>;
}

impl RecordKey for Uuid {
    fn to_key(&self) -> String {
        self.to_string()
    }

    fn from_key(raw: &str) -> Result<Self, SessionError> {
        Uuid::parse_str(raw).map_err(|e| SessionError::InvalidKey(format!("invalid UUID: {e}")))
    }
}

impl RecordKey for String {
    fn to_key(&self) -> String {
        self.clone()
    }

    fn from_key(raw: &str) -> Result<Self, SessionError> {
        Ok(raw.to_string())
    }
}

impl RecordKey for u64 {
    fn to_key(&self) -> String {
        self.to_string()
    }

    fn from_key(raw: &str) -> Result<Self, SessionError> {
        raw.parse()
            .map_err(|e| SessionError::InvalidKey(format!("invalid u64 key {raw:?}: {e}")))
    }
}

impl RecordKey for i64 {
    fn to_key(&self) -> String {
        self.to_string()
    }

    fn from_key(raw: &str) -> Result<Self, SessionError> {
        raw.parse()
            .map_err(|e| SessionError::InvalidKey(format!("invalid i64 key {raw:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_key_round_trips() {
        let id = Uuid::new_v4();
        assert_eq!(Uuid::from_key(&id.to_key()).unwrap(), id);
    }

    #[test]
    fn numeric_keys_parse() {
        assert_eq!(u64::from_key("42").unwrap(), 42);
        assert_eq!(i64::from_key("-7").unwrap(), -7);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(matches!(
            Uuid::from_key("not-a-uuid"),
            Err(SessionError::InvalidKey(_))
        ));
        assert!(matches!(
            u64::from_key("-1"),
            Err(SessionError::InvalidKey(_))
        ));
    }
}
