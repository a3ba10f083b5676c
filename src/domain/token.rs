//! Delivery token document -- one per owner, last write wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::timestamp;
use crate::error::StoreError;

/// The push-notification token most recently registered by an owner.
///
/// The owner id is the document key; it is carried in the body too so a
/// decoded record is self-describing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryToken {
    /// Owner identity (document key).
    #[serde(default, alias = "userId")]
    pub owner_id: String,

    /// Opaque token issued by the notification transport.
    pub token: String,

    /// When the token was last registered.
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

impl DeliveryToken {
    /// Creates a token record.
    pub fn new(
        owner_id: impl Into<String>,
        token: impl Into<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            token: token.into(),
            updated_at,
        }
    }

    /// Decodes and validates a stored token document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Malformed`] if the document cannot be decoded
    /// or the token is empty.
    pub fn from_document(key: &str, owner_id: &str, data: &[u8]) -> Result<Self, StoreError> {
        let mut record: DeliveryToken =
            serde_json::from_slice(data).map_err(|e| StoreError::Malformed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        if record.owner_id.is_empty() {
            record.owner_id = owner_id.to_string();
        }
        if record.token.trim().is_empty() {
            return Err(StoreError::Malformed {
                key: key.to_string(),
                reason: "empty token".to_string(),
            });
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_client_written_token() {
        // Shape written by the web client: owner is the key, updatedAt is Date.now().
        let bytes = serde_json::to_vec(&json!({
            "token": "fcm-abc",
            "updatedAt": 1_740_817_800_000_i64
        }))
        .unwrap();
        let record = DeliveryToken::from_document("fcmTokens/u1", "u1", &bytes).unwrap();
        assert_eq!(record.owner_id, "u1");
        assert_eq!(record.token, "fcm-abc");
        assert_eq!(record.updated_at.timestamp(), 1_740_817_800);
    }

    #[test]
    fn rejects_empty_token() {
        let bytes = serde_json::to_vec(&json!({
            "token": "",
            "updatedAt": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        let err = DeliveryToken::from_document("fcmTokens/u1", "u1", &bytes).unwrap_err();
        assert!(err.to_string().contains("empty token"));
    }

    #[test]
    fn rejects_missing_updated_at() {
        let bytes = serde_json::to_vec(&json!({ "token": "t" })).unwrap();
        assert!(DeliveryToken::from_document("fcmTokens/u1", "u1", &bytes).is_err());
    }
}
