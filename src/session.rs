//! Advisory registry of issued refresh tokens.
//!
//! Records exist for audit and explicit logout. They are not an allow-list:
//! a refresh token that verifies is honoured whether or not its record exists.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::{
    store::{SharedStore, StoreError},
    token::{fingerprint, fingerprint_prefix},
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub refresh_token_hash: String,
    pub created_at: String,
}

/// Stable subject id for a phone number, so every login of the same number
/// lands under one session prefix.
#[must_use]
pub fn subject_id(phone: &str) -> String {
    let digest = hex::encode(Sha256::digest(phone.as_bytes()));
    format!("user_{}", &digest[..16])
}

fn subject_prefix(subject_id: &str) -> String {
    format!("session:{subject_id}:")
}

fn session_key(subject_id: &str, prefix: &str) -> String {
    format!("session:{subject_id}:{prefix}")
}

/// Present while the subject has at least one record. Every `open` resets its
/// TTL, so it expires together with the newest record.
fn index_key(subject_id: &str) -> String {
    format!("sessions:{subject_id}")
}

pub struct SessionRegistry {
    store: SharedStore,
    ttl_seconds: u64,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(store: SharedStore, refresh_ttl: Duration) -> Self {
        Self {
            store,
            ttl_seconds: refresh_ttl.as_secs(),
        }
    }

    /// Record `refresh_token` for `subject_id`. Returns the fingerprint prefix
    /// that keys the record.
    ///
    /// # Errors
    /// Returns an error if the store write fails.
    #[instrument(skip(self, refresh_token))]
    pub async fn open(&self, subject_id: &str, refresh_token: &str) -> Result<String, StoreError> {
        let hash = fingerprint(refresh_token);
        let prefix = fingerprint_prefix(&hash).to_string();
        let record = SessionRecord {
            refresh_token_hash: hash,
            created_at: Utc::now().to_rfc3339(),
        };
        let value = serde_json::to_string(&record)
            .map_err(|err| StoreError::Backend(format!("failed to encode session: {err}")))?;

        self.store
            .set_ex(&session_key(subject_id, &prefix), &value, self.ttl_seconds)
            .await?;
        self.store
            .set_ex(&index_key(subject_id), "1", self.ttl_seconds)
            .await?;
        debug!(prefix, "Session opened");

        Ok(prefix)
    }

    /// Remove one record. Absent records are not an error.
    ///
    /// # Errors
    /// Returns an error if the store delete or the follow-up scan fails.
    #[instrument(skip(self))]
    pub async fn close(&self, subject_id: &str, prefix: &str) -> Result<(), StoreError> {
        let removed = self.store.del(&[session_key(subject_id, prefix)]).await?;
        if removed > 0
            && self
                .store
                .scan_prefix(&subject_prefix(subject_id))
                .await?
                .is_empty()
        {
            self.store.del(&[index_key(subject_id)]).await?;
        }
        debug!(removed, "Session closed");
        Ok(())
    }

    /// Remove every record of `subject_id`, returning how many were deleted.
    ///
    /// Scan then delete: records written concurrently may survive.
    ///
    /// # Errors
    /// Returns an error if the scan or delete fails.
    #[instrument(skip(self))]
    pub async fn close_all(&self, subject_id: &str) -> Result<u64, StoreError> {
        let keys = self.store.scan_prefix(&subject_prefix(subject_id)).await?;
        let removed = self.store.del(&keys).await?;
        self.store.del(&[index_key(subject_id)]).await?;
        debug!(removed, "All sessions closed");
        Ok(removed)
    }

    /// Single-key lookup, cheap enough for the login path.
    ///
    /// # Errors
    /// Returns an error if the read fails.
    pub async fn has_sessions(&self, subject_id: &str) -> Result<bool, StoreError> {
        Ok(self.store.get(&index_key(subject_id)).await?.is_some())
    }

    /// # Errors
    /// Returns an error if the read fails or the stored record does not decode.
    pub async fn record(
        &self,
        subject_id: &str,
        prefix: &str,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let Some(raw) = self.store.get(&session_key(subject_id, prefix)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| StoreError::Backend(format!("failed to decode session: {err}")))
    }
}
