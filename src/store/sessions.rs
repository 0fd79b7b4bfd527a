//! Session records and the in-memory session repository.
//!
//! Sessions are keyed by the SHA-256 of the raw bearer token; the raw value
//! is only ever returned to the client at issuance.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Fields exposed to callers other than the issuing logic are read-only.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub device_id: String,
    pub device_name: String,
    pub ip: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl SessionRecord {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// In-memory session repository.
#[derive(Debug, Default)]
pub struct InMemorySessions {
    sessions: RwLock<HashMap<Vec<u8>, SessionRecord>>,
}

impl InMemorySessions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a session under its token hash.
    ///
    /// When the account already holds `max_concurrent` active sessions, the
    /// oldest one is evicted.
    pub async fn insert(&self, token_hash: Vec<u8>, record: SessionRecord, max_concurrent: usize) {
        let mut sessions = self.sessions.write().await;

        let mut owned: Vec<(Vec<u8>, DateTime<Utc>)> = sessions
            .iter()
            .filter(|(_, s)| s.account_id == record.account_id)
            .map(|(hash, s)| (hash.clone(), s.created_at))
            .collect();
        if owned.len() >= max_concurrent {
            owned.sort_by_key(|(_, created_at)| *created_at);
            for (hash, _) in owned.iter().take(owned.len() + 1 - max_concurrent) {
                sessions.remove(hash);
            }
        }

        sessions.insert(token_hash, record);
    }

    /// Resolve a token hash into a live session; expired sessions are
    /// removed on sight and treated as absent.
    pub async fn find(&self, token_hash: &[u8], now: DateTime<Utc>) -> Option<SessionRecord> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(token_hash) {
            Some(record) if record.is_expired(now) => {
                sessions.remove(token_hash);
                None
            }
            Some(record) => Some(record.clone()),
            None => None,
        }
    }

    /// Refresh the activity timestamp for a live session.
    pub async fn touch(&self, token_hash: &[u8], now: DateTime<Utc>) {
        let mut sessions = self.sessions.write().await;
        if let Some(record) = sessions.get_mut(token_hash) {
            record.last_activity_at = now;
        }
    }

    /// Remove a session; returns the record when one existed.
    pub async fn delete(&self, token_hash: &[u8]) -> Option<SessionRecord> {
        self.sessions.write().await.remove(token_hash)
    }

    /// Live sessions belonging to an account.
    pub async fn active_for_account(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Vec<SessionRecord> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.account_id == account_id && !s.is_expired(now))
            .cloned()
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
