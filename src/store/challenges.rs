//! Pending two-factor challenges, keyed by the hash of the temporary token
//! issued after a correct password.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TwoFactorChallenge {
    pub account_id: Uuid,
    /// bcrypt hash of the one-time code sent to the user.
    pub code_hash: String,
    pub remember_me: bool,
    /// The temporary token is valid this long.
    pub token_expires_at: DateTime<Utc>,
    /// The code itself is boxed to a shorter window.
    pub code_expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct TwoFactorChallenges {
    challenges: RwLock<HashMap<Vec<u8>, TwoFactorChallenge>>,
}

impl TwoFactorChallenges {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, token_hash: Vec<u8>, challenge: TwoFactorChallenge) {
        self.challenges.write().await.insert(token_hash, challenge);
    }

    /// Look up a pending challenge; expired tokens are dropped on sight.
    pub async fn find(&self, token_hash: &[u8], now: DateTime<Utc>) -> Option<TwoFactorChallenge> {
        let mut challenges = self.challenges.write().await;
        match challenges.get(token_hash) {
            Some(challenge) if now > challenge.token_expires_at => {
                challenges.remove(token_hash);
                None
            }
            Some(challenge) => Some(challenge.clone()),
            None => None,
        }
    }

    /// Remove a challenge once verification succeeds.
    pub async fn remove(&self, token_hash: &[u8]) {
        self.challenges.write().await.remove(token_hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn challenge(now: DateTime<Utc>) -> TwoFactorChallenge {
        TwoFactorChallenge {
            account_id: Uuid::new_v4(),
            code_hash: "$2b$10$fake".to_string(),
            remember_me: false,
            token_expires_at: now + Duration::minutes(10),
            code_expires_at: now + Duration::minutes(5),
        }
    }

    #[tokio::test]
    async fn live_challenge_is_returned() {
        let store = TwoFactorChallenges::new();
        let now = Utc::now();
        store.insert(vec![1], challenge(now)).await;
        assert!(store.find(&[1], now).await.is_some());
    }

    #[tokio::test]
    async fn expired_token_is_dropped() {
        let store = TwoFactorChallenges::new();
        let now = Utc::now();
        store.insert(vec![1], challenge(now)).await;

        let later = now + Duration::minutes(11);
        assert!(store.find(&[1], later).await.is_none());
        // Dropped, not just hidden.
        assert!(store.find(&[1], now).await.is_none());
    }

    #[tokio::test]
    async fn remove_consumes_challenge() {
        let store = TwoFactorChallenges::new();
        let now = Utc::now();
        store.insert(vec![1], challenge(now)).await;
        store.remove(&[1]).await;
        assert!(store.find(&[1], now).await.is_none());
    }
}
