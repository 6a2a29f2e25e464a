//! Revoked session registry.
//!
//! Tokens are stateless, so logging out records the token id until the token
//! would have expired anyway. Scope is a single process.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    revoked: RwLock<HashMap<Uuid, i64>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke `session_id` until `expires_at` (unix seconds).
    pub async fn revoke(&self, session_id: Uuid, expires_at: i64) {
        let now = Utc::now().timestamp();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(session_id, expires_at);
        tracing::debug!(tracked = revoked.len(), "revoked sessions");
    }

    pub async fn is_revoked(&self, session_id: Uuid) -> bool {
        self.revoked.read().await.contains_key(&session_id)
    }
}
