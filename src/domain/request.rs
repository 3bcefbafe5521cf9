use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::party::Party;

/// An ephemeral trade invitation. Lives in the pending registry keyed by
/// target id until accepted, declined, expired, or orphaned by a disconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    pub sender: Party,
    pub target: Party,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TradeRequest {
    pub fn new(sender: Party, target: Party, timeout_secs: u64) -> Self {
        let created_at = Utc::now();
        Self {
            sender,
            target,
            created_at,
            expires_at: created_at + Duration::seconds(timeout_secs as i64),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
