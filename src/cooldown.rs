//! Request rate limiting
//!
//! Two independent cooldowns apply to every new trade request: a global
//! one per sender, and one per (sender, target) pair. The longer remaining
//! wait wins. Entries are independent per key, so lock-free concurrent maps
//! are enough; requests arrive from many connection-handling tasks at once.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::domain::PartyId;

/// Extra seconds an entry survives past its TTL before cleanup evicts it
const CLEANUP_MARGIN_SECS: u64 = 60;

pub struct CooldownTracker {
    global_secs: u64,
    per_target_secs: u64,
    last_request: DashMap<PartyId, DateTime<Utc>>,
    last_pair: DashMap<(PartyId, PartyId), DateTime<Utc>>,
}

impl CooldownTracker {
    pub fn new(global_secs: u64, per_target_secs: u64) -> Self {
        Self {
            global_secs,
            per_target_secs,
            last_request: DashMap::new(),
            last_pair: DashMap::new(),
        }
    }

    /// Seconds the sender must still wait before requesting this target.
    /// Zero means the request is permitted.
    pub fn check_cooldown(&self, sender: &PartyId, target: &PartyId) -> u64 {
        let now = Utc::now();

        let global = self
            .last_request
            .get(sender)
            .map(|ts| remaining(*ts, now, self.global_secs))
            .unwrap_or(0);

        let pair = self
            .last_pair
            .get(&(sender.clone(), target.clone()))
            .map(|ts| remaining(*ts, now, self.per_target_secs))
            .unwrap_or(0);

        global.max(pair)
    }

    pub fn record_request(&self, sender: &PartyId, target: &PartyId) {
        let now = Utc::now();
        self.last_request.insert(sender.clone(), now);
        self.last_pair
            .insert((sender.clone(), target.clone()), now);
    }

    /// Drop all entries involving a party
    pub fn clear(&self, party: &PartyId) {
        self.last_request.remove(party);
        self.last_pair
            .retain(|(sender, target), _| sender != party && target != party);
    }

    /// Evict entries old enough that neither cooldown can still apply
    pub fn cleanup(&self) {
        let ttl = self.global_secs.max(self.per_target_secs) + CLEANUP_MARGIN_SECS;
        let cutoff = Utc::now() - Duration::seconds(ttl as i64);
        self.cleanup_before(cutoff);
    }

    fn cleanup_before(&self, cutoff: DateTime<Utc>) {
        self.last_request.retain(|_, ts| *ts > cutoff);
        self.last_pair.retain(|_, ts| *ts > cutoff);
    }

    pub fn len(&self) -> usize {
        self.last_request.len() + self.last_pair.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_request.is_empty() && self.last_pair.is_empty()
    }
}

fn remaining(last: DateTime<Utc>, now: DateTime<Utc>, ttl_secs: u64) -> u64 {
    let elapsed = (now - last).num_seconds().max(0) as u64;
    ttl_secs.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn party(id: &str) -> PartyId {
        PartyId::new(id)
    }

    #[test]
    fn test_unknown_sender_is_permitted() {
        let tracker = CooldownTracker::new(60, 120);
        assert_eq!(tracker.check_cooldown(&party("a"), &party("b")), 0);
    }

    #[test]
    fn test_longer_remaining_wait_wins() {
        let tracker = CooldownTracker::new(60, 120);
        tracker.record_request(&party("a"), &party("b"));

        // The pair cooldown (120s) dominates for the same target
        let wait = tracker.check_cooldown(&party("a"), &party("b"));
        assert!(wait > 60 && wait <= 120, "wait was {}", wait);

        // A different target only sees the global cooldown
        let wait = tracker.check_cooldown(&party("a"), &party("c"));
        assert!(wait > 0 && wait <= 60, "wait was {}", wait);
    }

    #[test]
    fn test_zero_ttls_never_block() {
        let tracker = CooldownTracker::new(0, 0);
        tracker.record_request(&party("a"), &party("b"));
        assert_eq!(tracker.check_cooldown(&party("a"), &party("b")), 0);
    }

    #[test]
    fn test_clear_removes_both_directions() {
        let tracker = CooldownTracker::new(60, 120);
        tracker.record_request(&party("a"), &party("b"));
        tracker.record_request(&party("c"), &party("a"));

        tracker.clear(&party("a"));
        assert_eq!(tracker.check_cooldown(&party("a"), &party("b")), 0);
        // c's global entry survives; only the pair touching a was evicted
        assert!(tracker.check_cooldown(&party("c"), &party("d")) > 0);
        assert!(tracker
            .last_pair
            .iter()
            .all(|e| e.key().0 != party("a") && e.key().1 != party("a")));
    }

    #[test]
    fn test_cleanup_evicts_stale_entries() {
        let tracker = CooldownTracker::new(60, 120);
        tracker.record_request(&party("a"), &party("b"));
        assert!(!tracker.is_empty());

        // Nothing younger than the cutoff survives
        tracker.cleanup_before(Utc::now() + Duration::seconds(1));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_cleanup_keeps_fresh_entries() {
        let tracker = CooldownTracker::new(60, 120);
        tracker.record_request(&party("a"), &party("b"));
        tracker.cleanup();
        assert_eq!(tracker.len(), 2);
    }
}
