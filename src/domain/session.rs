//! Trade session state machine
//!
//! A `TradeSession` is the pure negotiation state for exactly two parties:
//! one `Offer` per side, a confirmation flag per side, and the lifecycle
//! state. It performs no I/O and knows nothing about the ledger, container,
//! or view layer. The one invariant it owns outright: a side's confirmation
//! never survives an edit of that side's own offer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::TradeError;

use super::currency::CurrencyKind;
use super::item::ItemStack;
use super::party::{Party, PartyId, Side};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Negotiation in progress
    Active,
    /// Settlement succeeded
    Completed,
    /// Cancelled, declined, or abandoned
    Cancelled,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Active => "ACTIVE",
            SessionState::Completed => "COMPLETED",
            SessionState::Cancelled => "CANCELLED",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;

        match (self, target) {
            (Active, Completed) => true,
            (Active, Cancelled) => true,
            // Completed and Cancelled are terminal
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Cancelled)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One side's current offer within a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Offer {
    pub items: Vec<ItemStack>,
    pub coins: u64,
    pub gems: u64,
    pub confirmed: bool,
}

impl Offer {
    pub fn currency(&self, kind: CurrencyKind) -> u64 {
        match kind {
            CurrencyKind::Coins => self.coins,
            CurrencyKind::Gems => self.gems,
        }
    }

    /// Offer slots in use; one slot per stack
    pub fn item_slots(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.coins == 0 && self.gems == 0
    }
}

/// The negotiation state for one in-progress trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    parties: [Party; 2],
    offers: [Offer; 2],
    state: SessionState,
    /// Item slots per offer side
    slots: usize,
}

impl TradeSession {
    pub fn new(party_a: Party, party_b: Party, slots: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            parties: [party_a, party_b],
            offers: [Offer::default(), Offer::default()],
            state: SessionState::Active,
            slots,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn party(&self, side: Side) -> &Party {
        &self.parties[side.index()]
    }

    pub fn offer(&self, side: Side) -> &Offer {
        &self.offers[side.index()]
    }

    /// Resolve a participant id to its side, if the party is in this session
    pub fn side_of(&self, party: &PartyId) -> Option<Side> {
        if self.parties[0].id == *party {
            Some(Side::A)
        } else if self.parties[1].id == *party {
            Some(Side::B)
        } else {
            None
        }
    }

    pub fn contains(&self, party: &PartyId) -> bool {
        self.side_of(party).is_some()
    }

    pub fn other_party(&self, party: &PartyId) -> Option<&Party> {
        self.side_of(party)
            .map(|side| self.party(side.other()))
    }

    pub fn is_both_confirmed(&self) -> bool {
        self.offers[0].confirmed && self.offers[1].confirmed
    }

    /// Replace a side's item list. Fails without mutation if the list
    /// exceeds the slot bound.
    pub fn set_items(&mut self, side: Side, items: Vec<ItemStack>) -> bool {
        if items.len() > self.slots {
            return false;
        }
        self.offers[side.index()].items = items;
        self.on_offer_changed(side);
        true
    }

    /// Add one stack to a side's offer. Fails if the offer is full.
    pub fn add_item(&mut self, side: Side, stack: ItemStack) -> bool {
        if self.offers[side.index()].items.len() >= self.slots {
            return false;
        }
        self.offers[side.index()].items.push(stack);
        self.on_offer_changed(side);
        true
    }

    pub fn set_currency(&mut self, side: Side, kind: CurrencyKind, amount: u64) {
        let offer = &mut self.offers[side.index()];
        match kind {
            CurrencyKind::Coins => offer.coins = amount,
            CurrencyKind::Gems => offer.gems = amount,
        }
        self.on_offer_changed(side);
    }

    /// Confirmation is a promise about the current offer only, so any edit
    /// of a side's own offer clears that side's flag.
    fn on_offer_changed(&mut self, side: Side) {
        self.offers[side.index()].confirmed = false;
    }

    /// Flip a side's confirmation flag, returning the new value
    pub fn toggle_confirm(&mut self, side: Side) -> bool {
        let offer = &mut self.offers[side.index()];
        offer.confirmed = !offer.confirmed;
        offer.confirmed
    }

    pub fn complete(&mut self) -> Result<(), TradeError> {
        self.transition(SessionState::Completed)
    }

    pub fn cancel(&mut self) -> Result<(), TradeError> {
        self.transition(SessionState::Cancelled)
    }

    fn transition(&mut self, target: SessionState) -> Result<(), TradeError> {
        if !self.state.can_transition_to(target) {
            return Err(TradeError::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        self.state = target;
        Ok(())
    }

    /// Drain both sides' items, pairing each bundle with its owner.
    /// Used by cancellation to return everything to where it came from.
    pub fn drain_items(&mut self) -> Vec<(Party, Vec<ItemStack>)> {
        Side::BOTH
            .iter()
            .map(|side| {
                (
                    self.parties[side.index()].clone(),
                    std::mem::take(&mut self.offers[side.index()].items),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> TradeSession {
        TradeSession::new(Party::new("a", "Alice"), Party::new("b", "Bob"), 12)
    }

    #[test]
    fn test_state_transitions() {
        use SessionState::*;

        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Active));
        assert!(!Cancelled.can_transition_to(Completed));

        assert!(!Active.is_terminal());
        assert!(Completed.is_terminal());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn test_side_resolution() {
        let s = session();
        assert_eq!(s.side_of(&PartyId::new("a")), Some(Side::A));
        assert_eq!(s.side_of(&PartyId::new("b")), Some(Side::B));
        assert_eq!(s.side_of(&PartyId::new("c")), None);
        assert_eq!(s.other_party(&PartyId::new("a")).unwrap().name, "Bob");
    }

    #[test]
    fn test_edit_clears_own_confirmation_only() {
        let mut s = session();
        s.toggle_confirm(Side::A);
        s.toggle_confirm(Side::B);
        assert!(s.is_both_confirmed());

        s.set_currency(Side::A, CurrencyKind::Coins, 100);
        assert!(!s.offer(Side::A).confirmed);
        assert!(s.offer(Side::B).confirmed);
        assert!(!s.is_both_confirmed());

        s.toggle_confirm(Side::A);
        assert!(s.is_both_confirmed());

        // Item edits clear too
        assert!(s.add_item(Side::B, ItemStack::new("apple", "Apple", 1)));
        assert!(!s.offer(Side::B).confirmed);
        assert!(s.offer(Side::A).confirmed);
    }

    #[test]
    fn test_offer_slot_bound() {
        let mut s = TradeSession::new(Party::new("a", "Alice"), Party::new("b", "Bob"), 2);
        assert!(s.add_item(Side::A, ItemStack::new("x", "X", 1)));
        assert!(s.add_item(Side::A, ItemStack::new("y", "Y", 1)));
        assert!(!s.add_item(Side::A, ItemStack::new("z", "Z", 1)));
        assert_eq!(s.offer(Side::A).item_slots(), 2);

        // set_items over the bound leaves the offer untouched
        let too_many = vec![
            ItemStack::new("x", "X", 1),
            ItemStack::new("y", "Y", 1),
            ItemStack::new("z", "Z", 1),
        ];
        assert!(!s.set_items(Side::B, too_many));
        assert_eq!(s.offer(Side::B).item_slots(), 0);
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut s = session();
        s.complete().unwrap();
        assert!(s.cancel().is_err());
        assert_eq!(s.state(), SessionState::Completed);

        let mut s = session();
        s.cancel().unwrap();
        assert!(s.complete().is_err());
        assert_eq!(s.state(), SessionState::Cancelled);
    }

    #[test]
    fn test_drain_items_pairs_bundles_with_owners() {
        let mut s = session();
        s.add_item(Side::A, ItemStack::new("x", "X", 1));
        s.add_item(Side::B, ItemStack::new("y", "Y", 2));

        let drained = s.drain_items();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].0.name, "Alice");
        assert_eq!(drained[0].1[0].item_id, "x");
        assert_eq!(drained[1].0.name, "Bob");
        assert_eq!(drained[1].1[0].item_id, "y");
        assert!(s.offer(Side::A).items.is_empty());
        assert!(s.offer(Side::B).items.is_empty());
    }
}
