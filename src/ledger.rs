//! External collaborator seams
//!
//! The coordinator never touches balances or inventories directly; it goes
//! through the `Ledger` and `Container` traits. The host server provides
//! the real implementations. `MemoryLedger` and `MemoryContainer` back the
//! tests and the demo binary, including failure injection for the
//! mid-settlement paths.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::{CurrencyKind, ItemStack, PartyId};

/// Single-party balance debits and credits.
///
/// `debit` must be idempotent given the same key: a replayed leg returns
/// success without re-applying. `balance` must be current at the moment of
/// the sufficiency check.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn balance(&self, party: &PartyId, kind: CurrencyKind) -> u64;

    async fn debit(
        &self,
        party: &PartyId,
        amount: u64,
        kind: CurrencyKind,
        idempotency_key: &str,
        memo: &str,
    ) -> bool;

    async fn credit(&self, party: &PartyId, amount: u64, kind: CurrencyKind, memo: &str) -> bool;
}

/// Per-party item storage.
///
/// A party's container is reachable exactly while they are connected, so
/// `is_connected` also answers the settlement reachability check. Overflow
/// from `add_items` is returned, never destroyed; callers hand leftovers to
/// `drop_items`, which places them in the party's immediate environment.
#[async_trait]
pub trait Container: Send + Sync {
    async fn free_capacity(&self, party: &PartyId) -> usize;

    /// Add items, returning any that did not fit
    async fn add_items(&self, party: &PartyId, items: Vec<ItemStack>) -> Vec<ItemStack>;

    /// Drop items into the party's immediate environment
    async fn drop_items(&self, party: &PartyId, items: Vec<ItemStack>);

    async fn is_connected(&self, party: &PartyId) -> bool;
}

/// In-memory ledger with idempotency-key deduplication and a debit-failure
/// switch for exercise of the manual-recovery path
#[derive(Default)]
pub struct MemoryLedger {
    balances: DashMap<(PartyId, CurrencyKind), u64>,
    applied_keys: DashSet<String>,
    fail_debits_for: DashSet<PartyId>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, party: &PartyId, kind: CurrencyKind, amount: u64) {
        self.balances.insert((party.clone(), kind), amount);
    }

    /// Make every future debit against this party fail
    pub fn fail_debits_for(&self, party: &PartyId) {
        self.fail_debits_for.insert(party.clone());
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn balance(&self, party: &PartyId, kind: CurrencyKind) -> u64 {
        self.balances
            .get(&(party.clone(), kind))
            .map(|b| *b)
            .unwrap_or(0)
    }

    async fn debit(
        &self,
        party: &PartyId,
        amount: u64,
        kind: CurrencyKind,
        idempotency_key: &str,
        _memo: &str,
    ) -> bool {
        if self.applied_keys.contains(idempotency_key) {
            // Replay of an applied leg: succeed without re-applying
            return true;
        }
        if self.fail_debits_for.contains(party) {
            return false;
        }

        let mut balance = self.balances.entry((party.clone(), kind)).or_insert(0);
        if *balance < amount {
            return false;
        }
        *balance -= amount;
        drop(balance);

        self.applied_keys.insert(idempotency_key.to_string());
        true
    }

    async fn credit(&self, party: &PartyId, amount: u64, kind: CurrencyKind, _memo: &str) -> bool {
        *self.balances.entry((party.clone(), kind)).or_insert(0) += amount;
        true
    }
}

/// In-memory container with per-party capacity, a drop bucket, and a
/// connection flag
pub struct MemoryContainer {
    capacity: AtomicUsize,
    inventories: DashMap<PartyId, Vec<ItemStack>>,
    dropped: DashMap<PartyId, Vec<ItemStack>>,
    offline: DashSet<PartyId>,
}

impl MemoryContainer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: AtomicUsize::new(capacity),
            inventories: DashMap::new(),
            dropped: DashMap::new(),
            offline: DashSet::new(),
        }
    }

    pub fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::SeqCst);
    }

    pub fn disconnect(&self, party: &PartyId) {
        self.offline.insert(party.clone());
    }

    pub fn reconnect(&self, party: &PartyId) {
        self.offline.remove(party);
    }

    pub fn items(&self, party: &PartyId) -> Vec<ItemStack> {
        self.inventories
            .get(party)
            .map(|i| i.value().clone())
            .unwrap_or_default()
    }

    pub fn dropped(&self, party: &PartyId) -> Vec<ItemStack> {
        self.dropped
            .get(party)
            .map(|i| i.value().clone())
            .unwrap_or_default()
    }
}

impl Default for MemoryContainer {
    fn default() -> Self {
        Self::new(36)
    }
}

#[async_trait]
impl Container for MemoryContainer {
    async fn free_capacity(&self, party: &PartyId) -> usize {
        let used = self.inventories.get(party).map(|i| i.len()).unwrap_or(0);
        self.capacity.load(Ordering::SeqCst).saturating_sub(used)
    }

    async fn add_items(&self, party: &PartyId, items: Vec<ItemStack>) -> Vec<ItemStack> {
        let capacity = self.capacity.load(Ordering::SeqCst);
        let mut inventory = self.inventories.entry(party.clone()).or_default();

        let mut leftover = Vec::new();
        for stack in items {
            if inventory.len() < capacity {
                inventory.push(stack);
            } else {
                leftover.push(stack);
            }
        }
        leftover
    }

    async fn drop_items(&self, party: &PartyId, items: Vec<ItemStack>) {
        if items.is_empty() {
            return;
        }
        self.dropped.entry(party.clone()).or_default().extend(items);
    }

    async fn is_connected(&self, party: &PartyId) -> bool {
        !self.offline.contains(party)
    }
}
