//! Trade coordinator: central orchestrator for negotiation and settlement
//!
//! The Coordinator owns the pending-request registry (keyed by target id),
//! the active-session registry (each session registered under both
//! participant ids), the cooldown tracker, and both durable stores. All
//! offer mutations, confirmations, and lifecycle transitions flow through
//! it. Settlement moves currency in four fixed-order idempotent legs before
//! any item moves; a failed leg is journaled for manual recovery and the
//! session is cancelled forward, never rolled back.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::TradeConfig;
use crate::cooldown::CooldownTracker;
use crate::domain::{
    CurrencyKind, ItemStack, Party, PartyId, Side, TradeRequest, TradeSession,
};
use crate::error::{OfferError, RequestError, SettlementError};
use crate::ledger::{Container, Ledger};
use crate::persistence::{HistoryEntry, HistoryStore, TransactionJournal};

use super::notify::TradeNotifier;

/// Sessions older than this are pointed out by the sweep (never cancelled)
const IDLE_SESSION_LOG_SECS: i64 = 300;

/// Shared handle to one active session. The inner lock guards the session
/// fields; the lifecycle mutex serializes complete/cancel on the same
/// session so two concurrent settlement attempts cannot interleave.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: Uuid,
    inner: RwLock<TradeSession>,
    lifecycle: Mutex<()>,
}

impl SessionHandle {
    fn new(session: TradeSession) -> Arc<Self> {
        Arc::new(Self {
            id: session.id,
            inner: RwLock::new(session),
            lifecycle: Mutex::new(()),
        })
    }

    /// Consistent read-only snapshot for the view layer
    pub async fn snapshot(&self) -> TradeSession {
        self.inner.read().await.clone()
    }
}

pub struct TradeCoordinator {
    config: TradeConfig,
    enabled: AtomicBool,
    ledger: Arc<dyn Ledger>,
    container: Arc<dyn Container>,
    notifier: Arc<dyn TradeNotifier>,
    cooldowns: CooldownTracker,
    history: Arc<HistoryStore>,
    journal: Arc<TransactionJournal>,
    /// Pending requests keyed by target id; exactly one per target
    pending: DashMap<PartyId, TradeRequest>,
    /// Active sessions, registered under both participant ids
    sessions: DashMap<PartyId, Arc<SessionHandle>>,
}

impl TradeCoordinator {
    pub fn new(
        config: TradeConfig,
        ledger: Arc<dyn Ledger>,
        container: Arc<dyn Container>,
        notifier: Arc<dyn TradeNotifier>,
        history: Arc<HistoryStore>,
        journal: Arc<TransactionJournal>,
    ) -> Self {
        let cooldowns =
            CooldownTracker::new(config.global_cooldown_secs, config.per_target_cooldown_secs);
        Self {
            enabled: AtomicBool::new(config.enabled),
            config,
            ledger,
            container,
            notifier,
            cooldowns,
            history,
            journal,
            pending: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    /// Runtime master switch; admission rejects everything while disabled
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn session_for(&self, party: &PartyId) -> Option<Arc<SessionHandle>> {
        self.sessions.get(party).map(|s| s.value().clone())
    }

    pub fn pending_request_for(&self, target: &PartyId) -> Option<TradeRequest> {
        self.pending.get(target).map(|r| r.value().clone())
    }

    // === Request admission ===

    /// Admit a trade request. No state is mutated on rejection.
    pub fn send_request(&self, sender: &Party, target: &Party) -> Result<(), RequestError> {
        if !self.is_enabled() {
            return Err(RequestError::TradingDisabled);
        }
        if sender.id == target.id {
            return Err(RequestError::SelfTrade);
        }
        if self.sessions.contains_key(&sender.id) {
            return Err(RequestError::AlreadyInTrade);
        }
        if self.sessions.contains_key(&target.id) {
            return Err(RequestError::TargetInTrade);
        }

        let wait = self.cooldowns.check_cooldown(&sender.id, &target.id);
        if wait > 0 {
            return Err(RequestError::Cooldown {
                seconds_remaining: wait,
            });
        }

        let request =
            TradeRequest::new(sender.clone(), target.clone(), self.config.request_timeout_secs);
        match self.pending.entry(target.id.clone()) {
            Entry::Occupied(existing) if !existing.get().is_expired() => {
                return Err(RequestError::AlreadyRequested);
            }
            Entry::Occupied(mut existing) => {
                // Evicting an expired request; tell its sender, same as the
                // sweep would have
                let stale = existing.insert(request);
                self.notifier.notify(
                    &stale.sender.id,
                    &format!("Your trade request to {} expired", stale.target.name),
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(request);
            }
        }
        self.cooldowns.record_request(&sender.id, &target.id);

        info!("Trade request: {} -> {}", sender.name, target.name);
        self.notifier
            .notify(&sender.id, &format!("Trade request sent to {}", target.name));
        self.notifier.notify(
            &target.id,
            &format!(
                "{} wants to trade with you. Use 'trade accept' or 'trade deny'.",
                sender.name
            ),
        );
        Ok(())
    }

    /// Accept the pending request addressed to `target`, creating a session
    pub async fn accept_request(
        &self,
        target: &PartyId,
    ) -> Result<Arc<SessionHandle>, RequestError> {
        let (_, request) = self
            .pending
            .remove(target)
            .ok_or(RequestError::NoPendingRequest)?;

        if request.is_expired() {
            self.notifier
                .notify(target, "That trade request has expired");
            return Err(RequestError::RequestExpired);
        }

        // Race with a third party: either side may have entered another
        // session since the request was sent
        if self.sessions.contains_key(target) {
            return Err(RequestError::AlreadyInTrade);
        }
        if self.sessions.contains_key(&request.sender.id) {
            self.notifier.notify(
                target,
                &format!("{} is already in another trade", request.sender.name),
            );
            return Err(RequestError::TargetInTrade);
        }

        let session = TradeSession::new(
            request.sender.clone(),
            request.target.clone(),
            self.config.offer_slots,
        );
        self.journal.log_session_start(&session).await;
        info!(
            "Trade session {} started: {} <-> {}",
            session.id, request.sender.name, request.target.name
        );

        let snapshot = session.clone();
        let handle = SessionHandle::new(session);
        self.sessions
            .insert(request.sender.id.clone(), handle.clone());
        self.sessions
            .insert(request.target.id.clone(), handle.clone());

        self.notifier.notify(
            &request.sender.id,
            &format!("{} accepted your trade request", request.target.name),
        );
        self.notifier.notify(
            &request.target.id,
            &format!("Trading with {}", request.sender.name),
        );
        self.notifier.session_changed(&snapshot);
        Ok(handle)
    }

    /// Decline and discard the pending request addressed to `target`
    pub fn decline_request(&self, target: &PartyId) -> Result<(), RequestError> {
        let (_, request) = self
            .pending
            .remove(target)
            .ok_or(RequestError::NoPendingRequest)?;

        info!(
            "Trade request declined: {} -> {}",
            request.sender.name, request.target.name
        );
        self.notifier.notify(
            &request.sender.id,
            &format!("{} declined your trade request", request.target.name),
        );
        self.notifier.notify(target, "Trade request declined");
        Ok(())
    }

    // === Offer mutation ===

    pub async fn set_currency(
        &self,
        party: &PartyId,
        kind: CurrencyKind,
        amount: u64,
    ) -> Result<(), OfferError> {
        self.edit_offer(party, |session, side| {
            session.set_currency(side, kind, amount);
            Ok(())
        })
        .await
    }

    pub async fn set_items(
        &self,
        party: &PartyId,
        items: Vec<ItemStack>,
    ) -> Result<(), OfferError> {
        let slots = self.config.offer_slots;
        self.edit_offer(party, move |session, side| {
            if session.set_items(side, items) {
                Ok(())
            } else {
                Err(OfferError::OfferFull { slots })
            }
        })
        .await
    }

    pub async fn add_item(&self, party: &PartyId, stack: ItemStack) -> Result<(), OfferError> {
        let slots = self.config.offer_slots;
        self.edit_offer(party, move |session, side| {
            if session.add_item(side, stack) {
                Ok(())
            } else {
                Err(OfferError::OfferFull { slots })
            }
        })
        .await
    }

    async fn edit_offer<F>(&self, party: &PartyId, edit: F) -> Result<(), OfferError>
    where
        F: FnOnce(&mut TradeSession, Side) -> Result<(), OfferError>,
    {
        let handle = self.session_for(party).ok_or(OfferError::NoSession)?;
        let mut session = handle.inner.write().await;
        if session.state().is_terminal() {
            return Err(OfferError::SessionClosed);
        }
        let side = session.side_of(party).ok_or(OfferError::NoSession)?;
        edit(&mut session, side)?;
        let snapshot = session.clone();
        drop(session);
        self.notifier.session_changed(&snapshot);
        Ok(())
    }

    // === Confirmation ===

    /// Flip the caller's confirmation flag, returning the new value
    pub async fn toggle_confirm(&self, party: &PartyId) -> Result<bool, OfferError> {
        let handle = self.session_for(party).ok_or(OfferError::NoSession)?;
        let mut session = handle.inner.write().await;
        if session.state().is_terminal() {
            return Err(OfferError::SessionClosed);
        }
        let side = session.side_of(party).ok_or(OfferError::NoSession)?;
        let confirmed = session.toggle_confirm(side);

        let me = session.party(side).clone();
        let other = session.party(side.other()).clone();
        let snapshot = session.clone();
        drop(session);

        self.notifier.notify(
            &other.id,
            &format!(
                "{} {} the trade",
                me.name,
                if confirmed { "confirmed" } else { "unconfirmed" }
            ),
        );
        self.notifier.session_changed(&snapshot);
        Ok(confirmed)
    }

    // === Settlement ===

    /// Execute a confirmed trade: verify preconditions, move all currency
    /// in four ordered idempotent legs, then exchange item bundles. A
    /// precondition rejection is observationally a no-op; a failed leg is
    /// journaled for manual recovery and cancels the session forward.
    pub async fn complete_trade(&self, initiator: &PartyId) -> Result<(), SettlementError> {
        let handle = self
            .session_for(initiator)
            .ok_or(SettlementError::NoSession)?;
        let _lifecycle = handle.lifecycle.lock().await;
        let mut session = handle.inner.write().await;

        if session.state().is_terminal() {
            return Err(SettlementError::NoSession);
        }
        if !session.is_both_confirmed() {
            return Err(SettlementError::NotBothConfirmed);
        }

        // Both participants must be reachable
        for side in Side::BOTH {
            let party = session.party(side).clone();
            if !self.container.is_connected(&party.id).await {
                self.cancel_locked(&mut session, "counterpart unavailable")
                    .await;
                return Err(SettlementError::CounterpartUnavailable);
            }
        }

        // Capacity: each receiver must fit the incoming bundle, counting
        // the slots freed by handing away its own offered items
        for side in Side::BOTH {
            let receiver = session.party(side).clone();
            let receiving = session.offer(side.other()).item_slots();
            let giving = session.offer(side).item_slots();
            let free = self.container.free_capacity(&receiver.id).await;
            if free + giving < receiving {
                let err = SettlementError::InsufficientCapacity {
                    party: receiver.name.clone(),
                };
                self.notify_both(&session, &err.to_string());
                return Err(err);
            }
        }

        // Sufficiency: each giver must currently hold what it offers
        for side in Side::BOTH {
            let giver = session.party(side).clone();
            for kind in CurrencyKind::ALL {
                let offered = session.offer(side).currency(kind);
                if offered > 0 && self.ledger.balance(&giver.id, kind).await < offered {
                    let err = SettlementError::InsufficientFunds {
                        party: giver.name.clone(),
                        currency: kind.to_string(),
                    };
                    self.notify_both(&session, &err.to_string());
                    return Err(err);
                }
            }
        }

        // Currency legs in fixed deterministic order so journal entries
        // form a reproducible total order
        let legs = [
            (Side::A, CurrencyKind::Coins, "a-coins"),
            (Side::B, CurrencyKind::Coins, "b-coins"),
            (Side::A, CurrencyKind::Gems, "a-gems"),
            (Side::B, CurrencyKind::Gems, "b-gems"),
        ];
        for (side, kind, tag) in legs {
            let amount = session.offer(side).currency(kind);
            if amount == 0 {
                continue;
            }
            let from = session.party(side).clone();
            let to = session.party(side.other()).clone();
            let key = format!("{}:{}", session.id, tag);
            let memo = format!("trade {} with {}", session.id, to.name);

            if !self.ledger.debit(&from.id, amount, kind, &key, &memo).await {
                self.journal
                    .log_currency_leg(session.id, &from, &to, kind, amount, &key, false)
                    .await;
                self.journal
                    .log_recovery_needed(
                        session.id,
                        &format!(
                            "debit of {} {} from {} failed; earlier legs may have committed",
                            amount, kind, from.name
                        ),
                    )
                    .await;
                error!(
                    "Settlement of session {} failed at leg {}; flagged for manual recovery",
                    session.id, tag
                );
                self.cancel_locked(&mut session, "currency exchange failed")
                    .await;
                return Err(SettlementError::ExchangeFailed);
            }

            let credited = self.ledger.credit(&to.id, amount, kind, &memo).await;
            self.journal
                .log_currency_leg(session.id, &from, &to, kind, amount, &key, credited)
                .await;
            if !credited {
                self.journal
                    .log_recovery_needed(
                        session.id,
                        &format!(
                            "credit of {} {} to {} failed after a committed debit",
                            amount, kind, to.name
                        ),
                    )
                    .await;
                error!(
                    "Settlement of session {} failed crediting leg {}; flagged for manual recovery",
                    session.id, tag
                );
                self.cancel_locked(&mut session, "currency exchange failed")
                    .await;
                return Err(SettlementError::ExchangeFailed);
            }
        }

        // Snapshot for history while the offers are still intact
        let entry = HistoryEntry::from_session(&session);

        // Item legs; capacity was pre-verified, dropping is the safety net
        for side in Side::BOTH {
            let from = session.party(side).clone();
            let to = session.party(side.other()).clone();
            let items = session.offer(side).items.clone();
            if items.is_empty() {
                continue;
            }
            self.journal
                .log_item_leg(session.id, &from, &to, &items)
                .await;
            let leftover = self.container.add_items(&to.id, items).await;
            if !leftover.is_empty() {
                warn!(
                    "Session {}: {} items did not fit {}'s container, dropped nearby",
                    session.id,
                    leftover.len(),
                    to.name
                );
                self.container.drop_items(&to.id, leftover).await;
            }
        }

        self.journal.log_session_complete(&session).await;
        if let Err(e) = session.complete() {
            error!("Session {} completion transition failed: {}", session.id, e);
        }
        self.history.save(entry).await;

        let a = session.party(Side::A).clone();
        let b = session.party(Side::B).clone();
        let snapshot = session.clone();
        drop(session);

        self.sessions.remove(&a.id);
        self.sessions.remove(&b.id);

        info!("Trade session {} completed: {} <-> {}", snapshot.id, a.name, b.name);
        self.notifier.notify(&a.id, "Trade complete");
        self.notifier.notify(&b.id, "Trade complete");
        self.notifier.session_changed(&snapshot);
        Ok(())
    }

    // === Cancellation ===

    /// Cancel the caller's session, returning every offered item to its
    /// owner. A no-op when the party has no session.
    pub async fn cancel_trade(&self, party: &PartyId, reason: &str) {
        let Some(handle) = self.session_for(party) else {
            return;
        };
        let _lifecycle = handle.lifecycle.lock().await;
        let mut session = handle.inner.write().await;
        if session.state().is_terminal() {
            return;
        }
        self.cancel_locked(&mut session, reason).await;
    }

    /// Shared cancellation path; the caller holds both session locks
    async fn cancel_locked(&self, session: &mut TradeSession, reason: &str) {
        // Return offered items to their original owners; drop what no
        // longer fits, never delete
        for (owner, items) in session.drain_items() {
            if items.is_empty() {
                continue;
            }
            let leftover = self.container.add_items(&owner.id, items).await;
            if !leftover.is_empty() {
                self.container.drop_items(&owner.id, leftover).await;
            }
        }

        if let Err(e) = session.cancel() {
            error!("Session {} cancel transition failed: {}", session.id, e);
            return;
        }
        self.journal.log_session_cancelled(session, reason).await;

        let a = session.party(Side::A).clone();
        let b = session.party(Side::B).clone();
        self.sessions.remove(&a.id);
        self.sessions.remove(&b.id);

        info!(
            "Trade session {} cancelled ({}): {} <-> {}",
            session.id, reason, a.name, b.name
        );
        let message = format!("Trade cancelled: {}", reason);
        self.notifier.notify(&a.id, &message);
        self.notifier.notify(&b.id, &message);
        self.notifier.session_changed(session);
    }

    // === Disconnect handling ===

    /// Discard anything the departing party is involved in
    pub async fn handle_disconnect(&self, party: &PartyId) {
        // A request addressed to the departing party
        if let Some((_, request)) = self.pending.remove(party) {
            self.notifier.notify(
                &request.sender.id,
                &format!("{} disconnected; trade request cancelled", request.target.name),
            );
        }

        // Requests the departing party sent
        let orphaned: Vec<PartyId> = self
            .pending
            .iter()
            .filter(|entry| entry.value().sender.id == *party)
            .map(|entry| entry.key().clone())
            .collect();
        for target in orphaned {
            if let Some((_, request)) = self.pending.remove(&target) {
                self.notifier.notify(
                    &request.target.id,
                    &format!(
                        "{} disconnected; their trade request was withdrawn",
                        request.sender.name
                    ),
                );
            }
        }

        self.cooldowns.clear(party);
        self.cancel_trade(party, "party disconnected").await;
    }

    // === Timeout sweep ===

    /// Evict expired requests and clean cooldown maps. Runs periodically;
    /// the hard expiry also holds on the accept path, so a request that
    /// outlives its timeout is rejected even before the next sweep.
    pub async fn sweep(&self) {
        let expired: Vec<PartyId> = self
            .pending
            .iter()
            .filter(|entry| entry.value().is_expired())
            .map(|entry| entry.key().clone())
            .collect();

        for target in expired {
            if let Some((_, request)) = self
                .pending
                .remove_if(&target, |_, request| request.is_expired())
            {
                debug!(
                    "Trade request expired: {} -> {}",
                    request.sender.name, request.target.name
                );
                self.notifier.notify(
                    &request.sender.id,
                    &format!("Your trade request to {} expired", request.target.name),
                );
                self.notifier.notify(
                    &request.target.id,
                    &format!("Trade request from {} expired", request.sender.name),
                );
            }
        }

        self.cooldowns.cleanup();

        // Long-lived sessions are worth noticing, but the reference
        // behavior keeps them alive until explicit resolution
        let handles: Vec<Arc<SessionHandle>> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let mut seen = HashSet::new();
        for handle in handles {
            if !seen.insert(handle.id) {
                continue;
            }
            let session = handle.inner.read().await;
            let age = (chrono::Utc::now() - session.created_at).num_seconds();
            if age > IDLE_SESSION_LOG_SECS {
                debug!("Session {} has been active for {}s", session.id, age);
            }
        }
    }

    /// Spawn the recurring sweep task
    pub fn spawn_sweeper(coordinator: Arc<Self>) -> JoinHandle<()> {
        let period = tokio::time::Duration::from_secs(coordinator.config.sweep_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                coordinator.sweep().await;
            }
        })
    }

    fn notify_both(&self, session: &TradeSession, message: &str) {
        for side in Side::BOTH {
            self.notifier.notify(&session.party(side).id, message);
        }
    }
}
