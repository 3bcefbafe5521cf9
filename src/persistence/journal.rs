//! Transaction journal
//!
//! Append-only, human-auditable record of every asset movement attempted
//! during settlement, independent of the user-facing history. One file per
//! day. After a partial settlement failure, an operator replays these lines
//! to reconcile balances by hand.
//!
//! Journal writes never error past their caller: a write failure is logged
//! to the operational log, because forensics must not abort a settlement.

use chrono::Utc;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::error;
use uuid::Uuid;

use crate::domain::{describe_items, CurrencyKind, ItemStack, Party, Side, TradeSession};
use crate::error::Result;

pub struct TransactionJournal {
    dir: PathBuf,
}

impl TransactionJournal {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub async fn log_session_start(&self, session: &TradeSession) {
        self.append(&format!(
            "SESSION_START {} | {} ({}) <-> {} ({})",
            session.id,
            session.party(Side::A).name,
            session.party(Side::A).id,
            session.party(Side::B).name,
            session.party(Side::B).id,
        ))
        .await;
    }

    /// One currency leg attempt: debit-then-credit under one idempotency key
    #[allow(clippy::too_many_arguments)]
    pub async fn log_currency_leg(
        &self,
        session_id: Uuid,
        from: &Party,
        to: &Party,
        kind: CurrencyKind,
        amount: u64,
        idempotency_key: &str,
        success: bool,
    ) {
        self.append(&format!(
            "CURRENCY_LEG {} | {} ({}) -> {} ({}) | {} {} | key={} | {}",
            session_id,
            from.name,
            from.id,
            to.name,
            to.id,
            amount,
            kind,
            idempotency_key,
            if success { "OK" } else { "FAILED" },
        ))
        .await;
    }

    pub async fn log_item_leg(
        &self,
        session_id: Uuid,
        from: &Party,
        to: &Party,
        items: &[ItemStack],
    ) {
        self.append(&format!(
            "ITEM_LEG {} | {} ({}) -> {} ({}) | {}",
            session_id,
            from.name,
            from.id,
            to.name,
            to.id,
            describe_items(items),
        ))
        .await;
    }

    pub async fn log_session_complete(&self, session: &TradeSession) {
        let summary = |side: Side| {
            let offer = session.offer(side);
            format!(
                "{} gave {} coins, {} gems, {}",
                session.party(side).name,
                offer.coins,
                offer.gems,
                describe_items(&offer.items),
            )
        };
        self.append(&format!(
            "SESSION_COMPLETE {} | {} | {}",
            session.id,
            summary(Side::A),
            summary(Side::B),
        ))
        .await;
    }

    pub async fn log_session_cancelled(&self, session: &TradeSession, reason: &str) {
        self.append(&format!(
            "SESSION_CANCELLED {} | {} <-> {} | reason: {}",
            session.id,
            session.party(Side::A).name,
            session.party(Side::B).name,
            reason,
        ))
        .await;
    }

    /// Flag a settlement that stopped after at least one leg may have
    /// committed. Operators reconcile these by replaying the leg lines.
    pub async fn log_recovery_needed(&self, session_id: Uuid, message: &str) {
        self.append(&format!(
            "MANUAL_RECOVERY_NEEDED {} | {}",
            session_id, message
        ))
        .await;
    }

    async fn append(&self, line: &str) {
        if let Err(e) = self.try_append(line).await {
            error!("Journal write failed: {} (entry: {})", e, line);
        }
    }

    async fn try_append(&self, line: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let now = Utc::now();
        let path = self
            .dir
            .join(format!("trades-{}.log", now.format("%Y-%m-%d")));

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(format!("[{}] {}\n", now.to_rfc3339(), line).as_bytes())
            .await?;
        file.flush().await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn read_today(&self) -> String {
        let path = self
            .dir
            .join(format!("trades-{}.log", Utc::now().format("%Y-%m-%d")));
        tokio::fs::read_to_string(path).await.unwrap_or_default()
    }
}
