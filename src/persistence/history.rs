//! Durable trade history
//!
//! Completed trades are appended to a JSON-lines file and mirrored into a
//! bounded most-recent cache for lookups. History is best-effort audit: a
//! durable-write failure is logged and never blocks the settlement that
//! just happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::{describe_items, PartyId, Side, TradeSession};
use crate::error::Result;

/// What one side gave away in a settled trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySide {
    pub id: PartyId,
    pub name: String,
    /// Textual description of the items this side handed over
    pub items: String,
    pub coins: u64,
    pub gems: u64,
}

/// Immutable snapshot of one settled trade, taken at settlement time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub side_a: HistorySide,
    pub side_b: HistorySide,
}

impl HistoryEntry {
    /// Snapshot a session that is about to complete
    pub fn from_session(session: &TradeSession) -> Self {
        let snapshot = |side: Side| {
            let party = session.party(side);
            let offer = session.offer(side);
            HistorySide {
                id: party.id.clone(),
                name: party.name.clone(),
                items: describe_items(&offer.items),
                coins: offer.coins,
                gems: offer.gems,
            }
        };

        Self {
            session_id: session.id,
            timestamp: Utc::now(),
            side_a: snapshot(Side::A),
            side_b: snapshot(Side::B),
        }
    }

    pub fn involves(&self, party: &PartyId) -> bool {
        self.side_a.id == *party || self.side_b.id == *party
    }
}

/// File-backed history store with a bounded in-memory recent cache
pub struct HistoryStore {
    path: PathBuf,
    cache_size: usize,
    /// Oldest at the front, newest at the back
    cache: RwLock<VecDeque<HistoryEntry>>,
}

impl HistoryStore {
    pub fn new(path: PathBuf, cache_size: usize) -> Self {
        Self {
            path,
            cache_size,
            cache: RwLock::new(VecDeque::new()),
        }
    }

    /// Load the most recent entries from durable storage into the cache.
    /// Older entries stay durable-only.
    pub async fn load(&self) -> Result<()> {
        if !self.path.exists() {
            debug!("No existing history file, starting fresh");
            return Ok(());
        }

        // Streamed so memory stays bounded by the cache size, not by the
        // total history on disk
        let file = tokio::fs::File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut entries = VecDeque::new();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(line) {
                Ok(entry) => {
                    entries.push_back(entry);
                    if entries.len() > self.cache_size {
                        entries.pop_front();
                    }
                }
                Err(e) => error!("Skipping unreadable history line: {}", e),
            }
        }

        info!("Loaded {} recent trades from history", entries.len());
        *self.cache.write().await = entries;
        Ok(())
    }

    /// Append an entry durably and to the cache. The durable write is
    /// best-effort; a failure is logged and the cache still gains the entry.
    pub async fn save(&self, entry: HistoryEntry) {
        if let Err(e) = self.append_durable(&entry).await {
            error!(
                "Failed to persist history for session {}: {}",
                entry.session_id, e
            );
        }

        let mut cache = self.cache.write().await;
        cache.push_back(entry);
        while cache.len() > self.cache_size {
            cache.pop_front();
        }
    }

    async fn append_durable(&self, entry: &HistoryEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Cached entries involving a party, newest first
    pub async fn for_participant(&self, party: &PartyId, limit: usize) -> Vec<HistoryEntry> {
        let cache = self.cache.read().await;
        cache
            .iter()
            .rev()
            .filter(|e| e.involves(party))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Most recent cached entries, newest first
    pub async fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        let cache = self.cache.read().await;
        cache.iter().rev().take(limit).cloned().collect()
    }
}
