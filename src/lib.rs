pub mod commands;
pub mod config;
pub mod cooldown;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod persistence;

pub use config::AppConfig;
pub use cooldown::CooldownTracker;
pub use coordinator::{LogNotifier, SessionHandle, TradeCoordinator, TradeNotifier};
pub use domain::{
    CurrencyKind, ItemStack, Offer, Party, PartyId, SessionState, Side, TradeRequest,
    TradeSession,
};
pub use error::{OfferError, RequestError, Result, SettlementError, TradeError};
pub use ledger::{Container, Ledger, MemoryContainer, MemoryLedger};
pub use persistence::{HistoryEntry, HistorySide, HistoryStore, TransactionJournal};
