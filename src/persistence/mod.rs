pub mod history;
pub mod journal;

pub use history::{HistoryEntry, HistorySide, HistoryStore};
pub use journal::TransactionJournal;
