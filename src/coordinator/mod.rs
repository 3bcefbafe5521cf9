pub mod coordinator;
pub mod notify;

pub use coordinator::{SessionHandle, TradeCoordinator};
pub use notify::{LogNotifier, TradeNotifier};
