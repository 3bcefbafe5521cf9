pub mod currency;
pub mod item;
pub mod party;
pub mod request;
pub mod session;

pub use currency::CurrencyKind;
pub use item::{describe_items, ItemStack};
pub use party::{Party, PartyId, Side};
pub use request::TradeRequest;
pub use session::{Offer, SessionState, TradeSession};
