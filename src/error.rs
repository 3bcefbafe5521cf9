use thiserror::Error;

/// Main error type for the trade engine
#[derive(Error, Debug)]
pub enum TradeError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // State machine errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Request admission rejections
    #[error("{0}")]
    Request(#[from] RequestError),

    // Settlement rejections and failures
    #[error("{0}")]
    Settlement(#[from] SettlementError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for TradeError
pub type Result<T> = std::result::Result<T, TradeError>;

/// Rejections at request admission. No state is mutated when one of these
/// is returned; the message doubles as the notification sent to the sender.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Trading is currently disabled")]
    TradingDisabled,

    #[error("You cannot trade with yourself")]
    SelfTrade,

    #[error("You are already in a trade")]
    AlreadyInTrade,

    #[error("That player is already in a trade")]
    TargetInTrade,

    #[error("You must wait {seconds_remaining}s before sending another trade request")]
    Cooldown { seconds_remaining: u64 },

    #[error("That player already has a pending trade request")]
    AlreadyRequested,

    #[error("No pending trade request")]
    NoPendingRequest,

    #[error("The trade request has expired")]
    RequestExpired,
}

/// Rejections at settlement preconditions, plus the mid-settlement failure.
/// Precondition variants are observationally a no-op on external state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("You are not in a trade")]
    NoSession,

    #[error("Both parties must confirm before completing the trade")]
    NotBothConfirmed,

    #[error("Your trade partner is no longer available")]
    CounterpartUnavailable,

    #[error("{party} does not have enough inventory space")]
    InsufficientCapacity { party: String },

    #[error("{party} does not have enough {currency}")]
    InsufficientFunds { party: String, currency: String },

    #[error("Currency exchange failed")]
    ExchangeFailed,
}

/// Rejections when editing an offer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OfferError {
    #[error("You are not in a trade")]
    NoSession,

    #[error("This trade is no longer active")]
    SessionClosed,

    #[error("The offer is full ({slots} slots)")]
    OfferFull { slots: usize },
}

impl From<OfferError> for TradeError {
    fn from(err: OfferError) -> Self {
        TradeError::Internal(err.to_string())
    }
}
