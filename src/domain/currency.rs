use serde::{Deserialize, Serialize};
use std::fmt;

/// The two currencies a trade can move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrencyKind {
    Coins,
    Gems,
}

impl CurrencyKind {
    pub const ALL: [CurrencyKind; 2] = [CurrencyKind::Coins, CurrencyKind::Gems];

    pub fn as_str(self) -> &'static str {
        match self {
            CurrencyKind::Coins => "coins",
            CurrencyKind::Gems => "gems",
        }
    }
}

impl fmt::Display for CurrencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for CurrencyKind {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "coins" => Ok(CurrencyKind::Coins),
            "gems" => Ok(CurrencyKind::Gems),
            _ => Err(format!("Unknown currency: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_from_str() {
        assert_eq!(CurrencyKind::try_from("coins").unwrap(), CurrencyKind::Coins);
        assert_eq!(CurrencyKind::try_from("GEMS").unwrap(), CurrencyKind::Gems);
        assert!(CurrencyKind::try_from("shells").is_err());
    }
}
