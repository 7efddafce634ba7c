use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported currency whitelist. Anything outside this set is rejected at
/// the service boundary before any storage access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    USD,
    RUB,
    EUR,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::USD, Currency::RUB, Currency::EUR];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::RUB => "RUB",
            Currency::EUR => "EUR",
        }
    }

    /// Case-sensitive parse against the whitelist.
    pub fn parse(value: &str) -> Option<Currency> {
        match value {
            "USD" => Some(Currency::USD),
            "RUB" => Some(Currency::RUB),
            "EUR" => Some(Currency::EUR),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_currencies() {
        assert_eq!(Currency::parse("USD"), Some(Currency::USD));
        assert_eq!(Currency::parse("RUB"), Some(Currency::RUB));
        assert_eq!(Currency::parse("EUR"), Some(Currency::EUR));
    }

    #[test]
    fn rejects_unknown_and_lowercase() {
        assert_eq!(Currency::parse("GBP"), None);
        assert_eq!(Currency::parse("usd"), None);
        assert_eq!(Currency::parse(""), None);
    }

    #[test]
    fn display_matches_wire_format() {
        for currency in Currency::ALL {
            assert_eq!(Currency::parse(currency.as_str()), Some(currency));
        }
    }
}
