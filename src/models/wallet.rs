use serde::{Deserialize, Serialize};

/// Converts a major-unit amount into minor units (1/100), truncating any
/// fraction below one minor unit. Truncation is the contract: the external
/// float boundary never round-trips sub-cent precision.
pub fn amount_to_minor_units(amount: f64) -> i64 {
    (amount * 100.0) as i64
}

/// Converts minor units back into a major-unit amount for responses.
pub fn amount_from_minor_units(minor: i64) -> f64 {
    minor as f64 / 100.0
}

/// Balances per supported currency, in major units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UserBalance {
    #[serde(rename = "USD")]
    pub usd: f64,
    #[serde(rename = "RUB")]
    pub rub: f64,
    #[serde(rename = "EUR")]
    pub eur: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: UserBalance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    pub amount: f64,
    pub currency: String,
    #[serde(rename = "requestID")]
    pub request_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub amount: f64,
    pub currency: String,
    #[serde(rename = "requestID")]
    pub request_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceOperationResponse {
    pub message: String,
    pub new_balance: UserBalance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_exact_major_amounts() {
        assert_eq!(amount_to_minor_units(1000.50), 100050);
        assert_eq!(amount_to_minor_units(50.0), 5000);
        assert_eq!(amount_to_minor_units(0.01), 1);
    }

    #[test]
    fn truncates_sub_cent_fractions() {
        // 10.005 is not a multiple of 0.01; the conversion truncates rather
        // than rounds, so the round-trip is not the identity.
        let minor = amount_to_minor_units(10.005);
        assert_eq!(minor, 1000);
        assert_eq!(amount_from_minor_units(minor), 10.0);

        assert_eq!(amount_to_minor_units(0.009), 0);
    }

    #[test]
    fn round_trips_whole_cents() {
        assert_eq!(amount_from_minor_units(amount_to_minor_units(1234.56)), 1234.56);
    }

    #[test]
    fn balance_serializes_with_currency_keys() {
        let balance = UserBalance {
            usd: 10.5,
            rub: 0.0,
            eur: 3.25,
        };
        let json = serde_json::to_value(balance).unwrap();
        assert_eq!(json["USD"], 10.5);
        assert_eq!(json["RUB"], 0.0);
        assert_eq!(json["EUR"], 3.25);
    }

    #[test]
    fn deposit_request_uses_camel_case_request_id() {
        let request: DepositRequest = serde_json::from_str(
            r#"{"amount": 100.0, "currency": "USD", "requestID": "r1"}"#,
        )
        .unwrap();
        assert_eq!(request.request_id, "r1");
        assert_eq!(request.currency, "USD");
    }
}
