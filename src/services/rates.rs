//! Rates service core: reads the exchange_rates table and derives pair
//! rates against the shared numeraire.

use std::collections::HashMap;

use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};

use crate::entities::{exchange_rates, prelude::*};
use crate::models::currency::Currency;

#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
    #[error("from_currency and to_currency must be different")]
    SameCurrency,
    #[error("no rate stored for currency {0}")]
    MissingRate(String),
    #[error("invalid reference rate stored for {0}")]
    InvalidReferenceRate(String),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Both rates are quoted against the same numeraire, so the pair rate is
/// `to / from`. A zero rate is invalid reference data, not a zero price.
pub fn derive_pair_rate(from_rate: f64, to_rate: f64) -> Option<f64> {
    if from_rate == 0.0 || to_rate == 0.0 {
        return None;
    }
    Some(to_rate / from_rate)
}

#[derive(Clone)]
pub struct RateSource {
    db: DatabaseConnection,
}

impl RateSource {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn all_rates(&self) -> Result<HashMap<String, f64>, RateError> {
        let rows = ExchangeRates::find().all(&self.db).await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.currency, row.rate))
            .collect())
    }

    pub async fn rate_for_pair(&self, from: &str, to: &str) -> Result<f64, RateError> {
        let from = Currency::parse(from)
            .ok_or_else(|| RateError::UnsupportedCurrency(from.to_string()))?;
        let to =
            Currency::parse(to).ok_or_else(|| RateError::UnsupportedCurrency(to.to_string()))?;
        if from == to {
            return Err(RateError::SameCurrency);
        }

        let from_rate = self.rate_row(from).await?;
        let to_rate = self.rate_row(to).await?;

        let rate = derive_pair_rate(from_rate, to_rate).ok_or_else(|| {
            let invalid = if from_rate == 0.0 { from } else { to };
            RateError::InvalidReferenceRate(invalid.as_str().to_string())
        })?;

        tracing::debug!(from = %from, to = %to, rate, "derived pair rate");
        Ok(rate)
    }

    async fn rate_row(&self, currency: Currency) -> Result<f64, RateError> {
        let row = ExchangeRates::find()
            .filter(exchange_rates::Column::Currency.eq(currency.as_str()))
            .one(&self.db)
            .await?
            .ok_or_else(|| RateError::MissingRate(currency.as_str().to_string()))?;
        Ok(row.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_rate_is_to_over_from() {
        assert_eq!(derive_pair_rate(1.0, 1.09), Some(1.09));
        assert_eq!(derive_pair_rate(1.09, 1.0), Some(1.0 / 1.09));
        assert_eq!(derive_pair_rate(0.011, 1.0), Some(1.0 / 0.011));
    }

    #[test]
    fn zero_rates_are_invalid_reference_data() {
        assert_eq!(derive_pair_rate(0.0, 1.09), None);
        assert_eq!(derive_pair_rate(1.0, 0.0), None);
        assert_eq!(derive_pair_rate(0.0, 0.0), None);
    }
}
