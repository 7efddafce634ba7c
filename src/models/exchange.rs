use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub from_currency: String,
    pub to_currency: String,
    pub amount: f64,
    #[serde(rename = "requestID")]
    pub request_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeResponse {
    pub message: String,
    pub exchanged_amount: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesResponse {
    pub rates: HashMap<String, f64>,
}
