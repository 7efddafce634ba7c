//! gRPC client for the rates service, implementing the wallet side's
//! [`RatesProvider`] seam.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;

use crate::error::AppError;
use crate::grpc::proto;
use crate::grpc::proto::exchange_service_client::ExchangeServiceClient;
use crate::models::currency::Currency;
use crate::services::exchange::RatesProvider;

#[derive(Clone)]
pub struct GrpcRatesClient {
    client: ExchangeServiceClient<Channel>,
    timeout: Duration,
}

impl GrpcRatesClient {
    /// Dials the rates service eagerly so a bad address fails at startup.
    pub async fn connect(addr: String, timeout: Duration) -> Result<Self, tonic::transport::Error> {
        tracing::info!(addr = %addr, "connecting to rates service");

        let channel = Endpoint::from_shared(addr)?
            .connect_timeout(Duration::from_secs(5))
            .connect()
            .await?;

        tracing::info!("connected to rates service");

        Ok(Self {
            client: ExchangeServiceClient::new(channel),
            timeout,
        })
    }
}

#[async_trait]
impl RatesProvider for GrpcRatesClient {
    async fn get_exchange_rates(&self) -> Result<HashMap<String, f64>, AppError> {
        let mut client = self.client.clone();

        let mut request = Request::new(proto::Empty {});
        request.set_timeout(self.timeout);

        let response = client.get_exchange_rates(request).await.map_err(|status| {
            AppError::Internal(format!("rates service call failed: {status}"))
        })?;

        Ok(response.into_inner().rates)
    }

    async fn get_rate_for_pair(&self, from: Currency, to: Currency) -> Result<f64, AppError> {
        let mut client = self.client.clone();

        let mut request = Request::new(proto::CurrencyRequest {
            from_currency: from.as_str().to_string(),
            to_currency: to.as_str().to_string(),
        });
        request.set_timeout(self.timeout);

        let response = client
            .get_exchange_rate_for_currency(request)
            .await
            .map_err(|status| {
                AppError::Internal(format!(
                    "rates service call failed for {from}->{to}: {status}"
                ))
            })?;

        Ok(response.into_inner().rate)
    }
}
