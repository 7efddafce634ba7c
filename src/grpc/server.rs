//! gRPC surface of the rates service.

use tonic::{Request, Response, Status};

use crate::grpc::proto;
use crate::grpc::proto::exchange_service_server::ExchangeService;
use crate::services::rates::{RateError, RateSource};

pub struct ExchangeRatesServer {
    source: RateSource,
}

impl ExchangeRatesServer {
    pub fn new(source: RateSource) -> Self {
        Self { source }
    }
}

#[tonic::async_trait]
impl ExchangeService for ExchangeRatesServer {
    async fn get_exchange_rates(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::ExchangeRatesResponse>, Status> {
        let rates = self.source.all_rates().await.map_err(|err| {
            tracing::error!(error = %err, "failed to load exchange rates");
            Status::internal("failed to get exchange rates")
        })?;

        Ok(Response::new(proto::ExchangeRatesResponse { rates }))
    }

    async fn get_exchange_rate_for_currency(
        &self,
        request: Request<proto::CurrencyRequest>,
    ) -> Result<Response<proto::ExchangeRateResponse>, Status> {
        let req = request.into_inner();

        tracing::info!(from = %req.from_currency, to = %req.to_currency, "pair rate requested");

        match self
            .source
            .rate_for_pair(&req.from_currency, &req.to_currency)
            .await
        {
            Ok(rate) => Ok(Response::new(proto::ExchangeRateResponse {
                from_currency: req.from_currency,
                to_currency: req.to_currency,
                rate,
            })),
            Err(err @ RateError::UnsupportedCurrency(_)) => {
                Err(Status::invalid_argument(err.to_string()))
            }
            Err(err @ RateError::SameCurrency) => Err(Status::invalid_argument(err.to_string())),
            Err(err @ (RateError::MissingRate(_) | RateError::InvalidReferenceRate(_))) => {
                tracing::error!(error = %err, "invalid reference data in exchange_rates");
                Err(Status::internal("invalid exchange rate data"))
            }
            Err(RateError::Database(err)) => {
                tracing::error!(error = %err, "failed to load pair rate");
                Err(Status::internal("failed to get exchange rate"))
            }
        }
    }
}
