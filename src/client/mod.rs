use std::{future::Future, sync::Arc, time::Duration};

use reqwest::{Client, Response};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    config::ServiceConfig,
    core::{
        AmortizationRequest, AmortizationSchedule, Endpoint, MonteCarloResult, PaymentGrid,
        PaymentGridRequest, SimulationRequest,
    },
    error::{Error, ServiceError},
};

const CURRENT_RATE_PATH: &str = "/api/current-rate";
const AMORTIZATION_PATH: &str = "/api/amortization";
const MONTE_CARLO_PATH: &str = "/api/monte-carlo";
const MORTGAGE_OPTIONS_PATH: &str = "/api/mortgage-options";

/// The remote computation service the dashboard delegates all math to.
pub trait RemoteService: Send + Sync + 'static {
    /// Current market rate in percent; `None` when the service has no value.
    fn current_rate(&self) -> impl Future<Output = Result<Option<f64>, ServiceError>> + Send;

    fn amortization(
        &self,
        request: AmortizationRequest,
    ) -> impl Future<Output = Result<AmortizationSchedule, ServiceError>> + Send;

    fn monte_carlo(
        &self,
        request: SimulationRequest,
    ) -> impl Future<Output = Result<MonteCarloResult, ServiceError>> + Send;

    fn mortgage_options(
        &self,
        request: PaymentGridRequest,
    ) -> impl Future<Output = Result<PaymentGrid, ServiceError>> + Send;
}

#[derive(Debug, Deserialize)]
struct RateResponse {
    rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpService {
    base_url: String,
    http: Client,
}

impl HttpService {
    pub fn new(config: &ServiceConfig) -> Result<HttpService, Error> {
        config.validate()?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(HttpService {
            base_url: config.base_url().to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl RemoteService for HttpService {
    fn current_rate(&self) -> impl Future<Output = Result<Option<f64>, ServiceError>> + Send {
        async move {
            let response = self.http.get(self.url(CURRENT_RATE_PATH)).send().await?;
            let body: RateResponse = read_json(response).await?;
            Ok(body.rate)
        }
    }

    fn amortization(
        &self,
        request: AmortizationRequest,
    ) -> impl Future<Output = Result<AmortizationSchedule, ServiceError>> + Send {
        async move {
            let response = self
                .http
                .post(self.url(AMORTIZATION_PATH))
                .json(&request)
                .send()
                .await?;
            read_json(response).await
        }
    }

    fn monte_carlo(
        &self,
        request: SimulationRequest,
    ) -> impl Future<Output = Result<MonteCarloResult, ServiceError>> + Send {
        async move {
            let response = self
                .http
                .post(self.url(MONTE_CARLO_PATH))
                .json(&request)
                .send()
                .await?;
            read_json(response).await
        }
    }

    fn mortgage_options(
        &self,
        request: PaymentGridRequest,
    ) -> impl Future<Output = Result<PaymentGrid, ServiceError>> + Send {
        async move {
            let response = self
                .http
                .post(self.url(MORTGAGE_OPTIONS_PATH))
                .json(&request)
                .send()
                .await?;
            read_json(response).await
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let status = response.status();
    let url = response.url().clone();
    let body = response.bytes().await?;
    debug!("{url} responded {status} with {} bytes", body.len());

    if status.is_success() {
        return Ok(serde_json::from_slice(&body)?);
    }

    match serde_json::from_slice::<ErrorResponse>(&body) {
        Ok(ErrorResponse {
            error: Some(message),
        }) if !message.trim().is_empty() => Err(ServiceError::Rejected {
            status: status.as_u16(),
            message,
        }),
        _ => Err(ServiceError::Status(status.as_u16())),
    }
}

#[derive(Debug)]
pub struct Amortization<S>(pub Arc<S>);

impl<S: RemoteService> Endpoint for Amortization<S> {
    type Params = AmortizationRequest;
    type Output = AmortizationSchedule;

    const NAME: &'static str = "amortization";
    const FAILURE: &'static str = "Calculation failed";

    fn call(
        &self,
        params: AmortizationRequest,
    ) -> impl Future<Output = Result<AmortizationSchedule, ServiceError>> + Send {
        self.0.amortization(params)
    }
}

#[derive(Debug)]
pub struct Simulation<S>(pub Arc<S>);

impl<S: RemoteService> Endpoint for Simulation<S> {
    type Params = SimulationRequest;
    type Output = MonteCarloResult;

    const NAME: &'static str = "simulation";
    const FAILURE: &'static str = "Simulation failed";

    fn call(
        &self,
        params: SimulationRequest,
    ) -> impl Future<Output = Result<MonteCarloResult, ServiceError>> + Send {
        self.0.monte_carlo(params)
    }
}

#[derive(Debug)]
pub struct PaymentOptions<S>(pub Arc<S>);

impl<S: RemoteService> Endpoint for PaymentOptions<S> {
    type Params = PaymentGridRequest;
    type Output = PaymentGrid;

    const NAME: &'static str = "payment grid";
    const FAILURE: &'static str = "Payment comparison failed";

    fn call(
        &self,
        params: PaymentGridRequest,
    ) -> impl Future<Output = Result<PaymentGrid, ServiceError>> + Send {
        self.0.mortgage_options(params)
    }
}
