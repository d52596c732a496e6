use std::{
    future::Future,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use tokio::sync::Notify;

use crate::{
    client::RemoteService,
    core::{
        AmortizationRequest, AmortizationRow, AmortizationSchedule, Endpoint, MonteCarloResult,
        PaymentGrid, PaymentGridRequest, PaymentGridRow, SimulationRequest, SimulationRuns,
    },
    error::ServiceError,
};

/// Endpoint whose params already carry the outcome: `Ok(value)` succeeds,
/// `Err(Some(text))` is rejected with that text, `Err(None)` fails bare.
#[derive(Debug, Default)]
pub struct Echo {
    calls: Arc<AtomicUsize>,
}

impl Echo {
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Endpoint for Echo {
    type Params = Result<i32, Option<String>>;
    type Output = i32;

    const NAME: &'static str = "echo";
    const FAILURE: &'static str = "Echo failed";

    fn call(
        &self,
        params: Self::Params,
    ) -> impl Future<Output = Result<i32, ServiceError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        async move {
            params.map_err(|message| match message {
                Some(message) => ServiceError::Rejected {
                    status: 400,
                    message,
                },
                None => ServiceError::Status(500),
            })
        }
    }
}

/// Schedule paying 200 of principal per period, with the last period
/// clearing whatever is left.
pub fn schedule_fixture(loan_amount: f64, property_value: f64, periods: u32) -> AmortizationSchedule {
    let mut remaining = loan_amount;
    (1..=periods)
        .map(|period| {
            let beginning_principal = remaining;
            let principal_paid = if period == periods {
                remaining
            } else {
                200.0_f64.min(remaining)
            };
            remaining -= principal_paid;
            AmortizationRow {
                period,
                beginning_principal,
                interest_paid: (beginning_principal * 0.005).round(),
                principal_paid,
                ending_principal: remaining,
                equity: property_value - remaining,
            }
        })
        .collect()
}

pub fn simulation_fixture() -> MonteCarloResult {
    MonteCarloResult {
        periods: vec![1, 2, 3],
        runs: SimulationRuns::new(vec![
            ("0".to_string(), vec![9.0, 18.0, 29.0]),
            ("1".to_string(), vec![11.0, 22.0, 31.0]),
        ]),
        median: vec![10.0, 20.0, 30.0],
        quantile_25: vec![5.0, 15.0, 25.0],
        quantile_75: vec![15.0, 25.0, 35.0],
    }
}

/// In-memory service that answers from fixtures and records what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedService {
    pub rate: Option<Result<Option<f64>, String>>,
    /// When set, the rate answer is held back until the gate is notified.
    pub rate_gate: Option<Arc<Notify>>,
    pub amortization_error: Option<String>,
    pub simulation_error: Option<String>,
    pub rate_calls: AtomicUsize,
    pub amortization_requests: Mutex<Vec<AmortizationRequest>>,
    pub simulation_requests: Mutex<Vec<SimulationRequest>>,
}

impl ScriptedService {
    pub fn with_rate(rate: f64) -> Self {
        Self {
            rate: Some(Ok(Some(rate))),
            ..Self::default()
        }
    }

    /// A rate of `rate` that only arrives once the returned gate is notified.
    pub fn gated_rate(rate: f64) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let service = Self {
            rate_gate: Some(Arc::clone(&gate)),
            ..Self::with_rate(rate)
        };
        (service, gate)
    }

    pub fn failing_rate() -> Self {
        Self {
            rate: None,
            ..Self::default()
        }
    }

    pub fn amortization_requests(&self) -> Vec<AmortizationRequest> {
        self.amortization_requests
            .lock()
            .expect("requests lock")
            .clone()
    }
}

impl RemoteService for ScriptedService {
    fn current_rate(&self) -> impl Future<Output = Result<Option<f64>, ServiceError>> + Send {
        self.rate_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = match &self.rate {
            Some(Ok(rate)) => Ok(*rate),
            Some(Err(message)) => Err(ServiceError::Rejected {
                status: 500,
                message: message.clone(),
            }),
            None => Err(ServiceError::Status(503)),
        };
        let gate = self.rate_gate.clone();
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            outcome
        }
    }

    fn amortization(
        &self,
        request: AmortizationRequest,
    ) -> impl Future<Output = Result<AmortizationSchedule, ServiceError>> + Send {
        let outcome = match &self.amortization_error {
            Some(message) => Err(ServiceError::Rejected {
                status: 400,
                message: message.clone(),
            }),
            None => match (
                request.loan_amount.as_f64(),
                request.property_value.as_f64(),
                request.term_in_months.as_f64(),
                request.annual_rate.as_f64(),
            ) {
                (Some(loan), Some(property), Some(term), Some(_)) if term >= 1.0 => {
                    Ok(schedule_fixture(loan, property, term as u32))
                }
                _ => Err(ServiceError::Rejected {
                    status: 500,
                    message: "could not convert string to float".to_string(),
                }),
            },
        };
        self.amortization_requests
            .lock()
            .expect("requests lock")
            .push(request);
        async move { outcome }
    }

    fn monte_carlo(
        &self,
        request: SimulationRequest,
    ) -> impl Future<Output = Result<MonteCarloResult, ServiceError>> + Send {
        let outcome = match &self.simulation_error {
            Some(message) => Err(ServiceError::Rejected {
                status: 500,
                message: message.clone(),
            }),
            None => Ok(simulation_fixture()),
        };
        self.simulation_requests
            .lock()
            .expect("requests lock")
            .push(request);
        async move { outcome }
    }

    fn mortgage_options(
        &self,
        request: PaymentGridRequest,
    ) -> impl Future<Output = Result<PaymentGrid, ServiceError>> + Send {
        let term = request.term_in_months.as_f64().unwrap_or(360.0) as u32;
        let grid = PaymentGrid {
            columns: vec!["6.250".to_string(), "6.500".to_string()],
            rows: [180, term]
                .into_iter()
                .map(|term| PaymentGridRow {
                    term,
                    payments: [
                        ("6.250".to_string(), 3000.0 + term as f64),
                        ("6.500".to_string(), 3100.0 + term as f64),
                    ]
                    .into_iter()
                    .collect(),
                })
                .collect(),
        };
        async move { Ok(grid) }
    }
}
