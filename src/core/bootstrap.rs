use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::client::RemoteService;

pub const RATE_ADVISORY: &str = "Could not fetch the current interest rate from the server.";

#[derive(Clone, Debug, PartialEq)]
pub enum RateOutcome {
    /// Market rate in percent, rounded to two decimals.
    Suggested(f64),
    /// The service answered without a usable rate.
    Missing,
    /// The fetch failed; carries the advisory to show.
    Advisory(String),
}

/// Seeds the rate field from the service's current market rate, at most once.
#[derive(Debug, Default)]
pub struct RateBootstrap {
    started: AtomicBool,
}

impl RateBootstrap {
    /// Returns `None` on every call after the first.
    pub async fn run<S: RemoteService>(&self, service: &S) -> Option<RateOutcome> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("rate bootstrap already ran, skipping");
            return None;
        }

        let outcome = match service.current_rate().await {
            Ok(Some(rate)) if rate.is_finite() && rate != 0.0 => {
                let rate = round_to_cents(rate);
                info!("current market rate is {rate:.2}%");
                RateOutcome::Suggested(rate)
            }
            Ok(_) => {
                debug!("service returned no current rate");
                RateOutcome::Missing
            }
            Err(err) => {
                warn!("failed to fetch current rate: {err}");
                RateOutcome::Advisory(RATE_ADVISORY.to_string())
            }
        };
        Some(outcome)
    }

    pub fn has_run(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::ScriptedService;

    #[tokio::test]
    async fn suggests_rounded_rate() {
        let service = ScriptedService::with_rate(6.8749);
        let bootstrap = RateBootstrap::default();
        assert_eq!(
            bootstrap.run(&service).await,
            Some(RateOutcome::Suggested(6.87))
        );
    }

    #[tokio::test]
    async fn runs_at_most_once() {
        let service = ScriptedService::with_rate(6.5);
        let bootstrap = RateBootstrap::default();
        assert!(bootstrap.run(&service).await.is_some());
        assert_eq!(bootstrap.run(&service).await, None);
        assert_eq!(service.rate_calls.load(Ordering::SeqCst), 1);
        assert!(bootstrap.has_run());
    }

    #[tokio::test]
    async fn failure_yields_advisory() {
        let service = ScriptedService::failing_rate();
        let bootstrap = RateBootstrap::default();
        assert_eq!(
            bootstrap.run(&service).await,
            Some(RateOutcome::Advisory(RATE_ADVISORY.to_string()))
        );
    }

    #[tokio::test]
    async fn zero_or_absent_rate_is_missing() {
        for rate in [Some(0.0), None, Some(f64::NAN)] {
            let service = ScriptedService {
                rate: Some(Ok(rate)),
                ..ScriptedService::default()
            };
            let bootstrap = RateBootstrap::default();
            assert_eq!(bootstrap.run(&service).await, Some(RateOutcome::Missing));
        }
    }

    #[test]
    fn round_to_cents_keeps_two_decimals() {
        assert_eq!(round_to_cents(6.125_1), 6.13);
        assert_eq!(round_to_cents(7.0), 7.0);
    }
}
