mod bootstrap;
mod dashboard;
mod export;
mod projection;
mod request;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use bootstrap::{RATE_ADVISORY, RateBootstrap, RateOutcome, round_to_cents};
pub use dashboard::{DashboardController, RequestKind};
pub use export::{DEFAULT_DELIMITER, EXPORT_FILE_NAME, save_schedule, to_delimited_text};
pub use projection::{
    ChartProjection, EQUITY, Layout, LineStyle, MEDIAN, Mark, QUANTILE_25, QUANTILE_75,
    REMAINING_DEBT, Series, TableView, amortization_layout, display_name, project,
    project_simulation, simulation_layout, tabulate,
};
pub use request::{Endpoint, RequestController, RequestState};
pub use types::{
    AmortizationRequest, AmortizationRow, AmortizationSchedule, CASE_SHILLER_NATIONAL, GraphMode,
    InputValue, LoanField, LoanInputs, MonteCarloResult, PRICE_INDICES, PaymentGrid,
    PaymentGridRequest, PaymentGridRow, PriceIndex, SimulationRequest, SimulationRuns, Tab,
};
