use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Serialize;

use super::{
    bootstrap::{RateBootstrap, RateOutcome},
    export::{save_schedule, to_delimited_text},
    projection::{ChartProjection, TableView, project, project_simulation, tabulate},
    request::{RequestController, RequestState},
    types::{
        AmortizationRequest, AmortizationSchedule, GraphMode, LoanField, LoanInputs,
        MonteCarloResult, PaymentGrid, PaymentGridRequest, SimulationRequest, Tab,
    },
};
use crate::{
    client::{Amortization, PaymentOptions, RemoteService, Simulation},
    error::Error,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    Amortization,
    Simulation,
    PaymentGrid,
}

#[derive(Debug)]
struct Derived<K> {
    key: K,
    projection: Option<ChartProjection>,
}

/// Inputs, tab and graph mode selection, and the request lifecycles behind
/// the calculator, simulation and payment comparison views.
pub struct DashboardController<S: RemoteService> {
    service: Arc<S>,
    inputs: LoanInputs,
    rate_edited: bool,
    tab: Tab,
    graph_mode: GraphMode,
    amortization: RequestController<Amortization<S>>,
    simulation: RequestController<Simulation<S>>,
    payment_grid: RequestController<PaymentOptions<S>>,
    rate_bootstrap: Arc<RateBootstrap>,
    advisory: Option<String>,
    last_triggered: Option<RequestKind>,
    calculator_view: Option<Derived<(u64, GraphMode)>>,
    simulation_view: Option<Derived<u64>>,
}

impl<S: RemoteService> DashboardController<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self {
            amortization: RequestController::new(Amortization(Arc::clone(&service))),
            simulation: RequestController::new(Simulation(Arc::clone(&service))),
            payment_grid: RequestController::new(PaymentOptions(Arc::clone(&service))),
            service,
            inputs: LoanInputs::default(),
            rate_edited: false,
            tab: Tab::default(),
            graph_mode: GraphMode::default(),
            rate_bootstrap: Arc::new(RateBootstrap::default()),
            advisory: None,
            last_triggered: None,
            calculator_view: None,
            simulation_view: None,
        }
    }

    /// Fetches the market rate once per dashboard. Later calls do nothing.
    pub async fn bootstrap(&mut self) {
        if let Some(outcome) = self.fetch_rate().await {
            self.apply_rate(outcome);
        }
    }

    /// The market rate fetch, detached from the dashboard so it can run while
    /// the inputs stay editable. Resolves to `None` once it has already run.
    pub fn fetch_rate(&self) -> impl Future<Output = Option<RateOutcome>> + Send + 'static {
        let bootstrap = Arc::clone(&self.rate_bootstrap);
        let service = Arc::clone(&self.service);
        async move { bootstrap.run(service.as_ref()).await }
    }

    /// A suggested rate only fills a rate field the user has not touched.
    pub fn apply_rate(&mut self, outcome: RateOutcome) {
        match outcome {
            RateOutcome::Suggested(rate) if !self.rate_edited => {
                self.inputs.annual_rate_percent = format!("{rate:.2}").into();
            }
            RateOutcome::Advisory(message) => self.advisory = Some(message),
            _ => {}
        }
    }

    pub fn inputs(&self) -> &LoanInputs {
        &self.inputs
    }

    pub fn set_field(&mut self, field: LoanField, raw: impl Into<String>) {
        if field == LoanField::AnnualRatePercent {
            self.rate_edited = true;
        }
        self.inputs.set(field, raw);
    }

    pub fn active_tab(&self) -> Tab {
        self.tab
    }

    pub fn select_tab(&mut self, tab: Tab) {
        self.tab = tab;
    }

    pub fn visible_fields(&self) -> &'static [LoanField] {
        self.tab.input_fields()
    }

    pub fn graph_mode(&self) -> GraphMode {
        self.graph_mode
    }

    pub fn set_graph_mode(&mut self, mode: GraphMode) {
        self.graph_mode = mode;
    }

    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    /// Snapshots the inputs and starts an amortization request. The returned
    /// future performs the call; spawn or await it.
    pub fn calculate(&mut self) -> impl Future<Output = ()> + Send + 'static {
        self.before_trigger(RequestKind::Amortization);
        self.amortization
            .trigger(AmortizationRequest::from(&self.inputs))
    }

    pub fn simulate(&mut self) -> impl Future<Output = ()> + Send + 'static {
        self.before_trigger(RequestKind::Simulation);
        self.simulation.trigger(SimulationRequest::from(&self.inputs))
    }

    pub fn compare_payments(&mut self) -> impl Future<Output = ()> + Send + 'static {
        self.before_trigger(RequestKind::PaymentGrid);
        self.payment_grid
            .trigger(PaymentGridRequest::from(&self.inputs))
    }

    fn before_trigger(&mut self, kind: RequestKind) {
        self.advisory = None;
        self.last_triggered = Some(kind);
    }

    pub fn amortization_state(&self) -> RequestState<AmortizationSchedule> {
        self.amortization.state()
    }

    pub fn simulation_state(&self) -> RequestState<MonteCarloResult> {
        self.simulation.state()
    }

    pub fn payment_grid_state(&self) -> RequestState<PaymentGrid> {
        self.payment_grid.state()
    }

    pub fn status(&self, kind: RequestKind) -> &'static str {
        match kind {
            RequestKind::Amortization => self.amortization.read(|state| state.label()),
            RequestKind::Simulation => self.simulation.read(|state| state.label()),
            RequestKind::PaymentGrid => self.payment_grid.read(|state| state.label()),
        }
    }

    pub fn is_loading(&self, kind: RequestKind) -> bool {
        match kind {
            RequestKind::Amortization => self.amortization.is_loading(),
            RequestKind::Simulation => self.simulation.is_loading(),
            RequestKind::PaymentGrid => self.payment_grid.is_loading(),
        }
    }

    /// Failure of the most recently triggered request, else the advisory.
    pub fn error_message(&self) -> Option<String> {
        let failure = match self.last_triggered {
            Some(RequestKind::Amortization) => self.amortization.read(error_of),
            Some(RequestKind::Simulation) => self.simulation.read(error_of),
            Some(RequestKind::PaymentGrid) => self.payment_grid.read(error_of),
            None => None,
        };
        failure.or_else(|| self.advisory.clone())
    }

    /// Chart of the current schedule in the current graph mode; rebuilt only
    /// when either has changed since the last call.
    pub fn calculator_chart(&mut self) -> Option<&ChartProjection> {
        let key = (self.amortization.revision(), self.graph_mode);
        if self.calculator_view.as_ref().map(|view| view.key) != Some(key) {
            let mode = self.graph_mode;
            let projection = self
                .amortization
                .read(|state| state.result().map(|schedule| project(schedule, mode)));
            self.calculator_view = Some(Derived { key, projection });
        }
        self.calculator_view
            .as_ref()
            .and_then(|view| view.projection.as_ref())
    }

    pub fn simulation_chart(&mut self) -> Option<&ChartProjection> {
        let key = self.simulation.revision();
        if self.simulation_view.as_ref().map(|view| view.key) != Some(key) {
            let projection = self
                .simulation
                .read(|state| state.result().map(project_simulation));
            self.simulation_view = Some(Derived { key, projection });
        }
        self.simulation_view
            .as_ref()
            .and_then(|view| view.projection.as_ref())
    }

    pub fn amortization_table(&self) -> TableView {
        self.amortization.read(|state| {
            state
                .result()
                .map(|schedule| tabulate(schedule))
                .unwrap_or_default()
        })
    }

    pub fn can_export(&self) -> bool {
        self.amortization
            .read(|state| state.result().is_some_and(|schedule| !schedule.is_empty()))
    }

    pub fn export_text(&self, delimiter: u8) -> Result<Option<String>, Error> {
        self.amortization.read(|state| match state.result() {
            Some(schedule) => to_delimited_text(schedule, delimiter),
            None => Ok(None),
        })
    }

    pub fn export_to(&self, dir: &Path, delimiter: u8) -> Result<Option<PathBuf>, Error> {
        self.amortization.read(|state| match state.result() {
            Some(schedule) => save_schedule(schedule, dir, delimiter),
            None => Ok(None),
        })
    }
}

fn error_of<T>(state: &RequestState<T>) -> Option<String> {
    state.error().map(str::to_string)
}
