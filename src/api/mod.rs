use axum::{
    Router,
    extract::{Json, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::info;

use crate::{
    client::{HttpService, RemoteService},
    config::ServiceConfig,
    core::{
        ChartProjection, DEFAULT_DELIMITER, DashboardController, EXPORT_FILE_NAME, GraphMode,
        InputValue, LoanField, LoanInputs, PRICE_INDICES, PriceIndex, RequestKind, TableView,
        Tab, amortization_layout, simulation_layout,
    },
    error::Error,
};

pub struct AppState<S: RemoteService> {
    dashboard: Arc<Mutex<DashboardController<S>>>,
}

impl<S: RemoteService> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            dashboard: Arc::clone(&self.dashboard),
        }
    }
}

impl<S: RemoteService> AppState<S> {
    pub fn new(dashboard: DashboardController<S>) -> Self {
        Self {
            dashboard: Arc::new(Mutex::new(dashboard)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DashboardController<S>> {
        self.dashboard.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct InputsPayload {
    loan_amount: Option<InputValue>,
    property_value: Option<InputValue>,
    #[serde(alias = "annualRate")]
    annual_rate_percent: Option<InputValue>,
    term_in_months: Option<InputValue>,
    price_index_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TabPayload {
    tab: Tab,
}

#[derive(Debug, Deserialize)]
struct GraphModePayload {
    mode: GraphMode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardResponse<'a> {
    inputs: &'a LoanInputs,
    tab: Tab,
    graph_mode: GraphMode,
    visible_fields: &'static [LoanField],
    price_indices: &'static [PriceIndex],
    amortization: &'static str,
    simulation: &'static str,
    payment_grid: &'static str,
    error: Option<String>,
    advisory: Option<&'a str>,
    can_export: bool,
}

#[derive(Debug, Serialize)]
struct TriggerResponse {
    request: RequestKind,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct AmortizationResponse {
    status: &'static str,
    error: Option<String>,
    table: TableView,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn run_http_server(port: u16, config: &ServiceConfig) -> Result<(), Error> {
    let service = Arc::new(HttpService::new(config)?);
    let state = AppState::new(DashboardController::new(service));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("dashboard listening on http://{addr}, service at {}", config.base_url());
    info!("local access: http://127.0.0.1:{port}/dashboard");

    spawn_rate_bootstrap(&state);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Fetches the market rate in the background and applies it under the lock
/// once it arrives. The dashboard is served in the meantime.
pub fn spawn_rate_bootstrap<S: RemoteService>(state: &AppState<S>) -> JoinHandle<()> {
    let pending = state.lock().fetch_rate();
    let state = state.clone();
    tokio::spawn(async move {
        if let Some(outcome) = pending.await {
            state.lock().apply_rate(outcome);
        }
    })
}

pub fn router<S: RemoteService>(state: AppState<S>) -> Router {
    Router::new()
        .route("/dashboard", get(dashboard_handler::<S>))
        .route("/dashboard/inputs", post(inputs_handler::<S>))
        .route("/dashboard/tab", post(tab_handler::<S>))
        .route("/dashboard/graph-mode", post(graph_mode_handler::<S>))
        .route(
            "/dashboard/amortization",
            get(amortization_handler::<S>).post(calculate_handler::<S>),
        )
        .route("/dashboard/simulation", post(simulate_handler::<S>))
        .route(
            "/dashboard/payment-grid",
            get(payment_grid_handler::<S>).post(compare_payments_handler::<S>),
        )
        .route(
            "/dashboard/charts/amortization",
            get(amortization_chart_handler::<S>),
        )
        .route(
            "/dashboard/charts/simulation",
            get(simulation_chart_handler::<S>),
        )
        .route("/dashboard/export", get(export_handler::<S>))
        .fallback(not_found_handler)
        .with_state(state)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn dashboard_handler<S: RemoteService>(State(state): State<AppState<S>>) -> Response {
    let dashboard = state.lock();
    dashboard_response(&dashboard)
}

async fn inputs_handler<S: RemoteService>(
    State(state): State<AppState<S>>,
    Json(payload): Json<InputsPayload>,
) -> Response {
    let mut dashboard = state.lock();
    let fields = [
        (LoanField::LoanAmount, payload.loan_amount),
        (LoanField::PropertyValue, payload.property_value),
        (LoanField::AnnualRatePercent, payload.annual_rate_percent),
        (LoanField::TermInMonths, payload.term_in_months),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            dashboard.set_field(field, value.raw());
        }
    }
    if let Some(key) = payload.price_index_key {
        dashboard.set_field(LoanField::PriceIndexKey, key);
    }
    dashboard_response(&dashboard)
}

async fn tab_handler<S: RemoteService>(
    State(state): State<AppState<S>>,
    Json(payload): Json<TabPayload>,
) -> Response {
    let mut dashboard = state.lock();
    dashboard.select_tab(payload.tab);
    dashboard_response(&dashboard)
}

async fn graph_mode_handler<S: RemoteService>(
    State(state): State<AppState<S>>,
    Json(payload): Json<GraphModePayload>,
) -> Response {
    let mut dashboard = state.lock();
    dashboard.set_graph_mode(payload.mode);
    dashboard_response(&dashboard)
}

async fn calculate_handler<S: RemoteService>(State(state): State<AppState<S>>) -> Response {
    let pending = state.lock().calculate();
    tokio::spawn(pending);
    trigger_response(RequestKind::Amortization)
}

async fn simulate_handler<S: RemoteService>(State(state): State<AppState<S>>) -> Response {
    let pending = state.lock().simulate();
    tokio::spawn(pending);
    trigger_response(RequestKind::Simulation)
}

async fn compare_payments_handler<S: RemoteService>(
    State(state): State<AppState<S>>,
) -> Response {
    let pending = state.lock().compare_payments();
    tokio::spawn(pending);
    trigger_response(RequestKind::PaymentGrid)
}

async fn amortization_handler<S: RemoteService>(State(state): State<AppState<S>>) -> Response {
    let dashboard = state.lock();
    let body = AmortizationResponse {
        status: dashboard.status(RequestKind::Amortization),
        error: dashboard.amortization_state().error().map(str::to_string),
        table: dashboard.amortization_table(),
    };
    json_response(StatusCode::OK, body)
}

async fn payment_grid_handler<S: RemoteService>(State(state): State<AppState<S>>) -> Response {
    let dashboard = state.lock();
    json_response(StatusCode::OK, dashboard.payment_grid_state())
}

async fn amortization_chart_handler<S: RemoteService>(
    State(state): State<AppState<S>>,
) -> Response {
    let mut dashboard = state.lock();
    let mode = dashboard.graph_mode();
    let chart = dashboard
        .calculator_chart()
        .cloned()
        .unwrap_or_else(|| ChartProjection::blank(amortization_layout(mode)));
    json_response(StatusCode::OK, chart)
}

async fn simulation_chart_handler<S: RemoteService>(
    State(state): State<AppState<S>>,
) -> Response {
    let mut dashboard = state.lock();
    let chart = dashboard
        .simulation_chart()
        .cloned()
        .unwrap_or_else(|| ChartProjection::blank(simulation_layout()));
    json_response(StatusCode::OK, chart)
}

async fn export_handler<S: RemoteService>(State(state): State<AppState<S>>) -> Response {
    let exported = state.lock().export_text(DEFAULT_DELIMITER);
    match exported {
        Ok(Some(text)) => with_cache_control((
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
                ),
            ],
            text,
        )),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "No amortization schedule to export"),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

fn dashboard_response<S: RemoteService>(dashboard: &DashboardController<S>) -> Response {
    json_response(
        StatusCode::OK,
        DashboardResponse {
            inputs: dashboard.inputs(),
            tab: dashboard.active_tab(),
            graph_mode: dashboard.graph_mode(),
            visible_fields: dashboard.visible_fields(),
            price_indices: &PRICE_INDICES,
            amortization: dashboard.status(RequestKind::Amortization),
            simulation: dashboard.status(RequestKind::Simulation),
            payment_grid: dashboard.status(RequestKind::PaymentGrid),
            error: dashboard.error_message(),
            advisory: dashboard.advisory(),
            can_export: dashboard.can_export(),
        },
    )
}

fn trigger_response(request: RequestKind) -> Response {
    json_response(
        StatusCode::ACCEPTED,
        TriggerResponse {
            request,
            status: "loading",
        },
    )
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CASE_SHILLER_NATIONAL, testing::ScriptedService};
    use serde_json::{Value, json};
    use std::time::Duration;

    async fn spawn_dashboard(service: ScriptedService) -> String {
        let mut dashboard = DashboardController::new(Arc::new(service));
        dashboard.bootstrap().await;

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let app = router(AppState::new(dashboard));
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        format!("http://{addr}")
    }

    async fn spawn_with_background_rate(service: ScriptedService) -> (String, JoinHandle<()>) {
        let state = AppState::new(DashboardController::new(Arc::new(service)));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let bootstrap = spawn_rate_bootstrap(&state);
        let app = router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        (format!("http://{addr}"), bootstrap)
    }

    async fn wait_until_settled(client: &reqwest::Client, base: &str, key: &str) -> Value {
        for _ in 0..50 {
            let snapshot: Value = client
                .get(format!("{base}/dashboard"))
                .send()
                .await
                .expect("get")
                .json()
                .await
                .expect("json");
            if snapshot[key] != "loading" {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{key} request never settled");
    }

    #[tokio::test]
    async fn snapshot_shows_bootstrapped_rate_and_defaults() {
        let base = spawn_dashboard(ScriptedService::with_rate(6.875)).await;
        let response = reqwest::get(format!("{base}/dashboard")).await.expect("get");
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).map(|v| v.as_bytes()),
            Some(&b"no-store"[..])
        );

        let body: Value = response.json().await.expect("json");
        assert_eq!(body["inputs"]["annualRatePercent"], 6.88);
        assert_eq!(body["inputs"]["loanAmount"], 500000);
        assert_eq!(body["tab"], "calculator");
        assert_eq!(body["graphMode"], "stacked-bar");
        assert_eq!(body["amortization"], "idle");
        assert_eq!(body["canExport"], false);
        assert_eq!(body["advisory"], Value::Null);
    }

    #[tokio::test]
    async fn dashboard_is_usable_while_rate_fetch_is_pending() {
        let (service, gate) = ScriptedService::gated_rate(6.5);
        let (base, bootstrap) = spawn_with_background_rate(service).await;
        let client = reqwest::Client::new();

        let body: Value = client
            .get(format!("{base}/dashboard"))
            .send()
            .await
            .expect("get")
            .json()
            .await
            .expect("json");
        assert_eq!(body["inputs"]["annualRatePercent"], "");
        assert_eq!(
            body["priceIndices"],
            json!([{"key": CASE_SHILLER_NATIONAL, "seriesId": "CSUSHPISA"}])
        );

        let response = client
            .post(format!("{base}/dashboard/amortization"))
            .send()
            .await
            .expect("trigger");
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
        assert!(!bootstrap.is_finished());

        gate.notify_one();
        bootstrap.await.expect("bootstrap task");
        let body: Value = client
            .get(format!("{base}/dashboard"))
            .send()
            .await
            .expect("get")
            .json()
            .await
            .expect("json");
        assert_eq!(body["inputs"]["annualRatePercent"], 6.5);
    }

    #[tokio::test]
    async fn rate_typed_before_fetch_completes_is_kept() {
        let (service, gate) = ScriptedService::gated_rate(6.5);
        let (base, bootstrap) = spawn_with_background_rate(service).await;
        let client = reqwest::Client::new();

        client
            .post(format!("{base}/dashboard/inputs"))
            .json(&json!({"annualRatePercent": "7.25"}))
            .send()
            .await
            .expect("post inputs");
        gate.notify_one();
        bootstrap.await.expect("bootstrap task");

        let body: Value = client
            .get(format!("{base}/dashboard"))
            .send()
            .await
            .expect("get")
            .json()
            .await
            .expect("json");
        assert_eq!(body["inputs"]["annualRatePercent"], 7.25);
    }

    #[tokio::test]
    async fn failed_bootstrap_reports_advisory() {
        let base = spawn_dashboard(ScriptedService::failing_rate()).await;
        let body: Value = reqwest::get(format!("{base}/dashboard"))
            .await
            .expect("get")
            .json()
            .await
            .expect("json");
        assert_eq!(
            body["advisory"],
            "Could not fetch the current interest rate from the server."
        );
        assert_eq!(body["inputs"]["annualRatePercent"], "");
    }

    #[tokio::test]
    async fn calculate_then_chart_table_and_export() {
        let base = spawn_dashboard(ScriptedService::with_rate(6.5)).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/dashboard/inputs"))
            .json(&json!({"termInMonths": "4", "loanAmount": 1000, "propertyValue": 1500}))
            .send()
            .await
            .expect("post inputs");
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let response = client
            .post(format!("{base}/dashboard/amortization"))
            .send()
            .await
            .expect("trigger");
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

        let snapshot = wait_until_settled(&client, &base, "amortization").await;
        assert_eq!(snapshot["amortization"], "succeeded");
        assert_eq!(snapshot["canExport"], true);

        let chart: Value = client
            .get(format!("{base}/dashboard/charts/amortization"))
            .send()
            .await
            .expect("chart")
            .json()
            .await
            .expect("json");
        assert_eq!(chart["series"][0]["name"], "Equity");
        assert_eq!(chart["series"][1]["y"][0], 800.0);
        assert_eq!(chart["series"][0]["type"], "bar");

        client
            .post(format!("{base}/dashboard/graph-mode"))
            .json(&json!({"mode": "line"}))
            .send()
            .await
            .expect("mode");
        let chart: Value = client
            .get(format!("{base}/dashboard/charts/amortization"))
            .send()
            .await
            .expect("chart")
            .json()
            .await
            .expect("json");
        assert_eq!(chart["series"][0]["type"], "scatter");
        assert_eq!(chart["series"][1]["y"][0], 800.0);

        let table: Value = client
            .get(format!("{base}/dashboard/amortization"))
            .send()
            .await
            .expect("table")
            .json()
            .await
            .expect("json");
        assert_eq!(table["table"]["headers"][4], "Ending Principal");
        assert_eq!(table["table"]["rows"].as_array().map(Vec::len), Some(4));

        let export = client
            .get(format!("{base}/dashboard/export"))
            .send()
            .await
            .expect("export");
        assert_eq!(
            export
                .headers()
                .get(header::CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok()),
            Some("attachment; filename=\"amortization_schedule.csv\"")
        );
        let text = export.text().await.expect("text");
        assert!(text.starts_with("period,beginning_principal,"));
        assert_eq!(text.lines().count(), 5);
    }

    #[tokio::test]
    async fn export_without_schedule_is_not_found() {
        let base = spawn_dashboard(ScriptedService::with_rate(6.5)).await;
        let response = reqwest::get(format!("{base}/dashboard/export"))
            .await
            .expect("get");
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        let body: Value = response.json().await.expect("json");
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn empty_charts_before_any_result() {
        let base = spawn_dashboard(ScriptedService::with_rate(6.5)).await;
        let chart: Value = reqwest::get(format!("{base}/dashboard/charts/simulation"))
            .await
            .expect("get")
            .json()
            .await
            .expect("json");
        assert_eq!(chart["series"], json!([]));
        assert_eq!(chart["layout"]["xaxis_title"], "Months");
    }

    #[tokio::test]
    async fn tab_selection_changes_visible_fields() {
        let base = spawn_dashboard(ScriptedService::with_rate(6.5)).await;
        let client = reqwest::Client::new();
        let body: Value = client
            .post(format!("{base}/dashboard/tab"))
            .json(&json!({"tab": "simulation"}))
            .send()
            .await
            .expect("tab")
            .json()
            .await
            .expect("json");
        assert_eq!(body["tab"], "simulation");
        assert_eq!(
            body["visibleFields"],
            json!(["propertyValue", "termInMonths", "priceIndexKey"])
        );
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let base = spawn_dashboard(ScriptedService::with_rate(6.5)).await;
        let response = reqwest::get(format!("{base}/nope")).await.expect("get");
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        let body: Value = response.json().await.expect("json");
        assert_eq!(body["error"], "Not found");
    }
}
