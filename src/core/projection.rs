use serde::Serialize;

use super::types::{AmortizationRow, GraphMode, MonteCarloResult};

pub const EQUITY: &str = "Equity";
pub const REMAINING_DEBT: &str = "Remaining Debt";
pub const QUANTILE_25: &str = "25th Percentile";
pub const MEDIAN: &str = "Median";
pub const QUANTILE_75: &str = "75th Percentile";

const RUN_COLOR: &str = "rgba(128, 128, 128, 0.35)";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Bar,
    Scatter,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineStyle {
    pub width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash: Option<&'static str>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub x: Vec<u32>,
    pub y: Vec<f64>,
    #[serde(rename = "type")]
    pub mark: Mark,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    #[serde(rename = "showlegend")]
    pub show_legend: bool,
    #[serde(rename = "stackgroup", skip_serializing_if = "Option::is_none")]
    pub stack_group: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<LineStyle>,
}

impl Series {
    fn line(name: String, x: Vec<u32>, y: Vec<f64>) -> Self {
        Self {
            name,
            x,
            y,
            mark: Mark::Scatter,
            mode: Some("lines"),
            show_legend: true,
            stack_group: None,
            fill: None,
            line: None,
        }
    }

    pub fn y_at(&self, x: u32) -> Option<f64> {
        self.x
            .iter()
            .position(|period| *period == x)
            .and_then(|idx| self.y.get(idx).copied())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Layout {
    pub title: &'static str,
    pub xaxis_title: &'static str,
    pub yaxis_title: &'static str,
    pub hovermode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barmode: Option<&'static str>,
    #[serde(rename = "showlegend")]
    pub show_legend: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartProjection {
    pub series: Vec<Series>,
    pub layout: Layout,
}

impl ChartProjection {
    pub fn blank(layout: Layout) -> Self {
        Self {
            series: Vec::new(),
            layout,
        }
    }

    pub fn series(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|series| series.name == name)
    }
}

pub fn amortization_layout(mode: GraphMode) -> Layout {
    Layout {
        title: "Mortgage amortization and equity assuming constant property value over time",
        xaxis_title: "Periods",
        yaxis_title: "Dollars",
        hovermode: "x",
        barmode: matches!(mode, GraphMode::StackedBar).then_some("stack"),
        show_legend: true,
    }
}

pub fn simulation_layout() -> Layout {
    Layout {
        title: "Monte Carlo simulation of property value",
        xaxis_title: "Months",
        yaxis_title: "Property Value ($)",
        hovermode: "x",
        barmode: None,
        show_legend: true,
    }
}

/// Equity and remaining debt per period. The mode only changes rendering
/// hints; x and y values are the same for every mode.
pub fn project(schedule: &[AmortizationRow], mode: GraphMode) -> ChartProjection {
    let periods: Vec<u32> = schedule.iter().map(|row| row.period).collect();
    let equity = schedule.iter().map(|row| row.equity).collect();
    let debt = schedule.iter().map(|row| row.ending_principal).collect();

    ChartProjection {
        series: vec![
            amortization_series(EQUITY, periods.clone(), equity, mode),
            amortization_series(REMAINING_DEBT, periods, debt, mode),
        ],
        layout: amortization_layout(mode),
    }
}

fn amortization_series(name: &str, x: Vec<u32>, y: Vec<f64>, mode: GraphMode) -> Series {
    let series = Series::line(name.to_string(), x, y);
    match mode {
        GraphMode::StackedBar => Series {
            mark: Mark::Bar,
            mode: None,
            ..series
        },
        GraphMode::Line => series,
        GraphMode::StackedArea => Series {
            stack_group: Some("one"),
            fill: Some("tonexty"),
            ..series
        },
    }
}

/// One faint unlabelled line per run, then the quartile band and median.
pub fn project_simulation(result: &MonteCarloResult) -> ChartProjection {
    let mut series: Vec<Series> = result
        .runs
        .iter()
        .map(|(key, values)| Series {
            show_legend: false,
            line: Some(LineStyle {
                width: 1.0,
                color: Some(RUN_COLOR),
                dash: None,
            }),
            ..Series::line(format!("Run {key}"), result.periods.clone(), values.to_vec())
        })
        .collect();

    for (name, values, dash) in [
        (QUANTILE_25, &result.quantile_25, Some("dash")),
        (MEDIAN, &result.median, None),
        (QUANTILE_75, &result.quantile_75, Some("dash")),
    ] {
        series.push(Series {
            line: Some(LineStyle {
                width: 3.0,
                color: None,
                dash,
            }),
            ..Series::line(name.to_string(), result.periods.clone(), values.clone())
        });
    }

    ChartProjection {
        series,
        layout: simulation_layout(),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TableView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn tabulate(schedule: &[AmortizationRow]) -> TableView {
    if schedule.is_empty() {
        return TableView::default();
    }

    TableView {
        headers: AmortizationRow::FIELDS
            .iter()
            .map(|field| display_name(field))
            .collect(),
        rows: schedule.iter().map(|row| row.values().to_vec()).collect(),
    }
}

/// "ending_principal" -> "Ending Principal".
pub fn display_name(field: &str) -> String {
    field
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
