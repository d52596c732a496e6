use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use homebuyer::{
    api::run_http_server,
    client::HttpService,
    config::{Cli, Command, LoanArgs, ServiceConfig, delimiter_byte},
    core::{
        DashboardController, LoanField, MonteCarloResult, RateBootstrap, RateOutcome,
        RequestState,
    },
    error::Error,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_tracing(cli.verbose) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) -> Result<(), Error> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Command::Serve { port } => run_http_server(port, &cli.service).await,
        Command::Rate => {
            let service = HttpService::new(&cli.service)?;
            match RateBootstrap::default().run(&service).await {
                Some(RateOutcome::Suggested(rate)) => println!("{rate:.2}"),
                Some(RateOutcome::Advisory(message)) => println!("{message}"),
                _ => info!("service has no current rate"),
            }
            Ok(())
        }
        Command::Amortize {
            loan,
            graph_mode,
            chart,
            export,
            delimiter,
        } => {
            let delimiter = delimiter_byte(delimiter)?;
            let mut dashboard = dashboard(&cli.service, Some(&loan)).await?;
            dashboard.set_graph_mode(graph_mode.into());
            dashboard.calculate().await;
            if let RequestState::Failed(message) = dashboard.amortization_state() {
                return Err(Error::RequestFailed(message));
            }

            if chart {
                if let Some(projection) = dashboard.calculator_chart() {
                    println!("{}", serde_json::to_string_pretty(projection)?);
                }
            } else {
                let table = dashboard.amortization_table();
                println!("{}", table.headers.join("\t"));
                for row in &table.rows {
                    println!("{}", row.join("\t"));
                }
            }

            if let Some(dir) = export {
                match dashboard.export_to(&dir, delimiter)? {
                    Some(path) => info!("saved {}", path.display()),
                    None => info!("no rows to export"),
                }
            }
            Ok(())
        }
        Command::Simulate {
            property_value,
            term_in_months,
            price_index,
            chart,
        } => {
            let mut dashboard = dashboard(&cli.service, None).await?;
            dashboard.set_field(LoanField::PropertyValue, property_value);
            dashboard.set_field(LoanField::TermInMonths, term_in_months);
            dashboard.set_field(LoanField::PriceIndexKey, price_index);
            dashboard.simulate().await;

            match dashboard.simulation_state() {
                RequestState::Failed(message) => Err(Error::RequestFailed(message)),
                RequestState::Succeeded(result) if !chart => {
                    println!("runs: {}", result.runs.len());
                    match final_period_summary(&result) {
                        Some(summary) => println!("{summary}"),
                        None => info!("simulation returned no periods"),
                    }
                    Ok(())
                }
                _ => {
                    if let Some(projection) = dashboard.simulation_chart() {
                        println!("{}", serde_json::to_string_pretty(projection)?);
                    }
                    Ok(())
                }
            }
        }
        Command::Payments { loan } => {
            let mut dashboard = dashboard(&cli.service, Some(&loan)).await?;
            dashboard.compare_payments().await;
            match dashboard.payment_grid_state() {
                RequestState::Succeeded(grid) => {
                    println!("term\t{}", grid.columns.join("\t"));
                    for row in &grid.rows {
                        let payments: Vec<String> = grid
                            .columns
                            .iter()
                            .map(|column| {
                                row.payments
                                    .get(column)
                                    .map(|payment| format!("{payment:.2}"))
                                    .unwrap_or_default()
                            })
                            .collect();
                        println!("{}\t{}", row.term, payments.join("\t"));
                    }
                    Ok(())
                }
                RequestState::Failed(message) => Err(Error::RequestFailed(message)),
                _ => Ok(()),
            }
        }
    }
}

/// A dashboard with the loan fields from the command line. The market rate
/// is fetched only for loan commands run without `--rate`.
async fn dashboard(
    config: &ServiceConfig,
    loan: Option<&LoanArgs>,
) -> Result<DashboardController<HttpService>, Error> {
    let mut dashboard = DashboardController::new(Arc::new(HttpService::new(config)?));
    let Some(loan) = loan else {
        return Ok(dashboard);
    };

    match &loan.rate {
        Some(rate) => dashboard.set_field(LoanField::AnnualRatePercent, rate.clone()),
        None => {
            dashboard.bootstrap().await;
            if let Some(advisory) = dashboard.advisory() {
                info!("{advisory}");
            }
        }
    }
    dashboard.set_field(LoanField::LoanAmount, loan.loan_amount.clone());
    dashboard.set_field(LoanField::PropertyValue, loan.property_value.clone());
    dashboard.set_field(LoanField::TermInMonths, loan.term_in_months.clone());
    Ok(dashboard)
}

/// Quartiles at the last simulated month, as `month 360: 25th .. median .. 75th ..`.
fn final_period_summary(result: &MonteCarloResult) -> Option<String> {
    let idx = result.periods.len().checked_sub(1)?;
    let at = |values: &[f64]| values.get(idx).map(|v| format!("{v:.0}"));
    Some(format!(
        "month {}: 25th {} median {} 75th {}",
        result.periods[idx],
        at(&result.quantile_25[..])?,
        at(&result.median[..])?,
        at(&result.quantile_75[..])?
    ))
}
