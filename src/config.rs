use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{core::GraphMode, error::Error};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    #[arg(
        long,
        env = "HOMEBUYER_API_URL",
        default_value = DEFAULT_API_URL,
        help = "Base URL of the amortization and simulation service"
    )]
    pub api_url: String,
    #[arg(
        long,
        env = "HOMEBUYER_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        help = "Seconds before a request to the service is abandoned"
    )]
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), Error> {
        let url = self.api_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::ConfigurationError(format!(
                "--api-url must start with http:// or https://, got {url:?}"
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::ConfigurationError(
                "--timeout-secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.api_url.trim().trim_end_matches('/')
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliGraphMode {
    StackedBar,
    Line,
    StackedArea,
}

impl From<CliGraphMode> for GraphMode {
    fn from(value: CliGraphMode) -> Self {
        match value {
            CliGraphMode::StackedBar => GraphMode::StackedBar,
            CliGraphMode::Line => GraphMode::Line,
            CliGraphMode::StackedArea => GraphMode::StackedArea,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "homebuyer",
    about = "Home purchase dashboard: mortgage amortization and Monte Carlo property value projections"
)]
pub struct Cli {
    #[command(flatten)]
    pub service: ServiceConfig,
    #[arg(long, global = true, help = "Log at debug level")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the dashboard over HTTP
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Fetch the current market rate once
    Rate,
    /// Request an amortization schedule
    Amortize {
        #[command(flatten)]
        loan: LoanArgs,
        #[arg(long, value_enum, default_value_t = CliGraphMode::StackedBar)]
        graph_mode: CliGraphMode,
        #[arg(long, help = "Print the chart series as JSON instead of the table")]
        chart: bool,
        #[arg(long, help = "Directory to save amortization_schedule.csv into")]
        export: Option<std::path::PathBuf>,
        #[arg(long, default_value_t = ',')]
        delimiter: char,
    },
    /// Run a Monte Carlo projection of the property value
    Simulate {
        #[arg(long, default_value = "600000")]
        property_value: String,
        #[arg(long, default_value = "360")]
        term_in_months: String,
        #[arg(long, default_value = crate::core::CASE_SHILLER_NATIONAL)]
        price_index: String,
        #[arg(long, help = "Print the chart series as JSON instead of the summary")]
        chart: bool,
    },
    /// Compare monthly payments across nearby rates and terms
    Payments {
        #[command(flatten)]
        loan: LoanArgs,
    },
}

/// Loan fields as typed; they reach the service without validation.
#[derive(Args, Debug, Clone)]
pub struct LoanArgs {
    #[arg(long, default_value = "500000")]
    pub loan_amount: String,
    #[arg(long, default_value = "600000")]
    pub property_value: String,
    #[arg(
        long,
        help = "Annual rate in percent, e.g. 6.5; defaults to the current market rate"
    )]
    pub rate: Option<String>,
    #[arg(long, default_value = "360")]
    pub term_in_months: String,
}

/// Byte form of `--delimiter`. Quotes and line breaks are refused since the
/// exported text would no longer split back into the same fields.
pub fn delimiter_byte(delimiter: char) -> Result<u8, Error> {
    u8::try_from(delimiter)
        .ok()
        .filter(|byte| byte.is_ascii() && !matches!(*byte, b'"' | b'\n' | b'\r'))
        .ok_or_else(|| {
            Error::ConfigurationError(format!(
                "--delimiter must be a single ASCII character other than a quote or line break, got {delimiter:?}"
            ))
        })
}
