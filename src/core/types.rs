use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use serde_json::{Map, Number, Value};

pub const CASE_SHILLER_NATIONAL: &str = "S&P CoreLogic Case-Shiller U.S. National Home Price Index";
/// A home-price series the simulation service can sample from, keyed the way
/// the service expects and tagged with its FRED series id.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceIndex {
    pub key: &'static str,
    pub series_id: &'static str,
}

pub const PRICE_INDICES: [PriceIndex; 1] = [PriceIndex {
    key: CASE_SHILLER_NATIONAL,
    series_id: "CSUSHPISA",
}];

/// Raw text of a numeric input field, sent to the service as typed.
///
/// Text that reads as a JSON number goes over the wire as a number; anything
/// else goes as the original string so the service can reject it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InputValue(String);

impl InputValue {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn raw(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.0.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<f64> for InputValue {
    fn from(value: f64) -> Self {
        Self(value.to_string())
    }
}

impl From<u32> for InputValue {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for InputValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match Number::from_str(self.0.trim()) {
            Ok(number) => number.serialize(serializer),
            Err(_) => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for InputValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawInput {
            Number(Number),
            Text(String),
        }

        Ok(match RawInput::deserialize(deserializer)? {
            RawInput::Number(number) => Self(number.to_string()),
            RawInput::Text(text) => Self(text),
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoanField {
    LoanAmount,
    PropertyValue,
    #[serde(alias = "annualRate")]
    AnnualRatePercent,
    TermInMonths,
    PriceIndexKey,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanInputs {
    pub loan_amount: InputValue,
    pub property_value: InputValue,
    pub annual_rate_percent: InputValue,
    pub term_in_months: InputValue,
    pub price_index_key: String,
}

impl LoanInputs {
    pub fn new(
        loan_amount: f64,
        property_value: f64,
        annual_rate_percent: f64,
        term_in_months: u32,
        price_index_key: &str,
    ) -> Self {
        Self {
            loan_amount: loan_amount.into(),
            property_value: property_value.into(),
            annual_rate_percent: annual_rate_percent.into(),
            term_in_months: term_in_months.into(),
            price_index_key: price_index_key.to_string(),
        }
    }

    pub fn set(&mut self, field: LoanField, raw: impl Into<String>) {
        let raw = raw.into();
        match field {
            LoanField::LoanAmount => self.loan_amount = raw.into(),
            LoanField::PropertyValue => self.property_value = raw.into(),
            LoanField::AnnualRatePercent => self.annual_rate_percent = raw.into(),
            LoanField::TermInMonths => self.term_in_months = raw.into(),
            LoanField::PriceIndexKey => self.price_index_key = raw,
        }
    }
}

impl Default for LoanInputs {
    fn default() -> Self {
        Self {
            loan_amount: 500_000.0_f64.into(),
            property_value: 600_000.0_f64.into(),
            annual_rate_percent: InputValue::default(),
            term_in_months: 360_u32.into(),
            price_index_key: CASE_SHILLER_NATIONAL.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmortizationRequest {
    pub loan_amount: InputValue,
    pub property_value: InputValue,
    pub annual_rate: InputValue,
    pub term_in_months: InputValue,
}

impl From<&LoanInputs> for AmortizationRequest {
    fn from(inputs: &LoanInputs) -> Self {
        Self {
            loan_amount: inputs.loan_amount.clone(),
            property_value: inputs.property_value.clone(),
            annual_rate: inputs.annual_rate_percent.clone(),
            term_in_months: inputs.term_in_months.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    pub property_value: InputValue,
    pub term_in_months: InputValue,
    pub price_index_key: String,
}

impl From<&LoanInputs> for SimulationRequest {
    fn from(inputs: &LoanInputs) -> Self {
        Self {
            property_value: inputs.property_value.clone(),
            term_in_months: inputs.term_in_months.clone(),
            price_index_key: inputs.price_index_key.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentGridRequest {
    pub loan_amount: InputValue,
    pub annual_rate: InputValue,
    pub term_in_months: InputValue,
}

impl From<&LoanInputs> for PaymentGridRequest {
    fn from(inputs: &LoanInputs) -> Self {
        Self {
            loan_amount: inputs.loan_amount.clone(),
            annual_rate: inputs.annual_rate_percent.clone(),
            term_in_months: inputs.term_in_months.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmortizationRow {
    pub period: u32,
    pub beginning_principal: f64,
    #[serde(alias = "interest_to_pay")]
    pub interest_paid: f64,
    #[serde(alias = "principal_payment")]
    pub principal_paid: f64,
    pub ending_principal: f64,
    pub equity: f64,
}

impl AmortizationRow {
    pub const FIELDS: [&'static str; 6] = [
        "period",
        "beginning_principal",
        "interest_paid",
        "principal_paid",
        "ending_principal",
        "equity",
    ];

    /// Field values in `FIELDS` order, stringified as received.
    pub fn values(&self) -> [String; 6] {
        [
            self.period.to_string(),
            self.beginning_principal.to_string(),
            self.interest_paid.to_string(),
            self.principal_paid.to_string(),
            self.ending_principal.to_string(),
            self.equity.to_string(),
        ]
    }
}

pub type AmortizationSchedule = Vec<AmortizationRow>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub periods: Vec<u32>,
    pub runs: SimulationRuns,
    pub median: Vec<f64>,
    pub quantile_25: Vec<f64>,
    pub quantile_75: Vec<f64>,
}

/// Simulated value paths keyed by run id, in the order the service sent them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimulationRuns(Vec<(String, Vec<f64>)>);

impl SimulationRuns {
    pub fn new(runs: Vec<(String, Vec<f64>)>) -> Self {
        Self(runs)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.0.iter().map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SimulationRuns {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(key, values)| (key, values)))
    }
}

impl<'de> Deserialize<'de> for SimulationRuns {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        map.into_iter()
            .map(|(key, values)| {
                serde_json::from_value::<Vec<f64>>(values)
                    .map(|values| (key, values))
                    .map_err(D::Error::custom)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentGrid {
    pub columns: Vec<String>,
    #[serde(rename = "data")]
    pub rows: Vec<PaymentGridRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentGridRow {
    pub term: u32,
    #[serde(flatten)]
    pub payments: BTreeMap<String, f64>,
}

impl PaymentGrid {
    pub fn payment(&self, term: u32, column: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| row.term == term)
            .and_then(|row| row.payments.get(column).copied())
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GraphMode {
    #[default]
    #[serde(alias = "bar", alias = "Bar Graph", alias = "stackedBar")]
    StackedBar,
    #[serde(alias = "Line Graph")]
    Line,
    #[serde(alias = "area", alias = "stackedArea")]
    StackedArea,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Calculator,
    Simulation,
    #[serde(alias = "FAQ")]
    Faq,
}

impl Tab {
    pub fn input_fields(self) -> &'static [LoanField] {
        match self {
            Tab::Calculator => &[
                LoanField::LoanAmount,
                LoanField::PropertyValue,
                LoanField::AnnualRatePercent,
                LoanField::TermInMonths,
            ],
            Tab::Simulation => &[
                LoanField::PropertyValue,
                LoanField::TermInMonths,
                LoanField::PriceIndexKey,
            ],
            Tab::Faq => &[],
        }
    }
}
