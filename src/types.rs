use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::util::{format_number, format_timestamp};

/// One row of the raw export, exactly as the CSV reader hands it over.
///
/// Every field is optional: an absent column and an empty cell both show up
/// as `None` and get the zero-equivalent default during normalization.
#[derive(Debug, Deserialize)]
pub struct RawRow {
    #[serde(rename = "INCIDENT_NUMBER", alias = "INCIDENT_NUM")]
    pub incident_number: Option<String>,
    #[serde(rename = "OFFENSE_CODE")]
    pub offense_code: Option<String>,
    #[serde(rename = "OFFENSE_CODE_GROUP")]
    pub offense_code_group: Option<String>,
    #[serde(rename = "OFFENSE_DESCRIPTION")]
    pub offense_description: Option<String>,
    #[serde(rename = "DISTRICT")]
    pub district: Option<String>,
    #[serde(rename = "REPORTING_AREA")]
    pub reporting_area: Option<String>,
    #[serde(rename = "STREET")]
    pub street: Option<String>,
    #[serde(rename = "OCCURRED_ON_DATE")]
    pub occurred_on_date: Option<String>,
    #[serde(rename = "YEAR")]
    pub year: Option<String>,
    #[serde(rename = "MONTH")]
    pub month: Option<String>,
    #[serde(rename = "DAY_OF_WEEK")]
    pub day_of_week: Option<String>,
    #[serde(rename = "Long")]
    pub long: Option<String>,
    #[serde(rename = "Lat")]
    pub lat: Option<String>,
}

/// A normalized incident, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct Incident {
    #[tabled(rename = "INCIDENT_NUMBER")]
    pub incident_number: String,
    #[tabled(rename = "OFFENSE_CODE")]
    pub offense_code: i64,
    #[tabled(rename = "OFFENSE_CODE_GROUP")]
    pub offense_code_group: String,
    #[tabled(rename = "OFFENSE_DESCRIPTION")]
    pub offense_description: String,
    #[tabled(rename = "DISTRICT")]
    pub district: String,
    #[tabled(rename = "REPORTING_AREA")]
    pub reporting_area: i64,
    #[tabled(rename = "STREET")]
    pub street: String,
    #[tabled(rename = "OCCURRED_ON_DATE", display_with = "display_timestamp")]
    pub occurred_on: NaiveDateTime,
    #[tabled(rename = "YEAR")]
    pub year: i64,
    #[tabled(rename = "MONTH")]
    pub month: i64,
    #[tabled(rename = "DAY_OF_WEEK")]
    pub day_of_week: String,
    #[tabled(rename = "Long")]
    pub longitude: f64,
    #[tabled(rename = "Lat")]
    pub latitude: f64,
}

fn display_timestamp(ts: &NaiveDateTime) -> String {
    format_timestamp(*ts)
}

fn display_avg(v: &f64) -> String {
    format_number(*v, 2)
}

fn display_pct(v: &f64) -> String {
    format!("{}%", format_number(*v, 2))
}

// Report rows. Serde names are the CSV header; tabled names match them so
// the console preview and the exported file read the same.

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct OffenseCountRow {
    #[serde(rename = "OffenseDescription")]
    #[tabled(rename = "OffenseDescription")]
    pub offense_description: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct StreetHotspotRow {
    #[serde(rename = "Street")]
    #[tabled(rename = "Street")]
    pub street: String,
    #[serde(rename = "Lat")]
    #[tabled(rename = "Lat")]
    pub lat: f64,
    #[serde(rename = "Long")]
    #[tabled(rename = "Long")]
    pub long: f64,
    #[serde(rename = "AvgIncidentsPerMonth")]
    #[tabled(rename = "AvgIncidentsPerMonth", display_with = "display_avg")]
    pub avg_incidents_per_month: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct MonthWeekdayRow {
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: i64,
    #[serde(rename = "DayOfWeek")]
    #[tabled(rename = "DayOfWeek")]
    pub day_of_week: String,
    #[serde(rename = "TotalIncidents")]
    #[tabled(rename = "TotalIncidents")]
    pub total_incidents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct MonthlyTrendRow {
    #[serde(rename = "Month")]
    #[tabled(rename = "Month")]
    pub month: i64,
    #[serde(rename = "TotalIncidents")]
    #[tabled(rename = "TotalIncidents")]
    pub total_incidents: i64,
    #[serde(rename = "PercentageChange")]
    #[tabled(rename = "PercentageChange", display_with = "display_pct")]
    pub percentage_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct YearlyTrendRow {
    #[serde(rename = "Year")]
    #[tabled(rename = "Year")]
    pub year: i64,
    #[serde(rename = "TotalIncidents")]
    #[tabled(rename = "TotalIncidents")]
    pub total_incidents: i64,
    #[serde(rename = "YoYPercentageChange")]
    #[tabled(rename = "YoYPercentageChange", display_with = "display_pct")]
    pub yoy_percentage_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct TimeBandRow {
    #[serde(rename = "TimeRange")]
    #[tabled(rename = "TimeRange")]
    pub time_range: String,
    #[serde(rename = "TotalIncidents")]
    #[tabled(rename = "TotalIncidents")]
    pub total_incidents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct DangerousTimesRow {
    #[serde(rename = "MostDangerousTime")]
    #[tabled(rename = "MostDangerousTime")]
    pub most_dangerous_time: String,
    #[serde(rename = "MostDangerousIncidents")]
    #[tabled(rename = "MostDangerousIncidents")]
    pub most_dangerous_incidents: i64,
    #[serde(rename = "LeastDangerousTime")]
    #[tabled(rename = "LeastDangerousTime")]
    pub least_dangerous_time: String,
    #[serde(rename = "LeastDangerousIncidents")]
    #[tabled(rename = "LeastDangerousIncidents")]
    pub least_dangerous_incidents: i64,
}

/// Frequency of one distinct value, used by the load diagnostics.
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct FrequencyRow {
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Count")]
    pub count: usize,
}

/// Number of blank cells in one source column.
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct MissingCountRow {
    #[tabled(rename = "Column")]
    pub column: String,
    #[tabled(rename = "Missing")]
    pub missing: usize,
}

/// Describe-style summary of one numeric column.
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct ColumnSummaryRow {
    #[tabled(rename = "Column")]
    pub column: String,
    #[tabled(rename = "Count")]
    pub count: usize,
    #[tabled(rename = "Mean", display_with = "display_avg")]
    pub mean: f64,
    #[tabled(rename = "Std", display_with = "display_avg")]
    pub std: f64,
    #[tabled(rename = "Min")]
    pub min: f64,
    #[tabled(rename = "Max")]
    pub max: f64,
}

/// Manifest entry for one exported report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub title: String,
    pub file: String,
    pub rows: usize,
}

#[derive(Debug, Serialize)]
pub struct RunManifest {
    pub database: String,
    pub incidents: usize,
    pub reports: Vec<ReportSummary>,
}
