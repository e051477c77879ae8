use crate::error::LoadError;
use crate::types::{ColumnSummaryRow, FrequencyRow, Incident, MissingCountRow, RawRow};
use crate::util::{average, epoch, non_blank, parse_f64_safe, parse_i64_safe, parse_timestamp, std_dev};
use csv::{ReaderBuilder, StringRecord};
use encoding_rs::Encoding;
use std::collections::HashMap;
use std::path::Path;

/// Columns the report queries depend on; a header without any of them is
/// rejected before a single row is read.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "OFFENSE_DESCRIPTION",
    "DISTRICT",
    "STREET",
    "OCCURRED_ON_DATE",
    "YEAR",
    "MONTH",
    "DAY_OF_WEEK",
    "Long",
    "Lat",
];

/// Diagnostics gathered while normalizing. Printed, never persisted.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub total_rows: usize,
    pub columns: Vec<String>,
    pub missing: Vec<MissingCountRow>,
    pub invalid_numbers: usize,
    pub offense_counts: Vec<FrequencyRow>,
    pub weekday_counts: Vec<FrequencyRow>,
    pub numeric_summary: Vec<ColumnSummaryRow>,
}

pub fn load(path: &Path, encoding: &str) -> Result<(Vec<Incident>, LoadReport), LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("read {} bytes from {}", bytes.len(), path.display());
    load_bytes(&bytes, encoding)
}

/// Decode, validate and normalize an in-memory export.
pub fn load_bytes(bytes: &[u8], encoding: &str) -> Result<(Vec<Incident>, LoadReport), LoadError> {
    let encoding = Encoding::for_label(encoding.trim().as_bytes())
        .ok_or_else(|| LoadError::UnknownEncoding(encoding.to_string()))?;
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        log::warn!("input contained bytes not valid in {}; replaced", encoding.name());
    }

    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: StringRecord = rdr.headers()?.iter().map(str::trim).collect();
    let missing_columns: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h == **c))
        .map(|c| c.to_string())
        .collect();
    if !missing_columns.is_empty() {
        return Err(LoadError::MissingColumns(missing_columns));
    }

    let mut incidents: Vec<Incident> = Vec::new();
    let mut missing = vec![0usize; headers.len()];
    let mut invalid_numbers = 0usize;

    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: RawRow = record.deserialize(Some(&headers))?;

        // A short row's absent trailing fields count as blank.
        for (idx, slot) in missing.iter_mut().enumerate() {
            if non_blank(record.get(idx)).is_none() {
                *slot += 1;
            }
        }

        let mut int_cell = |cell: Option<&str>| match non_blank(cell) {
            None => 0,
            Some(s) => parse_i64_safe(Some(s)).unwrap_or_else(|| {
                invalid_numbers += 1;
                0
            }),
        };
        let offense_code = int_cell(row.offense_code.as_deref());
        let reporting_area = int_cell(row.reporting_area.as_deref());
        let year = int_cell(row.year.as_deref());
        let month = int_cell(row.month.as_deref());

        let mut real_cell = |cell: Option<&str>| match non_blank(cell) {
            None => 0.0,
            Some(s) => parse_f64_safe(Some(s)).unwrap_or_else(|| {
                invalid_numbers += 1;
                0.0
            }),
        };
        let longitude = real_cell(row.long.as_deref());
        let latitude = real_cell(row.lat.as_deref());

        let occurred_on = match non_blank(row.occurred_on_date.as_deref()) {
            None => epoch(),
            Some(s) => parse_timestamp(s).ok_or_else(|| LoadError::InvalidDate {
                line,
                value: s.to_string(),
            })?,
        };

        let owned = |cell: Option<String>| cell.map(|s| s.trim().to_string()).unwrap_or_default();
        incidents.push(Incident {
            incident_number: owned(row.incident_number),
            offense_code,
            offense_code_group: owned(row.offense_code_group),
            offense_description: owned(row.offense_description),
            district: owned(row.district),
            reporting_area,
            street: owned(row.street),
            occurred_on,
            year,
            month,
            day_of_week: owned(row.day_of_week),
            longitude,
            latitude,
        });
    }

    let filled: usize = missing.iter().sum();
    if filled > 0 || invalid_numbers > 0 {
        log::warn!(
            "defaulted {} blank and {} unparseable numeric cells",
            filled,
            invalid_numbers
        );
    }

    let missing_rows: Vec<MissingCountRow> = headers
        .iter()
        .zip(missing)
        .map(|(column, missing)| MissingCountRow {
            column: column.to_string(),
            missing,
        })
        .collect();

    let report = LoadReport {
        total_rows: incidents.len(),
        columns: headers.iter().map(str::to_string).collect(),
        missing: missing_rows,
        invalid_numbers,
        offense_counts: frequencies(incidents.iter().map(|i| i.offense_description.as_str())),
        weekday_counts: frequencies(incidents.iter().map(|i| i.day_of_week.as_str())),
        numeric_summary: describe(&incidents),
    };
    Ok((incidents, report))
}

/// Distinct values with their counts, most frequent first.
pub fn frequencies<'a>(values: impl Iterator<Item = &'a str>) -> Vec<FrequencyRow> {
    let mut map: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *map.entry(v).or_insert(0) += 1;
    }
    let mut rows: Vec<FrequencyRow> = map
        .into_iter()
        .map(|(value, count)| FrequencyRow {
            value: value.to_string(),
            count,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    rows
}

fn describe(incidents: &[Incident]) -> Vec<ColumnSummaryRow> {
    let columns: [(&str, fn(&Incident) -> f64); 6] = [
        ("OFFENSE_CODE", |i| i.offense_code as f64),
        ("REPORTING_AREA", |i| i.reporting_area as f64),
        ("YEAR", |i| i.year as f64),
        ("MONTH", |i| i.month as f64),
        ("Lat", |i| i.latitude),
        ("Long", |i| i.longitude),
    ];
    columns
        .iter()
        .map(|(name, get)| {
            let values: Vec<f64> = incidents.iter().map(get).collect();
            let (min, max) = if values.is_empty() {
                (0.0, 0.0)
            } else {
                values
                    .iter()
                    .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
            };
            ColumnSummaryRow {
                column: name.to_string(),
                count: values.len(),
                mean: average(&values),
                std: std_dev(&values),
                min,
                max,
            }
        })
        .collect()
}
