use crate::error::ReportError;
use crate::loader::LoadReport;
use crate::types::Incident;
use crate::util::format_int;
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

/// Write `rows` as CSV with the row type's column header.
///
/// The header is written up front so an empty report still names its
/// columns.
pub fn write_csv<T>(path: &Path, rows: &[T]) -> Result<(), ReportError>
where
    T: Serialize + Tabled,
{
    let write_err = |source: csv::Error| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(write_err)?;
    let headers = T::headers();
    wtr.write_record(headers.iter().map(|h| h.as_bytes()))
        .map_err(write_err)?;
    for r in rows {
        wtr.serialize(r).map_err(write_err)?;
    }
    wtr.flush().map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

pub fn preview_table<T>(report_no: usize, title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\nQuery {}: {}", report_no, title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    preview_table_rows(rows, max_rows);
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    if rows.len() > max_rows {
        println!("{}\n... {} more rows\n", table_str, format_int(rows.len() - max_rows));
    } else {
        println!("{}\n", table_str);
    }
}

/// Print the load diagnostics the way an analyst would eyeball a fresh
/// dataframe: head, columns, blanks, describe, then the two frequencies.
pub fn print_load_report(incidents: &[Incident], report: &LoadReport, max_rows: usize) {
    println!(
        "Loaded {} rows x {} columns",
        format_int(report.total_rows),
        format_int(report.columns.len())
    );
    println!();
    preview_table_rows(incidents, max_rows);

    println!("Columns: {}\n", report.columns.join(", "));

    println!("Missing values (filled with defaults):");
    preview_table_rows(&report.missing, report.missing.len());
    if report.invalid_numbers > 0 {
        println!(
            "Note: {} numeric cells could not be parsed and were set to 0.\n",
            format_int(report.invalid_numbers)
        );
    }

    println!("Summary statistics:");
    preview_table_rows(&report.numeric_summary, report.numeric_summary.len());

    println!("Incidents per offense:");
    preview_table_rows(&report.offense_counts, max_rows);

    println!("Incidents per day of week:");
    preview_table_rows(&report.weekday_counts, report.weekday_counts.len());
}
