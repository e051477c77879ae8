use clap::Parser;
use std::path::PathBuf;

/// Load a crime-incident CSV export into SQLite and export aggregate reports.
#[derive(Parser, Debug, Clone)]
#[command(name = "crime_report")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Incident CSV export to load
    #[arg(short, long, env = "CRIME_CSV")]
    pub input: PathBuf,

    /// Text encoding of the export (any WHATWG label, e.g. ISO-8859-1, utf-8)
    #[arg(long, env = "CRIME_CSV_ENCODING", default_value = "ISO-8859-1")]
    pub encoding: String,

    /// SQLite database file; its `incidents` table is replaced on every run
    #[arg(long, env = "CRIME_DB", default_value = "crime_data.db")]
    pub database: PathBuf,

    /// Directory the report CSV files are written to
    #[arg(short, long, env = "CRIME_REPORT_DIR", default_value = "Queries")]
    pub output_dir: PathBuf,

    /// Rows shown per console table
    #[arg(long, default_value_t = 5)]
    pub preview_rows: usize,
}
