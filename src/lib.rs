//! Crime-incident reporting pipeline.
//!
//! A run is strictly sequential: the export is loaded and normalized, the
//! rows replace the `incidents` table in SQLite, and seven fixed aggregate
//! reports are exported as CSV. Any failure aborts the run.
pub mod config;
pub mod error;
pub mod loader;
pub mod output;
pub mod reports;
pub mod store;
pub mod types;
pub mod util;

pub use config::Config;
pub use error::PipelineError;

use reports::ReportOptions;
use types::ReportSummary;
use util::format_int;

pub fn run(config: &Config) -> Result<Vec<ReportSummary>, PipelineError> {
    log::info!("loading {} ({})", config.input.display(), config.encoding);
    let (incidents, load_report) = loader::load(&config.input, &config.encoding)?;
    println!("Processing dataset... ({} rows loaded)\n", format_int(incidents.len()));
    output::print_load_report(&incidents, &load_report, config.preview_rows);

    let persisted = store::persist(&config.database, &incidents)?;

    let opts = ReportOptions {
        output_dir: config.output_dir.clone(),
        preview_rows: config.preview_rows,
    };
    let summaries = reports::run_all(&persisted, &opts)?;
    println!(
        "\n{} reports written to {}",
        summaries.len(),
        config.output_dir.display()
    );
    Ok(summaries)
}
