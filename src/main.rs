// Entry point: parse configuration, set up logging, run the pipeline once.
use anyhow::Context;
use clap::Parser;
use crime_report::Config;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Config::parse();
    crime_report::run(&config)
        .with_context(|| format!("crime report run over {} failed", config.input.display()))?;
    Ok(())
}
