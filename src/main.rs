mod cli;
mod cohort;
mod config;
mod demographics;
mod error;
mod features;
mod logging;
mod output;
mod pipeline;
mod readers;
mod sanitize;
mod stats;
mod stay;
mod table;
mod types;
mod values;
mod window;

use clap::Parser;
use tracing::error;

use cli::{Cli, Commands};
use config::PipelineConfig;
use logging::{init_logging, LogConfig};
use types::Result;

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose)
        .with_format(cli.log_format)
        .with_log_file(cli.log_file.clone());
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Error: cannot open log file: {e}");
        std::process::exit(2);
    }

    if let Err(e) = run(cli.command) {
        error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Cohorts { input, out, config } => {
            let config = PipelineConfig::load_or_default(config.as_deref())?;
            let cohorts = pipeline::derive_cohorts(&input, &out, &config)?;
            eprintln!(
                "{} cohort tables written to: {}",
                cohorts.len(),
                out.display()
            );
        }
        Commands::Features {
            cohort_dir,
            out,
            config,
        } => {
            let config = PipelineConfig::load_or_default(config.as_deref())?;
            let cohorts = pipeline::load_cohorts(&cohort_dir, &config)?;
            let written = pipeline::extract_features(&cohorts, &out, &config)?;
            eprintln!(
                "{} feature tables written to: {}",
                written.len(),
                out.join(pipeline::CLEAN_DIR).display()
            );
        }
        Commands::Run { input, out, config } => {
            let config = PipelineConfig::load_or_default(config.as_deref())?;
            let written = pipeline::run(&input, &out, &config)?;
            eprintln!(
                "{} feature tables written to: {}",
                written.len(),
                out.join(pipeline::CLEAN_DIR).display()
            );
        }
    }
    Ok(())
}
