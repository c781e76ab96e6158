use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Sepsis ICU cohort derivation and time-windowed feature extraction
#[derive(Parser, Debug)]
#[command(name = "sepsis-cohorts")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive the cohort tables and attrition report from a raw extract
    Cohorts {
        /// Raw extract, one row per ICU stay (csv, tsv or Excel)
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Build feature tables from previously derived cohort tables
    Features {
        /// Directory holding MIMIC_coh_<id>.csv files
        #[arg(long)]
        cohort_dir: PathBuf,

        /// Output directory; tables land in its clean/ subdirectory
        #[arg(short, long)]
        out: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Derive cohorts and build their feature tables in one go
    Run {
        /// Raw extract, one row per ICU stay (csv, tsv or Excel)
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
