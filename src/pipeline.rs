use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, info_span};

use crate::cohort::{run_cascade, AttritionEntry};
use crate::config::{CohortSpec, PipelineConfig};
use crate::features::FeatureAssembler;
use crate::output::{write_json_file, write_table_csv};
use crate::readers::{read_table, table_name};
use crate::table::Table;
use crate::types::{Result, Treatment};

pub const ATTRITION_FILE: &str = "attrition.json";
pub const CLEAN_DIR: &str = "clean";

/// File name of a persisted cohort table
pub fn cohort_file_name(id: usize) -> String {
    format!("MIMIC_coh_{id}.csv")
}

/// Path of the feature table for one (cohort, treatment) pair
pub fn feature_file_path(out: &Path, id: usize, treatment: Treatment) -> PathBuf {
    out.join(CLEAN_DIR)
        .join(format!("coh_{}_{}.csv", id, treatment.code()))
}

/// Attrition of one cohort branch
#[derive(Debug, Clone, Serialize)]
pub struct BranchReport {
    pub cohort: usize,
    pub min_los_days: f64,
    pub eligibility_bound_hours: f64,
    pub steps: Vec<AttritionEntry>,
    pub output: String,
}

/// Everything needed to reproduce and audit a cohort derivation
#[derive(Debug, Clone, Serialize)]
pub struct AttritionReport {
    pub input: String,
    pub sha256: String,
    pub generated_at: DateTime<Utc>,
    pub config: PipelineConfig,
    pub chain: Vec<AttritionEntry>,
    pub branches: Vec<BranchReport>,
}

/// A persisted cohort table together with the cohort it belongs to
#[derive(Debug, Clone)]
pub struct CohortTable {
    pub spec: CohortSpec,
    pub table: Table,
}

/// Run the cascade over `input` and write one table per cohort plus the attrition report
pub fn derive_cohorts(
    input: &Path,
    out: &Path,
    config: &PipelineConfig,
) -> Result<Vec<CohortTable>> {
    let raw = read_table(input)?;
    info!(
        input = %input.display(),
        rows = raw.len(),
        columns = raw.headers().len(),
        "Read extract"
    );

    let outcome = run_cascade(&raw, config)?;

    let mut cohorts = Vec::with_capacity(outcome.branches.len());
    let mut branches = Vec::with_capacity(outcome.branches.len());
    for branch in &outcome.branches {
        let name = cohort_file_name(branch.spec.id);
        let table = branch.cohort.to_table(&raw, name.clone());
        let path = out.join(&name);
        write_table_csv(&table, &path)?;
        info!(cohort = branch.spec.id, rows = table.len(), path = %path.display(), "Wrote cohort");

        branches.push(BranchReport {
            cohort: branch.spec.id,
            min_los_days: branch.spec.min_los_days,
            eligibility_bound_hours: branch.spec.eligibility_bound_hours,
            steps: branch.attrition(),
            output: name,
        });
        cohorts.push(CohortTable {
            spec: branch.spec.clone(),
            table,
        });
    }

    let report = AttritionReport {
        input: table_name(input),
        sha256: compute_file_hash(input)?,
        generated_at: Utc::now(),
        config: config.clone(),
        chain: outcome.chain.iter().map(|c| c.attrition()).collect(),
        branches,
    };
    let report_path = out.join(ATTRITION_FILE);
    write_json_file(&report, &report_path)?;
    info!(path = %report_path.display(), "Wrote attrition report");

    Ok(cohorts)
}

/// Assemble and write the feature table of every configured treatment for each cohort
pub fn extract_features(
    cohorts: &[CohortTable],
    out: &Path,
    config: &PipelineConfig,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(cohorts.len() * config.treatments.len());
    for cohort in cohorts {
        let _span = info_span!("features", cohort = cohort.spec.id).entered();
        for &treatment in &config.treatments {
            let features = FeatureAssembler::new(&cohort.spec, treatment).assemble(&cohort.table)?;
            let path = feature_file_path(out, cohort.spec.id, treatment);
            write_table_csv(&features, &path)?;
            info!(treatment = %treatment, path = %path.display(), "Wrote features");
            written.push(path);
        }
    }
    Ok(written)
}

/// Read previously written cohort tables from `cohort_dir`, one per configured cohort
pub fn load_cohorts(cohort_dir: &Path, config: &PipelineConfig) -> Result<Vec<CohortTable>> {
    config
        .cohorts
        .iter()
        .map(|spec| {
            let table = read_table(&cohort_dir.join(cohort_file_name(spec.id)))?;
            Ok(CohortTable {
                spec: spec.clone(),
                table,
            })
        })
        .collect()
}

/// Both stages end to end
pub fn run(input: &Path, out: &Path, config: &PipelineConfig) -> Result<Vec<PathBuf>> {
    let cohorts = derive_cohorts(input, out, config)?;
    extract_features(&cohorts, out, config)
}

/// SHA-256 of a file, streamed
fn compute_file_hash(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
