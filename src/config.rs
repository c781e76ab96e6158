use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{
    Result, Treatment, DEFAULT_EXCLUDED_RACE, DEFAULT_MAX_LOS_DAYS, HOURS_PER_DAY, WINDOW_COUNT,
};

/// One length-of-stay cohort and the treatment eligibility window that goes with it.
///
/// The cohort id doubles as its look-back horizon: cohort `k` may read the first
/// `k` day windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSpec {
    pub id: usize,
    /// Minimum ICU length of stay, in days
    pub min_los_days: f64,
    /// A treatment counts only if it starts strictly before this many hours
    pub eligibility_bound_hours: f64,
}

impl CohortSpec {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            min_los_days: (id + 1) as f64,
            eligibility_bound_hours: id as f64 * HOURS_PER_DAY,
        }
    }

    /// Number of day windows available to this cohort
    pub fn horizon(&self) -> usize {
        self.id.clamp(1, WINDOW_COUNT)
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cohorts: Vec<CohortSpec>,
    pub treatments: Vec<Treatment>,
    /// Stays longer than this are excluded before branching
    pub max_los_days: f64,
    /// Race category treated as "unknown or other" and excluded
    pub excluded_race: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cohorts: (1..=WINDOW_COUNT).map(CohortSpec::new).collect(),
            treatments: Treatment::ALL.to_vec(),
            max_los_days: DEFAULT_MAX_LOS_DAYS,
            excluded_race: DEFAULT_EXCLUDED_RACE.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON configuration file; absent keys take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else use the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cohorts.is_empty() {
            return Err(Error::InvalidConfig("no cohorts configured".to_string()));
        }
        if self.treatments.is_empty() {
            return Err(Error::InvalidConfig("no treatments configured".to_string()));
        }
        if !(self.max_los_days > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "max_los_days must be positive, got {}",
                self.max_los_days
            )));
        }

        let mut seen = HashSet::new();
        for cohort in &self.cohorts {
            if !(1..=WINDOW_COUNT).contains(&cohort.id) {
                return Err(Error::InvalidConfig(format!(
                    "cohort id {} outside 1..={}",
                    cohort.id, WINDOW_COUNT
                )));
            }
            if !seen.insert(cohort.id) {
                return Err(Error::InvalidConfig(format!(
                    "cohort id {} configured twice",
                    cohort.id
                )));
            }
            if !(cohort.min_los_days > 0.0) || !(cohort.eligibility_bound_hours > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "cohort {} needs a positive minimum LoS and eligibility bound",
                    cohort.id
                )));
            }
        }
        Ok(())
    }
}
