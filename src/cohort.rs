use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::config::{CohortSpec, PipelineConfig};
use crate::demographics::Demographics;
use crate::stay::{load_stays, StayRecord};
use crate::table::Table;
use crate::types::Result;

/// One step of the cascade
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterStep {
    /// The unfiltered extract
    Raw,
    Sepsis,
    /// Full code at both admission and discharge
    FullCode,
    KnownRace { excluded: String },
    MaxLos { days: f64 },
    MinLos { days: f64 },
    /// Keep the first stay per patient by (subject, admission, hospital stay, ICU stay)
    OneStayPerPatient,
}

impl FilterStep {
    /// Row predicate for this step. Deduplication is not a row predicate and keeps everything.
    pub fn keeps(&self, stay: &StayRecord) -> bool {
        match self {
            FilterStep::Raw | FilterStep::OneStayPerPatient => true,
            FilterStep::Sepsis => stay.sepsis,
            FilterStep::FullCode => stay.full_code_admission && stay.full_code_discharge,
            FilterStep::KnownRace { excluded } => {
                stay.race_group.as_deref() != Some(excluded.as_str())
            }
            FilterStep::MaxLos { days } => stay.los_icu.is_some_and(|los| los <= *days),
            FilterStep::MinLos { days } => stay.los_icu.is_some_and(|los| los >= *days),
        }
    }

    /// What the stays removed by this step have in common
    pub fn removed_description(&self) -> String {
        match self {
            FilterStep::Raw => "stays".to_string(),
            FilterStep::Sepsis => "stays without sepsis".to_string(),
            FilterStep::FullCode => "stays without Full Code".to_string(),
            FilterStep::KnownRace { excluded } => {
                format!("stays with no race information or race '{excluded}'")
            }
            FilterStep::MaxLos { days } => format!("stays with LoS > {days} days"),
            FilterStep::MinLos { days } => format!("stays with LoS < {days} days"),
            FilterStep::OneStayPerPatient => "recurrent stays".to_string(),
        }
    }
}

impl fmt::Display for FilterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterStep::Raw => f.write_str("ICU stays"),
            FilterStep::Sepsis => f.write_str("sepsis"),
            FilterStep::FullCode => f.write_str("full code"),
            FilterStep::KnownRace { .. } => f.write_str("race known"),
            FilterStep::MaxLos { days } => write!(f, "ICU LoS <= {days}d"),
            FilterStep::MinLos { days } => write!(f, "ICU LoS >= {days}d"),
            FilterStep::OneStayPerPatient => f.write_str("one stay per patient"),
        }
    }
}

/// A named subset of stays, the step that produced it, and its demographics
#[derive(Debug, Clone)]
pub struct Cohort {
    pub label: String,
    pub step: FilterStep,
    pub stays: Vec<StayRecord>,
    /// Stays dropped relative to the cohort this one was derived from
    pub removed: usize,
    pub demographics: Demographics,
}

impl Cohort {
    pub fn root(stays: Vec<StayRecord>) -> Self {
        Self::new(FilterStep::Raw.to_string(), FilterStep::Raw, stays, 0)
    }

    fn new(label: String, step: FilterStep, stays: Vec<StayRecord>, removed: usize) -> Self {
        let demographics = Demographics::describe(&stays);
        Self {
            label,
            step,
            stays,
            removed,
            demographics,
        }
    }

    pub fn len(&self) -> usize {
        self.stays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stays.is_empty()
    }

    /// Derive a new cohort by applying one step. `self` is left untouched.
    pub fn apply(&self, step: FilterStep) -> Cohort {
        let stays: Vec<StayRecord> = match &step {
            FilterStep::OneStayPerPatient => one_stay_per_patient(&self.stays),
            _ => self.stays.iter().filter(|s| step.keeps(s)).cloned().collect(),
        };
        let removed = self.len() - stays.len();
        let label = match &self.step {
            FilterStep::Raw => step.to_string(),
            _ => format!("{}, {}", self.label, step),
        };
        let cohort = Cohort::new(label, step, stays, removed);
        cohort.log();
        cohort
    }

    /// Positions of this cohort's stays in the table they were parsed from
    pub fn rows(&self) -> Vec<usize> {
        self.stays.iter().map(|s| s.row).collect()
    }

    /// Materialise the cohort as a table with the raw column set
    pub fn to_table(&self, raw: &Table, name: impl Into<String>) -> Table {
        raw.select_rows(name, &self.rows())
    }

    pub fn attrition(&self) -> AttritionEntry {
        AttritionEntry {
            label: self.label.clone(),
            step: self.step.clone(),
            remaining: self.len(),
            removed: self.removed,
            demographics: self.demographics.clone(),
        }
    }

    fn log(&self) {
        info!(
            step = %self.step,
            removed = self.removed,
            remaining = self.len(),
            "Removed {} {}",
            self.removed,
            self.step.removed_description()
        );
        if self.demographics.is_no_data() {
            warn!(cohort = %self.label, "No stays left");
        } else {
            info!(cohort = %self.label, "{} stays ({})", self.len(), self.demographics);
        }
    }
}

/// Sort by the stay ordering key and keep the first row per patient.
///
/// The ordering is by identifiers and sequence numbers, not timestamps.
/// Stays without a patient identifier are dropped.
fn one_stay_per_patient(stays: &[StayRecord]) -> Vec<StayRecord> {
    let mut ordered: Vec<&StayRecord> = stays.iter().collect();
    ordered.sort_by_key(|s| s.sort_key());
    let mut seen = HashSet::new();
    ordered
        .into_iter()
        .filter(|s| s.subject_id.is_some_and(|id| seen.insert(id)))
        .cloned()
        .collect()
}

/// Serializable record of one cascade step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttritionEntry {
    pub label: String,
    pub step: FilterStep,
    pub remaining: usize,
    pub removed: usize,
    pub demographics: Demographics,
}

/// The per-cohort side branch of the cascade
#[derive(Debug, Clone)]
pub struct CohortBranch {
    pub spec: CohortSpec,
    /// Base cohort restricted to the minimum LoS
    pub min_los: Cohort,
    /// `min_los` reduced to one stay per patient; the cohort that gets persisted
    pub cohort: Cohort,
}

impl CohortBranch {
    pub fn attrition(&self) -> Vec<AttritionEntry> {
        vec![self.min_los.attrition(), self.cohort.attrition()]
    }
}

/// Everything the cascade derived from one raw extract
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    /// Shared chain, starting with the raw cohort
    pub chain: Vec<Cohort>,
    pub branches: Vec<CohortBranch>,
}

impl CascadeOutcome {
    /// Last cohort of the shared chain, the one all branches start from
    pub fn base(&self) -> Option<&Cohort> {
        self.chain.last()
    }
}

/// Run the full cascade over a raw extract.
///
/// Fails only when the extract lacks a required column. Empty cohorts
/// propagate as empty.
pub fn run_cascade(raw: &Table, config: &PipelineConfig) -> Result<CascadeOutcome> {
    let stays = load_stays(raw)?;
    let root = Cohort::root(stays);
    info!(stays = root.len(), "{} stays in the ICU", root.len());

    let shared = [
        FilterStep::Sepsis,
        FilterStep::FullCode,
        FilterStep::KnownRace {
            excluded: config.excluded_race.clone(),
        },
        FilterStep::MaxLos {
            days: config.max_los_days,
        },
    ];
    let mut chain = Vec::with_capacity(shared.len() + 1);
    let mut base = root;
    for step in shared {
        let next = base.apply(step);
        chain.push(std::mem::replace(&mut base, next));
    }

    let mut branches = Vec::with_capacity(config.cohorts.len());
    for spec in &config.cohorts {
        let _span = info_span!("cohort", id = spec.id).entered();
        info!("Ramification starts for cohort {}", spec.id);
        let min_los = base.apply(FilterStep::MinLos {
            days: spec.min_los_days,
        });
        let cohort = min_los.apply(FilterStep::OneStayPerPatient);
        branches.push(CohortBranch {
            spec: spec.clone(),
            min_los,
            cohort,
        });
    }
    chain.push(base);

    Ok(CascadeOutcome { chain, branches })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stay::REQUIRED_COLUMNS;

    /// Columns: subject, hadm, hospstay_seq, icustay_seq, sepsis, fc_adm, fc_dis, race, los, age, female
    fn raw(rows: &[[&str; 11]]) -> Table {
        Table::new(
            "raw.csv",
            REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
    }

    /// Ten stays: 6 with sepsis, 4 of those full code, 3 of those with known race,
    /// all 3 within [2, 30] days and from distinct patients.
    fn ten_stays() -> Table {
        raw(&[
            ["1", "11", "1", "1", "True", "1", "1", "White", "3.0", "60", "1"],
            ["2", "21", "1", "1", "True", "1", "1", "Black", "5.5", "70", "0"],
            ["3", "31", "1", "1", "True", "1", "1", "Hispanic", "2.0", "55", "1"],
            ["4", "41", "1", "1", "True", "1", "1", "Other", "4.0", "65", "0"],
            ["5", "51", "1", "1", "True", "0", "1", "White", "4.0", "80", "0"],
            ["6", "61", "1", "1", "True", "1", "0", "Asian", "6.0", "45", "1"],
            ["7", "71", "1", "1", "False", "1", "1", "White", "3.0", "50", "0"],
            ["8", "81", "1", "1", "False", "1", "1", "White", "3.0", "52", "1"],
            ["9", "91", "1", "1", "False", "1", "1", "Black", "9.0", "33", "0"],
            ["10", "101", "1", "1", "False", "1", "1", "Asian", "12.0", "41", "1"],
        ])
    }

    #[test]
    fn test_end_to_end_two_day_cohort() {
        let table = ten_stays();
        let outcome = run_cascade(&table, &PipelineConfig::default()).unwrap();

        let sizes: Vec<usize> = outcome.chain.iter().map(Cohort::len).collect();
        assert_eq!(sizes, vec![10, 6, 4, 3, 3]);

        let first = &outcome.branches[0].cohort;
        assert_eq!(outcome.branches[0].spec.id, 1);
        assert_eq!(first.len(), 3);
        for stay in &first.stays {
            let race = stay.race_group.as_deref().unwrap();
            assert!(["White", "Black", "Hispanic", "Asian"].contains(&race));
        }
    }

    #[test]
    fn test_chain_is_monotone_and_predicates_hold() {
        let table = ten_stays();
        let outcome = run_cascade(&table, &PipelineConfig::default()).unwrap();

        for pair in outcome.chain.windows(2) {
            assert!(pair[1].len() <= pair[0].len());
            assert_eq!(pair[0].len() - pair[1].len(), pair[1].removed);
            assert!(pair[1].stays.iter().all(|s| pair[1].step.keeps(s)));
        }
        // earlier predicates still hold further down the chain
        let last = outcome.base().unwrap();
        for step in outcome.chain.iter().map(|c| &c.step) {
            assert!(last.stays.iter().all(|s| step.keeps(s)));
        }
    }

    #[test]
    fn test_branches_are_independent_thresholds() {
        let table = ten_stays();
        let outcome = run_cascade(&table, &PipelineConfig::default()).unwrap();

        // LoS of the three remaining stays: 3.0, 5.5, 2.0
        let sizes: Vec<usize> = outcome.branches.iter().map(|b| b.cohort.len()).collect();
        assert_eq!(sizes, vec![3, 2, 1, 1]);
        for branch in &outcome.branches {
            assert!(branch.cohort.len() <= outcome.base().unwrap().len());
        }
    }

    #[test]
    fn test_dedupe_keeps_first_by_sequence() {
        let table = raw(&[
            ["7", "300", "2", "1", "1", "1", "1", "White", "4", "60", "0"],
            ["7", "200", "1", "2", "1", "1", "1", "White", "5", "60", "0"],
            ["7", "200", "1", "1", "1", "1", "1", "White", "6", "60", "0"],
            ["8", "400", "1", "1", "1", "1", "1", "Black", "3", "50", "1"],
        ]);
        let outcome = run_cascade(&table, &PipelineConfig::default()).unwrap();
        let cohort = &outcome.branches[0].cohort;

        assert_eq!(cohort.len(), 2);
        assert_eq!(cohort.removed, 2);
        let kept = cohort.stays.iter().find(|s| s.subject_id == Some(7)).unwrap();
        assert_eq!(kept.row, 2);

        let distinct: HashSet<i64> = cohort.stays.iter().filter_map(|s| s.subject_id).collect();
        assert_eq!(distinct.len(), cohort.len());
    }

    #[test]
    fn test_stays_without_patient_id_are_dropped_at_dedupe() {
        let table = raw(&[
            ["1", "10", "1", "1", "True", "1", "1", "White", "3", "60", "0"],
            ["", "20", "1", "1", "False", "1", "1", "White", "3", "60", "0"],
            ["NA", "30", "1", "1", "True", "1", "1", "Black", "3", "60", "0"],
        ]);
        let outcome = run_cascade(&table, &PipelineConfig::default()).unwrap();

        // the row predicates do not look at the identifier
        assert_eq!(outcome.chain[1].len(), 2);
        assert_eq!(outcome.base().unwrap().len(), 2);

        let cohort = &outcome.branches[0].cohort;
        assert_eq!(cohort.len(), 1);
        assert_eq!(cohort.removed, 1);
        assert_eq!(cohort.stays[0].subject_id, Some(1));
    }

    #[test]
    fn test_missing_los_is_excluded() {
        let table = raw(&[["1", "1", "1", "1", "1", "1", "1", "White", "", "60", "0"]]);
        let outcome = run_cascade(&table, &PipelineConfig::default()).unwrap();
        assert!(outcome.base().unwrap().is_empty());
    }

    #[test]
    fn test_missing_race_is_not_the_excluded_category() {
        let table = raw(&[["1", "1", "1", "1", "1", "1", "1", "", "3", "60", "0"]]);
        let outcome = run_cascade(&table, &PipelineConfig::default()).unwrap();
        assert_eq!(outcome.base().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_cohorts_propagate() {
        let table = raw(&[["1", "1", "1", "1", "False", "1", "1", "White", "3", "60", "0"]]);
        let outcome = run_cascade(&table, &PipelineConfig::default()).unwrap();

        assert!(outcome.chain[1].is_empty());
        assert!(outcome.chain[1].demographics.is_no_data());
        for branch in &outcome.branches {
            assert!(branch.cohort.is_empty());
            assert!(branch.cohort.demographics.is_no_data());
        }
    }

    #[test]
    fn test_missing_column_fails() {
        let table = Table::new("raw.csv", vec!["subject_id".to_string()], vec![]);
        assert!(run_cascade(&table, &PipelineConfig::default()).is_err());
    }

    #[test]
    fn test_to_table_keeps_raw_columns() {
        let table = ten_stays();
        let outcome = run_cascade(&table, &PipelineConfig::default()).unwrap();
        let cohort_table = outcome.branches[0].cohort.to_table(&table, "MIMIC_coh_1.csv");

        assert_eq!(cohort_table.headers(), table.headers());
        assert_eq!(cohort_table.len(), 3);
        // sorted by subject id after deduplication
        let ids: Vec<&str> = cohort_table
            .rows()
            .map(|r| r.get("subject_id").unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_attrition_entry_serializes_step() {
        let table = ten_stays();
        let outcome = run_cascade(&table, &PipelineConfig::default()).unwrap();
        let entry = outcome.chain[1].attrition();
        assert_eq!(entry.removed, 4);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["step"]["kind"], "sepsis");
        assert_eq!(json["remaining"], 6);
    }
}
