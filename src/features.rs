use tracing::{debug, info};

use crate::config::CohortSpec;
use crate::sanitize::{range_for, sanitize_hemoglobin, HEMOGLOBIN};
use crate::stay::{ADMISSION_AGE, RACE_GROUP, SEX_FEMALE};
use crate::table::{Row, Table};
use crate::types::{Result, Sex, Treatment};
use crate::values::{format_numeric, is_missing};
use crate::window::{
    select, select_window, severity_scores, windowed_columns, TreatmentEligibility, WindowFamily,
    WindowSource,
};

/// Variables aggregated over the 6_24h .. 72_96h windows, in output order
pub const PHYSIOLOGIC_VARIABLES: [&str; 18] = [
    "fluids",
    "FiO2_mean",
    "resp_rate_mean",
    "mbp_mean",
    "temperature_mean",
    "spo2_mean",
    "heart_rate_mean",
    "po2_min",
    "pco2_max",
    "ph_min",
    "lactate_max",
    "glucose_max",
    "sodium_min",
    "potassium_max",
    "cortisol_min",
    "hemoglobin_min",
    "fibrinogen_min",
    "inr_max",
];

/// SOFA score and organ subscores over the 0_24h .. 72_96h windows, in output order
pub const SEVERITY_VARIABLES: [&str; 7] = [
    "sofa_max",
    "respiratory_max",
    "coagulation_max",
    "liver_max",
    "cardiovascular_max",
    "cns_max",
    "renal_max",
];

pub const ADMIT_SCORES: [&str; 7] = [
    "SOFA_admit",
    "respiratory_admit",
    "coagulation_admit",
    "cardiovascular_admit",
    "cns_admit",
    "renal_admit",
    "liver_admit",
];

pub const COMORBIDITIES: [&str; 6] = [
    "hypertension_present",
    "heart_failure_present",
    "copd_present",
    "asthma_present",
    "cad_present",
    "connective_disease",
];

pub const DIAGNOSES: [&str; 4] = ["pneumonia", "uti", "biliary", "skin"];

/// Dummy columns against the White reference group
const RACE_DUMMIES: [(&str, &str); 4] = [
    ("race_black", "Black"),
    ("race_hisp", "Hispanic"),
    ("race_asian", "Asian"),
    ("race_other", "Other"),
];

const REFERENCE_RACE: &str = "White";
const LIMITED_ENGLISH: &str = "?";

const ANCHOR_YEAR_GROUPS: [&str; 4] = ["2008 - 2010", "2011 - 2013", "2014 - 2016", "2017 - 2019"];

// Input columns read by the assembler outside the windowed variables
const LANGUAGE: &str = "language";
const FLUIDS_VOLUME: &str = "fluids_volume";
const ANCHOR_YEAR_GROUP: &str = "anchor_year_group";
const MAJOR_SURGERY: &str = "major_surgery";
const CKD_STAGES: &str = "ckd_stages";
const DIABETES_TYPES: &str = "diabetes_types";
const FLUIDS: &str = "fluids";
const PRIVATE_INSURANCE: &str = "private_insurance";
const ADM_ELECTIVE: &str = "adm_elective";
const CHARLSON_INDEX: &str = "charlson_comorbidity_index";

/// CKD stages above this count as present
const CKD_STAGE_THRESHOLD: f64 = 2.0;

/// Output columns, in order
pub fn output_columns() -> Vec<String> {
    let mut columns: Vec<&str> = vec![
        ADMISSION_AGE,
        SEX_FEMALE,
        "eng_prof",
        PRIVATE_INSURANCE,
        "race_nonwhite",
    ];
    columns.extend(RACE_DUMMIES.iter().map(|(col, _)| *col));
    columns.extend([
        ANCHOR_YEAR_GROUP,
        ADM_ELECTIVE,
        MAJOR_SURGERY,
        CHARLSON_INDEX,
    ]);
    columns.extend(ADMIT_SCORES);
    columns.extend(COMORBIDITIES);
    columns.extend([CKD_STAGES, DIABETES_TYPES]);
    columns.extend(PHYSIOLOGIC_VARIABLES);
    columns.push("fluids_overall");
    columns.extend(SEVERITY_VARIABLES);
    columns.extend(Treatment::ALL.iter().map(|t| t.eligibility_column()));
    columns.extend(DIAGNOSES);
    columns.into_iter().map(str::to_string).collect()
}

/// A flag written as `1` or a true token is present; anything else, missing included, is absent
fn is_present(flag: Option<bool>) -> bool {
    flag == Some(true)
}

/// Raw cell text, with missing-value tokens written as an empty cell
fn passthrough(row: Row<'_>, column: &str) -> Result<String> {
    let cell = row.get(column)?;
    Ok(if is_missing(cell) {
        String::new()
    } else {
        cell.trim().to_string()
    })
}

fn indicator(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

/// Builds the feature table of one cohort for one treatment
#[derive(Debug, Clone, Copy)]
pub struct FeatureAssembler<'a> {
    spec: &'a CohortSpec,
    treatment: Treatment,
}

impl<'a> FeatureAssembler<'a> {
    pub fn new(spec: &'a CohortSpec, treatment: Treatment) -> Self {
        Self { spec, treatment }
    }

    /// Every input column the assembler reads for this cohort's horizon
    pub fn required_columns(&self) -> Vec<String> {
        let horizon = self.spec.horizon();
        let mut columns: Vec<String> = [
            ADMISSION_AGE,
            SEX_FEMALE,
            PRIVATE_INSURANCE,
            ADM_ELECTIVE,
            CHARLSON_INDEX,
            RACE_GROUP,
            LANGUAGE,
            FLUIDS_VOLUME,
            ANCHOR_YEAR_GROUP,
            MAJOR_SURGERY,
            CKD_STAGES,
            DIABETES_TYPES,
        ]
        .iter()
        .chain(ADMIT_SCORES.iter())
        .chain(COMORBIDITIES.iter())
        .chain(DIAGNOSES.iter())
        .map(|c| c.to_string())
        .collect();
        columns.extend(Treatment::ALL.iter().map(|t| t.offset_column().to_string()));
        columns.extend(windowed_columns(
            &PHYSIOLOGIC_VARIABLES,
            WindowFamily::Physiologic,
            horizon,
        ));
        columns.extend(windowed_columns(
            &SEVERITY_VARIABLES,
            WindowFamily::Severity,
            horizon,
        ));
        columns
    }

    /// Assemble the feature table, one output row per cohort row.
    ///
    /// A missing input column fails before any row is read.
    pub fn assemble(&self, cohort: &Table) -> Result<Table> {
        let required = self.required_columns();
        cohort.require(required.iter().map(String::as_str))?;

        let mut rows = Vec::with_capacity(cohort.len());
        let mut eligible = 0usize;
        let mut peak_windows = 0usize;
        for row in cohort.rows() {
            let (cells, source) = self.assemble_row(row)?;
            match source {
                WindowSource::TreatmentStart => eligible += 1,
                WindowSource::SeverityPeak => peak_windows += 1,
            }
            rows.push(cells);
        }

        let name = format!("coh_{}_{}", self.spec.id, self.treatment);
        info!(
            table = %name,
            rows = rows.len(),
            eligible,
            severity_peak = peak_windows,
            "Assembled features"
        );
        Ok(Table::new(name, output_columns(), rows))
    }

    fn assemble_row(&self, row: Row<'_>) -> Result<(Vec<String>, WindowSource)> {
        let horizon = self.spec.horizon();
        let bound = self.spec.eligibility_bound_hours;

        let mut eligibility = Vec::with_capacity(Treatment::ALL.len());
        for treatment in Treatment::ALL {
            let offset = row.number(treatment.offset_column())?;
            eligibility.push((
                treatment,
                TreatmentEligibility::assess(offset, bound, horizon),
            ));
        }
        let own = eligibility
            .iter()
            .find(|(t, _)| *t == self.treatment)
            .map(|(_, e)| *e)
            .unwrap_or_else(|| TreatmentEligibility::assess(None, bound, horizon));
        let severity = severity_scores(row, horizon)?;
        let window = select_window(&own, &severity, horizon);
        debug!(
            row = row.index(),
            window = window.index,
            source = ?window.source,
            "Selected window"
        );

        let mut cells: Vec<String> = Vec::new();
        let filled = |value: Option<f64>| format_numeric(Some(value.unwrap_or(0.0)));
        let binary = |condition: bool| format_numeric(Some(indicator(condition)));

        // demographics and admission
        cells.push(format_numeric(row.number(ADMISSION_AGE)?));
        let female = row.flag(SEX_FEMALE)?;
        cells.push(format_numeric(female.map(indicator)));
        let language = row.get(LANGUAGE)?.trim();
        cells.push(binary(language != LIMITED_ENGLISH));
        cells.push(passthrough(row, PRIVATE_INSURANCE)?);

        let race_cell = row.get(RACE_GROUP)?.trim();
        let race = (!is_missing(race_cell)).then_some(race_cell);
        cells.push(binary(race != Some(REFERENCE_RACE)));
        for (_, group) in RACE_DUMMIES {
            cells.push(format_numeric(match race {
                Some(r) if r == group => Some(1.0),
                Some(REFERENCE_RACE) => Some(0.0),
                _ => None,
            }));
        }

        let anchor = row.get(ANCHOR_YEAR_GROUP)?.trim();
        cells.push(format_numeric(
            ANCHOR_YEAR_GROUPS
                .iter()
                .position(|g| *g == anchor)
                .map(|idx| idx as f64),
        ));
        cells.push(passthrough(row, ADM_ELECTIVE)?);
        cells.push(filled(row.number(MAJOR_SURGERY)?));
        cells.push(passthrough(row, CHARLSON_INDEX)?);

        for score in ADMIT_SCORES {
            cells.push(filled(row.number(score)?));
        }
        for comorbidity in COMORBIDITIES {
            cells.push(binary(is_present(row.flag(comorbidity)?)));
        }
        let ckd = row.number(CKD_STAGES)?;
        cells.push(binary(ckd.is_some_and(|s| s > CKD_STAGE_THRESHOLD)));
        let diabetes = row.number(DIABETES_TYPES)?;
        cells.push(binary(diabetes.is_some_and(|d| d != 0.0)));

        // windowed physiology
        let sex = Sex::from_female_flag(female);
        for variable in PHYSIOLOGIC_VARIABLES {
            let value = select(row, variable, window.index, WindowFamily::Physiologic)?;
            let value = if variable == HEMOGLOBIN {
                Some(sanitize_hemoglobin(value, sex))
            } else if let Some(range) = range_for(variable) {
                Some(range.sanitize(value))
            } else if variable == FLUIDS {
                Some(value.unwrap_or(0.0))
            } else {
                value
            };
            cells.push(format_numeric(value));
        }
        let volume = row.number(FLUIDS_VOLUME)?;
        cells.push(binary(volume.is_some_and(|v| v > 0.0)));

        for variable in SEVERITY_VARIABLES {
            cells.push(filled(select(row, variable, window.index, WindowFamily::Severity)?));
        }

        for (_, assessed) in &eligibility {
            cells.push(binary(assessed.eligible));
        }
        for diagnosis in DIAGNOSES {
            cells.push(binary(is_present(row.flag(diagnosis)?)));
        }

        Ok((cells, window.source))
    }
}
