use serde::Serialize;

use crate::table::Row;
use crate::types::{Result, HOURS_PER_DAY, WINDOW_COUNT};

/// Composite severity score whose peak decides the window for untreated stays
pub const SEVERITY_SCORE: &str = "sofa_max";

/// Suffix family of a windowed variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFamily {
    /// Labs, vitals and fluids: first window starts at 6h
    Physiologic,
    /// SOFA score and its organ subscores: first window starts at 0h
    Severity,
}

impl WindowFamily {
    pub fn suffixes(&self) -> &'static [&'static str; WINDOW_COUNT] {
        match self {
            WindowFamily::Physiologic => &["6_24h", "24_48h", "48_72h", "72_96h"],
            WindowFamily::Severity => &["0_24h", "24_48h", "48_72h", "72_96h"],
        }
    }
}

/// Column holding `variable` for the given window. Indices past the last window read the last one.
pub fn column_name(variable: &str, window: usize, family: WindowFamily) -> String {
    let suffixes = family.suffixes();
    format!("{}_{}", variable, suffixes[window.min(WINDOW_COUNT - 1)])
}

/// Read `variable` for one stay from the column of the selected window
pub fn select(row: Row<'_>, variable: &str, window: usize, family: WindowFamily) -> Result<Option<f64>> {
    row.number(&column_name(variable, window, family))
}

/// Columns of `variables` a cohort with the given horizon may read
pub fn windowed_columns(variables: &[&str], family: WindowFamily, horizon: usize) -> Vec<String> {
    variables
        .iter()
        .flat_map(|v| (0..horizon.min(WINDOW_COUNT)).map(move |w| column_name(v, w, family)))
        .collect()
}

/// Whether a treatment started inside the eligibility window, and on which day
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TreatmentEligibility {
    pub initiation_hours: Option<f64>,
    pub eligible: bool,
    /// Window index of initiation; set only when eligible
    pub initiation_day: Option<usize>,
}

impl TreatmentEligibility {
    /// Assess an initiation offset given in fractional days against a bound in hours.
    ///
    /// Eligibility is strict (`hours < bound`). A missing offset is never eligible.
    pub fn assess(offset_days: Option<f64>, bound_hours: f64, horizon: usize) -> Self {
        let initiation_hours = offset_days
            .filter(|d| !d.is_nan())
            .map(|d| d * HOURS_PER_DAY);
        let eligible = initiation_hours.is_some_and(|h| h < bound_hours);
        let initiation_day = initiation_hours.filter(|_| eligible).map(|h| {
            let day = (h / HOURS_PER_DAY).floor().max(0.0) as usize;
            day.min(horizon.clamp(1, WINDOW_COUNT) - 1)
        });
        Self {
            initiation_hours,
            eligible,
            initiation_day,
        }
    }
}

/// Index of the window with the highest severity score among the first `horizon` windows.
///
/// Ties go to the earliest window; all scores missing gives window 0.
pub fn severity_peak_day(scores: &[Option<f64>], horizon: usize) -> usize {
    let mut peak: Option<(usize, f64)> = None;
    for (idx, score) in scores.iter().take(horizon).enumerate() {
        let Some(score) = score.filter(|s| !s.is_nan()) else {
            continue;
        };
        if peak.map_or(true, |(_, best)| score > best) {
            peak = Some((idx, score));
        }
    }
    peak.map_or(0, |(idx, _)| idx)
}

/// Severity scores of one stay for the windows the horizon allows
pub fn severity_scores(row: Row<'_>, horizon: usize) -> Result<Vec<Option<f64>>> {
    (0..horizon.min(WINDOW_COUNT))
        .map(|w| select(row, SEVERITY_SCORE, w, WindowFamily::Severity))
        .collect()
}

/// Why a window was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSource {
    TreatmentStart,
    SeverityPeak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowSelection {
    pub index: usize,
    pub source: WindowSource,
}

/// Day of treatment start when eligible, otherwise the severity peak day
pub fn select_window(
    eligibility: &TreatmentEligibility,
    severity: &[Option<f64>],
    horizon: usize,
) -> WindowSelection {
    match eligibility.initiation_day {
        Some(index) => WindowSelection {
            index,
            source: WindowSource::TreatmentStart,
        },
        None => WindowSelection {
            index: severity_peak_day(severity, horizon),
            source: WindowSource::SeverityPeak,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;

    #[test]
    fn test_column_names_per_family() {
        assert_eq!(column_name("fluids", 1, WindowFamily::Physiologic), "fluids_24_48h");
        assert_eq!(column_name("fluids", 0, WindowFamily::Physiologic), "fluids_6_24h");
        assert_eq!(column_name("renal_max", 0, WindowFamily::Severity), "renal_max_0_24h");
        assert_eq!(column_name("renal_max", 3, WindowFamily::Severity), "renal_max_72_96h");
    }

    #[test]
    fn test_windowed_columns_respect_horizon() {
        let cols = windowed_columns(&["sofa_max"], WindowFamily::Severity, 2);
        assert_eq!(cols, vec!["sofa_max_0_24h", "sofa_max_24_48h"]);
    }

    #[test]
    fn test_eligible_within_bound() {
        let e = TreatmentEligibility::assess(Some(20.0 / 24.0), 24.0, 1);
        assert!(e.eligible);
        assert_eq!(e.initiation_day, Some(0));
    }

    #[test]
    fn test_not_eligible_past_bound() {
        let e = TreatmentEligibility::assess(Some(30.0 / 24.0), 24.0, 1);
        assert!(!e.eligible);
        assert_eq!(e.initiation_day, None);

        let selection = select_window(&e, &[Some(4.0)], 1);
        assert_eq!(selection.source, WindowSource::SeverityPeak);
        assert_eq!(selection.index, 0);
    }

    #[test]
    fn test_bound_is_strict() {
        let e = TreatmentEligibility::assess(Some(2.0), 48.0, 2);
        assert!(!e.eligible);
    }

    #[test]
    fn test_initiation_day_floor() {
        let e = TreatmentEligibility::assess(Some(2.5), 96.0, 4);
        assert_eq!(e.initiation_hours, Some(60.0));
        assert_eq!(e.initiation_day, Some(2));
    }

    #[test]
    fn test_initiation_before_admission_reads_first_window() {
        let e = TreatmentEligibility::assess(Some(-0.5), 24.0, 1);
        assert!(e.eligible);
        assert_eq!(e.initiation_day, Some(0));
    }

    #[test]
    fn test_missing_offset_is_not_eligible() {
        let e = TreatmentEligibility::assess(None, 96.0, 4);
        assert!(!e.eligible);
        assert_eq!(e.initiation_hours, None);
    }

    #[test]
    fn test_severity_peak_respects_horizon() {
        let scores = [Some(2.0), Some(5.0), Some(3.0), Some(f64::NAN)];
        assert_eq!(severity_peak_day(&scores, 3), 1);

        let scores = [Some(2.0), Some(5.0), Some(3.0), Some(9.0)];
        assert_eq!(severity_peak_day(&scores, 3), 1);
        assert_eq!(severity_peak_day(&scores, 4), 3);
    }

    #[test]
    fn test_severity_peak_ties_and_missing() {
        assert_eq!(severity_peak_day(&[Some(4.0), Some(4.0)], 2), 0);
        assert_eq!(severity_peak_day(&[None, Some(1.0), Some(1.0)], 3), 1);
        assert_eq!(severity_peak_day(&[None, None, None, None], 4), 0);
        assert_eq!(severity_peak_day(&[], 4), 0);
    }

    #[test]
    fn test_treatment_start_wins_over_peak() {
        let e = TreatmentEligibility::assess(Some(1.5), 72.0, 3);
        let selection = select_window(&e, &[Some(1.0), Some(2.0), Some(9.0)], 3);
        assert_eq!(selection.index, 1);
        assert_eq!(selection.source, WindowSource::TreatmentStart);
    }

    #[test]
    fn test_select_reads_suffixed_column() {
        let table = Table::new(
            "coh",
            vec![
                "sofa_max_0_24h".into(),
                "sofa_max_24_48h".into(),
                "fluids_24_48h".into(),
            ],
            vec![vec!["3".into(), "7".into(), "1500".into()]],
        );
        let row = table.row(0).unwrap();

        let scores = severity_scores(row, 2).unwrap();
        assert_eq!(scores, vec![Some(3.0), Some(7.0)]);
        assert_eq!(
            select(row, "fluids", 1, WindowFamily::Physiologic).unwrap(),
            Some(1500.0)
        );
        assert!(select(row, "fluids", 0, WindowFamily::Physiologic).is_err());
    }
}
