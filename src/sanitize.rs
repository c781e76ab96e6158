use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use crate::types::Sex;

/// Plausibility range of one variable, with the normal value used as replacement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlausibleRange {
    pub lower: f64,
    pub normal: f64,
    pub upper: f64,
}

impl PlausibleRange {
    pub const fn new(lower: f64, normal: f64, upper: f64) -> Self {
        Self {
            lower,
            normal,
            upper,
        }
    }

    /// Out-of-range values become zero, then zero and missing become the normal value.
    ///
    /// Zero is treated as "not recorded", so a true zero reading is also replaced.
    pub fn sanitize(&self, value: Option<f64>) -> f64 {
        let value = value
            .filter(|v| !v.is_nan())
            .map(|v| if v < self.lower || v > self.upper { 0.0 } else { v });
        match value {
            Some(v) if v != 0.0 => v,
            _ => self.normal,
        }
    }
}

/// Registered ranges, in output order
pub const LAB_RANGES: [(&str, PlausibleRange); 15] = [
    ("po2_min", PlausibleRange::new(0.0, 90.0, 1000.0)),
    ("pco2_max", PlausibleRange::new(0.0, 40.0, 200.0)),
    ("ph_min", PlausibleRange::new(5.0, 7.35, 10.0)),
    ("lactate_max", PlausibleRange::new(0.0, 1.05, 30.0)),
    ("glucose_max", PlausibleRange::new(0.0, 95.0, 2000.0)),
    ("sodium_min", PlausibleRange::new(0.0, 140.0, 160.0)),
    ("potassium_max", PlausibleRange::new(0.0, 3.5, 9.9)),
    ("cortisol_min", PlausibleRange::new(0.0, 20.0, 70.0)),
    ("fibrinogen_min", PlausibleRange::new(0.0, 200.0, 1000.0)),
    ("inr_max", PlausibleRange::new(0.0, 1.1, 10.0)),
    ("resp_rate_mean", PlausibleRange::new(0.0, 15.0, 50.0)),
    ("heart_rate_mean", PlausibleRange::new(0.0, 90.0, 250.0)),
    ("mbp_mean", PlausibleRange::new(0.0, 85.0, 200.0)),
    ("temperature_mean", PlausibleRange::new(32.0, 36.5, 45.0)),
    ("spo2_mean", PlausibleRange::new(0.0, 95.0, 100.0)),
];

static RANGE_INDEX: Lazy<BTreeMap<&'static str, PlausibleRange>> =
    Lazy::new(|| LAB_RANGES.iter().copied().collect());

/// Registered range for a variable, if it has one
pub fn range_for(variable: &str) -> Option<PlausibleRange> {
    RANGE_INDEX.get(variable).copied()
}

pub const HEMOGLOBIN: &str = "hemoglobin_min";
pub const HEMOGLOBIN_LOWER: f64 = 3.0;
pub const HEMOGLOBIN_UPPER: f64 = 30.0;
pub const HEMOGLOBIN_FEMALE_DEFAULT: f64 = 12.0;
pub const HEMOGLOBIN_MALE_DEFAULT: f64 = 13.5;

/// Hemoglobin uses its own bounds and a sex-specific default.
///
/// Stays with unrecorded sex get the male default. The upstream cleaning
/// script left those at 0; a filled value keeps the column free of zeros.
pub fn sanitize_hemoglobin(value: Option<f64>, sex: Sex) -> f64 {
    let value = value
        .filter(|v| !v.is_nan())
        .map(|v| {
            if !(HEMOGLOBIN_LOWER..=HEMOGLOBIN_UPPER).contains(&v) {
                0.0
            } else {
                v
            }
        })
        .unwrap_or(0.0);
    if value != 0.0 {
        return value;
    }
    match sex {
        Sex::Female => HEMOGLOBIN_FEMALE_DEFAULT,
        Sex::Male | Sex::Unknown => HEMOGLOBIN_MALE_DEFAULT,
    }
}
