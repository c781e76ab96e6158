use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::stats::{quantile_sorted, sorted, WelfordStats};
use crate::stay::StayRecord;
use crate::types::Sex;

/// Label used for stays without a recorded race category
pub const UNKNOWN_RACE: &str = "Unknown";

/// Summary of a cohort, or an explicit marker that there was nothing to summarise
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Demographics {
    NoData,
    Summary(DemographicSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemographicSummary {
    pub stays: usize,
    pub sex: Vec<CategoryShare>,
    pub race: Vec<CategoryShare>,
    /// `None` when no stay in the cohort has a recorded age
    pub age: Option<NumericSummary>,
    pub los_icu: Option<NumericSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub label: String,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: u64,
    pub mean: f64,
    pub std_dev: Option<f64>,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    pub min: f64,
    pub max: f64,
}

impl NumericSummary {
    fn from_values(values: impl Iterator<Item = f64>) -> Option<Self> {
        let values = sorted(values.filter(|v| !v.is_nan()).collect());
        let welford: WelfordStats = values.iter().copied().collect();
        Some(Self {
            count: welford.count(),
            mean: welford.mean()?,
            std_dev: welford.std_dev(),
            median: quantile_sorted(&values, 0.5)?,
            q1: quantile_sorted(&values, 0.25)?,
            q3: quantile_sorted(&values, 0.75)?,
            min: welford.min()?,
            max: welford.max()?,
        })
    }
}

impl Demographics {
    /// Summarise any set of stays. An empty set yields [`Demographics::NoData`].
    pub fn describe<'a>(stays: impl IntoIterator<Item = &'a StayRecord>) -> Self {
        let stays: Vec<&StayRecord> = stays.into_iter().collect();
        let total = stays.len();
        if total == 0 {
            return Demographics::NoData;
        }

        // B Tree so we get a predictable ordering.
        let mut sex_counts = BTreeMap::new();
        // Manually insert to make sure both categories are reported.
        sex_counts.insert(Sex::Female, 0);
        sex_counts.insert(Sex::Male, 0);
        let mut race_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for stay in &stays {
            *sex_counts.entry(stay.sex).or_insert(0) += 1;
            let race = stay.race_group.as_deref().unwrap_or(UNKNOWN_RACE);
            *race_counts.entry(race).or_insert(0) += 1;
        }

        let share = |label: String, count: usize| CategoryShare {
            label,
            count,
            percent: count as f64 / total as f64 * 100.,
        };

        Demographics::Summary(DemographicSummary {
            stays: total,
            sex: sex_counts
                .into_iter()
                .map(|(sex, count)| share(sex.to_string(), count))
                .collect(),
            race: race_counts
                .into_iter()
                .map(|(race, count)| share(race.to_string(), count))
                .collect(),
            age: NumericSummary::from_values(stays.iter().filter_map(|s| s.admission_age)),
            los_icu: NumericSummary::from_values(stays.iter().filter_map(|s| s.los_icu)),
        })
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Demographics::NoData)
    }
}

impl fmt::Display for Demographics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = match self {
            Demographics::NoData => return f.write_str("no data"),
            Demographics::Summary(summary) => summary,
        };

        let shares = |shares: &[CategoryShare]| {
            shares
                .iter()
                .map(|s| format!("{} {} ({:.1}%)", s.label, s.count, s.percent))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let numeric = |n: &Option<NumericSummary>| match n {
            Some(n) => format!("median {:.1} [IQR {:.1}-{:.1}]", n.median, n.q1, n.q3),
            None => "no data".to_string(),
        };

        write!(
            f,
            "{}; age {}; ICU LoS {}; {}",
            shares(&summary.sex),
            numeric(&summary.age),
            numeric(&summary.los_icu),
            shares(&summary.race),
        )
    }
}
