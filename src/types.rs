use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of day windows pre-aggregated upstream for every windowed variable
pub const WINDOW_COUNT: usize = 4;

/// Hours per day, used for every offset and duration conversion
pub const HOURS_PER_DAY: f64 = 24.0;

/// Race category that stands for "unknown or other" in the extract
pub const DEFAULT_EXCLUDED_RACE: &str = "Other";

/// Default upper bound on ICU length of stay, in days
pub const DEFAULT_MAX_LOS_DAYS: f64 = 30.0;

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Tsv,
    Excel,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(FileFormat::Csv),
            "tsv" | "tab" => Some(FileFormat::Tsv),
            "xlsx" | "xls" | "xlsm" | "xlsb" => Some(FileFormat::Excel),
            _ => None,
        }
    }
}

/// Treatments whose initiation drives window selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Treatment {
    /// Mechanical ventilation
    #[serde(rename = "MV")]
    MechanicalVentilation,
    /// Renal replacement therapy
    #[serde(rename = "RRT")]
    RenalReplacement,
    /// Vasopressor support
    #[serde(rename = "VP")]
    Vasopressor,
}

impl Treatment {
    pub const ALL: [Treatment; 3] = [
        Treatment::MechanicalVentilation,
        Treatment::RenalReplacement,
        Treatment::Vasopressor,
    ];

    /// Short code used in column and file names
    pub fn code(&self) -> &'static str {
        match self {
            Treatment::MechanicalVentilation => "MV",
            Treatment::RenalReplacement => "RRT",
            Treatment::Vasopressor => "VP",
        }
    }

    /// Column holding the initiation offset from ICU admission, in fractional days
    pub fn offset_column(&self) -> &'static str {
        match self {
            Treatment::MechanicalVentilation => "MV_init_offset_abs",
            Treatment::RenalReplacement => "RRT_init_offset_abs",
            Treatment::Vasopressor => "VP_init_offset_abs",
        }
    }

    /// Output column holding the eligibility flag
    pub fn eligibility_column(&self) -> &'static str {
        match self {
            Treatment::MechanicalVentilation => "MV_elig",
            Treatment::RenalReplacement => "RRT_elig",
            Treatment::Vasopressor => "VP_elig",
        }
    }
}

impl fmt::Display for Treatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Sex as recorded by the `sex_female` indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
    Unknown,
}

impl Sex {
    pub fn from_female_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Sex::Female,
            Some(false) => Sex::Male,
            None => Sex::Unknown,
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Female => f.write_str("female"),
            Sex::Male => f.write_str("male"),
            Sex::Unknown => f.write_str("unknown"),
        }
    }
}

/// Result type for the application
pub type Result<T> = std::result::Result<T, crate::error::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_format_from_extension() {
        assert_eq!(FileFormat::from_extension("CSV"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_extension("tab"), Some(FileFormat::Tsv));
        assert_eq!(FileFormat::from_extension("xlsx"), Some(FileFormat::Excel));
        assert_eq!(FileFormat::from_extension("parquet"), None);
    }

    #[test]
    fn test_treatment_columns() {
        assert_eq!(Treatment::RenalReplacement.code(), "RRT");
        assert_eq!(Treatment::Vasopressor.offset_column(), "VP_init_offset_abs");
        assert_eq!(Treatment::MechanicalVentilation.eligibility_column(), "MV_elig");
    }

    #[test]
    fn test_treatment_serde_uses_codes() {
        let json = serde_json::to_string(&Treatment::ALL).unwrap();
        assert_eq!(json, r#"["MV","RRT","VP"]"#);
    }
}
