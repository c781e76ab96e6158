use crate::table::{Row, Table};
use crate::types::{Result, Sex};
use crate::values::{is_missing, parse_id};

pub const SUBJECT_ID: &str = "subject_id";
pub const HADM_ID: &str = "hadm_id";
pub const HOSPSTAY_SEQ: &str = "hospstay_seq";
pub const ICUSTAY_SEQ: &str = "icustay_seq";
pub const SEPSIS: &str = "sepsis3";
pub const FULL_CODE_ADMISSION: &str = "is_full_code_admission";
pub const FULL_CODE_DISCHARGE: &str = "is_full_code_discharge";
pub const RACE_GROUP: &str = "race_group";
pub const LOS_ICU: &str = "los_icu";
pub const ADMISSION_AGE: &str = "admission_age";
pub const SEX_FEMALE: &str = "sex_female";

/// Columns the raw extract must carry for the cohort cascade to run
pub const REQUIRED_COLUMNS: [&str; 11] = [
    SUBJECT_ID,
    HADM_ID,
    HOSPSTAY_SEQ,
    ICUSTAY_SEQ,
    SEPSIS,
    FULL_CODE_ADMISSION,
    FULL_CODE_DISCHARGE,
    RACE_GROUP,
    LOS_ICU,
    ADMISSION_AGE,
    SEX_FEMALE,
];

/// One ICU stay, as far as cohort selection is concerned.
///
/// `row` points back at the stay's position in the table it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct StayRecord {
    pub row: usize,
    /// `None` when the identifier is blank or unparseable; such stays never survive deduplication
    pub subject_id: Option<i64>,
    pub hadm_id: Option<i64>,
    pub hospstay_seq: Option<i64>,
    pub icustay_seq: Option<i64>,
    pub sepsis: bool,
    pub full_code_admission: bool,
    pub full_code_discharge: bool,
    pub race_group: Option<String>,
    pub los_icu: Option<f64>,
    pub admission_age: Option<f64>,
    pub sex: Sex,
}

/// Ordering key for deduplication: missing identifiers sort after present ones.
pub type StaySortKey = ((bool, i64), (bool, i64), (bool, i64), (bool, i64));

impl StayRecord {
    pub fn from_row(row: Row<'_>) -> Result<Self> {
        let race = row.get(RACE_GROUP)?;
        let race_group = (!is_missing(race)).then(|| race.trim().to_string());

        Ok(Self {
            row: row.index(),
            subject_id: parse_id(row.get(SUBJECT_ID)?),
            hadm_id: parse_id(row.get(HADM_ID)?),
            hospstay_seq: parse_id(row.get(HOSPSTAY_SEQ)?),
            icustay_seq: parse_id(row.get(ICUSTAY_SEQ)?),
            sepsis: row.flag(SEPSIS)?.unwrap_or(false),
            full_code_admission: row.flag(FULL_CODE_ADMISSION)?.unwrap_or(false),
            full_code_discharge: row.flag(FULL_CODE_DISCHARGE)?.unwrap_or(false),
            race_group,
            los_icu: row.number(LOS_ICU)?,
            admission_age: row.number(ADMISSION_AGE)?,
            sex: Sex::from_female_flag(row.flag(SEX_FEMALE)?),
        })
    }

    pub fn sort_key(&self) -> StaySortKey {
        fn nulls_last(value: Option<i64>) -> (bool, i64) {
            (value.is_none(), value.unwrap_or_default())
        }
        (
            nulls_last(self.subject_id),
            nulls_last(self.hadm_id),
            nulls_last(self.hospstay_seq),
            nulls_last(self.icustay_seq),
        )
    }
}

/// Parse every row of the raw extract, failing fast on a missing required column
pub fn load_stays(table: &Table) -> Result<Vec<StayRecord>> {
    table.require(REQUIRED_COLUMNS)?;
    table.rows().map(StayRecord::from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn table(rows: Vec<Vec<&str>>) -> Table {
        Table::new(
            "raw",
            REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows.into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }

    #[test]
    fn test_parse_stay() {
        let t = table(vec![vec![
            "10", "200", "1", "2", "True", "1", "1", "White", "3.5", "64", "1",
        ]]);
        let stays = load_stays(&t).unwrap();
        let stay = &stays[0];

        assert_eq!(stay.subject_id, Some(10));
        assert_eq!(stay.hadm_id, Some(200));
        assert!(stay.sepsis);
        assert!(stay.full_code_admission && stay.full_code_discharge);
        assert_eq!(stay.race_group.as_deref(), Some("White"));
        assert_eq!(stay.los_icu, Some(3.5));
        assert_eq!(stay.sex, Sex::Female);
    }

    #[test]
    fn test_missing_fields_degrade() {
        let t = table(vec![vec!["10", "", "", "", "", "", "NA", "", "", "", ""]]);
        let stay = &load_stays(&t).unwrap()[0];

        assert!(!stay.sepsis);
        assert!(!stay.full_code_discharge);
        assert_eq!(stay.race_group, None);
        assert_eq!(stay.los_icu, None);
        assert_eq!(stay.sex, Sex::Unknown);
    }

    #[test]
    fn test_unparseable_subject_reads_as_missing() {
        let t = table(vec![
            vec!["abc", "1", "1", "1", "1", "1", "1", "White", "2", "50", "0"],
            vec!["", "2", "1", "1", "1", "1", "1", "White", "2", "50", "0"],
            vec!["4", "3", "1", "1", "1", "1", "1", "White", "2", "50", "0"],
        ]);
        let stays = load_stays(&t).unwrap();
        assert_eq!(stays[0].subject_id, None);
        assert_eq!(stays[1].subject_id, None);
        assert!(stays[2].sort_key() < stays[0].sort_key());
    }

    #[test]
    fn test_missing_column_fails_fast() {
        let t = Table::new("raw", vec![SUBJECT_ID.to_string()], vec![]);
        assert!(matches!(load_stays(&t), Err(Error::MissingColumn { .. })));
    }

    #[test]
    fn test_sort_key_puts_missing_sequence_last() {
        let t = table(vec![
            vec!["1", "", "1", "1", "1", "1", "1", "White", "2", "50", "0"],
            vec!["1", "5", "1", "1", "1", "1", "1", "White", "2", "50", "0"],
        ]);
        let stays = load_stays(&t).unwrap();
        assert!(stays[1].sort_key() < stays[0].sort_key());
    }
}
