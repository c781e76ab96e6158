use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader, Sheets};

use crate::table::Table;
use crate::types::Result;

use super::{table_name, DataReader};

/// Excel file reader (supports .xlsx, .xls, .xlsm, .xlsb)
///
/// Only the first worksheet is read; the extract is a single flat table.
pub struct ExcelReader {
    path: PathBuf,
}

impl ExcelReader {
    pub fn new(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Convert Excel Data to string representation
    fn data_to_string(dt: &Data) -> String {
        match dt {
            Data::Empty => String::new(),
            Data::String(s) => s.clone(),
            Data::Float(f) => f.to_string(),
            Data::Int(i) => i.to_string(),
            Data::Bool(b) => b.to_string(),
            Data::DateTime(d) => d.as_f64().to_string(),
            Data::DateTimeIso(s) => s.clone(),
            Data::DurationIso(s) => s.clone(),
            // Formula errors carry no value
            Data::Error(_) => String::new(),
        }
    }
}

impl DataReader for ExcelReader {
    fn read(&mut self) -> Result<Table> {
        let mut workbook: Sheets<std::io::BufReader<std::fs::File>> =
            open_workbook_auto(&self.path)?;

        let name = table_name(&self.path);
        let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
            return Ok(Table::new(name, Vec::new(), Vec::new()));
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(crate::error::Error::Excel)?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|row| {
                row.iter()
                    .map(|cell| Self::data_to_string(cell).trim().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let rows = rows
            .map(|row| row.iter().map(Self::data_to_string).collect())
            .collect();

        Ok(Table::new(name, headers, rows))
    }
}
