pub mod csv;
pub mod excel;

use std::path::Path;

use crate::table::Table;
use crate::types::{FileFormat, Result};

/// Common trait for tabular input readers
pub trait DataReader {
    /// Read the whole file into an in-memory table
    fn read(&mut self) -> Result<Table>;
}

/// Create a reader for the given file path
pub fn create_reader(path: &Path) -> Result<Box<dyn DataReader>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let format = FileFormat::from_extension(ext).ok_or_else(|| {
        crate::error::Error::UnsupportedFormat(format!(
            "Unsupported file extension: .{}",
            ext
        ))
    })?;

    match format {
        FileFormat::Csv => Ok(Box::new(csv::CsvReader::new(path)?)),
        FileFormat::Tsv => Ok(Box::new(csv::CsvReader::new_tsv(path)?)),
        FileFormat::Excel => Ok(Box::new(excel::ExcelReader::new(path)?)),
    }
}

/// Read a table from any supported format
pub fn read_table(path: &Path) -> Result<Table> {
    create_reader(path)?.read()
}

/// Table name used in error messages: the file name without its directory
pub(crate) fn table_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_unsupported_extension() {
        let file = NamedTempFile::with_suffix(".xyz").unwrap();
        assert!(matches!(
            read_table(file.path()),
            Err(crate::error::Error::UnsupportedFormat(_))
        ));
    }
}
