use std::collections::HashMap;

use crate::error::Error;
use crate::types::Result;
use crate::values::{parse_flag, parse_numeric};

/// An in-memory table of raw cells, one row per stay.
///
/// Cells are kept as the strings read from disk so that intermediate cohort
/// tables can be written back with the exact column set and values of the input.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, padding or truncating rows to the header width
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        let index = headers
            .iter()
            .enumerate()
            .map(|(idx, h)| (h.clone(), idx))
            .collect();
        Self {
            name: name.into(),
            headers,
            index,
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        (0..self.rows.len()).map(move |idx| Row { table: self, idx })
    }

    pub fn row(&self, idx: usize) -> Option<Row<'_>> {
        (idx < self.rows.len()).then_some(Row { table: self, idx })
    }

    pub(crate) fn raw_rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Position of a column, or a schema error naming the table
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.index
            .get(column)
            .copied()
            .ok_or_else(|| Error::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Fail on the first column in `columns` the table does not have
    pub fn require<'c>(&self, columns: impl IntoIterator<Item = &'c str>) -> Result<()> {
        for column in columns {
            self.column_index(column)?;
        }
        Ok(())
    }

    /// A new table with the same columns holding the given rows, in the given order
    pub fn select_rows(&self, name: impl Into<String>, rows: &[usize]) -> Table {
        let selected = rows
            .iter()
            .filter_map(|&idx| self.rows.get(idx).cloned())
            .collect();
        Table {
            name: name.into(),
            headers: self.headers.clone(),
            index: self.index.clone(),
            rows: selected,
        }
    }
}

/// A borrowed view of one row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    idx: usize,
}

impl<'a> Row<'a> {
    /// Zero-based row position within its table
    pub fn index(&self) -> usize {
        self.idx
    }

    pub fn get(&self, column: &str) -> Result<&'a str> {
        let col = self.table.column_index(column)?;
        Ok(self.table.rows[self.idx][col].as_str())
    }

    pub fn number(&self, column: &str) -> Result<Option<f64>> {
        Ok(parse_numeric(self.get(column)?))
    }

    pub fn flag(&self, column: &str) -> Result<Option<bool>> {
        Ok(parse_flag(self.get(column)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(
            "sample",
            vec!["id".into(), "los".into(), "flag".into()],
            vec![
                vec!["1".into(), "2.5".into(), "True".into()],
                vec!["2".into(), "NA".into()],
                vec!["3".into(), "7".into(), "0".into()],
            ],
        )
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = sample();
        let row = table.row(1).unwrap();
        assert_eq!(row.get("flag").unwrap(), "");
        assert_eq!(row.flag("flag").unwrap(), None);
        assert_eq!(row.number("los").unwrap(), None);
    }

    #[test]
    fn test_typed_access() {
        let table = sample();
        let row = table.row(0).unwrap();
        assert_eq!(row.number("los").unwrap(), Some(2.5));
        assert_eq!(row.flag("flag").unwrap(), Some(true));
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let table = sample();
        let err = table.require(["id", "sepsis3"]).unwrap_err();
        match err {
            Error::MissingColumn { table, column } => {
                assert_eq!(table, "sample");
                assert_eq!(column, "sepsis3");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_select_rows_keeps_columns_and_order() {
        let table = sample();
        let subset = table.select_rows("subset", &[2, 0]);
        assert_eq!(subset.headers(), table.headers());
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.row(0).unwrap().get("id").unwrap(), "3");
        assert_eq!(subset.row(1).unwrap().get("id").unwrap(), "1");
    }
}
