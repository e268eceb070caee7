//! Raw tabular source data
//!
//! Source extracts are flat CSV files. Columns are looked up by name so a
//! stage can fail fast with `MissingSourceColumn` instead of reading the
//! wrong field.

use crate::{PipelineError, Result};
use csv::StringRecord;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

/// A whole source table held in memory
#[derive(Debug, Clone)]
pub struct RawTable {
    name: String,
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

/// Handle to one named column of a [`RawTable`]
#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    table: &'a RawTable,
    index: usize,
}

impl RawTable {
    /// Load a CSV file with a header row
    pub fn from_path(name: &str, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading {} table from {:?}", name, path);

        let file = File::open(path)?;
        let table = Self::from_reader(name, BufReader::new(file))?;

        info!("Loaded {} rows from {:?}", table.len(), path);
        Ok(table)
    }

    pub fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            headers,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Look up a column by name
    pub fn column(&self, column: &str) -> Result<Column<'_>> {
        self.headers
            .iter()
            .position(|h| h == column)
            .map(|index| Column { table: self, index })
            .ok_or_else(|| PipelineError::MissingSourceColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }
}

impl<'a> Column<'a> {
    /// Raw text of this column in `row` (empty if the record is short)
    pub fn text(&self, row: usize) -> &'a str {
        self.table.rows[row].get(self.index).unwrap_or("")
    }

    /// Numeric value of this column in `row`, `None` when missing
    pub fn numeric(&self, row: usize) -> Option<f64> {
        parse_numeric(self.text(row))
    }
}

/// Coerce a raw cell to a number
///
/// Blank cells, "NA"/"NaN" markers, unparsable text and non-finite values
/// are all missing. Missing never becomes zero.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "state,county,poverty_rate\n13,1,0.21\n13,3,\n13,5,NaN\n";

    #[test]
    fn test_from_reader() {
        let table = RawTable::from_reader("sample", SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.has_column("poverty_rate"));
        assert!(!table.has_column("housing_cost_burden"));
    }

    #[test]
    fn test_numeric_missing_is_none() {
        let table = RawTable::from_reader("sample", SAMPLE.as_bytes()).unwrap();
        let col = table.column("poverty_rate").unwrap();
        assert_eq!(col.numeric(0), Some(0.21));
        assert_eq!(col.numeric(1), None);
        assert_eq!(col.numeric(2), None);
    }

    #[test]
    fn test_missing_column() {
        let table = RawTable::from_reader("sample", SAMPLE.as_bytes()).unwrap();
        match table.column("housing_cost_burden") {
            Err(PipelineError::MissingSourceColumn { table, column }) => {
                assert_eq!(table, "sample");
                assert_eq!(column, "housing_cost_burden");
            }
            other => panic!("expected MissingSourceColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric(" 12.5 "), Some(12.5));
        assert_eq!(parse_numeric(".5"), Some(0.5));
        assert_eq!(parse_numeric("NA"), None);
        assert_eq!(parse_numeric("inf"), None);
        assert_eq!(parse_numeric(""), None);
    }
}
