//! Correspondence tables loaded from CSV.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;

use crate::error::{Result, RuleError};

/// One table row, keyed by column name.
pub type Row = BTreeMap<String, String>;

/// Cell markers that spreadsheet tooling writes for missing values.
const NA_MARKERS: &[&str] = &[
    "nan", "NaN", "NAN", "NA", "N/A", "n/a", "NULL", "null", "None", "#N/A", "<NA>",
];

/// Rows × named columns, read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct CorrespondenceTable {
    name: String,
    headers: Vec<String>,
    rows: Vec<Row>,
}

fn normalize_header(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').trim().to_string()
}

fn normalize_cell(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('\u{feff}');
    if NA_MARKERS.contains(&trimmed) {
        String::new()
    } else {
        trimmed.to_string()
    }
}

impl CorrespondenceTable {
    /// Load a table from a CSV file with a header row.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(RuleError::TableNotFound {
                path: path.to_path_buf(),
            });
        }
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|source| RuleError::CsvRead {
                path: path.to_path_buf(),
                source,
            })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::collect(name, reader).map_err(|source| RuleError::CsvRead {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a table from any CSV source.
    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R) -> Result<Self> {
        let name = name.into();
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        Self::collect(name.clone(), reader).map_err(|source| RuleError::CsvRead {
            path: name.into(),
            source,
        })
    }

    fn collect<R: Read>(
        name: String,
        mut reader: csv::Reader<R>,
    ) -> std::result::Result<Self, csv::Error> {
        let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row = Row::new();
            for (idx, header) in headers.iter().enumerate() {
                // Short records leave the remaining columns blank.
                let value = record.get(idx).map(normalize_cell).unwrap_or_default();
                row.insert(header.clone(), value);
            }
            if row.values().all(String::is_empty) {
                continue;
            }
            rows.push(row);
        }
        Ok(Self {
            name,
            headers,
            rows,
        })
    }

    /// File name the table was loaded from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|header| header == column)
    }

    /// Columns from `required` that the table lacks, in the given order.
    pub fn missing_columns<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        required
            .into_iter()
            .filter(|column| !self.has_column(column))
            .map(str::to_string)
            .collect()
    }
}

/// Cell value of `column`, empty when the column is absent.
pub fn cell<'a>(row: &'a Row, column: &str) -> &'a str {
    row.get(column).map(String::as_str).unwrap_or("")
}
