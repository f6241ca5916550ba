use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::domain::FileId;
use crate::error::GdcError;

/// Rows of a tab-delimited search response with collapsed column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResultTable {
    /// Parses a TSV body whose header row holds dot-qualified field names.
    ///
    /// Short rows are padded with empty cells; rows with more cells than the
    /// header are rejected.
    pub fn from_tsv(text: &str) -> Result<Self, GdcError> {
        let mut lines = text
            .lines()
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let (_, header) = lines
            .next()
            .ok_or_else(|| GdcError::TableParse("response has no header row".to_string()))?;
        let columns = header.split('\t').map(collapse_column).collect::<Vec<_>>();

        let mut rows = Vec::new();
        for (index, line) in lines {
            let mut cells = line.split('\t').map(str::to_string).collect::<Vec<_>>();
            if cells.len() > columns.len() {
                return Err(GdcError::TableParse(format!(
                    "line {}: expected {} fields, saw {}",
                    index + 1,
                    columns.len(),
                    cells.len()
                )));
            }
            cells.resize(columns.len(), String::new());
            rows.push(cells);
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of the first column called `name`.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.columns.iter().position(|column| column == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).map_or("", String::as_str))
                .collect(),
        )
    }

    /// Identifiers from the `file_id` column, ready for a bulk download.
    pub fn file_ids(&self) -> Result<Vec<FileId>, GdcError> {
        let values = self
            .column("file_id")
            .ok_or_else(|| GdcError::TableParse("no file_id column in result".to_string()))?;
        values.into_iter().map(str::parse).collect()
    }

    pub fn to_tsv(&self) -> String {
        let mut out = self.columns.join("\t");
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
        out
    }
}

/// Serializes as a list of `{column: value}` records.
impl Serialize for ResultTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&Record {
                columns: &self.columns,
                row,
            })?;
        }
        seq.end()
    }
}

struct Record<'a> {
    columns: &'a [String],
    row: &'a [String],
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.row) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// `cases.samples.sample_type` -> `sample_type`
pub fn collapse_column(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).trim().to_string()
}
