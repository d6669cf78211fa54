//! Shared result-set representation
//!
//! Every query API and the KadeQL executor produce a [`ResultSet`]: a typed
//! column header plus a row vector. Result sets are fully materialized and
//! own deep clones of their cells, so callers can keep them across later
//! store mutations.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::row::Row;
use crate::serialization::json::value_to_json;
use crate::value::{Value, ValueType};

/// One output row of a result set
pub type ResultRow = Row;

/// Options for CSV emission
///
/// Fields containing the delimiter, the quote, CR, or LF are quoted, with
/// embedded quotes doubled (RFC-4180 style). Null cells emit as empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvOptions {
    pub delimiter: char,
    pub quote: char,
    pub include_header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
            include_header: true,
        }
    }
}

/// Typed column header plus row vector with a forward cursor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    columns: Vec<String>,
    types: Vec<ValueType>,
    rows: Vec<ResultRow>,
    #[serde(skip)]
    cursor: usize,
}

impl ResultSet {
    /// Create an empty result set with the given header
    pub fn new(columns: Vec<String>, types: Vec<ValueType>) -> Self {
        debug_assert_eq!(columns.len(), types.len());
        Self {
            columns,
            types,
            rows: Vec::new(),
            cursor: 0,
        }
    }

    /// Append a row
    pub fn push_row(&mut self, row: ResultRow) {
        self.rows.push(row);
    }

    /// Column names in declared order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Column types, parallel to [`Self::columns`]
    pub fn types(&self) -> &[ValueType] {
        &self.types
    }

    /// All rows
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Non-null value at `(row, col)`
    pub fn at(&self, row: usize, col: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.value(col))
    }

    /// Non-null value at `(row, column name)`
    pub fn at_named(&self, row: usize, name: &str) -> Option<&Value> {
        self.find_column(name).and_then(|col| self.at(row, col))
    }

    /// Advance the forward cursor, returning the next row
    pub fn next_row(&mut self) -> Option<&ResultRow> {
        let idx = self.cursor;
        if idx < self.rows.len() {
            self.cursor += 1;
            self.rows.get(idx)
        } else {
            None
        }
    }

    /// Reset the forward cursor to the first row
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Iterate over rows without touching the cursor
    pub fn iter(&self) -> std::slice::Iter<'_, ResultRow> {
        self.rows.iter()
    }

    /// Emit CSV with the given options
    pub fn to_csv(&self, opts: &CsvOptions) -> String {
        let mut out = String::new();
        if opts.include_header {
            Self::write_csv_record(
                &mut out,
                self.columns.iter().map(String::as_str),
                opts,
            );
        }
        for row in &self.rows {
            let fields: Vec<String> = row
                .iter()
                .map(|cell| match cell {
                    Some(v) => v.to_string(),
                    None => String::new(),
                })
                .collect();
            Self::write_csv_record(&mut out, fields.iter().map(String::as_str), opts);
        }
        out
    }

    fn write_csv_record<'a>(
        out: &mut String,
        fields: impl Iterator<Item = &'a str>,
        opts: &CsvOptions,
    ) {
        let mut first = true;
        for field in fields {
            if !first {
                out.push(opts.delimiter);
            }
            first = false;
            let needs_quoting = field
                .chars()
                .any(|c| c == opts.delimiter || c == opts.quote || c == '\r' || c == '\n');
            if needs_quoting {
                out.push(opts.quote);
                for c in field.chars() {
                    if c == opts.quote {
                        out.push(opts.quote);
                    }
                    out.push(c);
                }
                out.push(opts.quote);
            } else {
                out.push_str(field);
            }
        }
        out.push_str("\r\n");
    }

    /// Emit rows as a JSON array of arrays of value JSON
    pub fn to_json(&self) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| {
                serde_json::Value::Array(
                    row.iter()
                        .map(|cell| match cell {
                            Some(v) => value_to_json(v),
                            None => serde_json::Value::Null,
                        })
                        .collect(),
                )
            })
            .collect();
        serde_json::Value::Array(rows)
    }

    /// Emit the `{columns, types, rows}` envelope
    pub fn to_json_envelope(&self) -> serde_json::Value {
        json!({
            "columns": self.columns,
            "types": self.types.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "rows": self.to_json(),
        })
    }

    /// Number of pages at the given page size
    pub fn page_count(&self, page_size: usize) -> usize {
        if page_size == 0 {
            return 0;
        }
        self.rows.len().div_ceil(page_size)
    }

    /// Slice out one page; out-of-range pages yield an empty result with
    /// the same header
    pub fn page(&self, index: usize, page_size: usize) -> ResultSet {
        let mut out = Self::new(self.columns.clone(), self.types.clone());
        if page_size == 0 {
            return out;
        }
        let start = index.saturating_mul(page_size);
        if start >= self.rows.len() {
            return out;
        }
        let end = (start + page_size).min(self.rows.len());
        out.rows = self.rows[start..end].to_vec();
        out
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ResultRow;
    type IntoIter = std::slice::Iter<'a, ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultSet {
        let mut rs = ResultSet::new(
            vec!["id".into(), "name".into()],
            vec![ValueType::Integer, ValueType::String],
        );
        rs.push_row(Row::new(vec![
            Some(Value::integer(1)),
            Some(Value::string("ada")),
        ]));
        rs.push_row(Row::new(vec![Some(Value::integer(2)), None]));
        rs.push_row(Row::new(vec![
            Some(Value::integer(3)),
            Some(Value::string("has,comma \"q\"\nline")),
        ]));
        rs
    }

    #[test]
    fn test_lookup_and_at() {
        let rs = sample();
        assert_eq!(rs.find_column("name"), Some(1));
        assert_eq!(rs.at(0, 0), Some(&Value::integer(1)));
        assert_eq!(rs.at(1, 1), None);
        assert_eq!(rs.at_named(0, "name"), Some(&Value::string("ada")));
    }

    #[test]
    fn test_cursor() {
        let mut rs = sample();
        assert_eq!(rs.next_row().unwrap().value(0), Some(&Value::integer(1)));
        assert_eq!(rs.next_row().unwrap().value(0), Some(&Value::integer(2)));
        rs.rewind();
        assert_eq!(rs.next_row().unwrap().value(0), Some(&Value::integer(1)));
        rs.next_row();
        rs.next_row();
        assert!(rs.next_row().is_none());
    }

    #[test]
    fn test_csv_escaping() {
        let csv = sample().to_csv(&CsvOptions::default());
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[0], "id,name");
        assert_eq!(lines[1], "1,ada");
        assert_eq!(lines[2], "2,");
        // Field with delimiter, quote and newline gets quoted with doubled quotes.
        assert!(lines[3].starts_with("3,\"has,comma \"\"q\"\""));
    }

    #[test]
    fn test_csv_custom_delimiter() {
        let opts = CsvOptions {
            delimiter: ';',
            quote: '\'',
            include_header: false,
        };
        let mut rs = ResultSet::new(vec!["v".into()], vec![ValueType::String]);
        rs.push_row(Row::new(vec![Some(Value::string("a;b"))]));
        assert_eq!(rs.to_csv(&opts), "'a;b'\r\n");
    }

    #[test]
    fn test_json_envelope() {
        let v = sample().to_json_envelope();
        assert_eq!(v["columns"][1], "name");
        assert_eq!(v["types"][0], "integer");
        assert_eq!(v["rows"][0][0]["t"], "int");
        assert_eq!(v["rows"][1][1], serde_json::Value::Null);
    }

    #[test]
    fn test_pagination() {
        let rs = sample();
        assert_eq!(rs.page_count(2), 2);
        let p0 = rs.page(0, 2);
        assert_eq!(p0.row_count(), 2);
        assert_eq!(p0.columns(), rs.columns());
        let p1 = rs.page(1, 2);
        assert_eq!(p1.row_count(), 1);
        assert!(rs.page(2, 2).is_empty());
        assert_eq!(rs.page_count(0), 0);
    }
}
