//! Schema definitions for the KadeDB storage models
//!
//! - `Column` / `Constraints`: column metadata shared by every model
//! - `TableSchema`: ordered columns with O(1) name lookup and an optional
//!   primary key
//! - `DocumentSchema`: field-name keyed columns for document collections
//! - `TimeSeriesSchema`: timestamp column, granularity, tag/value columns,
//!   and an optional retention policy

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{KadeError, KadeResult};
use crate::value::ValueType;

/// Per-column value constraints
///
/// String rules are byte-based; numeric bounds are inclusive and apply to
/// both Integer and Float columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub one_of: Vec<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

impl Constraints {
    /// Create an empty constraint set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum string length in bytes
    #[must_use]
    pub const fn with_min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    /// Set the maximum string length in bytes
    #[must_use]
    pub const fn with_max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Restrict string values to an allowed set
    #[must_use]
    pub fn with_one_of(mut self, allowed: Vec<String>) -> Self {
        self.one_of = allowed;
        self
    }

    /// Set the inclusive numeric lower bound
    #[must_use]
    pub const fn with_min_value(mut self, v: f64) -> Self {
        self.min_value = Some(v);
        self
    }

    /// Set the inclusive numeric upper bound
    #[must_use]
    pub const fn with_max_value(mut self, v: f64) -> Self {
        self.max_value = Some(v);
        self
    }
}

/// Column definition shared by table, document, and time-series schemas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ValueType,
    pub nullable: bool,
    pub unique: bool,
    pub constraints: Option<Constraints>,
}

impl Column {
    /// Create a new non-nullable, non-unique column
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            unique: false,
            constraints: None,
        }
    }

    /// Mark the column as nullable
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark the column as unique
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Attach value constraints
    #[must_use]
    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = Some(constraints);
        self
    }
}

/// Table structure definition: ordered columns plus an optional primary key
///
/// Column lookup by name is O(1) average via an internal name index that is
/// kept in sync by every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawTableSchema", into = "RawTableSchema")]
pub struct TableSchema {
    columns: Vec<Column>,
    primary_key: Option<String>,
    index: HashMap<String, usize>,
}

/// Serde shadow for [`TableSchema`]; the name index is rebuilt on the way in
#[derive(Serialize, Deserialize)]
struct RawTableSchema {
    columns: Vec<Column>,
    primary_key: Option<String>,
}

impl From<RawTableSchema> for TableSchema {
    fn from(raw: RawTableSchema) -> Self {
        let index = Self::build_index(&raw.columns);
        Self {
            columns: raw.columns,
            primary_key: raw.primary_key,
            index,
        }
    }
}

impl From<TableSchema> for RawTableSchema {
    fn from(schema: TableSchema) -> Self {
        Self {
            columns: schema.columns,
            primary_key: schema.primary_key,
        }
    }
}

impl TableSchema {
    /// Create a schema from ordered columns, no primary key
    pub fn new(columns: Vec<Column>) -> Self {
        let index = Self::build_index(&columns);
        Self {
            columns,
            primary_key: None,
            index,
        }
    }

    /// Create a schema with a primary key; the key must name a column
    pub fn with_primary_key(
        columns: Vec<Column>,
        primary_key: impl Into<String>,
    ) -> KadeResult<Self> {
        let mut schema = Self::new(columns);
        schema.set_primary_key(primary_key)?;
        Ok(schema)
    }

    fn build_index(columns: &[Column]) -> HashMap<String, usize> {
        columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect()
    }

    /// Rebuild the name index; used after deserialization
    pub fn rebuild_index(&mut self) {
        self.index = Self::build_index(&self.columns);
    }

    /// Position of a column by name, O(1) average
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.find_column(name).map(|i| &self.columns[i])
    }

    /// Column by position
    pub fn column_at(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    /// All columns in declared order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The primary-key column name, when set
    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Append a column; the name must be new
    pub fn add_column(&mut self, column: Column) -> KadeResult<()> {
        if self.index.contains_key(&column.name) {
            return Err(KadeError::invalid_argument(format!(
                "column '{}' already exists",
                column.name
            )));
        }
        self.index.insert(column.name.clone(), self.columns.len());
        self.columns.push(column);
        Ok(())
    }

    /// Remove a column by name; clears the primary key if it referenced it
    pub fn remove_column(&mut self, name: &str) -> KadeResult<()> {
        let idx = self
            .find_column(name)
            .ok_or_else(|| KadeError::invalid_argument(format!("unknown column '{name}'")))?;
        self.columns.remove(idx);
        if self.primary_key.as_deref() == Some(name) {
            self.primary_key = None;
        }
        self.rebuild_index();
        Ok(())
    }

    /// Replace a column definition in place, keeping its position
    ///
    /// The replacement may rename the column as long as the new name does
    /// not collide with another column.
    pub fn update_column(&mut self, name: &str, column: Column) -> KadeResult<()> {
        let idx = self
            .find_column(name)
            .ok_or_else(|| KadeError::invalid_argument(format!("unknown column '{name}'")))?;
        if column.name != name && self.index.contains_key(&column.name) {
            return Err(KadeError::invalid_argument(format!(
                "column '{}' already exists",
                column.name
            )));
        }
        if self.primary_key.as_deref() == Some(name) {
            self.primary_key = Some(column.name.clone());
        }
        self.columns[idx] = column;
        self.rebuild_index();
        Ok(())
    }

    /// Set the primary key; must reference an existing column
    pub fn set_primary_key(&mut self, name: impl Into<String>) -> KadeResult<()> {
        let name = name.into();
        if self.find_column(&name).is_none() {
            return Err(KadeError::invalid_argument(format!(
                "primary key references unknown column '{name}'"
            )));
        }
        self.primary_key = Some(name);
        Ok(())
    }
}

impl PartialEq for TableSchema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns && self.primary_key == other.primary_key
    }
}

/// Field-name keyed schema for document collections
///
/// Unknown fields in a document are always allowed; fields named here are
/// validated against their column definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSchema {
    fields: HashMap<String, Column>,
}

impl DocumentSchema {
    /// Create an empty document schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field, keyed by the column name
    pub fn add_field(&mut self, column: Column) {
        self.fields.insert(column.name.clone(), column);
    }

    /// Remove a field by name
    pub fn remove_field(&mut self, name: &str) -> KadeResult<()> {
        self.fields
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| KadeError::invalid_argument(format!("unknown field '{name}'")))
    }

    /// Field definition by name
    pub fn get_field(&self, name: &str) -> Option<&Column> {
        self.fields.get(name)
    }

    /// Whether a field is declared
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterate over all declared fields
    pub fn fields(&self) -> impl Iterator<Item = &Column> {
        self.fields.values()
    }

    /// Number of declared fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are declared
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Timestamp granularity of a time series
///
/// The scale converts stored timestamp integers (and bucket widths) to
/// seconds. Conversions floor, so negative timestamps land in the bucket
/// below zero rather than rounding toward it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl Granularity {
    /// Convert a stored timestamp to whole seconds (floor division)
    pub fn timestamp_to_seconds(self, ts: i64) -> i64 {
        match self {
            Self::Nanoseconds => ts.div_euclid(1_000_000_000),
            Self::Microseconds => ts.div_euclid(1_000_000),
            Self::Milliseconds => ts.div_euclid(1_000),
            Self::Seconds => ts,
            Self::Minutes => ts * 60,
            Self::Hours => ts * 3_600,
            Self::Days => ts * 86_400,
        }
    }

    /// Convert a bucket width to seconds, at least 1 for sub-second widths
    pub fn width_to_seconds(self, width: i64) -> i64 {
        match self {
            Self::Nanoseconds => width.div_euclid(1_000_000_000).max(1),
            Self::Microseconds => width.div_euclid(1_000_000).max(1),
            Self::Milliseconds => width.div_euclid(1_000).max(1),
            Self::Seconds => width,
            Self::Minutes => width * 60,
            Self::Hours => width * 3_600,
            Self::Days => width * 86_400,
        }
    }
}

/// Coarse bucketing scheme for time-series partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Partition {
    Hourly,
    Daily,
}

impl Partition {
    /// Partition width in seconds
    pub const fn div_seconds(self) -> i64 {
        match self {
            Self::Hourly => 3_600,
            Self::Daily => 86_400,
        }
    }

    /// Bucket start for a timestamp in seconds (floors for negatives too)
    pub fn bucket_start(self, tsec: i64) -> i64 {
        let div = self.div_seconds();
        tsec.div_euclid(div) * div
    }
}

/// Retention bounds enforced on every append
///
/// A zero `ttl_seconds` or `max_rows` disables that bound. `drop_oldest`
/// selects trimming from the front of the oldest bucket when `max_rows` is
/// exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub ttl_seconds: i64,
    pub max_rows: usize,
    pub drop_oldest: bool,
}

impl RetentionPolicy {
    /// TTL-only policy
    pub const fn ttl(seconds: i64) -> Self {
        Self {
            ttl_seconds: seconds,
            max_rows: 0,
            drop_oldest: false,
        }
    }

    /// Row-count policy dropping the oldest rows
    pub const fn max_rows(rows: usize) -> Self {
        Self {
            ttl_seconds: 0,
            max_rows: rows,
            drop_oldest: true,
        }
    }
}

/// Schema of a time series: timestamp column, granularity, ordered value
/// and tag columns, optional retention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesSchema {
    pub timestamp_column: String,
    pub granularity: Granularity,
    value_columns: Vec<Column>,
    tag_columns: Vec<Column>,
    retention: Option<RetentionPolicy>,
}

impl TimeSeriesSchema {
    /// Create a schema with the given timestamp column and granularity
    pub fn new(timestamp_column: impl Into<String>, granularity: Granularity) -> Self {
        Self {
            timestamp_column: timestamp_column.into(),
            granularity,
            value_columns: Vec::new(),
            tag_columns: Vec::new(),
            retention: None,
        }
    }

    /// Append a value column
    pub fn add_value_column(&mut self, column: Column) {
        self.value_columns.push(column);
    }

    /// Append a tag column
    pub fn add_tag_column(&mut self, column: Column) {
        self.tag_columns.push(column);
    }

    /// Set or replace the retention policy
    pub fn set_retention_policy(&mut self, policy: RetentionPolicy) {
        self.retention = Some(policy);
    }

    /// The retention policy, when set
    pub fn retention_policy(&self) -> Option<&RetentionPolicy> {
        self.retention.as_ref()
    }

    /// Declared value columns, in order
    pub fn value_columns(&self) -> &[Column] {
        &self.value_columns
    }

    /// Declared tag columns, in order
    pub fn tag_columns(&self) -> &[Column] {
        &self.tag_columns
    }

    /// Flat column list: non-nullable Integer timestamp, then tags, then
    /// values. This is the shape of the derived table schema a series
    /// stores rows under.
    pub fn all_columns(&self) -> Vec<Column> {
        let mut cols =
            Vec::with_capacity(1 + self.tag_columns.len() + self.value_columns.len());
        cols.push(Column::new(&self.timestamp_column, ValueType::Integer));
        cols.extend(self.tag_columns.iter().cloned());
        cols.extend(self.value_columns.iter().cloned());
        cols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_columns() -> Vec<Column> {
        vec![
            Column::new("id", ValueType::Integer).unique(),
            Column::new("name", ValueType::String),
            Column::new("age", ValueType::Integer).nullable(),
        ]
    }

    #[test]
    fn test_column_builder() {
        let col = Column::new("name", ValueType::String)
            .nullable()
            .with_constraints(Constraints::new().with_min_length(1).with_max_length(64));
        assert!(col.nullable);
        assert!(!col.unique);
        assert_eq!(col.constraints.unwrap().max_length, Some(64));
    }

    #[test]
    fn test_table_schema_lookup() {
        let schema = TableSchema::with_primary_key(person_columns(), "id").unwrap();
        assert_eq!(schema.find_column("name"), Some(1));
        assert_eq!(schema.find_column("missing"), None);
        assert_eq!(schema.primary_key(), Some("id"));
    }

    #[test]
    fn test_primary_key_must_exist() {
        let err = TableSchema::with_primary_key(person_columns(), "nope").unwrap_err();
        assert!(err.to_string().contains("unknown column"));
    }

    #[test]
    fn test_add_remove_update_column() {
        let mut schema = TableSchema::new(person_columns());
        schema
            .add_column(Column::new("email", ValueType::String))
            .unwrap();
        assert_eq!(schema.find_column("email"), Some(3));
        assert!(schema.add_column(Column::new("email", ValueType::String)).is_err());

        schema
            .update_column("email", Column::new("mail", ValueType::String))
            .unwrap();
        assert_eq!(schema.find_column("email"), None);
        assert_eq!(schema.find_column("mail"), Some(3));

        schema.remove_column("mail").unwrap();
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn test_remove_primary_key_column_clears_key() {
        let mut schema = TableSchema::with_primary_key(person_columns(), "id").unwrap();
        schema.remove_column("id").unwrap();
        assert_eq!(schema.primary_key(), None);
        // Positions shift after removal.
        assert_eq!(schema.find_column("name"), Some(0));
    }

    #[test]
    fn test_document_schema_fields() {
        let mut schema = DocumentSchema::new();
        schema.add_field(Column::new("sku", ValueType::String).unique());
        assert!(schema.has_field("sku"));
        assert!(schema.get_field("sku").unwrap().unique);
        assert!(schema.remove_field("other").is_err());
        schema.remove_field("sku").unwrap();
        assert!(schema.is_empty());
    }

    #[test]
    fn test_granularity_scaling() {
        assert_eq!(Granularity::Milliseconds.timestamp_to_seconds(1_500), 1);
        assert_eq!(Granularity::Milliseconds.timestamp_to_seconds(-1), -1);
        assert_eq!(Granularity::Nanoseconds.timestamp_to_seconds(999_999_999), 0);
        assert_eq!(Granularity::Minutes.timestamp_to_seconds(2), 120);
        assert_eq!(Granularity::Days.timestamp_to_seconds(-1), -86_400);
        // Sub-second widths round up to one second.
        assert_eq!(Granularity::Milliseconds.width_to_seconds(10), 1);
        assert_eq!(Granularity::Seconds.width_to_seconds(10), 10);
        assert_eq!(Granularity::Hours.width_to_seconds(2), 7_200);
    }

    #[test]
    fn test_partition_bucket_floors_negatives() {
        assert_eq!(Partition::Hourly.bucket_start(3_700), 3_600);
        assert_eq!(Partition::Hourly.bucket_start(-1), -3_600);
        assert_eq!(Partition::Daily.bucket_start(86_400), 86_400);
        assert_eq!(Partition::Daily.bucket_start(-86_401), -172_800);
    }

    #[test]
    fn test_timeseries_all_columns_order() {
        let mut schema = TimeSeriesSchema::new("timestamp", Granularity::Seconds);
        schema.add_value_column(Column::new("value", ValueType::Integer).nullable());
        schema.add_tag_column(Column::new("sensor_id", ValueType::Integer));
        let cols = schema.all_columns();
        let names: Vec<&str> = cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["timestamp", "sensor_id", "value"]);
        assert_eq!(cols[0].ty, ValueType::Integer);
        assert!(!cols[0].nullable);
    }
}
