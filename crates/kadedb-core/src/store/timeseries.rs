//! Time-series storage engine
//!
//! Each series keeps a derived flat table schema (timestamp first, then
//! tags, then values) and partitions rows into Hourly or Daily buckets
//! keyed by bucket-start seconds. Appends enforce the retention policy
//! silently; range scans and bucketed aggregations visit only the buckets
//! overlapping the requested window.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::{KadeError, KadeResult};
use crate::predicate::Predicate;
use crate::result_set::ResultSet;
use crate::row::Row;
use crate::schema::{Granularity, Partition, TableSchema, TimeSeriesSchema};
use crate::validation::validate_row;
use crate::value::{Value, ValueType};

/// Aggregation functions over a value column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

#[derive(Debug)]
struct Series {
    schema: TimeSeriesSchema,
    partition: Partition,
    table_schema: TableSchema,
    /// Bucket-start seconds → rows in append order
    buckets: BTreeMap<i64, Vec<Row>>,
}

impl Series {
    fn total_rows(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Timestamp of a stored row, in seconds
    fn row_tsec(&self, row: &Row) -> Option<i64> {
        match row.value(0) {
            Some(Value::Integer(ts)) => Some(self.schema.granularity.timestamp_to_seconds(*ts)),
            _ => None,
        }
    }
}

/// In-memory time-series store
#[derive(Debug, Default)]
pub struct TimeSeriesStore {
    inner: Mutex<HashMap<String, Series>>,
}

impl TimeSeriesStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> KadeResult<MutexGuard<'_, HashMap<String, Series>>> {
        self.inner
            .lock()
            .map_err(|_| KadeError::internal("time-series store lock poisoned"))
    }

    /// Create a series; derives the flat table schema from `schema`
    pub fn create_series(
        &self,
        name: &str,
        schema: TimeSeriesSchema,
        partition: Partition,
    ) -> KadeResult<()> {
        let mut series_map = self.guard()?;
        if series_map.contains_key(name) {
            return Err(KadeError::already_exists(format!("series '{name}'")));
        }
        let table_schema = TableSchema::new(schema.all_columns());
        series_map.insert(
            name.to_string(),
            Series {
                schema,
                partition,
                table_schema,
                buckets: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Drop a series and all of its buckets
    pub fn drop_series(&self, name: &str) -> KadeResult<()> {
        self.guard()?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| KadeError::not_found(format!("series '{name}'")))
    }

    /// Series names, in arbitrary order
    pub fn list_series(&self) -> KadeResult<Vec<String>> {
        Ok(self.guard()?.keys().cloned().collect())
    }

    /// Deep copy of the derived flat table schema of a series
    pub fn series_table_schema(&self, name: &str) -> KadeResult<TableSchema> {
        let series_map = self.guard()?;
        Ok(lookup(&series_map, name)?.table_schema.clone())
    }

    /// Total stored rows across all buckets
    pub fn total_rows(&self, name: &str) -> KadeResult<usize> {
        let series_map = self.guard()?;
        Ok(lookup(&series_map, name)?.total_rows())
    }

    /// Validate and append a row, then enforce retention
    ///
    /// The timestamp cell must be a non-null Integer (the derived schema
    /// guarantees this for validated rows). Retention trimming is silent
    /// and never fails the append.
    pub fn append(&self, name: &str, row: Row) -> KadeResult<()> {
        let mut series_map = self.guard()?;
        let series = lookup_mut(&mut series_map, name)?;
        if let Some(message) = validate_row(&series.table_schema, &row) {
            return Err(KadeError::invalid_argument(message));
        }
        let ts = match row.value(0) {
            Some(Value::Integer(ts)) => *ts,
            _ => {
                return Err(KadeError::invalid_argument(
                    "timestamp cell must be an integer",
                ))
            }
        };
        let tsec = series.schema.granularity.timestamp_to_seconds(ts);
        let bucket_start = series.partition.bucket_start(tsec);
        series.buckets.entry(bucket_start).or_default().push(row);

        if let Some(policy) = series.schema.retention_policy().copied() {
            if policy.ttl_seconds > 0 {
                let cutoff = tsec - policy.ttl_seconds;
                enforce_ttl(series, cutoff);
            }
            if policy.max_rows > 0 && policy.drop_oldest {
                enforce_max_rows(series, policy.max_rows);
            }
        }
        debug!(
            "➕ appended to series '{name}' bucket {bucket_start} ({} total)",
            series.total_rows()
        );
        Ok(())
    }

    /// Scan rows with timestamps in `[start, end)` (series timestamp
    /// units), filter, and project `columns` (empty = all)
    pub fn range_query(
        &self,
        name: &str,
        columns: &[String],
        start: i64,
        end: i64,
        predicate: Option<&Predicate>,
    ) -> KadeResult<ResultSet> {
        if end < start {
            return Err(KadeError::invalid_argument(format!(
                "range end {end} precedes start {start}"
            )));
        }
        let series_map = self.guard()?;
        let series = lookup(&series_map, name)?;
        if let Some(pred) = predicate {
            pred.validate_columns(&series.table_schema)?;
        }
        let projection = resolve_projection(&series.table_schema, columns)?;
        let mut result = projected_result_set(&series.table_schema, &projection);

        let granularity = series.schema.granularity;
        let start_sec = granularity.timestamp_to_seconds(start);
        let end_sec = granularity.timestamp_to_seconds(end);
        if end_sec <= start_sec {
            return Ok(result);
        }

        let lo = series.partition.bucket_start(start_sec);
        let hi = series.partition.bucket_start(end_sec - 1);
        for rows in series.buckets.range(lo..=hi).map(|(_, rows)| rows) {
            for row in rows {
                let Some(tsec) = series.row_tsec(row) else {
                    continue;
                };
                if tsec < start_sec || tsec >= end_sec {
                    continue;
                }
                if !predicate.is_none_or(|p| p.evaluate(&series.table_schema, row)) {
                    continue;
                }
                result.push_row(project_row(row, &projection));
            }
        }
        Ok(result)
    }

    /// Bucketed aggregation over a value column
    ///
    /// Buckets are `start_sec + floor((tsec - start_sec) / width_sec) *
    /// width_sec`. Count tallies every qualifying row; the numeric
    /// statistics ignore non-numeric cells but those rows still count.
    /// Output rows are sorted ascending by bucket start with schema
    /// `(bucket_start: Integer, value: Integer|Float)`.
    #[allow(clippy::too_many_arguments)]
    pub fn aggregate(
        &self,
        name: &str,
        value_column: &str,
        agg: Aggregation,
        start: i64,
        end: i64,
        bucket_width: i64,
        bucket_granularity: Granularity,
        predicate: Option<&Predicate>,
    ) -> KadeResult<ResultSet> {
        if end < start {
            return Err(KadeError::invalid_argument(format!(
                "range end {end} precedes start {start}"
            )));
        }
        if bucket_width <= 0 {
            return Err(KadeError::invalid_argument(format!(
                "bucket width must be positive, got {bucket_width}"
            )));
        }
        let series_map = self.guard()?;
        let series = lookup(&series_map, name)?;
        let value_idx = series.table_schema.find_column(value_column).ok_or_else(|| {
            KadeError::invalid_argument(format!("unknown value column '{value_column}'"))
        })?;
        if let Some(pred) = predicate {
            pred.validate_columns(&series.table_schema)?;
        }

        let granularity = series.schema.granularity;
        let start_sec = granularity.timestamp_to_seconds(start);
        let end_sec = granularity.timestamp_to_seconds(end);
        let width_sec = bucket_granularity.width_to_seconds(bucket_width);

        let value_type = match agg {
            Aggregation::Count => ValueType::Integer,
            _ => ValueType::Float,
        };
        let mut result = ResultSet::new(
            vec!["bucket_start".to_string(), "value".to_string()],
            vec![ValueType::Integer, value_type],
        );
        if end_sec <= start_sec {
            return Ok(result);
        }

        let mut accumulators: BTreeMap<i64, Accumulator> = BTreeMap::new();
        let lo = series.partition.bucket_start(start_sec);
        let hi = series.partition.bucket_start(end_sec - 1);
        for rows in series.buckets.range(lo..=hi).map(|(_, rows)| rows) {
            for row in rows {
                let Some(tsec) = series.row_tsec(row) else {
                    continue;
                };
                if tsec < start_sec || tsec >= end_sec {
                    continue;
                }
                if !predicate.is_none_or(|p| p.evaluate(&series.table_schema, row)) {
                    continue;
                }
                let bucket = start_sec + (tsec - start_sec).div_euclid(width_sec) * width_sec;
                let acc = accumulators.entry(bucket).or_default();
                acc.count += 1;
                match row.value(value_idx) {
                    Some(Value::Integer(v)) => acc.observe(*v as f64),
                    Some(Value::Float(v)) => acc.observe(*v),
                    _ => {}
                }
            }
        }

        for (bucket_start, acc) in accumulators {
            result.push_row(Row::new(vec![
                Some(Value::integer(bucket_start)),
                acc.finish(agg),
            ]));
        }
        Ok(result)
    }
}

/// Running statistics for one aggregation bucket
#[derive(Debug, Default)]
struct Accumulator {
    count: u64,
    numeric_count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Accumulator {
    fn observe(&mut self, v: f64) {
        if self.numeric_count == 0 {
            self.min = v;
            self.max = v;
        } else {
            if v < self.min {
                self.min = v;
            }
            if v > self.max {
                self.max = v;
            }
        }
        self.numeric_count += 1;
        self.sum += v;
    }

    /// Final cell for the bucket; Null when a numeric statistic saw no
    /// numeric cells
    fn finish(&self, agg: Aggregation) -> Option<Value> {
        match agg {
            Aggregation::Count => Some(Value::integer(self.count as i64)),
            Aggregation::Sum => Some(Value::float(self.sum)),
            Aggregation::Min if self.numeric_count > 0 => Some(Value::float(self.min)),
            Aggregation::Max if self.numeric_count > 0 => Some(Value::float(self.max)),
            Aggregation::Avg if self.numeric_count > 0 => {
                Some(Value::float(self.sum / self.numeric_count as f64))
            }
            _ => None,
        }
    }
}

/// Drop rows older than the TTL cutoff; whole buckets that cannot contain
/// surviving rows go first
fn enforce_ttl(series: &mut Series, cutoff: i64) {
    let stale: Vec<i64> = series
        .buckets
        .keys()
        .copied()
        .filter(|&bucket_start| bucket_start + 86_400 < cutoff)
        .collect();
    for bucket_start in stale {
        series.buckets.remove(&bucket_start);
    }
    let granularity = series.schema.granularity;
    for rows in series.buckets.values_mut() {
        rows.retain(|row| match row.value(0) {
            Some(Value::Integer(ts)) => granularity.timestamp_to_seconds(*ts) >= cutoff,
            _ => false,
        });
    }
    series.buckets.retain(|_, rows| !rows.is_empty());
}

/// Trim from the front of the oldest bucket until within the row bound
fn enforce_max_rows(series: &mut Series, max_rows: usize) {
    while series.total_rows() > max_rows {
        let Some((&oldest, _)) = series.buckets.iter().next() else {
            break;
        };
        if let Some(rows) = series.buckets.get_mut(&oldest) {
            if !rows.is_empty() {
                rows.remove(0);
            }
            if rows.is_empty() {
                series.buckets.remove(&oldest);
            }
        }
    }
}

fn lookup<'a>(series_map: &'a HashMap<String, Series>, name: &str) -> KadeResult<&'a Series> {
    series_map
        .get(name)
        .ok_or_else(|| KadeError::not_found(format!("series '{name}'")))
}

fn lookup_mut<'a>(
    series_map: &'a mut HashMap<String, Series>,
    name: &str,
) -> KadeResult<&'a mut Series> {
    series_map
        .get_mut(name)
        .ok_or_else(|| KadeError::not_found(format!("series '{name}'")))
}

fn resolve_projection(schema: &TableSchema, columns: &[String]) -> KadeResult<Vec<usize>> {
    if columns.is_empty() {
        return Ok((0..schema.len()).collect());
    }
    columns
        .iter()
        .map(|name| {
            schema.find_column(name).ok_or_else(|| {
                KadeError::invalid_argument(format!("unknown projection column '{name}'"))
            })
        })
        .collect()
}

fn projected_result_set(schema: &TableSchema, projection: &[usize]) -> ResultSet {
    let mut names = Vec::with_capacity(projection.len());
    let mut types = Vec::with_capacity(projection.len());
    for &idx in projection {
        if let Some(column) = schema.column_at(idx) {
            names.push(column.name.clone());
            types.push(column.ty);
        }
    }
    ResultSet::new(names, types)
}

fn project_row(row: &Row, projection: &[usize]) -> Row {
    Row::new(
        projection
            .iter()
            .map(|&idx| row.cell(idx).cloned().unwrap_or(None))
            .collect(),
    )
}
