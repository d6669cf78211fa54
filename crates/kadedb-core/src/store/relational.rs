//! Relational storage engine
//!
//! Tables are a name-keyed map of `{schema, rows}`. One store-wide mutex
//! guards every operation. Inserts and updates enforce schema validation
//! and per-column uniqueness; updates revalidate over a working copy and
//! swap it in only when every check passes, so a failed update leaves the
//! table untouched.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::{KadeError, KadeResult};
use crate::predicate::Predicate;
use crate::result_set::ResultSet;
use crate::row::Row;
use crate::schema::TableSchema;
use crate::validation::{validate_row, validate_unique_rows};
use crate::value::Value;

#[derive(Debug)]
struct Table {
    schema: TableSchema,
    rows: Vec<Row>,
}

/// In-memory relational store
#[derive(Debug, Default)]
pub struct RelationalStore {
    inner: Mutex<HashMap<String, Table>>,
}

impl RelationalStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> KadeResult<MutexGuard<'_, HashMap<String, Table>>> {
        self.inner
            .lock()
            .map_err(|_| KadeError::internal("relational store lock poisoned"))
    }

    /// Create a table; the schema is copied into the store
    pub fn create_table(&self, name: &str, schema: TableSchema) -> KadeResult<()> {
        let mut tables = self.guard()?;
        if tables.contains_key(name) {
            return Err(KadeError::already_exists(format!("table '{name}'")));
        }
        debug!("➕ creating table '{name}'");
        tables.insert(
            name.to_string(),
            Table {
                schema,
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    /// Drop a table and all of its rows
    pub fn drop_table(&self, name: &str) -> KadeResult<()> {
        let mut tables = self.guard()?;
        tables
            .remove(name)
            .map(|_| debug!("🗑️ dropped table '{name}'"))
            .ok_or_else(|| KadeError::not_found(format!("table '{name}'")))
    }

    /// Table names, in arbitrary order
    pub fn list_tables(&self) -> KadeResult<Vec<String>> {
        Ok(self.guard()?.keys().cloned().collect())
    }

    /// Deep copy of a table's live schema; the storage probe used by the
    /// KadeQL optimizer and executor
    pub fn table_schema(&self, name: &str) -> KadeResult<TableSchema> {
        let tables = self.guard()?;
        let table = lookup(&tables, name)?;
        Ok(table.schema.clone())
    }

    /// Number of rows in a table
    pub fn row_count(&self, name: &str) -> KadeResult<usize> {
        let tables = self.guard()?;
        Ok(lookup(&tables, name)?.rows.len())
    }

    /// Validate and append a row
    pub fn insert_row(&self, name: &str, row: Row) -> KadeResult<()> {
        let mut tables = self.guard()?;
        let table = lookup_mut(&mut tables, name)?;
        if let Some(message) = validate_row(&table.schema, &row) {
            return Err(KadeError::invalid_argument(message));
        }
        table.rows.push(row);
        if let Some(message) = validate_unique_rows(&table.schema, &table.rows, true) {
            table.rows.pop();
            return Err(KadeError::failed_precondition(message));
        }
        debug!("➕ inserted row into '{name}' ({} total)", table.rows.len());
        Ok(())
    }

    /// Filter by `predicate`, then project `columns` (empty = all, in
    /// declared order); rows come back in insertion order
    pub fn select(
        &self,
        name: &str,
        columns: &[String],
        predicate: Option<&Predicate>,
    ) -> KadeResult<ResultSet> {
        let tables = self.guard()?;
        let table = lookup(&tables, name)?;
        if let Some(pred) = predicate {
            pred.validate_columns(&table.schema)?;
        }
        let projection = resolve_projection(&table.schema, columns)?;

        let mut result = projected_result_set(&table.schema, &projection);
        for row in &table.rows {
            if predicate.is_none_or(|p| p.evaluate(&table.schema, row)) {
                result.push_row(project_row(row, &projection));
            }
        }
        Ok(result)
    }

    /// Remove every matching row, returning the count
    pub fn delete_rows(&self, name: &str, predicate: Option<&Predicate>) -> KadeResult<usize> {
        let mut tables = self.guard()?;
        let table = lookup_mut(&mut tables, name)?;
        if let Some(pred) = predicate {
            pred.validate_columns(&table.schema)?;
        }
        let before = table.rows.len();
        let schema = &table.schema;
        table
            .rows
            .retain(|row| !predicate.is_none_or(|p| p.evaluate(schema, row)));
        let removed = before - table.rows.len();
        debug!("🗑️ deleted {removed} rows from '{name}'");
        Ok(removed)
    }

    /// Set the given columns to fixed values on every matching row
    ///
    /// The whole table is revalidated (schema + uniqueness) before the
    /// change is committed; on failure nothing is modified.
    pub fn update_rows(
        &self,
        name: &str,
        assignments: &HashMap<String, Value>,
        predicate: Option<&Predicate>,
    ) -> KadeResult<usize> {
        // Unknown assignment columns must fail even when nothing matches.
        let schema = self.table_schema(name)?;
        for column in assignments.keys() {
            if schema.find_column(column).is_none() {
                return Err(KadeError::invalid_argument(format!(
                    "unknown column '{column}' in assignment"
                )));
            }
        }
        self.update_rows_with(name, predicate, |row, schema| {
            let mut updated = row.clone();
            for (column, value) in assignments {
                let idx = schema.find_column(column).ok_or_else(|| {
                    KadeError::invalid_argument(format!("unknown column '{column}' in assignment"))
                })?;
                let cell = if value.is_null() {
                    None
                } else {
                    Some(value.clone())
                };
                updated.set(idx, cell)?;
            }
            Ok(updated)
        })
    }

    /// Replace every matching row with `updater(row, schema)`
    ///
    /// Used by the KadeQL executor for computed assignments. Same
    /// revalidate-then-swap contract as [`Self::update_rows`].
    pub fn update_rows_with<F>(
        &self,
        name: &str,
        predicate: Option<&Predicate>,
        mut updater: F,
    ) -> KadeResult<usize>
    where
        F: FnMut(&Row, &TableSchema) -> KadeResult<Row>,
    {
        let mut tables = self.guard()?;
        let table = lookup_mut(&mut tables, name)?;
        if let Some(pred) = predicate {
            pred.validate_columns(&table.schema)?;
        }

        let mut working = table.rows.clone();
        let mut updated_count = 0;
        for row in &mut working {
            if !predicate.is_none_or(|p| p.evaluate(&table.schema, row)) {
                continue;
            }
            let updated = updater(row, &table.schema)?;
            if let Some(message) = validate_row(&table.schema, &updated) {
                return Err(KadeError::invalid_argument(message));
            }
            *row = updated;
            updated_count += 1;
        }
        if let Some(message) = validate_unique_rows(&table.schema, &working, true) {
            return Err(KadeError::failed_precondition(message));
        }
        table.rows = working;
        debug!("✏️ updated {updated_count} rows in '{name}'");
        Ok(updated_count)
    }

    /// Clear all rows, keeping the schema
    pub fn truncate_table(&self, name: &str) -> KadeResult<()> {
        let mut tables = self.guard()?;
        lookup_mut(&mut tables, name)?.rows.clear();
        Ok(())
    }
}

fn lookup<'a>(tables: &'a HashMap<String, Table>, name: &str) -> KadeResult<&'a Table> {
    tables
        .get(name)
        .ok_or_else(|| KadeError::not_found(format!("table '{name}'")))
}

fn lookup_mut<'a>(
    tables: &'a mut HashMap<String, Table>,
    name: &str,
) -> KadeResult<&'a mut Table> {
    tables
        .get_mut(name)
        .ok_or_else(|| KadeError::not_found(format!("table '{name}'")))
}

/// Resolve a projection to column indices; empty means all columns
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

/// Empty result set with the projected header
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

/// Deep-clone the projected cells of a row
fn project_row(row: &Row, projection: &[usize]) -> Row {
    Row::new(
        projection
            .iter()
            .map(|&idx| row.cell(idx).cloned().unwrap_or(None))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::CompareOp;
    use crate::schema::Column;
    use crate::value::ValueType;

    fn person_store() -> RelationalStore {
        let store = RelationalStore::new();
        let schema = TableSchema::with_primary_key(
            vec![
                Column::new("id", ValueType::Integer).unique(),
                Column::new("name", ValueType::String),
                Column::new("age", ValueType::Integer).nullable(),
            ],
            "id",
        )
        .unwrap();
        store.create_table("person", schema).unwrap();
        for (id, name, age) in [(1, "Ada", Some(36)), (2, "Grace", Some(41)), (3, "Bob", Some(29))]
        {
            store
                .insert_row(
                    "person",
                    Row::new(vec![
                        Some(Value::integer(id)),
                        Some(Value::string(name)),
                        age.map(Value::integer),
                    ]),
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_create_table_collision() {
        let store = person_store();
        let err = store
            .create_table("person", TableSchema::new(vec![]))
            .unwrap_err();
        assert!(matches!(err, KadeError::AlreadyExists(_)));
    }

    #[test]
    fn test_drop_missing_table() {
        let store = RelationalStore::new();
        assert!(matches!(
            store.drop_table("nope").unwrap_err(),
            KadeError::NotFound(_)
        ));
    }

    #[test]
    fn test_select_with_and_range() {
        // SELECT name FROM person WHERE age >= 30 AND age <= 40
        let store = person_store();
        let pred = Predicate::And(vec![
            Predicate::comparison("age", CompareOp::Ge, Value::integer(30)),
            Predicate::comparison("age", CompareOp::Le, Value::integer(40)),
        ]);
        let result = store
            .select("person", &["name".to_string()], Some(&pred))
            .unwrap();
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.at(0, 0), Some(&Value::string("Ada")));
        assert_eq!(result.types(), &[ValueType::String]);
    }

    #[test]
    fn test_select_projects_in_declared_order() {
        let store = person_store();
        let result = store.select("person", &[], None).unwrap();
        assert_eq!(result.columns(), &["id", "name", "age"]);
        assert_eq!(result.row_count(), 3);
    }

    #[test]
    fn test_unknown_projection_column() {
        let store = person_store();
        let err = store
            .select("person", &["salary".to_string()], None)
            .unwrap_err();
        assert!(matches!(err, KadeError::InvalidArgument(_)));
    }

    #[test]
    fn test_insert_duplicate_unique_rejected() {
        let store = person_store();
        let err = store
            .insert_row(
                "person",
                Row::new(vec![
                    Some(Value::integer(1)),
                    Some(Value::string("Imposter")),
                    None,
                ]),
            )
            .unwrap_err();
        assert!(matches!(err, KadeError::FailedPrecondition(_)));
        assert_eq!(store.row_count("person").unwrap(), 3);
    }

    #[test]
    fn test_insert_schema_violation() {
        let store = person_store();
        let err = store
            .insert_row("person", Row::nulls(3))
            .unwrap_err();
        assert!(matches!(err, KadeError::InvalidArgument(_)));
    }

    #[test]
    fn test_update_rows_simple() {
        let store = person_store();
        let mut assignments = HashMap::new();
        assignments.insert("age".to_string(), Value::integer(30));
        let pred = Predicate::comparison("name", CompareOp::Eq, Value::string("Bob"));
        let updated = store
            .update_rows("person", &assignments, Some(&pred))
            .unwrap();
        assert_eq!(updated, 1);
        let result = store
            .select(
                "person",
                &["age".to_string()],
                Some(&Predicate::comparison(
                    "name",
                    CompareOp::Eq,
                    Value::string("Bob"),
                )),
            )
            .unwrap();
        assert_eq!(result.at(0, 0), Some(&Value::integer(30)));
    }

    #[test]
    fn test_update_uniqueness_rolls_back() {
        let store = person_store();
        let mut assignments = HashMap::new();
        assignments.insert("id".to_string(), Value::integer(1));
        let pred = Predicate::comparison("name", CompareOp::Eq, Value::string("Bob"));
        let err = store
            .update_rows("person", &assignments, Some(&pred))
            .unwrap_err();
        assert!(matches!(err, KadeError::FailedPrecondition(_)));
        // Bob keeps his original id.
        let result = store
            .select("person", &["id".to_string()], Some(&pred))
            .unwrap();
        assert_eq!(result.at(0, 0), Some(&Value::integer(3)));
    }

    #[test]
    fn test_update_rows_with_computed() {
        let store = person_store();
        let updated = store
            .update_rows_with("person", None, |row, schema| {
                let mut next = row.clone();
                let idx = schema.find_column("age").ok_or_else(|| {
                    KadeError::invalid_argument("age column missing")
                })?;
                if let Some(Value::Integer(age)) = row.value(idx) {
                    next.set(idx, Some(Value::integer(age + 1)))?;
                }
                Ok(next)
            })
            .unwrap();
        assert_eq!(updated, 3);
        let result = store
            .select(
                "person",
                &["age".to_string()],
                Some(&Predicate::comparison(
                    "name",
                    CompareOp::Eq,
                    Value::string("Ada"),
                )),
            )
            .unwrap();
        assert_eq!(result.at(0, 0), Some(&Value::integer(37)));
    }

    #[test]
    fn test_delete_and_truncate() {
        let store = person_store();
        let removed = store
            .delete_rows(
                "person",
                Some(&Predicate::comparison(
                    "age",
                    CompareOp::Lt,
                    Value::integer(35),
                )),
            )
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.row_count("person").unwrap(), 2);

        store.truncate_table("person").unwrap();
        assert_eq!(store.row_count("person").unwrap(), 0);
        // Schema survives truncation.
        assert!(store.table_schema("person").unwrap().find_column("id").is_some());
    }

    #[test]
    fn test_assignment_to_null() {
        let store = person_store();
        let mut assignments = HashMap::new();
        assignments.insert("age".to_string(), Value::null());
        store.update_rows("person", &assignments, None).unwrap();
        let result = store.select("person", &["age".to_string()], None).unwrap();
        assert!(result.iter().all(|row| row.value(0).is_none()));
    }
}
