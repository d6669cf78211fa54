//! Row and document validators
//!
//! Validators return `None` on success and a human-readable message on the
//! first violation. Stores map those messages onto `InvalidArgument` (shape
//! and constraint checks) or `FailedPrecondition` (post-mutation
//! uniqueness).

use std::collections::HashSet;

use crate::row::{Document, Row};
use crate::schema::{Column, DocumentSchema, TableSchema};
use crate::value::{Value, ValueType};

/// Key used for null cells when uniqueness counts nulls as equal
const NULL_KEY: &str = "<null>";

/// Validate a row against a table schema
///
/// Checks arity, null-vs-nullable, variant match (an Integer value
/// validates against a Float column), and per-type constraints.
pub fn validate_row(schema: &TableSchema, row: &Row) -> Option<String> {
    if row.len() != schema.len() {
        return Some(format!(
            "row has {} cells but schema declares {} columns",
            row.len(),
            schema.len()
        ));
    }
    for (idx, column) in schema.columns().iter().enumerate() {
        let cell = row.cell(idx)?;
        if let Some(message) = validate_cell(column, cell.as_ref()) {
            return Some(message);
        }
    }
    None
}

/// Validate a document against a document schema
///
/// Every non-nullable schema field must be present and non-null; present
/// declared fields must match type and constraints; unknown fields pass.
pub fn validate_document(schema: &DocumentSchema, doc: &Document) -> Option<String> {
    for column in schema.fields() {
        match doc.get(&column.name) {
            None if !column.nullable => {
                return Some(format!("missing non-nullable field '{}'", column.name));
            }
            None => {}
            Some(cell) => {
                if let Some(message) = validate_cell(column, cell.as_ref()) {
                    return Some(message);
                }
            }
        }
    }
    None
}

/// Validate one cell against its column definition
fn validate_cell(column: &Column, value: Option<&Value>) -> Option<String> {
    let Some(value) = value else {
        if column.nullable {
            return None;
        }
        return Some(format!("column '{}' is not nullable", column.name));
    };
    if value.is_null() {
        if column.nullable {
            return None;
        }
        return Some(format!("column '{}' is not nullable", column.name));
    }

    let actual = value.value_type();
    let type_ok = actual == column.ty
        || (column.ty == ValueType::Float && actual == ValueType::Integer);
    if !type_ok {
        return Some(format!(
            "column '{}' expects {} but got {}",
            column.name, column.ty, actual
        ));
    }

    let Some(constraints) = &column.constraints else {
        return None;
    };
    match value {
        Value::String(s) => {
            if let Some(min) = constraints.min_length {
                if s.len() < min {
                    return Some(format!(
                        "column '{}' value shorter than {min} bytes",
                        column.name
                    ));
                }
            }
            if let Some(max) = constraints.max_length {
                if s.len() > max {
                    return Some(format!(
                        "column '{}' value longer than {max} bytes",
                        column.name
                    ));
                }
            }
            if !constraints.one_of.is_empty() && !constraints.one_of.iter().any(|a| a == s) {
                return Some(format!(
                    "column '{}' value '{s}' not in the allowed set",
                    column.name
                ));
            }
        }
        Value::Integer(_) | Value::Float(_) => {
            // Integer cells may be validating against a Float column, so
            // bounds compare in f64 for both.
            let n = match value {
                Value::Integer(i) => *i as f64,
                Value::Float(f) => *f,
                _ => unreachable!(),
            };
            if let Some(min) = constraints.min_value {
                if n < min {
                    return Some(format!("column '{}' value {n} below minimum {min}", column.name));
                }
            }
            if let Some(max) = constraints.max_value {
                if n > max {
                    return Some(format!("column '{}' value {n} above maximum {max}", column.name));
                }
            }
        }
        _ => {}
    }
    None
}

/// Check per-column uniqueness over a full row set
///
/// For each column with `unique = true`, cell values are keyed by their
/// string rendering. Null cells are skipped when `ignore_nulls` is true,
/// otherwise they share the `"<null>"` key and collide with each other.
pub fn validate_unique_rows(
    schema: &TableSchema,
    rows: &[Row],
    ignore_nulls: bool,
) -> Option<String> {
    for (idx, column) in schema.columns().iter().enumerate() {
        if !column.unique {
            continue;
        }
        let mut seen = HashSet::new();
        for row in rows {
            let key = match row.value(idx) {
                Some(value) if !value.is_null() => value.to_string(),
                _ if ignore_nulls => continue,
                _ => NULL_KEY.to_string(),
            };
            if !seen.insert(key.clone()) {
                return Some(format!(
                    "duplicate value '{key}' in unique column '{}'",
                    column.name
                ));
            }
        }
    }
    None
}

/// Check per-field uniqueness over a full document set
pub fn validate_unique_documents<'a, I>(
    schema: &DocumentSchema,
    docs: I,
    ignore_nulls: bool,
) -> Option<String>
where
    I: IntoIterator<Item = &'a Document> + Clone,
{
    for column in schema.fields() {
        if !column.unique {
            continue;
        }
        let mut seen = HashSet::new();
        for doc in docs.clone() {
            let key = match doc.get(&column.name) {
                Some(Some(value)) if !value.is_null() => value.to_string(),
                None => continue,
                _ if ignore_nulls => continue,
                _ => NULL_KEY.to_string(),
            };
            if !seen.insert(key.clone()) {
                return Some(format!(
                    "duplicate value '{key}' in unique field '{}'",
                    column.name
                ));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Constraints;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            Column::new("id", ValueType::Integer).unique(),
            Column::new("name", ValueType::String).with_constraints(
                Constraints::new().with_min_length(1).with_max_length(8),
            ),
            Column::new("score", ValueType::Float)
                .nullable()
                .with_constraints(Constraints::new().with_min_value(0.0).with_max_value(100.0)),
        ])
    }

    fn row(id: i64, name: &str, score: Option<Value>) -> Row {
        Row::new(vec![
            Some(Value::integer(id)),
            Some(Value::string(name)),
            score,
        ])
    }

    #[test]
    fn test_valid_row_passes() {
        assert_eq!(validate_row(&schema(), &row(1, "ada", None)), None);
        assert_eq!(
            validate_row(&schema(), &row(1, "ada", Some(Value::float(99.5)))),
            None
        );
    }

    #[test]
    fn test_arity_mismatch() {
        let msg = validate_row(&schema(), &Row::nulls(2)).unwrap();
        assert!(msg.contains("2 cells"));
    }

    #[test]
    fn test_null_in_non_nullable_column() {
        let bad = Row::new(vec![None, Some(Value::string("x")), None]);
        let msg = validate_row(&schema(), &bad).unwrap();
        assert!(msg.contains("not nullable"));
    }

    #[test]
    fn test_type_mismatch_and_coercion() {
        // Integer into a Float column is fine.
        assert_eq!(
            validate_row(&schema(), &row(1, "a", Some(Value::integer(50)))),
            None
        );
        // Float into an Integer column is not.
        let bad = Row::new(vec![
            Some(Value::float(1.0)),
            Some(Value::string("a")),
            None,
        ]);
        let msg = validate_row(&schema(), &bad).unwrap();
        assert!(msg.contains("expects integer"));
    }

    #[test]
    fn test_string_constraints() {
        let msg = validate_row(&schema(), &row(1, "", None)).unwrap();
        assert!(msg.contains("shorter"));
        let msg = validate_row(&schema(), &row(1, "very long name", None)).unwrap();
        assert!(msg.contains("longer"));
    }

    #[test]
    fn test_numeric_bounds_inclusive() {
        assert_eq!(
            validate_row(&schema(), &row(1, "a", Some(Value::float(100.0)))),
            None
        );
        let msg = validate_row(&schema(), &row(1, "a", Some(Value::float(100.5)))).unwrap();
        assert!(msg.contains("above maximum"));
    }

    #[test]
    fn test_one_of_constraint() {
        let schema = TableSchema::new(vec![Column::new("state", ValueType::String)
            .with_constraints(
                Constraints::new().with_one_of(vec!["on".into(), "off".into()]),
            )]);
        let ok = Row::new(vec![Some(Value::string("on"))]);
        assert_eq!(validate_row(&schema, &ok), None);
        let bad = Row::new(vec![Some(Value::string("idle"))]);
        assert!(validate_row(&schema, &bad).unwrap().contains("allowed set"));
    }

    #[test]
    fn test_unique_rows_null_handling() {
        let schema = schema();
        let rows = vec![
            Row::new(vec![None, Some(Value::string("a")), None]),
            Row::new(vec![None, Some(Value::string("b")), None]),
        ];
        assert_eq!(validate_unique_rows(&schema, &rows, true), None);
        let msg = validate_unique_rows(&schema, &rows, false).unwrap();
        assert!(msg.contains("<null>"));
    }

    #[test]
    fn test_unique_rows_duplicate() {
        let rows = vec![row(7, "a", None), row(7, "b", None)];
        let msg = validate_unique_rows(&schema(), &rows, true).unwrap();
        assert!(msg.contains("'7'"));
        assert!(msg.contains("'id'"));
    }

    #[test]
    fn test_document_validation() {
        let mut schema = DocumentSchema::new();
        schema.add_field(Column::new("sku", ValueType::String));
        schema.add_field(Column::new("qty", ValueType::Integer).nullable());

        let mut doc = Document::new();
        doc.set("sku", Some(Value::string("A-1")));
        doc.set("unknown", Some(Value::boolean(true)));
        assert_eq!(validate_document(&schema, &doc), None);

        let mut missing = Document::new();
        missing.set("qty", Some(Value::integer(2)));
        assert!(validate_document(&schema, &missing)
            .unwrap()
            .contains("missing non-nullable"));
    }

    #[test]
    fn test_unique_documents() {
        let mut schema = DocumentSchema::new();
        schema.add_field(Column::new("sku", ValueType::String).unique());

        let mut a = Document::new();
        a.set("sku", Some(Value::string("A-1")));
        let mut b = Document::new();
        b.set("sku", Some(Value::string("A-1")));

        let docs = vec![a, b];
        let msg = validate_unique_documents(&schema, docs.iter(), true).unwrap();
        assert!(msg.contains("A-1"));
    }
}
