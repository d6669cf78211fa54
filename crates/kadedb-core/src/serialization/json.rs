//! Tagged JSON codec
//!
//! Forms, whitespace-insensitive:
//! - value: `{"t": "null"|"int"|"float"|"string"|"bool", "v": payload}`
//!   (the `v` member is omitted for null)
//! - row: `{"values": [ValueJSON|null, ...], "version": 1}`
//! - table schema: `{"columns": [...], "primaryKey": null|string,
//!   "version": 1}`
//! - document: flat `{ field: ValueJSON|null, ... }`
//!
//! Parsers accept exactly the emitted forms and reject unknown variant
//! tags.

use serde_json::{json, Map, Value as Json};

use crate::error::SerializationError;
use crate::row::{Document, Row};
use crate::schema::{Column, Constraints, DocumentSchema, TableSchema};
use crate::value::{Value, ValueType};

type SerResult<T> = Result<T, SerializationError>;

const JSON_VERSION: u64 = 1;

fn type_tag(ty: ValueType) -> &'static str {
    match ty {
        ValueType::Null => "null",
        ValueType::Integer => "int",
        ValueType::Float => "float",
        ValueType::String => "string",
        ValueType::Boolean => "bool",
    }
}

fn type_from_tag(tag: &str) -> SerResult<ValueType> {
    match tag {
        "null" => Ok(ValueType::Null),
        "int" => Ok(ValueType::Integer),
        "float" => Ok(ValueType::Float),
        "string" => Ok(ValueType::String),
        "bool" => Ok(ValueType::Boolean),
        other => Err(SerializationError::Malformed(format!(
            "unknown variant tag '{other}'"
        ))),
    }
}

/// Emit a value as tagged JSON
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => json!({ "t": "null" }),
        Value::Integer(i) => json!({ "t": "int", "v": i }),
        Value::Float(f) => json!({ "t": "float", "v": f }),
        Value::String(s) => json!({ "t": "string", "v": s }),
        Value::Boolean(b) => json!({ "t": "bool", "v": b }),
    }
}

/// Parse a tagged JSON value
pub fn value_from_json(json: &Json) -> SerResult<Value> {
    let obj = json
        .as_object()
        .ok_or_else(|| SerializationError::Malformed("value is not an object".into()))?;
    let tag = obj
        .get("t")
        .and_then(Json::as_str)
        .ok_or_else(|| SerializationError::Malformed("value missing 't' tag".into()))?;
    let payload = obj.get("v");
    match type_from_tag(tag)? {
        ValueType::Null => Ok(Value::Null),
        ValueType::Integer => payload
            .and_then(Json::as_i64)
            .map(Value::Integer)
            .ok_or_else(|| SerializationError::Malformed("integer payload".into())),
        ValueType::Float => payload
            .and_then(Json::as_f64)
            .map(Value::Float)
            .ok_or_else(|| SerializationError::Malformed("float payload".into())),
        ValueType::String => payload
            .and_then(Json::as_str)
            .map(Value::string)
            .ok_or_else(|| SerializationError::Malformed("string payload".into())),
        ValueType::Boolean => payload
            .and_then(Json::as_bool)
            .map(Value::Boolean)
            .ok_or_else(|| SerializationError::Malformed("boolean payload".into())),
    }
}

/// Emit a row as `{"values": [...], "version": 1}`
pub fn row_to_json(row: &Row) -> Json {
    let values: Vec<Json> = row
        .iter()
        .map(|cell| match cell {
            Some(v) => value_to_json(v),
            None => Json::Null,
        })
        .collect();
    json!({ "values": values, "version": JSON_VERSION })
}

/// Parse a row from its JSON form
pub fn row_from_json(json: &Json) -> SerResult<Row> {
    let obj = json
        .as_object()
        .ok_or_else(|| SerializationError::Malformed("row is not an object".into()))?;
    check_version(obj, "row")?;
    let values = obj
        .get("values")
        .and_then(Json::as_array)
        .ok_or_else(|| SerializationError::Malformed("row missing 'values' array".into()))?;
    let mut cells = Vec::with_capacity(values.len());
    for cell in values {
        if cell.is_null() {
            cells.push(None);
        } else {
            cells.push(Some(value_from_json(cell)?));
        }
    }
    Ok(Row::new(cells))
}

fn check_version(obj: &Map<String, Json>, what: &str) -> SerResult<()> {
    let version = obj
        .get("version")
        .and_then(Json::as_u64)
        .ok_or_else(|| SerializationError::Malformed(format!("{what} missing version")))?;
    if version != JSON_VERSION {
        return Err(SerializationError::UnsupportedVersion(version as u8));
    }
    Ok(())
}

fn constraints_to_json(constraints: &Constraints) -> Json {
    json!({
        "minLength": constraints.min_length,
        "maxLength": constraints.max_length,
        "oneOf": constraints.one_of,
        "minValue": constraints.min_value,
        "maxValue": constraints.max_value,
    })
}

fn constraints_from_json(json: &Json) -> SerResult<Constraints> {
    let obj = json
        .as_object()
        .ok_or_else(|| SerializationError::Malformed("constraints is not an object".into()))?;
    let one_of = match obj.get("oneOf") {
        None | Some(Json::Null) => Vec::new(),
        Some(Json::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(
                    item.as_str()
                        .ok_or_else(|| {
                            SerializationError::Malformed("oneOf entry is not a string".into())
                        })?
                        .to_string(),
                );
            }
            out
        }
        Some(_) => {
            return Err(SerializationError::Malformed(
                "oneOf is not an array".into(),
            ))
        }
    };
    Ok(Constraints {
        min_length: obj.get("minLength").and_then(Json::as_u64).map(|v| v as usize),
        max_length: obj.get("maxLength").and_then(Json::as_u64).map(|v| v as usize),
        one_of,
        min_value: obj.get("minValue").and_then(Json::as_f64),
        max_value: obj.get("maxValue").and_then(Json::as_f64),
    })
}

fn column_to_json(column: &Column) -> Json {
    json!({
        "name": column.name,
        "type": type_tag(column.ty),
        "nullable": column.nullable,
        "unique": column.unique,
        "constraints": column.constraints.as_ref().map(constraints_to_json),
    })
}

fn column_from_json(json: &Json) -> SerResult<Column> {
    let obj = json
        .as_object()
        .ok_or_else(|| SerializationError::Malformed("column is not an object".into()))?;
    let name = obj
        .get("name")
        .and_then(Json::as_str)
        .ok_or_else(|| SerializationError::Malformed("column missing name".into()))?;
    let ty = type_from_tag(
        obj.get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| SerializationError::Malformed("column missing type".into()))?,
    )?;
    let mut column = Column::new(name, ty);
    column.nullable = obj.get("nullable").and_then(Json::as_bool).unwrap_or(false);
    column.unique = obj.get("unique").and_then(Json::as_bool).unwrap_or(false);
    column.constraints = match obj.get("constraints") {
        None | Some(Json::Null) => None,
        Some(c) => Some(constraints_from_json(c)?),
    };
    Ok(column)
}

/// Emit a table schema as `{"columns": [...], "primaryKey": ...,
/// "version": 1}`
pub fn table_schema_to_json(schema: &TableSchema) -> Json {
    let columns: Vec<Json> = schema.columns().iter().map(column_to_json).collect();
    json!({
        "columns": columns,
        "primaryKey": schema.primary_key(),
        "version": JSON_VERSION,
    })
}

/// Parse a table schema from its JSON form
pub fn table_schema_from_json(json: &Json) -> SerResult<TableSchema> {
    let obj = json
        .as_object()
        .ok_or_else(|| SerializationError::Malformed("schema is not an object".into()))?;
    check_version(obj, "schema")?;
    let columns_json = obj
        .get("columns")
        .and_then(Json::as_array)
        .ok_or_else(|| SerializationError::Malformed("schema missing 'columns'".into()))?;
    let mut columns = Vec::with_capacity(columns_json.len());
    for column in columns_json {
        columns.push(column_from_json(column)?);
    }
    let mut schema = TableSchema::new(columns);
    match obj.get("primaryKey") {
        None | Some(Json::Null) => {}
        Some(Json::String(pk)) => {
            schema.set_primary_key(pk.as_str()).map_err(|_| {
                SerializationError::Malformed(format!("primary key '{pk}' unknown"))
            })?;
        }
        Some(_) => {
            return Err(SerializationError::Malformed(
                "primaryKey is not a string".into(),
            ))
        }
    }
    Ok(schema)
}

/// Emit a document schema as `{"fields": [...], "version": 1}`
pub fn document_schema_to_json(schema: &DocumentSchema) -> Json {
    let mut fields: Vec<&Column> = schema.fields().collect();
    fields.sort_by(|a, b| a.name.cmp(&b.name));
    let fields: Vec<Json> = fields.into_iter().map(column_to_json).collect();
    json!({ "fields": fields, "version": JSON_VERSION })
}

/// Parse a document schema from its JSON form
pub fn document_schema_from_json(json: &Json) -> SerResult<DocumentSchema> {
    let obj = json
        .as_object()
        .ok_or_else(|| SerializationError::Malformed("schema is not an object".into()))?;
    check_version(obj, "schema")?;
    let fields = obj
        .get("fields")
        .and_then(Json::as_array)
        .ok_or_else(|| SerializationError::Malformed("schema missing 'fields'".into()))?;
    let mut schema = DocumentSchema::new();
    for field in fields {
        schema.add_field(column_from_json(field)?);
    }
    Ok(schema)
}

/// Emit a document as a flat `{ field: ValueJSON|null }` object
pub fn document_to_json(doc: &Document) -> Json {
    let mut obj = Map::new();
    for (name, cell) in doc.iter() {
        let value = match cell {
            Some(v) => value_to_json(v),
            None => Json::Null,
        };
        obj.insert(name.clone(), value);
    }
    Json::Object(obj)
}

/// Render an emitted JSON form as text
pub fn to_json_text(json: &Json) -> String {
    json.to_string()
}

/// Parse JSON text into a tree for the `*_from_json` readers
pub fn parse_json_text(text: &str) -> SerResult<Json> {
    serde_json::from_str(text).map_err(|e| SerializationError::Malformed(e.to_string()))
}

/// Parse a document from its flat JSON form
pub fn document_from_json(json: &Json) -> SerResult<Document> {
    let obj = json
        .as_object()
        .ok_or_else(|| SerializationError::Malformed("document is not an object".into()))?;
    let mut doc = Document::new();
    for (name, cell) in obj {
        if cell.is_null() {
            doc.set(name.clone(), None);
        } else {
            doc.set(name.clone(), Some(value_from_json(cell)?));
        }
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_round_trips() {
        for v in [
            Value::null(),
            Value::integer(-7),
            Value::float(2.25),
            Value::string("héllo \"quoted\""),
            Value::boolean(false),
        ] {
            let encoded = value_to_json(&v);
            let decoded = value_from_json(&encoded).unwrap();
            assert_eq!(decoded, v);
            assert_eq!(decoded.value_type(), v.value_type());
        }
    }

    #[test]
    fn test_value_tags() {
        assert_eq!(value_to_json(&Value::integer(3))["t"], "int");
        assert_eq!(value_to_json(&Value::float(3.0))["t"], "float");
        assert_eq!(value_to_json(&Value::null())["t"], "null");
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let bad = json!({ "t": "decimal", "v": 3 });
        let err = value_from_json(&bad).unwrap_err();
        assert!(err.to_string().contains("decimal"));
    }

    #[test]
    fn test_whitespace_insensitive_text() {
        let text = " {\n  \"t\": \"int\",\n  \"v\": 42\n} ";
        let parsed: Json = serde_json::from_str(text).unwrap();
        assert_eq!(value_from_json(&parsed).unwrap(), Value::integer(42));
    }

    #[test]
    fn test_row_round_trip() {
        let row = Row::new(vec![Some(Value::integer(1)), None, Some(Value::string("x"))]);
        let encoded = row_to_json(&row);
        assert_eq!(encoded["version"], 1);
        assert_eq!(row_from_json(&encoded).unwrap(), row);
    }

    #[test]
    fn test_row_version_rejected() {
        let bad = json!({ "values": [], "version": 2 });
        assert!(matches!(
            row_from_json(&bad).unwrap_err(),
            SerializationError::UnsupportedVersion(2)
        ));
    }

    #[test]
    fn test_table_schema_round_trip() {
        use crate::value::ValueType;

        let schema = TableSchema::with_primary_key(
            vec![
                Column::new("id", ValueType::Integer).unique(),
                Column::new("name", ValueType::String)
                    .nullable()
                    .with_constraints(Constraints::new().with_max_length(10)),
            ],
            "id",
        )
        .unwrap();
        let encoded = table_schema_to_json(&schema);
        assert_eq!(encoded["primaryKey"], "id");
        let decoded = table_schema_from_json(&encoded).unwrap();
        assert_eq!(decoded, schema);
    }

    #[test]
    fn test_document_round_trip() {
        let mut doc = Document::new();
        doc.set("name", Some(Value::string("ada")));
        doc.set("age", None);
        let encoded = document_to_json(&doc);
        assert_eq!(encoded["age"], Json::Null);
        assert_eq!(document_from_json(&encoded).unwrap(), doc);
    }

    #[test]
    fn test_document_schema_round_trip() {
        use crate::value::ValueType;

        let mut schema = DocumentSchema::new();
        schema.add_field(Column::new("sku", ValueType::String).unique());
        let encoded = document_schema_to_json(&schema);
        assert_eq!(document_schema_from_json(&encoded).unwrap(), schema);
    }
}
