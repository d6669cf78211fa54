//! Versioned binary codec
//!
//! Layout, little-endian throughout:
//! - header: `MAGIC` (u32) + `FORMAT_VERSION` (u8)
//! - strings: u32 byte length + raw bytes
//! - value: 1-byte tag (Null=0, Integer=1, Float=2, String=3, Boolean=4)
//!   followed by the payload
//! - row: header + u32 cell count + per cell `u8 is_null` (+ value)
//! - schemas: columns with 1-byte presence flags for optional parts
//! - document: header + u32 field count + (name, `u8 is_null`, value)

use std::io::{Read, Write};

use crate::error::SerializationError;
use crate::row::{Document, Row};
use crate::schema::{Column, Constraints, DocumentSchema, TableSchema};
use crate::value::{Value, ValueType};

/// Magic bytes: "KDBV" as a little-endian u32
pub const MAGIC: u32 = 0x4B44_4256;

/// Current format version
pub const FORMAT_VERSION: u8 = 1;

type SerResult<T> = Result<T, SerializationError>;

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

fn write_u8<W: Write>(w: &mut W, v: u8) -> SerResult<()> {
    w.write_all(&[v])?;
    Ok(())
}

fn write_u32<W: Write>(w: &mut W, v: u32) -> SerResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_i64<W: Write>(w: &mut W, v: i64) -> SerResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f64<W: Write>(w: &mut W, v: f64) -> SerResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_string<W: Write>(w: &mut W, s: &str) -> SerResult<()> {
    let len = u32::try_from(s.len())
        .map_err(|_| SerializationError::Malformed(format!("string of {} bytes", s.len())))?;
    write_u32(w, len)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn write_bool<W: Write>(w: &mut W, v: bool) -> SerResult<()> {
    write_u8(w, u8::from(v))
}

fn read_exact<R: Read>(r: &mut R, buf: &mut [u8], what: &'static str) -> SerResult<()> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            SerializationError::UnexpectedEof(what)
        } else {
            SerializationError::from(e)
        }
    })
}

fn read_u8<R: Read>(r: &mut R, what: &'static str) -> SerResult<u8> {
    let mut buf = [0u8; 1];
    read_exact(r, &mut buf, what)?;
    Ok(buf[0])
}

fn read_u32<R: Read>(r: &mut R, what: &'static str) -> SerResult<u32> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf, what)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i64<R: Read>(r: &mut R, what: &'static str) -> SerResult<i64> {
    let mut buf = [0u8; 8];
    read_exact(r, &mut buf, what)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_f64<R: Read>(r: &mut R, what: &'static str) -> SerResult<f64> {
    let mut buf = [0u8; 8];
    read_exact(r, &mut buf, what)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_string<R: Read>(r: &mut R, what: &'static str) -> SerResult<String> {
    let len = read_u32(r, what)? as usize;
    let mut buf = vec![0u8; len];
    read_exact(r, &mut buf, what)?;
    String::from_utf8(buf)
        .map_err(|_| SerializationError::Malformed(format!("non-UTF-8 {what}")))
}

fn read_bool<R: Read>(r: &mut R, what: &'static str) -> SerResult<bool> {
    match read_u8(r, what)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(SerializationError::Malformed(format!(
            "flag byte {other} for {what}"
        ))),
    }
}

fn write_header<W: Write>(w: &mut W) -> SerResult<()> {
    write_u32(w, MAGIC)?;
    write_u8(w, FORMAT_VERSION)
}

fn read_header<R: Read>(r: &mut R) -> SerResult<()> {
    let magic = read_u32(r, "header magic")?;
    if magic != MAGIC {
        return Err(SerializationError::BadMagic(magic));
    }
    let version = read_u8(r, "header version")?;
    if version != FORMAT_VERSION {
        return Err(SerializationError::UnsupportedVersion(version));
    }
    Ok(())
}

const fn type_tag(ty: ValueType) -> u8 {
    ty.index()
}

fn type_from_tag(tag: u8) -> SerResult<ValueType> {
    match tag {
        0 => Ok(ValueType::Null),
        1 => Ok(ValueType::Integer),
        2 => Ok(ValueType::Float),
        3 => Ok(ValueType::String),
        4 => Ok(ValueType::Boolean),
        other => Err(SerializationError::UnknownTag(other)),
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

fn write_value_body<W: Write>(w: &mut W, value: &Value) -> SerResult<()> {
    write_u8(w, type_tag(value.value_type()))?;
    match value {
        Value::Null => Ok(()),
        Value::Integer(i) => write_i64(w, *i),
        Value::Float(f) => write_f64(w, *f),
        Value::String(s) => write_string(w, s),
        Value::Boolean(b) => write_bool(w, *b),
    }
}

fn read_value_body<R: Read>(r: &mut R) -> SerResult<Value> {
    let tag = read_u8(r, "value tag")?;
    match type_from_tag(tag)? {
        ValueType::Null => Ok(Value::Null),
        ValueType::Integer => Ok(Value::Integer(read_i64(r, "integer value")?)),
        ValueType::Float => Ok(Value::Float(read_f64(r, "float value")?)),
        ValueType::String => Ok(Value::String(read_string(r, "string value")?)),
        ValueType::Boolean => Ok(Value::Boolean(read_bool(r, "boolean value")?)),
    }
}

/// Write a single value with the format header
pub fn write_value<W: Write>(w: &mut W, value: &Value) -> SerResult<()> {
    write_header(w)?;
    write_value_body(w, value)
}

/// Read a single value, verifying the format header
pub fn read_value<R: Read>(r: &mut R) -> SerResult<Value> {
    read_header(r)?;
    read_value_body(r)
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Write a row with the format header
pub fn write_row<W: Write>(w: &mut W, row: &Row) -> SerResult<()> {
    write_header(w)?;
    let count = u32::try_from(row.len())
        .map_err(|_| SerializationError::Malformed(format!("row of {} cells", row.len())))?;
    write_u32(w, count)?;
    for cell in row.iter() {
        match cell {
            None => write_bool(w, true)?,
            Some(value) => {
                write_bool(w, false)?;
                write_value_body(w, value)?;
            }
        }
    }
    Ok(())
}

/// Read a row, verifying the format header
pub fn read_row<R: Read>(r: &mut R) -> SerResult<Row> {
    read_header(r)?;
    let count = read_u32(r, "row cell count")? as usize;
    let mut cells = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        let is_null = read_bool(r, "row cell null flag")?;
        if is_null {
            cells.push(None);
        } else {
            cells.push(Some(read_value_body(r)?));
        }
    }
    Ok(Row::new(cells))
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

fn write_opt_u32<W: Write>(w: &mut W, v: Option<usize>) -> SerResult<()> {
    match v {
        Some(v) => {
            let v = u32::try_from(v)
                .map_err(|_| SerializationError::Malformed(format!("length bound {v}")))?;
            write_bool(w, true)?;
            write_u32(w, v)
        }
        None => write_bool(w, false),
    }
}

fn read_opt_u32<R: Read>(r: &mut R, what: &'static str) -> SerResult<Option<usize>> {
    if read_bool(r, what)? {
        Ok(Some(read_u32(r, what)? as usize))
    } else {
        Ok(None)
    }
}

fn write_opt_f64<W: Write>(w: &mut W, v: Option<f64>) -> SerResult<()> {
    match v {
        Some(v) => {
            write_bool(w, true)?;
            write_f64(w, v)
        }
        None => write_bool(w, false),
    }
}

fn read_opt_f64<R: Read>(r: &mut R, what: &'static str) -> SerResult<Option<f64>> {
    if read_bool(r, what)? {
        Ok(Some(read_f64(r, what)?))
    } else {
        Ok(None)
    }
}

fn write_column<W: Write>(w: &mut W, column: &Column) -> SerResult<()> {
    write_string(w, &column.name)?;
    write_u8(w, type_tag(column.ty))?;
    write_bool(w, column.nullable)?;
    write_bool(w, column.unique)?;
    match &column.constraints {
        None => write_bool(w, false),
        Some(c) => {
            write_bool(w, true)?;
            write_opt_u32(w, c.min_length)?;
            write_opt_u32(w, c.max_length)?;
            let count = u32::try_from(c.one_of.len())
                .map_err(|_| SerializationError::Malformed("one_of set too large".into()))?;
            write_u32(w, count)?;
            for allowed in &c.one_of {
                write_string(w, allowed)?;
            }
            write_opt_f64(w, c.min_value)?;
            write_opt_f64(w, c.max_value)
        }
    }
}

fn read_column<R: Read>(r: &mut R) -> SerResult<Column> {
    let name = read_string(r, "column name")?;
    let ty = type_from_tag(read_u8(r, "column type tag")?)?;
    let nullable = read_bool(r, "column nullable flag")?;
    let unique = read_bool(r, "column unique flag")?;
    let constraints = if read_bool(r, "constraints presence flag")? {
        let min_length = read_opt_u32(r, "min length")?;
        let max_length = read_opt_u32(r, "max length")?;
        let count = read_u32(r, "one_of count")? as usize;
        let mut one_of = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            one_of.push(read_string(r, "one_of entry")?);
        }
        let min_value = read_opt_f64(r, "min value")?;
        let max_value = read_opt_f64(r, "max value")?;
        Some(Constraints {
            min_length,
            max_length,
            one_of,
            min_value,
            max_value,
        })
    } else {
        None
    };
    let mut column = Column::new(name, ty);
    column.nullable = nullable;
    column.unique = unique;
    column.constraints = constraints;
    Ok(column)
}

/// Write a table schema with the format header
pub fn write_table_schema<W: Write>(w: &mut W, schema: &TableSchema) -> SerResult<()> {
    write_header(w)?;
    let count = u32::try_from(schema.len())
        .map_err(|_| SerializationError::Malformed("too many columns".into()))?;
    write_u32(w, count)?;
    for column in schema.columns() {
        write_column(w, column)?;
    }
    match schema.primary_key() {
        Some(pk) => {
            write_bool(w, true)?;
            write_string(w, pk)
        }
        None => write_bool(w, false),
    }
}

/// Read a table schema, verifying the format header
pub fn read_table_schema<R: Read>(r: &mut R) -> SerResult<TableSchema> {
    read_header(r)?;
    let count = read_u32(r, "column count")? as usize;
    let mut columns = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        columns.push(read_column(r)?);
    }
    let mut schema = TableSchema::new(columns);
    if read_bool(r, "primary key presence flag")? {
        let pk = read_string(r, "primary key name")?;
        schema
            .set_primary_key(pk.as_str())
            .map_err(|_| SerializationError::Malformed(format!("primary key '{pk}' unknown")))?;
    }
    Ok(schema)
}

/// Write a document schema with the format header
pub fn write_document_schema<W: Write>(w: &mut W, schema: &DocumentSchema) -> SerResult<()> {
    write_header(w)?;
    let count = u32::try_from(schema.len())
        .map_err(|_| SerializationError::Malformed("too many fields".into()))?;
    write_u32(w, count)?;
    // Deterministic field order keeps emitted bytes stable.
    let mut fields: Vec<&Column> = schema.fields().collect();
    fields.sort_by(|a, b| a.name.cmp(&b.name));
    for column in fields {
        write_column(w, column)?;
    }
    Ok(())
}

/// Read a document schema, verifying the format header
pub fn read_document_schema<R: Read>(r: &mut R) -> SerResult<DocumentSchema> {
    read_header(r)?;
    let count = read_u32(r, "field count")? as usize;
    let mut schema = DocumentSchema::new();
    for _ in 0..count {
        schema.add_field(read_column(r)?);
    }
    Ok(schema)
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Write a document with the format header
pub fn write_document<W: Write>(w: &mut W, doc: &Document) -> SerResult<()> {
    write_header(w)?;
    let count = u32::try_from(doc.len())
        .map_err(|_| SerializationError::Malformed("too many fields".into()))?;
    write_u32(w, count)?;
    for (name, cell) in doc.iter() {
        write_string(w, name)?;
        match cell {
            None => write_bool(w, true)?,
            Some(value) => {
                write_bool(w, false)?;
                write_value_body(w, value)?;
            }
        }
    }
    Ok(())
}

/// Read a document, verifying the format header
pub fn read_document<R: Read>(r: &mut R) -> SerResult<Document> {
    read_header(r)?;
    let count = read_u32(r, "document field count")? as usize;
    let mut doc = Document::new();
    for _ in 0..count {
        let name = read_string(r, "document field name")?;
        let is_null = read_bool(r, "document field null flag")?;
        if is_null {
            doc.set(name, None);
        } else {
            doc.set(name, Some(read_value_body(r)?));
        }
    }
    Ok(doc)
}
