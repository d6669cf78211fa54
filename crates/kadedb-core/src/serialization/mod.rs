//! Serialization codecs for KadeDB entities
//!
//! Two paired formats cover values, rows, schemas, and documents:
//! - `binary`: the versioned little-endian wire format (magic + version
//!   header). The byte layout is a compatibility contract, so it is
//!   written out explicitly rather than through a generic serializer.
//! - `json`: tagged JSON forms built on `serde_json`.
//!
//! Round trips preserve variant and content in both directions; corrupt or
//! truncated input surfaces a [`crate::error::SerializationError`].

pub mod binary;
pub mod json;

pub use binary::{
    read_document, read_document_schema, read_row, read_table_schema, read_value,
    write_document, write_document_schema, write_row, write_table_schema, write_value,
    FORMAT_VERSION, MAGIC,
};
pub use json::{
    document_from_json, document_schema_from_json, document_schema_to_json, document_to_json,
    parse_json_text, row_from_json, row_to_json, table_schema_from_json, table_schema_to_json,
    to_json_text, value_from_json, value_to_json,
};
