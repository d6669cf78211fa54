//! Row and document containers
//!
//! - `Row`: fixed-length owned cells aligned to a `TableSchema`; cloning is
//!   a deep copy of every cell
//! - `RowShallow`: the same shape with reference-counted cells for cheap
//!   sharing inside a single caller; never stored
//! - `Document`: field-name keyed optional values for document collections

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{KadeError, KadeResult};
use crate::value::Value;

/// Database row: one owned optional value per schema column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    cells: Vec<Option<Value>>,
}

impl Row {
    /// Create a row from owned cells
    pub fn new(cells: Vec<Option<Value>>) -> Self {
        Self { cells }
    }

    /// Create a row of `len` null cells
    pub fn nulls(len: usize) -> Self {
        Self {
            cells: vec![None; len],
        }
    }

    /// Cell at `idx`; `None` when out of bounds
    pub fn cell(&self, idx: usize) -> Option<&Option<Value>> {
        self.cells.get(idx)
    }

    /// Non-null value at `idx`, flattening the optional cell
    pub fn value(&self, idx: usize) -> Option<&Value> {
        self.cells.get(idx).and_then(Option::as_ref)
    }

    /// Replace the cell at `idx`
    pub fn set(&mut self, idx: usize, value: Option<Value>) -> KadeResult<()> {
        let len = self.cells.len();
        let cell = self.cells.get_mut(idx).ok_or_else(|| {
            KadeError::invalid_argument(format!("cell index {idx} out of bounds for row of {len}"))
        })?;
        *cell = value;
        Ok(())
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over cells in column order
    pub fn iter(&self) -> impl Iterator<Item = &Option<Value>> {
        self.cells.iter()
    }

    /// Consume the row, yielding its cells
    pub fn into_cells(self) -> Vec<Option<Value>> {
        self.cells
    }
}

impl From<Vec<Option<Value>>> for Row {
    fn from(cells: Vec<Option<Value>>) -> Self {
        Self::new(cells)
    }
}

/// Row with shared cells
///
/// Cloning shares ownership of every cell instead of copying it. Scoped to
/// a single caller; stores never hold shallow rows.
#[derive(Debug, Clone, Default)]
pub struct RowShallow {
    cells: Vec<Option<Arc<Value>>>,
}

impl RowShallow {
    /// Build a shallow row by cloning each cell of `row` once
    pub fn from_clones(row: &Row) -> Self {
        Self {
            cells: row
                .iter()
                .map(|cell| cell.as_ref().map(|v| Arc::new(v.clone())))
                .collect(),
        }
    }

    /// Materialize an owned deep row
    pub fn to_row_deep(&self) -> Row {
        Row::new(
            self.cells
                .iter()
                .map(|cell| cell.as_ref().map(|v| (**v).clone()))
                .collect(),
        )
    }

    /// Cell at `idx`
    pub fn cell(&self, idx: usize) -> Option<&Option<Arc<Value>>> {
        self.cells.get(idx)
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Document: field name to owned optional value
///
/// Iteration order is the field-name order, which keeps projections and
/// serialized output deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    fields: BTreeMap<String, Option<Value>>,
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: Option<Value>) {
        self.fields.insert(name.into(), value);
    }

    /// Cell for a field; `None` when the field is absent
    pub fn get(&self, name: &str) -> Option<&Option<Value>> {
        self.fields.get(name)
    }

    /// Non-null value for a field
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).and_then(Option::as_ref)
    }

    /// Whether the field is present (possibly null)
    pub fn contains_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Remove a field, returning its cell
    pub fn remove(&mut self, name: &str) -> Option<Option<Value>> {
        self.fields.remove(name)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the document has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(name, cell)` pairs in field-name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<Value>)> {
        self.fields.iter()
    }

    /// Deep copy: clones every cell
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }
}
