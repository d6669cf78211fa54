//! Composable predicate trees and their evaluation semantics
//!
//! A predicate is a tree of comparisons combined with And/Or/Not, evaluated
//! against a row in a table schema ([`Predicate`]) or against a document
//! ([`DocPredicate`]). Empty child lists have neutral semantics:
//! `And([]) = true`, `Or([]) = false`, `Not([]) = false`.

use serde::{Deserialize, Serialize};

use crate::error::{KadeError, KadeResult};
use crate::row::{Document, Row};
use crate::schema::{DocumentSchema, TableSchema};
use crate::value::Value;

/// Comparison operator for predicate leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// The logically negated operator
    pub const fn invert(self) -> Self {
        match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Lt => Self::Ge,
            Self::Ge => Self::Lt,
            Self::Le => Self::Gt,
            Self::Gt => Self::Le,
        }
    }

    /// The operator with its operands swapped (`a op b` ⇔ `b mirror(op) a`)
    pub const fn mirror(self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            Self::Lt => Self::Gt,
            Self::Gt => Self::Lt,
            Self::Le => Self::Ge,
            Self::Ge => Self::Le,
        }
    }

    /// Test a comparison outcome against this operator
    pub fn matches(self, ord: std::cmp::Ordering) -> bool {
        match self {
            Self::Eq => ord.is_eq(),
            Self::Ne => ord.is_ne(),
            Self::Lt => ord.is_lt(),
            Self::Le => ord.is_le(),
            Self::Gt => ord.is_gt(),
            Self::Ge => ord.is_ge(),
        }
    }
}

/// Predicate tree over table rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Comparison {
        column: String,
        op: CompareOp,
        value: Value,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    /// Negation; carries zero or one child
    Not(Vec<Predicate>),
}

impl Predicate {
    /// Comparison leaf
    pub fn comparison(column: impl Into<String>, op: CompareOp, value: Value) -> Self {
        Self::Comparison {
            column: column.into(),
            op,
            value,
        }
    }

    /// Constant true, the empty conjunction
    pub const fn always_true() -> Self {
        Self::And(Vec::new())
    }

    /// Constant false, the empty disjunction
    pub const fn always_false() -> Self {
        Self::Or(Vec::new())
    }

    /// Negate a predicate
    pub fn negate(inner: Self) -> Self {
        Self::Not(vec![inner])
    }

    /// Check that every comparison references a column of `schema`
    pub fn validate_columns(&self, schema: &TableSchema) -> KadeResult<()> {
        match self {
            Self::Comparison { column, .. } => {
                if schema.find_column(column).is_none() {
                    return Err(KadeError::invalid_argument(format!(
                        "unknown column '{column}' in predicate"
                    )));
                }
                Ok(())
            }
            Self::And(children) | Self::Or(children) | Self::Not(children) => {
                for child in children {
                    child.validate_columns(schema)?;
                }
                Ok(())
            }
        }
    }

    /// Evaluate against a row
    ///
    /// Comparisons against a null cell (or with a Null right-hand side)
    /// are false. Columns are assumed validated; an unknown column simply
    /// fails the comparison.
    pub fn evaluate(&self, schema: &TableSchema, row: &Row) -> bool {
        match self {
            Self::Comparison { column, op, value } => {
                if value.is_null() {
                    return false;
                }
                let Some(idx) = schema.find_column(column) else {
                    return false;
                };
                match row.value(idx) {
                    Some(cell) if !cell.is_null() => op.matches(cell.compare(value)),
                    _ => false,
                }
            }
            Self::And(children) => children.iter().all(|c| c.evaluate(schema, row)),
            Self::Or(children) => children.iter().any(|c| c.evaluate(schema, row)),
            Self::Not(children) => match children.first() {
                Some(child) => !child.evaluate(schema, row),
                None => false,
            },
        }
    }
}

/// Predicate tree over documents; same shape, field names instead of
/// columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DocPredicate {
    Comparison {
        field: String,
        op: CompareOp,
        value: Value,
    },
    And(Vec<DocPredicate>),
    Or(Vec<DocPredicate>),
    /// Negation; carries zero or one child
    Not(Vec<DocPredicate>),
}

impl DocPredicate {
    /// Comparison leaf
    pub fn comparison(field: impl Into<String>, op: CompareOp, value: Value) -> Self {
        Self::Comparison {
            field: field.into(),
            op,
            value,
        }
    }

    /// Check that every comparison references a declared field
    pub fn validate_fields(&self, schema: &DocumentSchema) -> KadeResult<()> {
        match self {
            Self::Comparison { field, .. } => {
                if !schema.has_field(field) {
                    return Err(KadeError::invalid_argument(format!(
                        "unknown field '{field}' in predicate"
                    )));
                }
                Ok(())
            }
            Self::And(children) | Self::Or(children) | Self::Not(children) => {
                for child in children {
                    child.validate_fields(schema)?;
                }
                Ok(())
            }
        }
    }

    /// Evaluate against a document; absent or null fields fail comparisons
    pub fn evaluate(&self, doc: &Document) -> bool {
        match self {
            Self::Comparison { field, op, value } => {
                if value.is_null() {
                    return false;
                }
                match doc.value(field) {
                    Some(cell) if !cell.is_null() => op.matches(cell.compare(value)),
                    _ => false,
                }
            }
            Self::And(children) => children.iter().all(|c| c.evaluate(doc)),
            Self::Or(children) => children.iter().any(|c| c.evaluate(doc)),
            Self::Not(children) => match children.first() {
                Some(child) => !child.evaluate(doc),
                None => false,
            },
        }
    }
}
