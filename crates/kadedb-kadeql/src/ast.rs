//! Abstract syntax tree for KadeQL statements
//!
//! The parser produces one [`Statement`] per query. SELECT carries either
//! a legacy bare column list or expression items with optional aliases;
//! the executor chooses its path from that shape.

use kadedb_core::Value;
use serde::{Deserialize, Serialize};

/// Root AST node for a complete KadeQL statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectStatement {
    pub table: String,
    pub projection: Projection,
    pub where_clause: Option<Expression>,
}

/// Projection shape of a SELECT
///
/// `Columns` is the legacy mode chosen when every item is a bare
/// identifier and no alias is used; an empty list means `*`. Anything else
/// parses into `Expressions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    Columns(Vec<String>),
    Expressions(Vec<SelectItem>),
}

/// One expression-mode SELECT item with an optional alias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    pub expr: Expression,
    pub alias: Option<String>,
}

/// INSERT statement; tuple arities are checked at parse time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub values: Vec<Vec<Expression>>,
}

/// UPDATE statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Expression>,
}

/// One `column = expr` assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: String,
    pub value: Expression,
}

/// DELETE statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteStatement {
    pub table: String,
    pub where_clause: Option<Expression>,
}

/// Expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Literal(Literal),
    Identifier(String),
    BinaryOp {
        left: Box<Expression>,
        operator: BinaryOperator,
        right: Box<Expression>,
    },
    UnaryOp {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    FunctionCall {
        name: String,
        args: Vec<Expression>,
    },
}

impl Expression {
    /// Whether this is a literal (INSERT accepts only these)
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

/// Literal values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
}

impl Literal {
    /// Convert to a storage value
    pub fn to_value(&self) -> Value {
        match self {
            | Self::Null => Value::null(),
            | Self::Integer(v) => Value::integer(*v),
            | Self::Float(v) => Value::float(*v),
            | Self::String(s) => Value::string(s.clone()),
            | Self::Boolean(b) => Value::boolean(*b),
        }
    }
}

/// Binary operators, comparison and arithmetic plus AND/OR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // Logical
    And,
    Or,
}

impl BinaryOperator {
    /// Whether this is a comparison operator
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::LessThan
                | Self::LessThanOrEqual
                | Self::GreaterThan
                | Self::GreaterThanOrEqual
        )
    }

    /// Whether this is an arithmetic operator
    pub const fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Subtract | Self::Multiply | Self::Divide)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}
