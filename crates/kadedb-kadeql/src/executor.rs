//! KadeQL executor
//!
//! Dispatches parsed statements against a relational storage handle:
//! lowers WHERE clauses through the optimizer, translates projections,
//! evaluates computed assignments, and runs the aggregation path for
//! SELECT items with function calls or arithmetic (`TIME_BUCKET`,
//! `FIRST`, `LAST`).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use kadedb_core::{
    KadeError, KadeResult, Predicate, RelationalStore, ResultSet, Row, TableSchema, Value,
    ValueType,
};
use tracing::{debug, instrument};

use crate::ast::*;
use crate::optimizer::build_where;

/// Statement executor over a shared relational store
#[derive(Debug, Clone)]
pub struct Executor {
    storage: Arc<RelationalStore>,
}

impl Executor {
    /// Create an executor over the given storage handle
    pub fn new(storage: Arc<RelationalStore>) -> Self {
        Self { storage }
    }

    /// The underlying storage handle
    pub fn storage(&self) -> &Arc<RelationalStore> {
        &self.storage
    }

    /// Execute one parsed statement
    #[instrument(level = "debug", skip(self, statement))]
    pub fn execute(&self, statement: &Statement) -> KadeResult<ResultSet> {
        match statement {
            | Statement::Select(select) => self.execute_select(select),
            | Statement::Insert(insert) => self.execute_insert(insert),
            | Statement::Update(update) => self.execute_update(update),
            | Statement::Delete(delete) => self.execute_delete(delete),
        }
    }

    fn execute_select(&self, select: &SelectStatement) -> KadeResult<ResultSet> {
        let schema = self.storage.table_schema(&select.table)?;
        let predicate = build_where(select.where_clause.as_ref(), &schema)?;

        match &select.projection {
            | Projection::Columns(columns) => {
                self.storage.select(&select.table, columns, predicate.as_ref())
            }
            | Projection::Expressions(items) => {
                let all_identifiers = items
                    .iter()
                    .all(|item| matches!(item.expr, Expression::Identifier(_)));
                if all_identifiers {
                    self.select_renamed(select, items, predicate.as_ref())
                } else {
                    self.select_aggregated(select, &schema, items, predicate.as_ref())
                }
            }
        }
    }

    /// Identifier-only expression mode: project columns, rename headers
    fn select_renamed(
        &self,
        select: &SelectStatement,
        items: &[SelectItem],
        predicate: Option<&Predicate>,
    ) -> KadeResult<ResultSet> {
        let mut columns = Vec::with_capacity(items.len());
        for item in items {
            match &item.expr {
                | Expression::Identifier(name) => columns.push(name.clone()),
                | _ => {
                    return Err(KadeError::internal(
                        "non-identifier item on the rename path",
                    ))
                }
            }
        }
        let result = self.storage.select(&select.table, &columns, predicate)?;

        let headers: Vec<String> = items
            .iter()
            .zip(&columns)
            .map(|(item, column)| item.alias.clone().unwrap_or_else(|| column.clone()))
            .collect();
        let mut renamed = ResultSet::new(headers, result.types().to_vec());
        for row in result.iter() {
            renamed.push_row(row.clone());
        }
        Ok(renamed)
    }

    /// Aggregation mode: TIME_BUCKET grouping with FIRST/LAST and
    /// representative-row projections
    fn select_aggregated(
        &self,
        select: &SelectStatement,
        schema: &TableSchema,
        items: &[SelectItem],
        predicate: Option<&Predicate>,
    ) -> KadeResult<ResultSet> {
        let kinds: Vec<ItemKind> = items
            .iter()
            .map(|item| ItemKind::classify(&item.expr))
            .collect::<KadeResult<_>>()?;
        let data = self.storage.select(&select.table, &[], predicate)?;
        debug!(
            "aggregation mode over {} rows, {} items",
            data.row_count(),
            items.len()
        );

        // Group rows by the tuple of TIME_BUCKET values; no TIME_BUCKET
        // means one global group. BTreeMap keeps the output sorted
        // ascending by group key.
        let mut groups: BTreeMap<Vec<i64>, Vec<usize>> = BTreeMap::new();
        for (row_idx, row) in data.iter().enumerate() {
            let mut key = Vec::new();
            for kind in &kinds {
                if let ItemKind::TimeBucket { value, width } = kind {
                    key.push(time_bucket(value, width, schema, row)?);
                }
            }
            groups.entry(key).or_default().push(row_idx);
        }

        let mut output_rows: Vec<Vec<Option<Value>>> = Vec::with_capacity(groups.len());
        for (key, row_indices) in &groups {
            let mut out = Vec::with_capacity(kinds.len());
            let mut bucket_pos = 0;
            for kind in &kinds {
                let cell = match kind {
                    | ItemKind::TimeBucket { .. } => {
                        let bucket = key.get(bucket_pos).copied().ok_or_else(|| {
                            KadeError::internal("group key narrower than its TIME_BUCKET items")
                        })?;
                        bucket_pos += 1;
                        Some(Value::integer(bucket))
                    }
                    | ItemKind::First { value, order } => self.pick_edge_row(
                        schema, &data, row_indices, value, order.as_ref(), true,
                    )?,
                    | ItemKind::Last { value, order } => self.pick_edge_row(
                        schema, &data, row_indices, value, order.as_ref(), false,
                    )?,
                    | ItemKind::Plain(expr) => {
                        // Representative: the group's first row by insertion
                        // order.
                        let row = representative(&data, row_indices)?;
                        nullable_cell(evaluate_expression(expr, schema, row)?)
                    }
                };
                out.push(cell);
            }
            output_rows.push(out);
        }

        let headers: Vec<String> = items
            .iter()
            .zip(&kinds)
            .map(|(item, kind)| item.alias.clone().unwrap_or_else(|| kind.default_name()))
            .collect();
        let types: Vec<ValueType> = kinds
            .iter()
            .enumerate()
            .map(|(col, kind)| match kind {
                | ItemKind::TimeBucket { .. } => ValueType::Integer,
                | _ => output_rows
                    .iter()
                    .find_map(|row| row[col].as_ref().map(Value::value_type))
                    .unwrap_or(ValueType::Null),
            })
            .collect();

        let mut result = ResultSet::new(headers, types);
        for cells in output_rows {
            result.push_row(Row::new(cells));
        }
        Ok(result)
    }

    /// Evaluate `value` on the row minimizing (FIRST) or maximizing (LAST)
    /// the ordering expression; ties keep the earliest/latest scanned row
    fn pick_edge_row(
        &self,
        schema: &TableSchema,
        data: &ResultSet,
        row_indices: &[usize],
        value: &Expression,
        order: Option<&Expression>,
        minimize: bool,
    ) -> KadeResult<Option<Value>> {
        let default_order;
        let order = match order {
            | Some(expr) => expr,
            | None => {
                default_order = default_order_expression(schema)?;
                &default_order
            }
        };

        let mut best: Option<(Value, usize)> = None;
        for &row_idx in row_indices {
            let row = data.rows().get(row_idx).ok_or_else(|| {
                KadeError::internal("group references a row outside the scan")
            })?;
            let order_key = evaluate_expression(order, schema, row)?;
            let replace = match &best {
                | None => true,
                | Some((current, _)) => {
                    let ord = order_key.compare(current);
                    if minimize {
                        ord == std::cmp::Ordering::Less
                    } else {
                        ord != std::cmp::Ordering::Less
                    }
                }
            };
            if replace {
                best = Some((order_key, row_idx));
            }
        }
        match best {
            | None => Ok(None),
            | Some((_, row_idx)) => {
                let row = data.rows().get(row_idx).ok_or_else(|| {
                    KadeError::internal("group references a row outside the scan")
                })?;
                Ok(nullable_cell(evaluate_expression(value, schema, row)?))
            }
        }
    }

    fn execute_insert(&self, insert: &InsertStatement) -> KadeResult<ResultSet> {
        let schema = self.storage.table_schema(&insert.table)?;
        let positions: Vec<usize> = match &insert.columns {
            | Some(columns) => columns
                .iter()
                .map(|name| {
                    schema.find_column(name).ok_or_else(|| {
                        KadeError::invalid_argument(format!("unknown column '{name}' in INSERT"))
                    })
                })
                .collect::<KadeResult<_>>()?,
            | None => (0..schema.len()).collect(),
        };

        let mut inserted = 0usize;
        for tuple in &insert.values {
            if tuple.len() != positions.len() {
                return Err(KadeError::invalid_argument(format!(
                    "VALUES tuple has {} expressions but the target has {} columns",
                    tuple.len(),
                    positions.len()
                )));
            }
            let mut row = Row::nulls(schema.len());
            for (expr, &position) in tuple.iter().zip(&positions) {
                let Expression::Literal(literal) = expr else {
                    return Err(KadeError::invalid_argument(
                        "INSERT values must be literals",
                    ));
                };
                row.set(position, nullable_cell(literal.to_value()))?;
            }
            // A failing tuple halts the INSERT; earlier tuples stay.
            self.storage.insert_row(&insert.table, row)?;
            inserted += 1;
        }
        Ok(dml_result("inserted", inserted))
    }

    fn execute_update(&self, update: &UpdateStatement) -> KadeResult<ResultSet> {
        let schema = self.storage.table_schema(&update.table)?;
        let predicate = build_where(update.where_clause.as_ref(), &schema)?;

        let all_literal = update
            .assignments
            .iter()
            .all(|assignment| assignment.value.is_literal());
        let updated = if all_literal {
            let mut assignments = HashMap::with_capacity(update.assignments.len());
            for assignment in &update.assignments {
                let Expression::Literal(literal) = &assignment.value else {
                    return Err(KadeError::internal("non-literal on the simple path"));
                };
                assignments.insert(assignment.column.clone(), literal.to_value());
            }
            self.storage
                .update_rows(&update.table, &assignments, predicate.as_ref())?
        } else {
            let assignments = update.assignments.clone();
            self.storage
                .update_rows_with(&update.table, predicate.as_ref(), |row, schema| {
                    let mut next = row.clone();
                    for assignment in &assignments {
                        let idx = schema.find_column(&assignment.column).ok_or_else(|| {
                            KadeError::invalid_argument(format!(
                                "unknown column '{}' in assignment",
                                assignment.column
                            ))
                        })?;
                        let value = evaluate_expression(&assignment.value, schema, row)?;
                        next.set(idx, nullable_cell(value))?;
                    }
                    Ok(next)
                })?
        };
        Ok(dml_result("updated", updated))
    }

    fn execute_delete(&self, delete: &DeleteStatement) -> KadeResult<ResultSet> {
        let schema = self.storage.table_schema(&delete.table)?;
        let predicate = build_where(delete.where_clause.as_ref(), &schema)?;
        let deleted = self
            .storage
            .delete_rows(&delete.table, predicate.as_ref())?;
        Ok(dml_result("deleted", deleted))
    }
}

/// Classified aggregation-mode SELECT item
#[derive(Debug, Clone)]
enum ItemKind {
    TimeBucket {
        value: Expression,
        width: Expression,
    },
    First {
        value: Expression,
        order: Option<Expression>,
    },
    Last {
        value: Expression,
        order: Option<Expression>,
    },
    Plain(Expression),
}

impl ItemKind {
    fn classify(expr: &Expression) -> KadeResult<Self> {
        let Expression::FunctionCall { name, args } = expr else {
            return Ok(Self::Plain(expr.clone()));
        };
        if name.eq_ignore_ascii_case("TIME_BUCKET") {
            if args.len() != 2 {
                return Err(KadeError::invalid_argument(
                    "TIME_BUCKET requires exactly (expr, width)",
                ));
            }
            return Ok(Self::TimeBucket {
                value: args[0].clone(),
                width: args[1].clone(),
            });
        }
        if name.eq_ignore_ascii_case("FIRST") || name.eq_ignore_ascii_case("LAST") {
            if args.is_empty() || args.len() > 2 {
                return Err(KadeError::invalid_argument(format!(
                    "{} requires (value) or (value, order)",
                    name.to_ascii_uppercase()
                )));
            }
            let value = args[0].clone();
            let order = args.get(1).cloned();
            return Ok(if name.eq_ignore_ascii_case("FIRST") {
                Self::First { value, order }
            } else {
                Self::Last { value, order }
            });
        }
        Err(KadeError::invalid_argument(format!(
            "unsupported function '{name}'"
        )))
    }

    fn default_name(&self) -> String {
        match self {
            | Self::TimeBucket { .. } => "time_bucket".to_string(),
            | Self::First { .. } => "first".to_string(),
            | Self::Last { .. } => "last".to_string(),
            | Self::Plain(Expression::Identifier(name)) => name.clone(),
            | Self::Plain(_) => "expr".to_string(),
        }
    }
}

/// Integer floor-division bucket of a TIME_BUCKET item for one row
fn time_bucket(
    value: &Expression,
    width: &Expression,
    schema: &TableSchema,
    row: &Row,
) -> KadeResult<i64> {
    let v = evaluate_expression(value, schema, row)?.as_int().map_err(|_| {
        KadeError::invalid_argument("TIME_BUCKET expression must evaluate to an integer")
    })?;
    let w = evaluate_expression(width, schema, row)?.as_int().map_err(|_| {
        KadeError::invalid_argument("TIME_BUCKET width must be an integer")
    })?;
    if w <= 0 {
        return Err(KadeError::invalid_argument(format!(
            "TIME_BUCKET width must be positive, got {w}"
        )));
    }
    Ok(v.div_euclid(w) * w)
}

/// Default FIRST/LAST ordering: the first Integer column named `timestamp`
fn default_order_expression(schema: &TableSchema) -> KadeResult<Expression> {
    match schema.column("timestamp") {
        | Some(column) if column.ty == ValueType::Integer => {
            Ok(Expression::Identifier("timestamp".to_string()))
        }
        | _ => Err(KadeError::invalid_argument(
            "FIRST/LAST needs an ordering expression (no integer 'timestamp' column)",
        )),
    }
}

fn representative<'a>(data: &'a ResultSet, row_indices: &[usize]) -> KadeResult<&'a Row> {
    row_indices
        .first()
        .and_then(|&idx| data.rows().get(idx))
        .ok_or_else(|| KadeError::internal("empty aggregation group"))
}

fn nullable_cell(value: Value) -> Option<Value> {
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

fn dml_result(label: &str, count: usize) -> ResultSet {
    let mut result = ResultSet::new(
        vec!["affected".to_string(), label.to_string()],
        vec![ValueType::Integer, ValueType::Integer],
    );
    let count = count as i64;
    result.push_row(Row::new(vec![
        Some(Value::integer(count)),
        Some(Value::integer(count)),
    ]));
    result
}

/// Evaluate a row expression
///
/// Identifiers resolve against the schema, comparisons yield Booleans
/// (false when either side is null), arithmetic stays integer when both
/// operands are Integer and the operator is not `/`, `+` concatenates when
/// either side is a String, and Null propagates through arithmetic.
pub fn evaluate_expression(
    expr: &Expression,
    schema: &TableSchema,
    row: &Row,
) -> KadeResult<Value> {
    match expr {
        | Expression::Literal(literal) => Ok(literal.to_value()),
        | Expression::Identifier(name) => {
            let idx = schema.find_column(name).ok_or_else(|| {
                KadeError::invalid_argument(format!("unknown column '{name}' in expression"))
            })?;
            Ok(row.value(idx).cloned().unwrap_or(Value::Null))
        }
        | Expression::UnaryOp { operator, operand } => {
            let value = evaluate_expression(operand, schema, row)?;
            match operator {
                | UnaryOperator::Not => Ok(Value::boolean(!value.as_bool()?)),
                | UnaryOperator::Minus => match value {
                    | Value::Integer(i) => Ok(Value::integer(-i)),
                    | Value::Float(f) => Ok(Value::float(-f)),
                    | Value::Null => Ok(Value::Null),
                    | other => Err(KadeError::invalid_argument(format!(
                        "cannot negate {}",
                        other.value_type()
                    ))),
                },
                | UnaryOperator::Plus => match value {
                    | Value::Integer(_) | Value::Float(_) | Value::Null => Ok(value),
                    | other => Err(KadeError::invalid_argument(format!(
                        "unary '+' needs a numeric operand, got {}",
                        other.value_type()
                    ))),
                },
            }
        }
        | Expression::BinaryOp {
            left,
            operator,
            right,
        } => {
            match operator {
                | BinaryOperator::And => {
                    let lhs = evaluate_expression(left, schema, row)?.as_bool()?;
                    if !lhs {
                        return Ok(Value::boolean(false));
                    }
                    Ok(Value::boolean(
                        evaluate_expression(right, schema, row)?.as_bool()?,
                    ))
                }
                | BinaryOperator::Or => {
                    let lhs = evaluate_expression(left, schema, row)?.as_bool()?;
                    if lhs {
                        return Ok(Value::boolean(true));
                    }
                    Ok(Value::boolean(
                        evaluate_expression(right, schema, row)?.as_bool()?,
                    ))
                }
                | op if op.is_comparison() => {
                    let lhs = evaluate_expression(left, schema, row)?;
                    let rhs = evaluate_expression(right, schema, row)?;
                    if lhs.is_null() || rhs.is_null() {
                        return Ok(Value::boolean(false));
                    }
                    let ord = lhs.compare(&rhs);
                    let holds = match op {
                        | BinaryOperator::Equal => ord.is_eq(),
                        | BinaryOperator::NotEqual => ord.is_ne(),
                        | BinaryOperator::LessThan => ord.is_lt(),
                        | BinaryOperator::LessThanOrEqual => ord.is_le(),
                        | BinaryOperator::GreaterThan => ord.is_gt(),
                        | BinaryOperator::GreaterThanOrEqual => ord.is_ge(),
                        | _ => false,
                    };
                    Ok(Value::boolean(holds))
                }
                | op => {
                    let lhs = evaluate_expression(left, schema, row)?;
                    let rhs = evaluate_expression(right, schema, row)?;
                    apply_arithmetic(&lhs, *op, &rhs)
                }
            }
        }
        | Expression::FunctionCall { name, .. } => Err(KadeError::invalid_argument(format!(
            "function '{name}' is not allowed in this expression"
        ))),
    }
}

fn apply_arithmetic(lhs: &Value, op: BinaryOperator, rhs: &Value) -> KadeResult<Value> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    // '+' doubles as concatenation whenever either side is a String.
    if op == BinaryOperator::Add
        && (matches!(lhs, Value::String(_)) || matches!(rhs, Value::String(_)))
    {
        return Ok(Value::string(format!("{lhs}{rhs}")));
    }

    if let (Value::Integer(a), Value::Integer(b)) = (lhs, rhs) {
        if op != BinaryOperator::Divide {
            let result = match op {
                | BinaryOperator::Add => a.checked_add(*b),
                | BinaryOperator::Subtract => a.checked_sub(*b),
                | BinaryOperator::Multiply => a.checked_mul(*b),
                | _ => None,
            };
            return result.map(Value::integer).ok_or_else(|| {
                KadeError::invalid_argument(format!("integer overflow in {a} {op:?} {b}"))
            });
        }
    }

    let a = lhs.as_float().map_err(|_| {
        KadeError::invalid_argument(format!("{} is not numeric", lhs.value_type()))
    })?;
    let b = rhs.as_float().map_err(|_| {
        KadeError::invalid_argument(format!("{} is not numeric", rhs.value_type()))
    })?;
    let result = match op {
        | BinaryOperator::Add => a + b,
        | BinaryOperator::Subtract => a - b,
        | BinaryOperator::Multiply => a * b,
        | BinaryOperator::Divide => {
            if b == 0.0 {
                return Err(KadeError::invalid_argument("division by zero"));
            }
            a / b
        }
        | _ => {
            return Err(KadeError::invalid_argument(format!(
                "{op:?} is not an arithmetic operator"
            )))
        }
    };
    Ok(Value::float(result))
}
