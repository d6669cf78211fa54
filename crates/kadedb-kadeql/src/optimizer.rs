//! Logical optimizer: AST-to-predicate lowering and simplification
//!
//! [`build_predicate`] lowers boolean AST expressions into the storage
//! predicate model, folding literal-vs-literal comparisons into constants.
//! [`simplify`] is a pure function that pushes NOT down to the leaves
//! (inverting comparisons, De Morgan through And/Or), flattens nested
//! And/Or, applies the identity rules over the empty-list constants, and
//! deduplicates children by structural key. Simplified trees contain no
//! Not nodes at all.

use std::collections::HashSet;

use kadedb_core::{CompareOp, KadeError, KadeResult, Predicate, TableSchema, Value};

use crate::ast::{BinaryOperator, Expression, Literal, UnaryOperator};

/// Lower a boolean AST expression into a storage predicate
///
/// Supported shapes: AND/OR/NOT combinations, `identifier op literal`
/// comparisons (either operand order), literal-vs-literal comparisons
/// (folded into a constant), and boolean literals. Anything else is an
/// unsupported predicate shape.
pub fn build_predicate(expr: &Expression) -> KadeResult<Predicate> {
    match expr {
        | Expression::Literal(Literal::Boolean(true)) => Ok(Predicate::always_true()),
        | Expression::Literal(Literal::Boolean(false)) => Ok(Predicate::always_false()),
        | Expression::UnaryOp {
            operator: UnaryOperator::Not,
            operand,
        } => Ok(Predicate::Not(vec![build_predicate(operand)?])),
        | Expression::BinaryOp {
            left,
            operator: BinaryOperator::And,
            right,
        } => Ok(Predicate::And(vec![
            build_predicate(left)?,
            build_predicate(right)?,
        ])),
        | Expression::BinaryOp {
            left,
            operator: BinaryOperator::Or,
            right,
        } => Ok(Predicate::Or(vec![
            build_predicate(left)?,
            build_predicate(right)?,
        ])),
        | Expression::BinaryOp {
            left,
            operator,
            right,
        } if operator.is_comparison() => build_comparison(left, *operator, right),
        | other => Err(KadeError::invalid_argument(format!(
            "unsupported predicate shape: {other:?}"
        ))),
    }
}

fn build_comparison(
    left: &Expression,
    operator: BinaryOperator,
    right: &Expression,
) -> KadeResult<Predicate> {
    let op = compare_op(operator);
    match (left, right) {
        | (Expression::Identifier(column), Expression::Literal(literal)) => {
            Ok(Predicate::comparison(column, op, literal.to_value()))
        }
        | (Expression::Literal(literal), Expression::Identifier(column)) => {
            // Reversed operands mirror the operator: 25 < age ⇔ age > 25.
            Ok(Predicate::comparison(column, op.mirror(), literal.to_value()))
        }
        | (Expression::Literal(a), Expression::Literal(b)) => {
            Ok(fold_literal_comparison(&a.to_value(), op, &b.to_value()))
        }
        | _ => Err(KadeError::invalid_argument(format!(
            "unsupported comparison shape: {left:?} vs {right:?}"
        ))),
    }
}

/// Evaluate a literal-vs-literal comparison at build time
fn fold_literal_comparison(a: &Value, op: CompareOp, b: &Value) -> Predicate {
    // Null comparisons are false under the evaluation semantics.
    let holds = !a.is_null() && !b.is_null() && op.matches(a.compare(b));
    if holds {
        Predicate::always_true()
    } else {
        Predicate::always_false()
    }
}

const fn compare_op(operator: BinaryOperator) -> CompareOp {
    match operator {
        | BinaryOperator::Equal => CompareOp::Eq,
        | BinaryOperator::NotEqual => CompareOp::Ne,
        | BinaryOperator::LessThan => CompareOp::Lt,
        | BinaryOperator::LessThanOrEqual => CompareOp::Le,
        | BinaryOperator::GreaterThan => CompareOp::Gt,
        | BinaryOperator::GreaterThanOrEqual => CompareOp::Ge,
        // build_comparison only forwards comparison operators.
        | _ => CompareOp::Eq,
    }
}

/// Simplify a predicate; pure and idempotent
pub fn simplify(pred: &Predicate) -> Predicate {
    match pred {
        | Predicate::Comparison { .. } => pred.clone(),
        | Predicate::And(children) => {
            normalize(children.iter().map(simplify).collect(), true)
        }
        | Predicate::Or(children) => {
            normalize(children.iter().map(simplify).collect(), false)
        }
        | Predicate::Not(children) => match children.first() {
            | None => Predicate::always_false(),
            | Some(child) => negate(&simplify(child)),
        },
    }
}

/// Negate an already-simplified predicate without reintroducing Not
fn negate(pred: &Predicate) -> Predicate {
    match pred {
        | Predicate::Comparison { column, op, value } => Predicate::Comparison {
            column: column.clone(),
            op: op.invert(),
            value: value.clone(),
        },
        // De Morgan; the constants fall out of the empty lists.
        | Predicate::And(children) => normalize(children.iter().map(negate).collect(), false),
        | Predicate::Or(children) => normalize(children.iter().map(negate).collect(), true),
        | Predicate::Not(children) => match children.first() {
            | None => Predicate::always_true(),
            | Some(child) => simplify(child),
        },
    }
}

/// Flatten, apply identities, and dedup the children of an And/Or node
///
/// `conjunction` selects And semantics (true neutral, false dominant);
/// otherwise Or (false neutral, true dominant). Singleton nodes collapse
/// to their only child.
fn normalize(children: Vec<Predicate>, conjunction: bool) -> Predicate {
    let mut flat = Vec::new();
    let mut seen = HashSet::new();
    for child in children {
        match child {
            // true inside And (or false inside Or) is the neutral element;
            // flattening an empty nested list drops it naturally.
            | Predicate::And(nested) if conjunction => {
                for grandchild in nested {
                    push_unique(&mut flat, &mut seen, grandchild);
                }
            }
            | Predicate::Or(nested) if !conjunction => {
                for grandchild in nested {
                    push_unique(&mut flat, &mut seen, grandchild);
                }
            }
            // The dominant constant collapses the whole node.
            | Predicate::Or(nested) if conjunction && nested.is_empty() => {
                return Predicate::always_false();
            }
            | Predicate::And(nested) if !conjunction && nested.is_empty() => {
                return Predicate::always_true();
            }
            | other => push_unique(&mut flat, &mut seen, other),
        }
    }
    if flat.len() == 1 {
        return flat.remove(0);
    }
    if conjunction {
        Predicate::And(flat)
    } else {
        Predicate::Or(flat)
    }
}

/// Deterministic structural dedup keyed on the debug rendering
fn push_unique(flat: &mut Vec<Predicate>, seen: &mut HashSet<String>, pred: Predicate) {
    let key = format!("{pred:?}");
    if seen.insert(key) {
        flat.push(pred);
    }
}

/// Build, simplify, and schema-validate an optional WHERE clause
///
/// Column validation runs exactly once per statement, after
/// simplification and before storage is asked to apply the operation.
pub fn build_where(
    where_clause: Option<&Expression>,
    schema: &TableSchema,
) -> KadeResult<Option<Predicate>> {
    let Some(expr) = where_clause else {
        return Ok(None);
    };
    let predicate = simplify(&build_predicate(expr)?);
    predicate.validate_columns(schema)?;
    Ok(Some(predicate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(column: &str, op: CompareOp, v: i64) -> Predicate {
        Predicate::comparison(column, op, Value::integer(v))
    }

    #[test]
    fn test_double_negation() {
        let pred = Predicate::Not(vec![Predicate::Not(vec![cmp("a", CompareOp::Lt, 1)])]);
        assert_eq!(simplify(&pred), cmp("a", CompareOp::Lt, 1));
    }

    #[test]
    fn test_not_pushes_into_comparison() {
        let pred = Predicate::Not(vec![cmp("a", CompareOp::Lt, 1)]);
        assert_eq!(simplify(&pred), cmp("a", CompareOp::Ge, 1));
        let pred = Predicate::Not(vec![cmp("a", CompareOp::Eq, 1)]);
        assert_eq!(simplify(&pred), cmp("a", CompareOp::Ne, 1));
        let pred = Predicate::Not(vec![cmp("a", CompareOp::Le, 1)]);
        assert_eq!(simplify(&pred), cmp("a", CompareOp::Gt, 1));
    }

    #[test]
    fn test_de_morgan() {
        let pred = Predicate::Not(vec![Predicate::And(vec![
            cmp("a", CompareOp::Eq, 1),
            cmp("b", CompareOp::Eq, 2),
        ])]);
        assert_eq!(
            simplify(&pred),
            Predicate::Or(vec![
                cmp("a", CompareOp::Ne, 1),
                cmp("b", CompareOp::Ne, 2),
            ])
        );
    }

    #[test]
    fn test_flattening() {
        let pred = Predicate::And(vec![
            cmp("a", CompareOp::Eq, 1),
            Predicate::And(vec![cmp("b", CompareOp::Eq, 2), cmp("c", CompareOp::Eq, 3)]),
        ]);
        assert_eq!(
            simplify(&pred),
            Predicate::And(vec![
                cmp("a", CompareOp::Eq, 1),
                cmp("b", CompareOp::Eq, 2),
                cmp("c", CompareOp::Eq, 3),
            ])
        );
    }

    #[test]
    fn test_identities() {
        // true inside And disappears.
        let pred = Predicate::And(vec![Predicate::always_true(), cmp("a", CompareOp::Eq, 1)]);
        assert_eq!(simplify(&pred), cmp("a", CompareOp::Eq, 1));
        // false collapses And.
        let pred = Predicate::And(vec![cmp("a", CompareOp::Eq, 1), Predicate::always_false()]);
        assert_eq!(simplify(&pred), Predicate::always_false());
        // Duals for Or.
        let pred = Predicate::Or(vec![Predicate::always_false(), cmp("a", CompareOp::Eq, 1)]);
        assert_eq!(simplify(&pred), cmp("a", CompareOp::Eq, 1));
        let pred = Predicate::Or(vec![cmp("a", CompareOp::Eq, 1), Predicate::always_true()]);
        assert_eq!(simplify(&pred), Predicate::always_true());
    }

    #[test]
    fn test_dedup_is_stable() {
        let pred = Predicate::And(vec![
            cmp("b", CompareOp::Eq, 2),
            cmp("a", CompareOp::Eq, 1),
            cmp("b", CompareOp::Eq, 2),
        ]);
        assert_eq!(
            simplify(&pred),
            Predicate::And(vec![cmp("b", CompareOp::Eq, 2), cmp("a", CompareOp::Eq, 1)])
        );
    }

    #[test]
    fn test_simplify_idempotent() {
        let preds = [
            Predicate::Not(vec![Predicate::Or(vec![
                cmp("a", CompareOp::Eq, 1),
                Predicate::Not(vec![cmp("b", CompareOp::Lt, 2)]),
            ])]),
            Predicate::And(vec![
                Predicate::And(vec![cmp("a", CompareOp::Ge, 0), Predicate::always_true()]),
                Predicate::Or(vec![]),
            ]),
            Predicate::Not(vec![]),
        ];
        for pred in preds {
            let once = simplify(&pred);
            assert_eq!(simplify(&once), once, "not idempotent for {pred:?}");
        }
    }

    #[test]
    fn test_build_predicate_shapes() {
        use crate::parser::parse_query;
        use crate::ast::{Projection, Statement};

        let where_of = |query: &str| {
            let Statement::Select(select) = parse_query(query).unwrap() else {
                panic!("expected SELECT");
            };
            assert!(matches!(select.projection, Projection::Columns(_)));
            select.where_clause.unwrap()
        };

        // identifier op literal
        let pred = build_predicate(&where_of("SELECT id FROM t WHERE age >= 30")).unwrap();
        assert_eq!(pred, cmp("age", CompareOp::Ge, 30));

        // reversed operands mirror the operator
        let pred = build_predicate(&where_of("SELECT id FROM t WHERE 25 < age")).unwrap();
        assert_eq!(pred, cmp("age", CompareOp::Gt, 25));

        // literal vs literal folds to a constant
        let pred = build_predicate(&where_of("SELECT id FROM t WHERE 1 = 1")).unwrap();
        assert_eq!(simplify(&pred), Predicate::always_true());
        let pred = build_predicate(&where_of("SELECT id FROM t WHERE 1 = 2")).unwrap();
        assert_eq!(simplify(&pred), Predicate::always_false());

        // column-vs-column is unsupported
        let err = build_predicate(&where_of("SELECT id FROM t WHERE a = b")).unwrap_err();
        assert!(matches!(err, KadeError::InvalidArgument(_)));
    }

    #[test]
    fn test_build_where_validates_columns() {
        use kadedb_core::{Column, ValueType};

        let schema = TableSchema::new(vec![Column::new("age", ValueType::Integer)]);
        let expr = Expression::BinaryOp {
            left: Box::new(Expression::Identifier("salary".into())),
            operator: BinaryOperator::GreaterThan,
            right: Box::new(Expression::Literal(Literal::Integer(1))),
        };
        let err = build_where(Some(&expr), &schema).unwrap_err();
        assert!(err.to_string().contains("salary"));
        assert!(build_where(None, &schema).unwrap().is_none());
    }
}
