//! Property-based tests for parser robustness and optimizer soundness

use kadedb_core::{Column, CompareOp, Predicate, Row, TableSchema, Value, ValueType};
use proptest::prelude::*;

use crate::optimizer::simplify;
use crate::parser::parse_query;

fn arb_predicate() -> impl Strategy<Value = Predicate> {
    let leaf = prop_oneof![
        Just(Predicate::always_true()),
        Just(Predicate::always_false()),
        (
            prop_oneof![Just("a"), Just("b"), Just("c")],
            prop_oneof![
                Just(CompareOp::Eq),
                Just(CompareOp::Ne),
                Just(CompareOp::Lt),
                Just(CompareOp::Le),
                Just(CompareOp::Gt),
                Just(CompareOp::Ge),
            ],
            -5i64..5
        )
            .prop_map(|(column, op, v)| Predicate::comparison(column, op, Value::integer(v))),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Predicate::And),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Predicate::Or),
            prop::collection::vec(inner, 0..2).prop_map(Predicate::Not),
        ]
    })
}

fn abc_schema() -> TableSchema {
    TableSchema::new(vec![
        Column::new("a", ValueType::Integer),
        Column::new("b", ValueType::Integer),
        Column::new("c", ValueType::Integer),
    ])
}

proptest! {
    #[test]
    fn parser_never_panics(input in "[ -~]{0,60}") {
        // Arbitrary printable ASCII either parses or errors cleanly.
        let _ = parse_query(&input);
    }

    #[test]
    fn lexer_never_panics(input in "\\PC{0,60}") {
        let _ = crate::lexer::Lexer::tokenize(&input);
    }

    #[test]
    fn simplify_is_idempotent(pred in arb_predicate()) {
        let once = simplify(&pred);
        prop_assert_eq!(simplify(&once), once);
    }

    #[test]
    fn simplify_preserves_evaluation(
        pred in arb_predicate(),
        a in -5i64..5,
        b in -5i64..5,
        c in -5i64..5,
    ) {
        // Over rows without nulls, the simplified predicate evaluates
        // identically (NOT over a null comparison is the one documented
        // divergence, and these rows have no nulls).
        let schema = abc_schema();
        let row = Row::new(vec![
            Some(Value::integer(a)),
            Some(Value::integer(b)),
            Some(Value::integer(c)),
        ]);
        let simplified = simplify(&pred);
        prop_assert_eq!(
            pred.evaluate(&schema, &row),
            simplified.evaluate(&schema, &row),
            "pred {:?} vs simplified {:?}",
            pred,
            simplified
        );
    }

    #[test]
    fn round_trip_where_clause(v in -100i64..100) {
        // A parsed WHERE clause lowers to the comparison it spells.
        let query = format!("SELECT a FROM t WHERE a >= {v}");
        let statement = parse_query(&query).unwrap();
        let crate::ast::Statement::Select(select) = statement else {
            return Err(TestCaseError::fail("expected SELECT"));
        };
        let pred = crate::optimizer::build_predicate(&select.where_clause.unwrap()).unwrap();
        prop_assert_eq!(
            pred,
            Predicate::comparison("a", CompareOp::Ge, Value::integer(v))
        );
    }
}
