//! Cross-store integration tests exercising the public API end to end

use anyhow::Result;
use kadedb_core::{
    Aggregation, Column, CompareOp, Document, DocumentStore, Edge, Granularity, GraphStore, Node,
    Partition, Predicate, RelationalStore, RetentionPolicy, Row, TableSchema, TimeSeriesSchema,
    TimeSeriesStore, Value, ValueType,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn person_row(id: i64, name: &str, age: Option<i64>) -> Row {
    Row::new(vec![
        Some(Value::integer(id)),
        Some(Value::string(name)),
        age.map(Value::integer),
    ])
}

#[test]
fn relational_select_with_and_between_bounds() -> Result<()> {
    // S1: SELECT name FROM person WHERE age >= 30 AND age <= 40.
    let store = RelationalStore::new();
    let schema = TableSchema::with_primary_key(
        vec![
            Column::new("id", ValueType::Integer).unique(),
            Column::new("name", ValueType::String),
            Column::new("age", ValueType::Integer).nullable(),
        ],
        "id",
    )?;
    store.create_table("person", schema)?;
    store.insert_row("person", person_row(1, "Ada", Some(36)))?;
    store.insert_row("person", person_row(2, "Grace", Some(41)))?;
    store.insert_row("person", person_row(3, "Bob", Some(29)))?;

    let predicate = Predicate::And(vec![
        Predicate::comparison("age", CompareOp::Ge, Value::integer(30)),
        Predicate::comparison("age", CompareOp::Le, Value::integer(40)),
    ]);
    let result = store.select("person", &["name".to_string()], Some(&predicate))?;
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.at(0, 0), Some(&Value::string("Ada")));
    Ok(())
}

#[test]
fn result_sets_survive_later_mutations() {
    let store = RelationalStore::new();
    let schema = TableSchema::new(vec![Column::new("n", ValueType::Integer)]);
    store.create_table("t", schema).unwrap();
    store
        .insert_row("t", Row::new(vec![Some(Value::integer(1))]))
        .unwrap();

    let before = store.select("t", &[], None).unwrap();
    store.truncate_table("t").unwrap();
    store.drop_table("t").unwrap();

    // The result set is a deep clone, untouched by the mutations above.
    assert_eq!(before.row_count(), 1);
    assert_eq!(before.at(0, 0), Some(&Value::integer(1)));
}

#[test]
fn unique_columns_stay_unique_through_mutations() {
    let store = RelationalStore::new();
    let schema = TableSchema::new(vec![
        Column::new("id", ValueType::Integer).unique(),
        Column::new("tag", ValueType::String).nullable(),
    ]);
    store.create_table("t", schema).unwrap();
    for id in 1..=4 {
        store
            .insert_row("t", Row::new(vec![Some(Value::integer(id)), None]))
            .unwrap();
    }
    let mut assignments = std::collections::HashMap::new();
    assignments.insert("id".to_string(), Value::integer(99));
    // Updating every row to the same id must fail and change nothing.
    assert!(store.update_rows("t", &assignments, None).is_err());

    let result = store.select("t", &["id".to_string()], None).unwrap();
    let mut ids: Vec<i64> = result
        .iter()
        .filter_map(|row| row.value(0))
        .filter_map(|v| v.as_int().ok())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 4);
}

#[test]
fn document_store_projection_round_trip() -> Result<()> {
    let store = DocumentStore::new();
    let mut doc = Document::new();
    doc.set("kind", Some(Value::string("sensor")));
    doc.set("level", Some(Value::integer(3)));
    store.put("devices", "d1", doc)?;

    let results = store.query("devices", &["kind".to_string()], None)?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].1.value("kind"), Some(&Value::string("sensor")));
    assert_eq!(store.count("devices")?, 1);
    store.erase("devices", "d1")?;
    assert_eq!(store.count("devices")?, 0);
    Ok(())
}

#[test]
fn time_series_retention_and_aggregation() {
    // Combined TTL + max-rows policy on one series.
    let store = TimeSeriesStore::new();
    let mut schema = TimeSeriesSchema::new("timestamp", Granularity::Seconds);
    schema.add_tag_column(Column::new("sensor_id", ValueType::Integer));
    schema.add_value_column(Column::new("value", ValueType::Integer));
    schema.set_retention_policy(RetentionPolicy {
        ttl_seconds: 3_600,
        max_rows: 100,
        drop_oldest: true,
    });
    store.create_series("cpu", schema, Partition::Hourly).unwrap();

    for ts in 0..200 {
        store
            .append(
                "cpu",
                Row::new(vec![
                    Some(Value::integer(ts)),
                    Some(Value::integer(ts % 2)),
                    Some(Value::integer(10)),
                ]),
            )
            .unwrap();
    }
    // max_rows caps the total row count.
    assert!(store.total_rows("cpu").unwrap() <= 100);

    let result = store
        .aggregate(
            "cpu",
            "value",
            Aggregation::Count,
            0,
            1_000,
            50,
            Granularity::Seconds,
            None,
        )
        .unwrap();
    // Every bucket start is inside the window and counts only rows in
    // [bucket_start, bucket_start + width).
    let mut total = 0i64;
    for row in result.iter() {
        let bucket = row.value(0).unwrap().as_int().unwrap();
        assert!((0..1_000).contains(&bucket));
        assert_eq!(bucket % 50, 0);
        total += row.value(1).unwrap().as_int().unwrap();
    }
    assert_eq!(total as usize, store.total_rows("cpu").unwrap());
}

#[test]
fn ttl_bound_holds_after_every_append() {
    let store = TimeSeriesStore::new();
    let mut schema = TimeSeriesSchema::new("timestamp", Granularity::Seconds);
    schema.add_value_column(Column::new("value", ValueType::Integer));
    schema.set_retention_policy(RetentionPolicy::ttl(50));
    store.create_series("s", schema, Partition::Daily).unwrap();

    let mut now = 0;
    for ts in [0, 10, 45, 60, 200, 201] {
        store
            .append(
                "s",
                Row::new(vec![Some(Value::integer(ts)), Some(Value::integer(1))]),
            )
            .unwrap();
        now = ts;
        let rows = store.range_query("s", &[], i64::MIN / 4, i64::MAX / 4, None).unwrap();
        for row in rows.iter() {
            let tsec = row.value(0).unwrap().as_int().unwrap();
            assert!(tsec >= now - 50, "row {tsec} survived past TTL at {now}");
        }
    }
    assert!(now > 0);
}

#[test]
fn retention_bounds_hold_under_random_appends() {
    // Seeded, so the append order is shuffled but reproducible.
    let mut rng = StdRng::seed_from_u64(7);
    let store = TimeSeriesStore::new();
    let mut schema = TimeSeriesSchema::new("timestamp", Granularity::Seconds);
    schema.add_value_column(Column::new("value", ValueType::Integer));
    schema.set_retention_policy(RetentionPolicy {
        ttl_seconds: 500,
        max_rows: 64,
        drop_oldest: true,
    });
    store.create_series("s", schema, Partition::Hourly).unwrap();

    for _ in 0..300 {
        let ts = rng.gen_range(0..5_000i64);
        store
            .append(
                "s",
                Row::new(vec![
                    Some(Value::integer(ts)),
                    Some(Value::integer(rng.gen_range(-100..100))),
                ]),
            )
            .unwrap();
        // Both retention bounds hold after every single append, with the
        // TTL cutoff anchored at the row just written.
        assert!(store.total_rows("s").unwrap() <= 64);
        let rows = store.range_query("s", &[], 0, 10_000, None).unwrap();
        for row in rows.iter() {
            let tsec = row.value(0).unwrap().as_int().unwrap();
            assert!(tsec >= ts - 500, "row {tsec} survived past TTL at {ts}");
        }
    }
}

#[test]
fn graph_shortest_path_matches_bfs_distance() {
    let store = GraphStore::new();
    store.create_graph("g").unwrap();
    for id in 1..=6 {
        store.put_node("g", Node::new(id)).unwrap();
    }
    let edges = [(1, 2), (2, 3), (3, 4), (1, 5), (5, 4), (4, 6)];
    for (i, (from, to)) in edges.iter().enumerate() {
        store
            .put_edge("g", Edge::new(i as u64, *from, *to).with_type("link"))
            .unwrap();
    }

    let path = store.shortest_path("g", 1, 6).unwrap();
    assert_eq!(path.first(), Some(&1));
    assert_eq!(path.last(), Some(&6));
    // 1→2→3→4→6 and 1→5→4→6; BFS finds the 4-node path.
    assert_eq!(path.len(), 4);
    assert!(store.connected("g", 1, 6).unwrap());
    assert!(!store.connected("g", 6, 1).unwrap());

    // CONNECTED agrees with a non-empty shortest path for every pair.
    for from in 1..=6u64 {
        for to in 1..=6u64 {
            let path = store.shortest_path("g", from, to).unwrap();
            assert_eq!(store.connected("g", from, to).unwrap(), !path.is_empty());
        }
    }
}
