//! Tiny graph query language
//!
//! Keyword-directed statements over a [`GraphStore`]:
//!
//! ```text
//! TRAVERSE <graph> FROM <id> (BFS|DFS) [LIMIT n]
//! MATCH <graph> (a)-[:TYPE]->(b) [WHERE a = <id>] RETURN b
//! SHORTEST_PATH <graph> FROM <u> TO <v>
//! CONNECTED <graph> FROM <u> TO <v>
//! ```
//!
//! Keywords are case-insensitive; results come back as [`ResultSet`]s.

use crate::error::{KadeError, KadeResult};
use crate::result_set::ResultSet;
use crate::row::Row;
use crate::store::graph::{GraphStore, NodeId};
use crate::value::{Value, ValueType};

/// Execute a graph query against a store
pub fn execute_graph_query(store: &GraphStore, text: &str) -> KadeResult<ResultSet> {
    let tokens: Vec<&str> = text
        .trim()
        .trim_end_matches(';')
        .split_whitespace()
        .collect();
    let Some(&keyword) = tokens.first() else {
        return Err(KadeError::invalid_argument("empty graph query"));
    };
    match keyword.to_ascii_uppercase().as_str() {
        "TRAVERSE" => execute_traverse(store, &tokens),
        "MATCH" => execute_match(store, &tokens),
        "SHORTEST_PATH" => execute_shortest_path(store, &tokens),
        "CONNECTED" => execute_connected(store, &tokens),
        other => Err(KadeError::invalid_argument(format!(
            "unknown graph query keyword '{other}'"
        ))),
    }
}

fn execute_traverse(store: &GraphStore, tokens: &[&str]) -> KadeResult<ResultSet> {
    // TRAVERSE <g> FROM <id> (BFS|DFS) [LIMIT n]
    if tokens.len() < 5 {
        return Err(KadeError::invalid_argument(
            "usage: TRAVERSE <graph> FROM <id> (BFS|DFS) [LIMIT n]",
        ));
    }
    let graph = tokens[1];
    expect_keyword(tokens[2], "FROM")?;
    let start = parse_node_id(tokens[3])?;
    let algorithm = tokens[4].to_ascii_uppercase();

    let mut max_nodes = 0usize;
    match tokens.len() {
        5 => {}
        7 => {
            expect_keyword(tokens[5], "LIMIT")?;
            max_nodes = tokens[6].parse().map_err(|_| {
                KadeError::invalid_argument(format!("bad LIMIT '{}'", tokens[6]))
            })?;
        }
        _ => {
            return Err(KadeError::invalid_argument(
                "trailing tokens after TRAVERSE query",
            ))
        }
    }

    let nodes = match algorithm.as_str() {
        "BFS" => store.bfs(graph, start, max_nodes)?,
        "DFS" => store.dfs(graph, start, max_nodes)?,
        other => {
            return Err(KadeError::invalid_argument(format!(
                "unknown traversal '{other}', expected BFS or DFS"
            )))
        }
    };

    let mut result = ResultSet::new(vec!["node_id".to_string()], vec![ValueType::Integer]);
    for node in nodes {
        result.push_row(Row::new(vec![Some(node_value(node)?)]));
    }
    Ok(result)
}

fn execute_match(store: &GraphStore, tokens: &[&str]) -> KadeResult<ResultSet> {
    // MATCH <g> (a)-[:TYPE]->(b) [WHERE a = <id>] RETURN b
    if tokens.len() < 5 {
        return Err(KadeError::invalid_argument(
            "usage: MATCH <graph> (a)-[:TYPE]->(b) [WHERE a = <id>] RETURN b",
        ));
    }
    let graph = tokens[1];
    let (source_var, edge_type, target_var) = parse_pattern(tokens[2])?;

    let mut from = None;
    let mut cursor = 3;
    if tokens[cursor].eq_ignore_ascii_case("WHERE") {
        if tokens.len() < cursor + 4 {
            return Err(KadeError::invalid_argument("incomplete WHERE clause"));
        }
        if tokens[cursor + 1] != source_var {
            return Err(KadeError::invalid_argument(format!(
                "WHERE references '{}', pattern source is '{source_var}'",
                tokens[cursor + 1]
            )));
        }
        if tokens[cursor + 2] != "=" {
            return Err(KadeError::invalid_argument("WHERE supports only '='"));
        }
        from = Some(parse_node_id(tokens[cursor + 3])?);
        cursor += 4;
    }

    if tokens.len() != cursor + 2 {
        return Err(KadeError::invalid_argument("expected RETURN <var>"));
    }
    expect_keyword(tokens[cursor], "RETURN")?;
    if tokens[cursor + 1] != target_var {
        return Err(KadeError::invalid_argument(format!(
            "RETURN references '{}', pattern target is '{target_var}'",
            tokens[cursor + 1]
        )));
    }

    let pairs = store.match_edges(graph, &edge_type, from)?;
    let mut result = ResultSet::new(vec![target_var], vec![ValueType::Integer]);
    for (_, to) in pairs {
        result.push_row(Row::new(vec![Some(node_value(to)?)]));
    }
    Ok(result)
}

fn execute_shortest_path(store: &GraphStore, tokens: &[&str]) -> KadeResult<ResultSet> {
    // SHORTEST_PATH <g> FROM <u> TO <v>
    let (graph, from, to) = parse_from_to(tokens, "SHORTEST_PATH")?;
    let path = store.shortest_path(graph, from, to)?;
    let mut result = ResultSet::new(
        vec!["step".to_string(), "node_id".to_string()],
        vec![ValueType::Integer, ValueType::Integer],
    );
    for (step, node) in path.into_iter().enumerate() {
        result.push_row(Row::new(vec![
            Some(Value::integer(step as i64)),
            Some(node_value(node)?),
        ]));
    }
    Ok(result)
}

fn execute_connected(store: &GraphStore, tokens: &[&str]) -> KadeResult<ResultSet> {
    // CONNECTED <g> FROM <u> TO <v>
    let (graph, from, to) = parse_from_to(tokens, "CONNECTED")?;
    let connected = store.connected(graph, from, to)?;
    let mut result = ResultSet::new(vec!["value".to_string()], vec![ValueType::Boolean]);
    result.push_row(Row::new(vec![Some(Value::boolean(connected))]));
    Ok(result)
}

fn parse_from_to<'a>(
    tokens: &[&'a str],
    keyword: &str,
) -> KadeResult<(&'a str, NodeId, NodeId)> {
    if tokens.len() != 6 {
        return Err(KadeError::invalid_argument(format!(
            "usage: {keyword} <graph> FROM <u> TO <v>"
        )));
    }
    expect_keyword(tokens[2], "FROM")?;
    expect_keyword(tokens[4], "TO")?;
    Ok((tokens[1], parse_node_id(tokens[3])?, parse_node_id(tokens[5])?))
}

/// Parse a `(a)-[:TYPE]->(b)` pattern
fn parse_pattern(pattern: &str) -> KadeResult<(String, String, String)> {
    let bad = || {
        KadeError::invalid_argument(format!(
            "bad pattern '{pattern}', expected (a)-[:TYPE]->(b)"
        ))
    };
    let rest = pattern.strip_prefix('(').ok_or_else(bad)?;
    let (source, rest) = rest.split_once(')').ok_or_else(bad)?;
    let rest = rest.strip_prefix("-[:").ok_or_else(bad)?;
    let (edge_type, rest) = rest.split_once(']').ok_or_else(bad)?;
    let rest = rest.strip_prefix("->(").ok_or_else(bad)?;
    let target = rest.strip_suffix(')').ok_or_else(bad)?;
    if source.is_empty() || edge_type.is_empty() || target.is_empty() {
        return Err(bad());
    }
    Ok((source.to_string(), edge_type.to_string(), target.to_string()))
}

fn expect_keyword(token: &str, keyword: &str) -> KadeResult<()> {
    if token.eq_ignore_ascii_case(keyword) {
        Ok(())
    } else {
        Err(KadeError::invalid_argument(format!(
            "expected '{keyword}', found '{token}'"
        )))
    }
}

fn parse_node_id(token: &str) -> KadeResult<NodeId> {
    token
        .parse()
        .map_err(|_| KadeError::invalid_argument(format!("bad node id '{token}'")))
}

fn node_value(node: NodeId) -> KadeResult<Value> {
    i64::try_from(node)
        .map(Value::integer)
        .map_err(|_| KadeError::internal(format!("node id {node} exceeds integer range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::graph::{Edge, Node};

    /// 1 → 2 → 3 → 4
    fn chain() -> GraphStore {
        let store = GraphStore::new();
        store.create_graph("g").unwrap();
        for id in 1..=4 {
            store.put_node("g", Node::new(id)).unwrap();
        }
        store.put_edge("g", Edge::new(1, 1, 2).with_type("next")).unwrap();
        store.put_edge("g", Edge::new(2, 2, 3).with_type("next")).unwrap();
        store.put_edge("g", Edge::new(3, 3, 4).with_type("next")).unwrap();
        store
    }

    #[test]
    fn test_traverse_bfs_with_limit() {
        let store = chain();
        let result = execute_graph_query(&store, "TRAVERSE g FROM 1 BFS LIMIT 2").unwrap();
        assert_eq!(result.columns(), &["node_id"]);
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.at(1, 0), Some(&Value::integer(2)));
    }

    #[test]
    fn test_traverse_dfs() {
        let store = chain();
        let result = execute_graph_query(&store, "traverse g from 1 dfs").unwrap();
        assert_eq!(result.row_count(), 4);
    }

    #[test]
    fn test_match_with_where() {
        let store = chain();
        let result =
            execute_graph_query(&store, "MATCH g (a)-[:next]->(b) WHERE a = 2 RETURN b").unwrap();
        assert_eq!(result.columns(), &["b"]);
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.at(0, 0), Some(&Value::integer(3)));
    }

    #[test]
    fn test_match_without_where() {
        let store = chain();
        let result = execute_graph_query(&store, "MATCH g (a)-[:next]->(b) RETURN b").unwrap();
        assert_eq!(result.row_count(), 3);
    }

    #[test]
    fn test_shortest_path_steps() {
        // S6: SHORTEST_PATH g FROM 1 TO 4.
        let store = chain();
        let result = execute_graph_query(&store, "SHORTEST_PATH g FROM 1 TO 4").unwrap();
        assert_eq!(result.columns(), &["step", "node_id"]);
        assert_eq!(result.row_count(), 4);
        assert_eq!(result.at(0, 0), Some(&Value::integer(0)));
        assert_eq!(result.at(0, 1), Some(&Value::integer(1)));
        assert_eq!(result.at(3, 0), Some(&Value::integer(3)));
        assert_eq!(result.at(3, 1), Some(&Value::integer(4)));
    }

    #[test]
    fn test_connected_is_directed() {
        let store = chain();
        let result = execute_graph_query(&store, "CONNECTED g FROM 4 TO 1").unwrap();
        assert_eq!(result.columns(), &["value"]);
        assert_eq!(result.at(0, 0), Some(&Value::boolean(false)));
        let result = execute_graph_query(&store, "CONNECTED g FROM 1 TO 4").unwrap();
        assert_eq!(result.at(0, 0), Some(&Value::boolean(true)));
    }

    #[test]
    fn test_syntax_errors() {
        let store = chain();
        for bad in [
            "",
            "EXPLAIN g",
            "TRAVERSE g FROM x BFS",
            "TRAVERSE g FROM 1 WALK",
            "MATCH g (a)-[:next]->(b) RETURN c",
            "MATCH g a->b RETURN b",
            "SHORTEST_PATH g FROM 1",
        ] {
            let err = execute_graph_query(&store, bad).unwrap_err();
            assert!(
                matches!(err, KadeError::InvalidArgument(_)),
                "query {bad:?} should be a syntax error, got {err:?}"
            );
        }
    }
}
