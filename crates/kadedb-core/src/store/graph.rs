//! Property-graph storage engine
//!
//! Graphs keep node and edge tables plus out/in adjacency indices mapping
//! node ids to edge ids in insertion order. Traversals are deterministic:
//! BFS visits neighbors in stored adjacency order; DFS pushes them in
//! reverse so the first stored neighbor is emitted earliest.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KadeError, KadeResult};
use crate::value::Value;

/// Unique identifier for graph nodes
pub type NodeId = u64;

/// Unique identifier for graph edges
pub type EdgeId = u64;

/// Graph node with an optional label and arbitrary properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub label: Option<String>,
    pub props: HashMap<String, Value>,
}

impl Node {
    /// Create an unlabeled node without properties
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            label: None,
            props: HashMap::new(),
        }
    }

    /// Attach a label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attach a property
    #[must_use]
    pub fn with_prop(mut self, name: impl Into<String>, value: Value) -> Self {
        self.props.insert(name.into(), value);
        self
    }
}

/// Directed edge with an optional type and arbitrary properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: Option<String>,
    pub props: HashMap<String, Value>,
}

impl Edge {
    /// Create an untyped edge without properties
    pub fn new(id: EdgeId, from: NodeId, to: NodeId) -> Self {
        Self {
            id,
            from,
            to,
            edge_type: None,
            props: HashMap::new(),
        }
    }

    /// Attach an edge type
    #[must_use]
    pub fn with_type(mut self, edge_type: impl Into<String>) -> Self {
        self.edge_type = Some(edge_type.into());
        self
    }

    /// Attach a property
    #[must_use]
    pub fn with_prop(mut self, name: impl Into<String>, value: Value) -> Self {
        self.props.insert(name.into(), value);
        self
    }
}

#[derive(Debug, Default)]
struct Graph {
    nodes: HashMap<NodeId, Node>,
    edges: HashMap<EdgeId, Edge>,
    out_adj: HashMap<NodeId, Vec<EdgeId>>,
    in_adj: HashMap<NodeId, Vec<EdgeId>>,
}

impl Graph {
    fn unlink_edge(&mut self, edge: &Edge) {
        if let Some(out) = self.out_adj.get_mut(&edge.from) {
            out.retain(|&id| id != edge.id);
        }
        if let Some(incoming) = self.in_adj.get_mut(&edge.to) {
            incoming.retain(|&id| id != edge.id);
        }
    }

    fn link_edge(&mut self, edge: &Edge) {
        self.out_adj.entry(edge.from).or_default().push(edge.id);
        self.in_adj.entry(edge.to).or_default().push(edge.id);
    }

    /// Successor node ids of `node` in stored adjacency order
    fn successors(&self, node: NodeId) -> Vec<NodeId> {
        self.out_adj
            .get(&node)
            .map(|edge_ids| {
                edge_ids
                    .iter()
                    .filter_map(|id| self.edges.get(id).map(|e| e.to))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// In-memory property-graph store
#[derive(Debug, Default)]
pub struct GraphStore {
    inner: Mutex<HashMap<String, Graph>>,
}

impl GraphStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> KadeResult<MutexGuard<'_, HashMap<String, Graph>>> {
        self.inner
            .lock()
            .map_err(|_| KadeError::internal("graph store lock poisoned"))
    }

    /// Create a graph
    pub fn create_graph(&self, name: &str) -> KadeResult<()> {
        let mut graphs = self.guard()?;
        if graphs.contains_key(name) {
            return Err(KadeError::already_exists(format!("graph '{name}'")));
        }
        graphs.insert(name.to_string(), Graph::default());
        Ok(())
    }

    /// Drop a graph with all nodes and edges
    pub fn drop_graph(&self, name: &str) -> KadeResult<()> {
        self.guard()?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| KadeError::not_found(format!("graph '{name}'")))
    }

    /// Graph names, in arbitrary order
    pub fn list_graphs(&self) -> KadeResult<Vec<String>> {
        Ok(self.guard()?.keys().cloned().collect())
    }

    /// Insert or replace a node by id; replacement keeps incident edges
    pub fn put_node(&self, graph: &str, node: Node) -> KadeResult<()> {
        let mut graphs = self.guard()?;
        let g = lookup_mut(&mut graphs, graph)?;
        g.nodes.insert(node.id, node);
        Ok(())
    }

    /// Deep clone of a node by id
    pub fn get_node(&self, graph: &str, id: NodeId) -> KadeResult<Node> {
        let graphs = self.guard()?;
        lookup(&graphs, graph)?
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| KadeError::not_found(format!("node {id} in graph '{graph}'")))
    }

    /// Remove a node and every incident edge, cleaning both adjacencies
    pub fn erase_node(&self, graph: &str, id: NodeId) -> KadeResult<()> {
        let mut graphs = self.guard()?;
        let g = lookup_mut(&mut graphs, graph)?;
        if g.nodes.remove(&id).is_none() {
            return Err(KadeError::not_found(format!(
                "node {id} in graph '{graph}'"
            )));
        }
        let mut incident: Vec<EdgeId> = g.out_adj.remove(&id).unwrap_or_default();
        incident.extend(g.in_adj.remove(&id).unwrap_or_default());
        for edge_id in incident {
            if let Some(edge) = g.edges.remove(&edge_id) {
                g.unlink_edge(&edge);
            }
        }
        debug!("🗑️ erased node {id} from graph '{graph}'");
        Ok(())
    }

    /// Insert or replace an edge; both endpoints must exist
    ///
    /// Replacing an existing edge id removes the old adjacency entries
    /// before inserting the new ones.
    pub fn put_edge(&self, graph: &str, edge: Edge) -> KadeResult<()> {
        let mut graphs = self.guard()?;
        let g = lookup_mut(&mut graphs, graph)?;
        if !g.nodes.contains_key(&edge.from) {
            return Err(KadeError::invalid_argument(format!(
                "edge {} references missing node {}",
                edge.id, edge.from
            )));
        }
        if !g.nodes.contains_key(&edge.to) {
            return Err(KadeError::invalid_argument(format!(
                "edge {} references missing node {}",
                edge.id, edge.to
            )));
        }
        if let Some(old) = g.edges.remove(&edge.id) {
            g.unlink_edge(&old);
        }
        g.link_edge(&edge);
        g.edges.insert(edge.id, edge);
        Ok(())
    }

    /// Deep clone of an edge by id
    pub fn get_edge(&self, graph: &str, id: EdgeId) -> KadeResult<Edge> {
        let graphs = self.guard()?;
        lookup(&graphs, graph)?
            .edges
            .get(&id)
            .cloned()
            .ok_or_else(|| KadeError::not_found(format!("edge {id} in graph '{graph}'")))
    }

    /// Remove an edge from the graph and both adjacencies
    pub fn erase_edge(&self, graph: &str, id: EdgeId) -> KadeResult<()> {
        let mut graphs = self.guard()?;
        let g = lookup_mut(&mut graphs, graph)?;
        let edge = g
            .edges
            .remove(&id)
            .ok_or_else(|| KadeError::not_found(format!("edge {id} in graph '{graph}'")))?;
        g.unlink_edge(&edge);
        Ok(())
    }

    /// Outgoing edge ids of a node in insertion order
    pub fn edge_ids_out(&self, graph: &str, node: NodeId) -> KadeResult<Vec<EdgeId>> {
        let graphs = self.guard()?;
        let g = lookup(&graphs, graph)?;
        require_node(g, graph, node)?;
        Ok(g.out_adj.get(&node).cloned().unwrap_or_default())
    }

    /// Incoming edge ids of a node in insertion order
    pub fn edge_ids_in(&self, graph: &str, node: NodeId) -> KadeResult<Vec<EdgeId>> {
        let graphs = self.guard()?;
        let g = lookup(&graphs, graph)?;
        require_node(g, graph, node)?;
        Ok(g.in_adj.get(&node).cloned().unwrap_or_default())
    }

    /// Successor node ids of a node in stored adjacency order
    pub fn neighbors_out(&self, graph: &str, node: NodeId) -> KadeResult<Vec<NodeId>> {
        let graphs = self.guard()?;
        let g = lookup(&graphs, graph)?;
        require_node(g, graph, node)?;
        Ok(g.successors(node))
    }

    /// Predecessor node ids of a node in stored adjacency order
    pub fn neighbors_in(&self, graph: &str, node: NodeId) -> KadeResult<Vec<NodeId>> {
        let graphs = self.guard()?;
        let g = lookup(&graphs, graph)?;
        require_node(g, graph, node)?;
        Ok(g.in_adj
            .get(&node)
            .map(|edge_ids| {
                edge_ids
                    .iter()
                    .filter_map(|id| g.edges.get(id).map(|e| e.from))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Breadth-first traversal from `start` over out-edges
    ///
    /// FIFO order, neighbors in stored adjacency order; `max_nodes = 0`
    /// means unbounded.
    pub fn bfs(&self, graph: &str, start: NodeId, max_nodes: usize) -> KadeResult<Vec<NodeId>> {
        let graphs = self.guard()?;
        let g = lookup(&graphs, graph)?;
        require_node(g, graph, start)?;

        let mut visited = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(start);
        queue.push_back(start);
        while let Some(node) = queue.pop_front() {
            visited.push(node);
            if max_nodes != 0 && visited.len() >= max_nodes {
                break;
            }
            for next in g.successors(node) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        Ok(visited)
    }

    /// Depth-first traversal from `start` over out-edges
    ///
    /// LIFO order; neighbors are pushed in reverse stored order so the
    /// first stored neighbor is emitted earliest. `max_nodes = 0` means
    /// unbounded.
    pub fn dfs(&self, graph: &str, start: NodeId, max_nodes: usize) -> KadeResult<Vec<NodeId>> {
        let graphs = self.guard()?;
        let g = lookup(&graphs, graph)?;
        require_node(g, graph, start)?;

        let mut visited = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            visited.push(node);
            if max_nodes != 0 && visited.len() >= max_nodes {
                break;
            }
            for next in g.successors(node).into_iter().rev() {
                if !seen.contains(&next) {
                    stack.push(next);
                }
            }
        }
        Ok(visited)
    }

    /// Shortest path from `from` to `to` over out-edges, found by BFS
    ///
    /// Returns the node sequence including both endpoints, or an empty
    /// vector when `to` is unreachable.
    pub fn shortest_path(
        &self,
        graph: &str,
        from: NodeId,
        to: NodeId,
    ) -> KadeResult<Vec<NodeId>> {
        let graphs = self.guard()?;
        let g = lookup(&graphs, graph)?;
        require_node(g, graph, from)?;
        require_node(g, graph, to)?;

        if from == to {
            return Ok(vec![from]);
        }
        let mut parent: HashMap<NodeId, NodeId> = HashMap::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(from);
        queue.push_back(from);
        while let Some(node) = queue.pop_front() {
            for next in g.successors(node) {
                if !seen.insert(next) {
                    continue;
                }
                parent.insert(next, node);
                if next == to {
                    let mut path = vec![to];
                    let mut current = to;
                    while let Some(&prev) = parent.get(&current) {
                        path.push(prev);
                        current = prev;
                    }
                    path.reverse();
                    return Ok(path);
                }
                queue.push_back(next);
            }
        }
        Ok(Vec::new())
    }

    /// Whether `to` is reachable from `from` over out-edges
    pub fn connected(&self, graph: &str, from: NodeId, to: NodeId) -> KadeResult<bool> {
        Ok(!self.shortest_path(graph, from, to)?.is_empty())
    }

    /// Edges of a graph whose type matches, optionally restricted to a
    /// source node; pairs come back in edge-id order for determinism
    pub fn match_edges(
        &self,
        graph: &str,
        edge_type: &str,
        from: Option<NodeId>,
    ) -> KadeResult<Vec<(NodeId, NodeId)>> {
        let graphs = self.guard()?;
        let g = lookup(&graphs, graph)?;
        let mut matches: Vec<(EdgeId, NodeId, NodeId)> = g
            .edges
            .values()
            .filter(|edge| edge.edge_type.as_deref() == Some(edge_type))
            .filter(|edge| from.is_none_or(|id| edge.from == id))
            .map(|edge| (edge.id, edge.from, edge.to))
            .collect();
        matches.sort_unstable();
        Ok(matches.into_iter().map(|(_, f, t)| (f, t)).collect())
    }
}

fn require_node(g: &Graph, graph: &str, node: NodeId) -> KadeResult<()> {
    if g.nodes.contains_key(&node) {
        Ok(())
    } else {
        Err(KadeError::not_found(format!(
            "node {node} in graph '{graph}'"
        )))
    }
}

fn lookup<'a>(graphs: &'a HashMap<String, Graph>, name: &str) -> KadeResult<&'a Graph> {
    graphs
        .get(name)
        .ok_or_else(|| KadeError::not_found(format!("graph '{name}'")))
}

fn lookup_mut<'a>(
    graphs: &'a mut HashMap<String, Graph>,
    name: &str,
) -> KadeResult<&'a mut Graph> {
    graphs
        .get_mut(name)
        .ok_or_else(|| KadeError::not_found(format!("graph '{name}'")))
}
