//! The four KadeDB storage engines
//!
//! Each store owns all of its state behind one internal mutex held for the
//! duration of every operation. Query APIs hand back deep clones, so
//! results stay valid across later mutations. Mutations that can fail
//! after partially applying are built copy-validate-swap: on failure the
//! store is logically unchanged.

pub mod document;
pub mod graph;
pub mod graph_query;
pub mod relational;
pub mod timeseries;

pub use document::DocumentStore;
pub use graph::{Edge, EdgeId, GraphStore, Node, NodeId};
pub use graph_query::execute_graph_query;
pub use relational::RelationalStore;
pub use timeseries::{Aggregation, TimeSeriesStore};
