//! # KadeDB Core
//!
//! Multi-model, in-memory storage engines sharing one typed value system,
//! one composable predicate model, and one result-set representation:
//!
//! - **Relational**: schema-governed tables with constraint and uniqueness
//!   enforcement
//! - **Document**: key-addressed collections with optional schemas
//! - **Time series**: partitioned append-only buckets with retention,
//!   range scans, and bucketed aggregation
//! - **Graph**: labeled property graphs with adjacency indices,
//!   BFS/DFS/shortest-path, and a tiny query language
//!
//! Values, rows, schemas, and documents round-trip through a versioned
//! binary codec and a tagged JSON codec.

pub mod error;
pub mod predicate;
pub mod result_set;
pub mod row;
pub mod schema;
pub mod serialization;
pub mod store;
pub mod validation;
pub mod value;

pub use error::{KadeError, KadeResult, SerializationError, Status};
pub use predicate::{CompareOp, DocPredicate, Predicate};
pub use result_set::{CsvOptions, ResultRow, ResultSet};
pub use row::{Document, Row, RowShallow};
pub use schema::{
    Column, Constraints, DocumentSchema, Granularity, Partition, RetentionPolicy, TableSchema,
    TimeSeriesSchema,
};
pub use store::{
    execute_graph_query, Aggregation, DocumentStore, Edge, EdgeId, GraphStore, Node, NodeId,
    RelationalStore, TimeSeriesStore,
};
pub use value::{Value, ValueType};
