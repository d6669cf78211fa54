//! # KadeQL Language Implementation
//!
//! SQL-dialect pipeline for KadeDB: tokenizer → recursive-descent parser →
//! AST → logical optimizer → executor over the relational store.
//!
//! ## Features
//!
//! - **SELECT / INSERT / UPDATE / DELETE** with WHERE trees, BETWEEN, and
//!   computed assignments
//! - **Predicate optimization**: NOT pushdown, De Morgan, flattening,
//!   constant folding, structural dedup
//! - **Aggregation mode**: `TIME_BUCKET`, `FIRST`, `LAST` grouping inside
//!   the executor
//! - **Position-tagged errors**: every syntax error carries line/column

pub mod ast;
pub mod error;
pub mod executor;
pub mod lexer;
pub mod optimizer;
pub mod parser;

// Property-based tests for parser and optimizer robustness
#[cfg(test)]
mod proptest_suite;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use kadedb_core::{RelationalStore, ResultSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub use ast::{Statement, Projection, SelectItem};
pub use error::{KadeQlError, KadeQlResult, ParseError};
pub use executor::Executor;
pub use lexer::{Lexer, Token, TokenKind};
pub use optimizer::{build_predicate, build_where, simplify};
pub use parser::parse_query;

/// Performance counters for the engine facade
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineMetrics {
    pub queries_parsed: u64,
    pub queries_executed: u64,
    pub average_parse_time: Duration,
    pub average_execution_time: Duration,
}

/// Convenience engine: parse and execute in one call
///
/// Owns an [`Executor`] over a shared [`RelationalStore`] and keeps
/// lightweight timing metrics per phase.
pub struct KadeQlEngine {
    executor: Executor,
    metrics: EngineMetrics,
}

impl KadeQlEngine {
    /// Create an engine over the given storage handle
    pub fn new(storage: Arc<RelationalStore>) -> Self {
        Self {
            executor: Executor::new(storage),
            metrics: EngineMetrics::default(),
        }
    }

    /// Parse and execute a query with full pipeline processing
    #[instrument(skip(self, query))]
    pub fn execute(&mut self, query: &str) -> Result<ResultSet> {
        if query.trim().is_empty() {
            anyhow::bail!("empty query");
        }

        let parse_start = Instant::now();
        let statement = parser::parse_query(query)?;
        self.metrics.average_parse_time = update_average(
            self.metrics.average_parse_time,
            parse_start.elapsed(),
            self.metrics.queries_parsed,
        );
        self.metrics.queries_parsed += 1;

        let exec_start = Instant::now();
        let result = self.executor.execute(&statement)?;
        self.metrics.average_execution_time = update_average(
            self.metrics.average_execution_time,
            exec_start.elapsed(),
            self.metrics.queries_executed,
        );
        self.metrics.queries_executed += 1;

        debug!(
            "query executed: {} rows in {:?}",
            result.row_count(),
            exec_start.elapsed()
        );
        Ok(result)
    }

    /// The underlying executor
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Current performance metrics
    pub const fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Reset performance metrics
    pub fn reset_metrics(&mut self) {
        self.metrics = EngineMetrics::default();
    }
}

const fn update_average(current: Duration, new: Duration, count: u64) -> Duration {
    if count == 0 {
        new
    } else {
        Duration::from_nanos(
            (current.as_nanos() as u64 * count + new.as_nanos() as u64) / (count + 1),
        )
    }
}
