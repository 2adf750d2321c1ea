//! Generic data-store seam.
//!
//! Every logical entity maps to one backend collection; the domain modules
//! talk to the backend exclusively through [`Store`], which mirrors the
//! PostgREST-style surface the hosted backend exposes (filtered selects,
//! inserts returning the created rows, filtered patches, binary-object
//! upload with a public-URL accessor). The production implementation lives
//! in [`crate::api`]; tests run the same flows against [`memory::MemoryStore`].

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PosError;

// ---------------------------------------------------------------------------
// Query building
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Gte,
    Lt,
}

impl Op {
    pub fn as_postgrest(&self) -> &'static str {
        match self {
            Op::Eq => "eq",
            Op::Gte => "gte",
            Op::Lt => "lt",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub op: Op,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Filter {
            column: column.into(),
            op: Op::Eq,
            value: value.into(),
        }
    }
}

/// A filtered, ordered, optionally limited select, the same chain shape the
/// backend's query builder exposes.
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    pub filters: Vec<Filter>,
    /// `(column, ascending)`
    pub order: Option<(String, bool)>,
    pub limit: Option<usize>,
}

impl SelectQuery {
    pub fn new() -> Self {
        SelectQuery::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn gte(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op: Op::Gte,
            value: value.into(),
        });
        self
    }

    pub fn lt(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op: Op::Lt,
            value: value.into(),
        });
        self
    }

    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.order = Some((column.into(), true));
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order = Some((column.into(), false));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

// ---------------------------------------------------------------------------
// The seam
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Store: Send + Sync {
    async fn select(&self, table: &str, query: SelectQuery) -> Result<Vec<Value>, PosError>;

    /// Insert one object or an array of objects; returns the created rows.
    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, PosError>;

    /// Patch all rows matching the filters; returns the updated rows.
    async fn update(
        &self,
        table: &str,
        filters: Vec<Filter>,
        patch: Value,
    ) -> Result<Vec<Value>, PosError>;

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<(), PosError>;

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PosError>;

    fn public_url(&self, bucket: &str, path: &str) -> Result<String, PosError>;
}

// ===========================================================================
// In-memory store for tests
// ===========================================================================


#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn select_filters_orders_and_limits() {
        let store = MemoryStore::new();
        store.seed(
            "orders",
            vec![
                json!({"id": "a", "total_amount": 10, "created_at": "2026-08-01T01:00:00+00:00"}),
                json!({"id": "b", "total_amount": 20, "created_at": "2026-08-02T01:00:00+00:00"}),
                json!({"id": "c", "total_amount": 30, "created_at": "2026-08-03T01:00:00+00:00"}),
            ],
        );

        let rows = store
            .select(
                "orders",
                SelectQuery::new()
                    .gte("created_at", "2026-08-02T00:00:00+00:00")
                    .order_desc("created_at")
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "c");
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let store = MemoryStore::new();
        store.fail_next("insert", "orders");
        assert!(store.insert("orders", json!({"id": "x"})).await.is_err());
        assert!(store.insert("orders", json!({"id": "x"})).await.is_ok());
        assert_eq!(store.row_count("orders"), 1);
    }
}
