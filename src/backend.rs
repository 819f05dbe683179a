use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use ts_rs::TS;

pub mod rest;

/// Classification of backend failures, decided once at the HTTP boundary.
/// Everything downstream (resolver, client, diagnostics) matches on the kind
/// instead of re-parsing error strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// Endpoint unreachable or credentials rejected at the transport level.
    Connectivity,
    /// The physical table does not exist.
    TableNotFound,
    /// Row-level security or grants rejected the request.
    PermissionDenied,
    /// The table exists but the query referenced a column or shape it lacks.
    SchemaMismatch,
    /// The known misconfiguration signature: infinite recursion in an access
    /// policy. Tables failing this way never recover within a session.
    PolicyRecursion,
    Unknown,
}

#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
    pub table: Option<String>,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        BackendError {
            kind,
            message: message.into(),
            table: None,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Errors that disqualify a table for the rest of the session.
    pub fn is_blacklistable(&self) -> bool {
        matches!(
            self.kind,
            BackendErrorKind::PolicyRecursion | BackendErrorKind::PermissionDenied
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Asc
    }
}

/// Column predicates the data layer actually needs. Values are JSON so the
/// same filter set serves both the HTTP backend and the mock store.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Gte(String, Value),
    Lte(String, Value),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(col, _) | Filter::Gte(col, _) | Filter::Lte(col, _) => col,
        }
    }
}

/// Case-insensitive substring search over a fixed set of text columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpec {
    pub fields: Vec<String>,
    pub term: String,
}

#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    pub filters: Vec<Filter>,
    pub search: Option<SearchSpec>,
    pub order: Option<(String, SortOrder)>,
    pub offset: u64,
    pub limit: Option<u64>,
}

impl SelectQuery {
    pub fn new() -> Self {
        SelectQuery::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.into()));
        self
    }

    pub fn gte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(column.into(), value.into()));
        self
    }

    pub fn lte(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte(column.into(), value.into()));
        self
    }

    pub fn search(mut self, fields: &[&str], term: impl Into<String>) -> Self {
        self.search = Some(SearchSpec {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            term: term.into(),
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order = Some((column.into(), order));
        self
    }

    /// Page/limit based range: rows `[(page-1)*limit, page*limit - 1]`.
    pub fn page(mut self, page: u64, limit: u64) -> Self {
        let page = page.max(1);
        self.offset = (page - 1) * limit;
        self.limit = Some(limit);
        self
    }

    /// Zero-row query used by table existence probes.
    pub fn probe() -> Self {
        SelectQuery {
            limit: Some(0),
            ..SelectQuery::default()
        }
    }
}

/// One page of rows plus the filtered total (before slicing).
#[derive(Debug, Clone, Default)]
pub struct RowPage {
    pub rows: Vec<Value>,
    pub total: u64,
}

/// Window size used when walking a full result set page by page.
const SELECT_ALL_PAGE: u64 = 100;

/// The only contract this layer has with the hosted backend: select rows with
/// a filter, or mutate one row, and get either data or a classified error.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Cheapest possible reachability check.
    async fn ping(&self) -> Result<(), BackendError>;

    /// Zero-row select used to verify a physical table exists and responds.
    async fn probe_table(&self, table: &str) -> Result<(), BackendError>;

    async fn select(&self, table: &str, query: &SelectQuery) -> Result<RowPage, BackendError>;

    async fn insert(
        &self,
        table: &str,
        row: Map<String, Value>,
    ) -> Result<Value, BackendError>;

    async fn update(
        &self,
        table: &str,
        id: &str,
        business_id: &str,
        patch: Map<String, Value>,
    ) -> Result<Value, BackendError>;

    /// Returns the number of rows removed (0 when the id did not match).
    async fn delete(&self, table: &str, id: &str, business_id: &str)
        -> Result<u64, BackendError>;

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64, BackendError>;

    /// Every row matching the filters, fetched in offset windows until the
    /// reported total is reached. Wide reads (aggregates, integrity checks)
    /// must not be silently truncated by a single-page cap.
    async fn select_all(
        &self,
        table: &str,
        filters: &[Filter],
    ) -> Result<Vec<Value>, BackendError> {
        let mut rows = Vec::new();
        let mut offset = 0u64;
        loop {
            let query = SelectQuery {
                filters: filters.to_vec(),
                offset,
                limit: Some(SELECT_ALL_PAGE),
                ..SelectQuery::default()
            };
            let page = self.select(table, &query).await?;
            let fetched = page.rows.len() as u64;
            rows.extend(page.rows);
            offset += fetched;
            if fetched < SELECT_ALL_PAGE || offset >= page.total {
                break;
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_range_matches_convention() {
        let q = SelectQuery::new().page(1, 10);
        assert_eq!(q.offset, 0);
        assert_eq!(q.limit, Some(10));

        let q = SelectQuery::new().page(3, 25);
        assert_eq!(q.offset, 50);
        assert_eq!(q.limit, Some(25));
    }

    #[test]
    fn page_zero_is_clamped_to_first_page() {
        let q = SelectQuery::new().page(0, 10);
        assert_eq!(q.offset, 0);
    }

    #[tokio::test]
    async fn select_all_walks_past_the_page_window() {
        use serde_json::json;

        struct PagedBackend {
            rows: Vec<Value>,
        }

        #[async_trait]
        impl Backend for PagedBackend {
            async fn ping(&self) -> Result<(), BackendError> {
                Ok(())
            }

            async fn probe_table(&self, _table: &str) -> Result<(), BackendError> {
                Ok(())
            }

            async fn select(
                &self,
                _table: &str,
                query: &SelectQuery,
            ) -> Result<RowPage, BackendError> {
                let start = (query.offset as usize).min(self.rows.len());
                let end = match query.limit {
                    Some(limit) => (start + limit as usize).min(self.rows.len()),
                    None => self.rows.len(),
                };
                Ok(RowPage {
                    rows: self.rows[start..end].to_vec(),
                    total: self.rows.len() as u64,
                })
            }

            async fn insert(
                &self,
                _table: &str,
                _row: Map<String, Value>,
            ) -> Result<Value, BackendError> {
                unreachable!("insert not used here")
            }

            async fn update(
                &self,
                _table: &str,
                _id: &str,
                _business_id: &str,
                _patch: Map<String, Value>,
            ) -> Result<Value, BackendError> {
                unreachable!("update not used here")
            }

            async fn delete(
                &self,
                _table: &str,
                _id: &str,
                _business_id: &str,
            ) -> Result<u64, BackendError> {
                unreachable!("delete not used here")
            }

            async fn count(&self, _table: &str, _filters: &[Filter]) -> Result<u64, BackendError> {
                Ok(self.rows.len() as u64)
            }
        }

        let backend = PagedBackend {
            rows: (0..250).map(|i| json!({ "i": i })).collect(),
        };
        let rows = backend.select_all("t", &[]).await.unwrap();
        assert_eq!(rows.len(), 250);
        assert_eq!(rows[249], json!({ "i": 249 }));

        let empty = PagedBackend { rows: Vec::new() };
        assert!(empty.select_all("t", &[]).await.unwrap().is_empty());
    }

    #[test]
    fn only_policy_and_permission_errors_blacklist() {
        let recursion = BackendError::new(BackendErrorKind::PolicyRecursion, "recursion");
        let denied = BackendError::new(BackendErrorKind::PermissionDenied, "denied");
        let missing = BackendError::new(BackendErrorKind::TableNotFound, "missing");
        let offline = BackendError::new(BackendErrorKind::Connectivity, "offline");
        assert!(recursion.is_blacklistable());
        assert!(denied.is_blacklistable());
        assert!(!missing.is_blacklistable());
        assert!(!offline.is_blacklistable());
    }
}
