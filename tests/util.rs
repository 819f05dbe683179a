#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use glowdesk_lib::{
    Backend, BackendError, BackendErrorKind, ClientMode, ConnectivityProbe, DataClient, Entity,
    Filter, MockStore, RowPage, SelectQuery, StoreHandle, TableResolver,
};

/// Scripted backend for tests: physical tables are backed by a `MockStore`,
/// and individual tables (or the whole endpoint) can be made to fail with a
/// chosen error kind. Counts every call so tests can assert what was and was
/// not attempted.
pub struct FakeBackend {
    tables: HashMap<String, Entity>,
    data: MockStore,
    fail: Mutex<HashMap<String, BackendErrorKind>>,
    offline: AtomicBool,
    pub probes: Mutex<Vec<String>>,
    pub selects: AtomicUsize,
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
    pub pings: AtomicUsize,
}

impl FakeBackend {
    /// Every canonical table present and seeded.
    pub fn standard() -> Self {
        let mut tables = HashMap::new();
        for entity in Entity::ALL {
            tables.insert(entity.logical_name().to_string(), entity);
        }
        FakeBackend {
            tables,
            data: MockStore::with_seed_data(),
            fail: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            probes: Mutex::new(Vec::new()),
            selects: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            pings: AtomicUsize::new(0),
        }
    }

    /// No tables at all; every probe misses.
    pub fn bare() -> Self {
        let mut backend = Self::standard();
        backend.tables.clear();
        backend
    }

    /// Renames a physical table, e.g. canonical "clients" absent but the
    /// "customers" variant present.
    pub fn rename_table(mut self, canonical: &str, variant: &str) -> Self {
        if let Some(entity) = self.tables.remove(canonical) {
            self.tables.insert(variant.to_string(), entity);
        }
        self
    }

    pub fn fail_table(self, table: &str, kind: BackendErrorKind) -> Self {
        self.fail_table_now(table, kind);
        self
    }

    /// Injects a failure after construction, e.g. once a table has already
    /// been bound.
    pub fn fail_table_now(&self, table: &str, kind: BackendErrorKind) {
        self.fail.lock().unwrap().insert(table.to_string(), kind);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn probe_count(&self, table: &str) -> usize {
        self.probes
            .lock()
            .unwrap()
            .iter()
            .filter(|probed| probed.as_str() == table)
            .count()
    }

    fn check(&self, table: &str) -> Result<Entity, BackendError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::new(
                BackendErrorKind::Connectivity,
                "endpoint unreachable",
            ));
        }
        if let Some(kind) = self.fail.lock().unwrap().get(table) {
            return Err(BackendError::new(*kind, "scripted failure").with_table(table));
        }
        self.tables.get(table).copied().ok_or_else(|| {
            BackendError::new(BackendErrorKind::TableNotFound, "relation does not exist")
                .with_table(table)
        })
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn ping(&self) -> Result<(), BackendError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            Err(BackendError::new(
                BackendErrorKind::Connectivity,
                "endpoint unreachable",
            ))
        } else {
            Ok(())
        }
    }

    async fn probe_table(&self, table: &str) -> Result<(), BackendError> {
        self.probes.lock().unwrap().push(table.to_string());
        self.check(table).map(|_| ())
    }

    async fn select(&self, table: &str, query: &SelectQuery) -> Result<RowPage, BackendError> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        let entity = self.check(table)?;
        Ok(self.data.select(entity, query))
    }

    async fn insert(&self, table: &str, row: Map<String, Value>) -> Result<Value, BackendError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let entity = self.check(table)?;
        Ok(self.data.insert(entity, row))
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        business_id: &str,
        patch: Map<String, Value>,
    ) -> Result<Value, BackendError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let entity = self.check(table)?;
        self.data
            .update(entity, id, business_id, patch)
            .ok_or_else(|| {
                BackendError::new(BackendErrorKind::Unknown, "no row matched the update")
                    .with_table(table)
            })
    }

    async fn delete(
        &self,
        table: &str,
        id: &str,
        business_id: &str,
    ) -> Result<u64, BackendError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let entity = self.check(table)?;
        Ok(u64::from(self.data.delete(entity, id, business_id)))
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64, BackendError> {
        let entity = self.check(table)?;
        Ok(self.data.count(entity, filters))
    }
}

/// Backend-first client wired so every operation re-attempts the live path
/// (no sticky connectivity verdict, no negative-cache delay).
pub fn backend_first(backend: Arc<FakeBackend>) -> DataClient {
    DataClient::with_parts(
        Some(backend as Arc<dyn Backend>),
        StoreHandle::in_memory(),
        ClientMode::BackendFirst,
        TableResolver::with_reprobe_after(Duration::ZERO),
        ConnectivityProbe::new(Duration::ZERO),
        MockStore::with_seed_data(),
    )
}

/// Same as `backend_first` but with an effectively permanent negative cache,
/// for tests that pin down the memoization behavior.
pub fn backend_first_cached(backend: Arc<FakeBackend>) -> DataClient {
    DataClient::with_parts(
        Some(backend as Arc<dyn Backend>),
        StoreHandle::in_memory(),
        ClientMode::BackendFirst,
        TableResolver::with_reprobe_after(Duration::from_secs(3600)),
        ConnectivityProbe::new(Duration::ZERO),
        MockStore::with_seed_data(),
    )
}
