use std::sync::Arc;

use paste::paste;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use ts_rs::TS;

use crate::backend::{Backend, BackendError, BackendErrorKind, SelectQuery, SortOrder};
use crate::business_active::{
    get_active_business_id, set_active_business_id, ActiveSetError, StoreHandle,
};
use crate::connectivity::ConnectivityProbe;
use crate::error::AppError;
use crate::id::new_uuid_v7;
use crate::mock::MockStore;
use crate::model::{
    Appointment, Business, Client, DataSource, ListQuery, ListResponse, MutationResponse,
    Pagination, Product, Professional, Service, Transaction,
};
use crate::resolver::{Entity, TableResolver};
use crate::time::now_ms;

const DAY_MS: i64 = 86_400_000;

/// One strategy, configured rather than four competing client classes:
/// backend-first-with-fallback, or mock-only demo mode that never builds a
/// backend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    BackendFirst,
    MockOnly,
}

/// The public entity API. Every operation injects the active business id,
/// resolves the physical table, and degrades to the mock store on any
/// failure. Responses carry an explicit `source` tag.
pub struct DataClient {
    pub(crate) backend: Option<Arc<dyn Backend>>,
    pub(crate) mode: ClientMode,
    pub(crate) resolver: TableResolver,
    pub(crate) probe: ConnectivityProbe,
    pub(crate) mock: MockStore,
    pub(crate) store: StoreHandle,
}

impl DataClient {
    pub fn new(backend: Arc<dyn Backend>, store: StoreHandle) -> Self {
        Self::with_parts(
            Some(backend),
            store,
            ClientMode::BackendFirst,
            TableResolver::new(),
            ConnectivityProbe::default(),
            MockStore::with_seed_data(),
        )
    }

    /// Demo mode: serves the seed data and never touches a backend.
    pub fn mock_only(store: StoreHandle) -> Self {
        Self::with_parts(
            None,
            store,
            ClientMode::MockOnly,
            TableResolver::new(),
            ConnectivityProbe::default(),
            MockStore::with_seed_data(),
        )
    }

    /// Fully explicit construction. Tests use this to shrink the probe TTL
    /// and the resolver's re-probe window.
    pub fn with_parts(
        backend: Option<Arc<dyn Backend>>,
        store: StoreHandle,
        mode: ClientMode,
        resolver: TableResolver,
        probe: ConnectivityProbe,
        mock: MockStore,
    ) -> Self {
        DataClient {
            backend,
            mode,
            resolver,
            probe,
            mock,
            store,
        }
    }

    pub fn mode(&self) -> ClientMode {
        self.mode
    }

    /// The current tenant. Installs the default id on first use.
    pub fn active_business_id(&self) -> String {
        get_active_business_id(&self.store)
    }

    /// Switches the tenant and invalidates tenant-dependent caches.
    pub fn set_active_business(&self, id: &str) -> Result<(), ActiveSetError> {
        set_active_business_id(&self.store, id)?;
        self.resolver.reset();
        self.probe.invalidate();
        Ok(())
    }

    /// Resolves the backend + physical table for a live attempt, or `None`
    /// when the operation should go straight to the mock store.
    async fn live_table(&self, entity: Entity) -> Option<(&dyn Backend, String)> {
        if self.mode == ClientMode::MockOnly {
            return None;
        }
        let backend = self.backend.as_deref()?;
        if self.probe.last_verdict() == Some(false) {
            debug!(
                target: "glowdesk",
                event = "live_skipped_offline",
                entity = entity.logical_name()
            );
            return None;
        }
        let table = self.resolver.resolve(backend, entity).await?;
        Some((backend, table))
    }

    fn note_live_failure(&self, entity: Entity, op: &str, err: &BackendError) {
        if err.kind == BackendErrorKind::Connectivity {
            self.probe.note(false);
        }
        let classified = AppError::from(err.clone());
        warn!(
            target: "glowdesk",
            event = "live_query_failed",
            entity = entity.logical_name(),
            op,
            code = classified.code(),
            error = %err.message
        );
    }

    fn build_query(&self, entity: Entity, q: &ListQuery, business_id: &str) -> SelectQuery {
        let mut sq = SelectQuery::new().eq("business_id", business_id);

        if let Some(status) = &q.status {
            sq = sq.eq("status", status.clone());
        }
        match entity {
            Entity::Appointments => {
                if let Some(day) = q.date {
                    sq = sq
                        .gte("scheduled_at", day)
                        .lte("scheduled_at", day + DAY_MS - 1);
                }
                if let Some(client_id) = &q.client_id {
                    sq = sq.eq("client_id", client_id.clone());
                }
                if let Some(professional_id) = &q.professional_id {
                    sq = sq.eq("professional_id", professional_id.clone());
                }
            }
            Entity::Products => {
                if let Some(category) = &q.category {
                    sq = sq.eq("category", category.clone());
                }
            }
            Entity::Transactions => {
                if let Some(kind) = &q.kind {
                    sq = sq.eq("kind", kind.clone());
                }
                if let Some(from) = q.date_from {
                    sq = sq.gte("occurred_at", from);
                }
                if let Some(to) = q.date_to {
                    sq = sq.lte("occurred_at", to);
                }
            }
            _ => {}
        }

        if let Some(term) = &q.search {
            if !term.trim().is_empty() {
                sq = sq.search(search_fields(entity), term.trim());
            }
        }

        let sort = q
            .sort
            .as_deref()
            .filter(|field| allowed_sort_fields(entity).contains(field))
            .unwrap_or_else(|| default_sort(entity));
        sq = sq.order_by(sort, q.order());

        sq.page(q.page(), q.limit())
    }

    async fn list_entity<T>(&self, entity: Entity, q: &ListQuery) -> ListResponse<T>
    where
        T: DeserializeOwned + TS,
    {
        let business_id = self.active_business_id();
        let query = self.build_query(entity, q, &business_id);

        if let Some((backend, table)) = self.live_table(entity).await {
            match backend.select(&table, &query).await {
                Ok(page) => match rows_to::<T>(page.rows) {
                    Ok(items) => {
                        self.probe.note(true);
                        return ListResponse::new(
                            items,
                            Pagination::new(q.page(), q.limit(), page.total),
                            DataSource::Live,
                        );
                    }
                    Err(err) => {
                        warn!(
                            target: "glowdesk",
                            event = "live_decode_failed",
                            entity = entity.logical_name(),
                            error = %err
                        );
                    }
                },
                Err(err) => self.note_live_failure(entity, "list", &err),
            }
        }

        let page = self.mock.select(entity, &query);
        let items = rows_to::<T>(page.rows).unwrap_or_default();
        ListResponse::new(
            items,
            Pagination::new(q.page(), q.limit(), page.total),
            DataSource::Mock,
        )
    }

    async fn get_entity<T>(&self, entity: Entity, id: &str) -> MutationResponse<T>
    where
        T: DeserializeOwned + TS,
    {
        let business_id = self.active_business_id();
        let query = SelectQuery::new()
            .eq("business_id", business_id.as_str())
            .eq("id", id)
            .page(1, 1);

        if let Some((backend, table)) = self.live_table(entity).await {
            match backend.select(&table, &query).await {
                Ok(page) => {
                    self.probe.note(true);
                    return match page.rows.into_iter().next() {
                        Some(row) => decode_one(row, DataSource::Live),
                        None => MutationResponse::fail("record not found", DataSource::Live),
                    };
                }
                Err(err) => self.note_live_failure(entity, "get", &err),
            }
        }

        match self.mock.select(entity, &query).rows.into_iter().next() {
            Some(row) => decode_one(row, DataSource::Mock),
            None => MutationResponse::fail("record not found", DataSource::Mock),
        }
    }

    async fn create_entity<T>(&self, entity: Entity, mut data: Map<String, Value>) -> MutationResponse<T>
    where
        T: DeserializeOwned + TS,
    {
        let business_id = self.active_business_id();
        // Tenant injection overrides whatever the caller supplied.
        data.insert("business_id".into(), Value::String(business_id));
        let now = now_ms();
        data.entry(String::from("created_at"))
            .or_insert(Value::from(now));
        data.insert("updated_at".into(), Value::from(now));

        if let Some((backend, table)) = self.live_table(entity).await {
            let mut row = data.clone();
            if !row.get("id").map(|v| v.is_string()).unwrap_or(false) {
                row.insert("id".into(), Value::String(new_uuid_v7()));
            }
            match backend.insert(&table, row).await {
                Ok(stored) => {
                    self.probe.note(true);
                    return decode_one(stored, DataSource::Live);
                }
                Err(err) => self.note_live_failure(entity, "create", &err),
            }
        }

        let stored = self.mock.insert(entity, data);
        decode_one(stored, DataSource::Mock)
    }

    async fn update_entity<T>(
        &self,
        entity: Entity,
        id: &str,
        mut patch: Map<String, Value>,
    ) -> MutationResponse<T>
    where
        T: DeserializeOwned + TS,
    {
        let business_id = self.active_business_id();
        patch.remove("id");
        patch.remove("business_id");
        patch.remove("created_at");
        patch.insert("updated_at".into(), Value::from(now_ms()));

        if let Some((backend, table)) = self.live_table(entity).await {
            match backend.update(&table, id, &business_id, patch.clone()).await {
                Ok(stored) => {
                    self.probe.note(true);
                    return decode_one(stored, DataSource::Live);
                }
                Err(err) => self.note_live_failure(entity, "update", &err),
            }
        }

        match self.mock.update(entity, id, &business_id, patch) {
            Some(row) => decode_one(row, DataSource::Mock),
            None => MutationResponse::fail("record not found", DataSource::Mock),
        }
    }

    async fn delete_entity<T>(&self, entity: Entity, id: &str) -> MutationResponse<T>
    where
        T: DeserializeOwned + TS,
    {
        let business_id = self.active_business_id();

        if let Some((backend, table)) = self.live_table(entity).await {
            match backend.delete(&table, id, &business_id).await {
                Ok(removed) => {
                    self.probe.note(true);
                    return if removed > 0 {
                        MutationResponse::ok_empty(DataSource::Live)
                    } else {
                        MutationResponse::fail("record not found", DataSource::Live)
                    };
                }
                Err(err) => self.note_live_failure(entity, "delete", &err),
            }
        }

        if self.mock.delete(entity, id, &business_id) {
            MutationResponse::ok_empty(DataSource::Mock)
        } else {
            MutationResponse::fail("record not found", DataSource::Mock)
        }
    }

    /// Businesses are created out-of-band and read-only here; the list feeds
    /// the tenant picker, so it is not tenant-filtered.
    pub async fn businesses_list(&self) -> ListResponse<Business> {
        let query = SelectQuery::new()
            .order_by("name", SortOrder::Asc)
            .page(1, ListQuery::MAX_LIMIT);

        if let Some((backend, table)) = self.live_table(Entity::Businesses).await {
            match backend.select(&table, &query).await {
                Ok(page) => {
                    if let Ok(items) = rows_to::<Business>(page.rows) {
                        self.probe.note(true);
                        return ListResponse::new(
                            items,
                            Pagination::new(1, ListQuery::MAX_LIMIT, page.total),
                            DataSource::Live,
                        );
                    }
                }
                Err(err) => self.note_live_failure(Entity::Businesses, "list", &err),
            }
        }

        let page = self.mock.select(Entity::Businesses, &query);
        let items = rows_to::<Business>(page.rows).unwrap_or_default();
        ListResponse::new(
            items,
            Pagination::new(1, ListQuery::MAX_LIMIT, page.total),
            DataSource::Mock,
        )
    }
}

macro_rules! gen_entity_api {
    ( $( $table:ident => $ty:ty, $entity:expr );+ $(;)? ) => {
        paste! {
            impl DataClient {
                $(
                    pub async fn [<$table _list>](&self, query: &ListQuery) -> ListResponse<$ty> {
                        self.list_entity($entity, query).await
                    }

                    pub async fn [<$table _get>](&self, id: &str) -> MutationResponse<$ty> {
                        self.get_entity($entity, id).await
                    }

                    pub async fn [<$table _create>](
                        &self,
                        data: Map<String, Value>,
                    ) -> MutationResponse<$ty> {
                        self.create_entity($entity, data).await
                    }

                    pub async fn [<$table _update>](
                        &self,
                        id: &str,
                        patch: Map<String, Value>,
                    ) -> MutationResponse<$ty> {
                        self.update_entity($entity, id, patch).await
                    }

                    pub async fn [<$table _delete>](&self, id: &str) -> MutationResponse<$ty> {
                        self.delete_entity($entity, id).await
                    }
                )+
            }
        }
    };
}

gen_entity_api!(
    clients => Client, Entity::Clients;
    appointments => Appointment, Entity::Appointments;
    services => Service, Entity::Services;
    professionals => Professional, Entity::Professionals;
    products => Product, Entity::Products;
    transactions => Transaction, Entity::Transactions;
);

fn rows_to<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, serde_json::Error> {
    rows.into_iter().map(serde_json::from_value).collect()
}

fn decode_one<T: DeserializeOwned + TS>(row: Value, source: DataSource) -> MutationResponse<T> {
    match serde_json::from_value(row) {
        Ok(record) => MutationResponse::ok(record, source),
        Err(err) => MutationResponse::fail(format!("malformed record: {err}"), source),
    }
}

fn search_fields(entity: Entity) -> &'static [&'static str] {
    match entity {
        Entity::Businesses => &["name"],
        Entity::Clients => &["name", "email", "phone"],
        Entity::Appointments => &["notes"],
        Entity::Services => &["name", "description"],
        Entity::Professionals => &["name", "email", "specialty"],
        Entity::Products => &["name", "category"],
        Entity::Transactions => &["description"],
    }
}

fn default_sort(entity: Entity) -> &'static str {
    match entity {
        Entity::Businesses => "name",
        Entity::Clients => "name",
        Entity::Appointments => "scheduled_at",
        Entity::Services => "name",
        Entity::Professionals => "name",
        Entity::Products => "name",
        Entity::Transactions => "occurred_at",
    }
}

/// Sort columns accepted from callers; anything else falls back to the
/// default instead of producing a query-shape error downstream.
fn allowed_sort_fields(entity: Entity) -> &'static [&'static str] {
    match entity {
        Entity::Businesses => &["name", "created_at"],
        Entity::Clients => &["name", "email", "status", "created_at", "updated_at"],
        Entity::Appointments => &["scheduled_at", "status", "created_at"],
        Entity::Services => &["name", "price_cents", "duration_min", "created_at"],
        Entity::Professionals => &["name", "specialty", "status", "created_at"],
        Entity::Products => &["name", "category", "quantity", "price_cents", "created_at"],
        Entity::Transactions => &["occurred_at", "amount_cents", "kind", "created_at"],
    }
}
