mod util;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};

use glowdesk_lib::{
    Backend, BackendErrorKind, ClientMode, ConnectivityProbe, DataClient, DataSource, ListQuery,
    MockStore, StoreHandle, TableResolver,
};

use util::{backend_first, FakeBackend};

fn row(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn offline_list_serves_the_mock_store() {
    let backend = Arc::new(FakeBackend::standard());
    backend.set_offline(true);
    let client = backend_first(backend);

    let res = client.clients_list(&ListQuery::default()).await;
    assert!(res.success);
    assert_eq!(res.source, DataSource::Mock);
    assert_eq!(res.pagination.total, 12);
    assert_eq!(res.data.len(), 12);
}

#[tokio::test]
async fn live_list_is_tagged_live() {
    let backend = Arc::new(FakeBackend::standard());
    let client = backend_first(backend.clone());

    let res = client.clients_list(&ListQuery::default()).await;
    assert!(res.success);
    assert_eq!(res.source, DataSource::Live);
    assert_eq!(res.pagination.total, 12);
    assert_eq!(backend.selects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn create_on_blacklisted_table_lands_in_the_mock_store() {
    let backend = Arc::new(
        FakeBackend::standard().fail_table("clients", BackendErrorKind::PermissionDenied),
    );
    let client = backend_first(backend.clone());

    let created = client
        .clients_create(row(json!({ "name": "Walk-in" })))
        .await;

    assert!(created.success);
    assert_eq!(created.source, DataSource::Mock);
    let stored = created.data.expect("created record");
    assert!(stored.id.starts_with("mock-"), "{}", stored.id);
    assert_eq!(backend.inserts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn schema_mismatch_degrades_to_mock() {
    let backend = Arc::new(
        FakeBackend::standard().fail_table("services", BackendErrorKind::SchemaMismatch),
    );
    let client = backend_first(backend);

    let res = client.services_list(&ListQuery::default()).await;
    assert!(res.success);
    assert_eq!(res.source, DataSource::Mock);
    assert_eq!(res.pagination.total, 5);
}

#[tokio::test]
async fn live_and_mock_pages_agree_and_do_not_overlap() {
    let backend = Arc::new(FakeBackend::standard());
    let live = backend_first(backend);
    let mock = DataClient::mock_only(StoreHandle::in_memory());

    let mut live_ids = Vec::new();
    let mut mock_ids = Vec::new();
    for page in 1..=2u64 {
        let q = ListQuery {
            page: Some(page),
            limit: Some(10),
            ..ListQuery::default()
        };
        let live_page = live.clients_list(&q).await;
        let mock_page = mock.clients_list(&q).await;
        assert_eq!(live_page.source, DataSource::Live);
        assert_eq!(mock_page.source, DataSource::Mock);
        live_ids.extend(live_page.data.into_iter().map(|c| c.id));
        mock_ids.extend(mock_page.data.into_iter().map(|c| c.id));
    }

    assert_eq!(live_ids.len(), 12);
    assert_eq!(live_ids, mock_ids);
    let mut deduped = live_ids.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), live_ids.len());
}

#[tokio::test]
async fn connectivity_failure_is_sticky_for_the_probe_window() {
    let backend = Arc::new(FakeBackend::standard());
    let client = DataClient::with_parts(
        Some(backend.clone() as Arc<dyn Backend>),
        StoreHandle::in_memory(),
        ClientMode::BackendFirst,
        TableResolver::with_reprobe_after(Duration::from_secs(3600)),
        ConnectivityProbe::new(Duration::from_secs(3600)),
        MockStore::with_seed_data(),
    );

    let first = client.clients_list(&ListQuery::default()).await;
    assert_eq!(first.source, DataSource::Live);
    assert_eq!(backend.selects.load(Ordering::SeqCst), 1);

    backend.set_offline(true);
    let second = client.clients_list(&ListQuery::default()).await;
    assert_eq!(second.source, DataSource::Mock);
    assert_eq!(backend.selects.load(Ordering::SeqCst), 2);

    // The failure above recorded an offline verdict; within the window the
    // live path is skipped without another backend call.
    let third = client.clients_list(&ListQuery::default()).await;
    assert_eq!(third.source, DataSource::Mock);
    assert_eq!(backend.selects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn mock_only_mode_never_contacts_the_backend() {
    let backend = Arc::new(FakeBackend::standard());
    let client = DataClient::with_parts(
        Some(backend.clone() as Arc<dyn Backend>),
        StoreHandle::in_memory(),
        ClientMode::MockOnly,
        TableResolver::new(),
        ConnectivityProbe::default(),
        MockStore::with_seed_data(),
    );

    let listed = client.clients_list(&ListQuery::default()).await;
    let created = client
        .clients_create(row(json!({ "name": "Demo" })))
        .await;

    assert_eq!(listed.source, DataSource::Mock);
    assert_eq!(created.source, DataSource::Mock);
    assert!(backend.probes.lock().unwrap().is_empty());
    assert_eq!(backend.selects.load(Ordering::SeqCst), 0);
    assert_eq!(backend.inserts.load(Ordering::SeqCst), 0);
    assert_eq!(backend.pings.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn live_low_stock_count_spans_multiple_pages() {
    let backend = Arc::new(FakeBackend::standard());
    for i in 0..150 {
        let mut row = Map::new();
        row.insert("business_id".into(), json!("biz-0001"));
        row.insert("name".into(), json!(format!("Bulk item {i}")));
        row.insert("category".into(), json!("hair"));
        row.insert("quantity".into(), json!(0));
        row.insert("min_quantity".into(), json!(5));
        backend.insert("products", row).await.unwrap();
    }

    let client = backend_first(backend);
    let res = client.dashboard_stats().await;
    assert_eq!(res.source, DataSource::Live);
    // 2 seeded low-stock products plus the 150 added above; the aggregate
    // must see rows beyond the first result page.
    assert_eq!(res.data.products_low_stock, 152);
}

#[tokio::test]
async fn stats_with_one_failing_leg_are_recomputed_entirely_from_mock() {
    let backend = Arc::new(FakeBackend::standard());
    let client = DataClient::with_parts(
        Some(backend.clone() as Arc<dyn Backend>),
        StoreHandle::in_memory(),
        ClientMode::BackendFirst,
        TableResolver::with_reprobe_after(Duration::from_secs(3600)),
        ConnectivityProbe::new(Duration::ZERO),
        MockStore::with_seed_data(),
    );

    let live = client.dashboard_stats().await;
    assert_eq!(live.source, DataSource::Live);
    assert_eq!(live.data.clients_total, 12);

    // Tables stay bound; only the transactions query starts failing. A single
    // bad leg must not produce a half-live aggregate.
    backend.fail_table_now("transactions", BackendErrorKind::SchemaMismatch);
    let degraded = client.dashboard_stats().await;
    assert!(degraded.success);
    assert_eq!(degraded.source, DataSource::Mock);
    assert_eq!(degraded.data.clients_total, 12);
    assert_eq!(degraded.data.professionals_active, 2);
    assert_eq!(degraded.data.products_low_stock, 2);
}

#[tokio::test]
async fn failed_live_delete_falls_back_and_reports_honestly() {
    let backend = Arc::new(FakeBackend::standard());
    backend.set_offline(true);
    let client = backend_first(backend);

    // The seed row exists in the client's own mock store, so the fallback
    // delete succeeds.
    let deleted = client.clients_delete("cli-0001").await;
    assert!(deleted.success);
    assert_eq!(deleted.source, DataSource::Mock);

    let missing = client.clients_delete("cli-0001").await;
    assert!(!missing.success);
    assert_eq!(missing.error.as_deref(), Some("record not found"));
}
