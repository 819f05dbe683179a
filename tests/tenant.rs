mod util;

use std::sync::Arc;

use glowdesk_lib::{
    get_active_business_id, set_active_business_id, DataSource, ListQuery, StoreHandle,
    DEFAULT_BUSINESS_ID,
};

use util::{backend_first, backend_first_cached, FakeBackend};

#[tokio::test]
async fn default_tenant_is_installed_on_first_use() {
    let backend = Arc::new(FakeBackend::standard());
    let client = backend_first(backend);
    assert_eq!(client.active_business_id(), DEFAULT_BUSINESS_ID);
}

#[tokio::test]
async fn switching_tenant_scopes_every_query() {
    let backend = Arc::new(FakeBackend::standard());
    let client = backend_first(backend);

    let before = client.clients_list(&ListQuery::default()).await;
    assert_eq!(before.pagination.total, 12);

    client.set_active_business("biz-0002").expect("valid id");
    assert_eq!(client.active_business_id(), "biz-0002");

    let clients = client.clients_list(&ListQuery::default()).await;
    assert_eq!(clients.source, DataSource::Live);
    assert_eq!(clients.pagination.total, 2);
    assert!(clients.data.iter().all(|c| c.business_id == "biz-0002"));

    let appointments = client.appointments_list(&ListQuery::default()).await;
    assert_eq!(appointments.pagination.total, 1);
}

#[tokio::test]
async fn tenant_switch_drops_cached_bindings() {
    let backend = Arc::new(FakeBackend::standard());
    let client = backend_first_cached(backend.clone());

    client.clients_list(&ListQuery::default()).await;
    assert_eq!(backend.probe_count("clients"), 1);

    client.set_active_business("biz-0002").expect("valid id");
    client.clients_list(&ListQuery::default()).await;
    assert_eq!(backend.probe_count("clients"), 2);
}

#[tokio::test]
async fn created_records_always_belong_to_the_active_tenant() {
    let backend = Arc::new(FakeBackend::standard());
    let client = backend_first(backend);
    client.set_active_business("biz-0002").expect("valid id");

    // A caller-supplied business_id is overridden, never trusted.
    let mut data = serde_json::Map::new();
    data.insert("name".into(), "Spoofed".into());
    data.insert("business_id".into(), "biz-0001".into());
    let created = client.clients_create(data).await;

    let stored = created.data.expect("created record");
    assert_eq!(stored.business_id, "biz-0002");
}

#[test]
fn file_store_persists_the_selection() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.json");

    let store = StoreHandle::file(&path).expect("open store");
    set_active_business_id(&store, "biz-0002").expect("valid id");

    let reopened = StoreHandle::file(&path).expect("reopen store");
    assert_eq!(get_active_business_id(&reopened), "biz-0002");
}

#[test]
fn file_store_installs_default_into_fresh_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.json");

    let store = StoreHandle::file(&path).expect("open store");
    assert_eq!(get_active_business_id(&store), DEFAULT_BUSINESS_ID);

    let reopened = StoreHandle::file(&path).expect("reopen store");
    assert_eq!(reopened.snapshot().as_deref(), Some(DEFAULT_BUSINESS_ID));
}
