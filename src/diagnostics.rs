use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::backend::{Filter, SelectQuery};
use crate::client::{ClientMode, DataClient};
use crate::model::DataSource;
use crate::resolver::{BindingState, Entity};

/// Point-in-time view of the data layer, for the status bin and support
/// bundles.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    pub mode: String,
    pub online: bool,
    pub active_business_id: String,
    pub tables: Vec<TableStatus>,
    pub generated_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStatus {
    pub logical: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub appointments_checked: usize,
    pub violations: Vec<IntegrityViolation>,
    pub source: DataSource,
    pub generated_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityViolation {
    pub appointment_id: String,
    pub field: String,
    pub missing_id: String,
}

fn state_label(state: &BindingState) -> (String, Option<String>) {
    match state {
        BindingState::Unknown => ("unknown".into(), None),
        BindingState::Bound(table) => ("bound".into(), Some(table.clone())),
        BindingState::NotFound { .. } => ("not_found".into(), None),
        BindingState::Blacklisted { kind } => {
            (format!("blacklisted ({kind:?})").to_lowercase(), None)
        }
    }
}

impl DataClient {
    /// Connectivity verdict plus per-table binding state and row counts.
    /// Read-only: it resolves tables but mutates nothing.
    pub async fn database_status(&self) -> DatabaseStatus {
        let business_id = self.active_business_id();
        let mode = match self.mode() {
            ClientMode::BackendFirst => "backend_first",
            ClientMode::MockOnly => "mock_only",
        };

        let online = match (self.mode(), self.backend.as_deref()) {
            (ClientMode::BackendFirst, Some(backend)) => self.probe.check(backend).await,
            _ => false,
        };

        let mut tables = Vec::with_capacity(Entity::ALL.len());
        for entity in Entity::ALL {
            if online {
                if let Some(backend) = self.backend.as_deref() {
                    let _ = self.resolver.resolve(backend, entity).await;
                }
            }
            let state = self.resolver.state(entity);
            let (label, physical) = state_label(&state);
            let rows = match (&physical, self.backend.as_deref()) {
                (Some(table), Some(backend)) if online => {
                    let filters = tenant_filters(entity, &business_id);
                    backend.count(table, &filters).await.ok()
                }
                _ => None,
            };
            tables.push(TableStatus {
                logical: entity.logical_name().to_string(),
                state: label,
                physical,
                rows,
            });
        }

        DatabaseStatus {
            mode: mode.to_string(),
            online,
            active_business_id: business_id,
            tables,
            generated_at: Utc::now().to_rfc3339(),
        }
    }

    /// Referential spot-check: every appointment must point at a client,
    /// service and professional that exist within the same business.
    pub async fn validate_integrity(&self) -> IntegrityReport {
        let business_id = self.active_business_id();

        let (appointments, source) = self.fetch_all(Entity::Appointments, &business_id).await;
        let (clients, clients_src) = self.fetch_all(Entity::Clients, &business_id).await;
        let (services, services_src) = self.fetch_all(Entity::Services, &business_id).await;
        let (professionals, pros_src) = self.fetch_all(Entity::Professionals, &business_id).await;

        // A mixed read would make every reference look broken; degrade the
        // whole report to mock if any leg did.
        let source = if [source, clients_src, services_src, pros_src]
            .iter()
            .any(|s| *s == DataSource::Mock)
        {
            DataSource::Mock
        } else {
            DataSource::Live
        };
        let (appointments, clients, services, professionals) = if source == DataSource::Mock {
            (
                self.mock_rows(Entity::Appointments, &business_id),
                self.mock_rows(Entity::Clients, &business_id),
                self.mock_rows(Entity::Services, &business_id),
                self.mock_rows(Entity::Professionals, &business_id),
            )
        } else {
            (appointments, clients, services, professionals)
        };

        let client_ids = id_set(&clients);
        let service_ids = id_set(&services);
        let professional_ids = id_set(&professionals);

        let mut violations = Vec::new();
        for appointment in &appointments {
            let appointment_id = str_field(appointment, "id").unwrap_or_default();
            for (field, ids) in [
                ("client_id", &client_ids),
                ("service_id", &service_ids),
                ("professional_id", &professional_ids),
            ] {
                if let Some(reference) = str_field(appointment, field) {
                    if !ids.contains(&reference) {
                        violations.push(IntegrityViolation {
                            appointment_id: appointment_id.clone(),
                            field: field.to_string(),
                            missing_id: reference,
                        });
                    }
                }
            }
        }

        IntegrityReport {
            appointments_checked: appointments.len(),
            violations,
            source,
            generated_at: Utc::now().to_rfc3339(),
        }
    }

    async fn fetch_all(&self, entity: Entity, business_id: &str) -> (Vec<Value>, DataSource) {
        if self.mode() == ClientMode::BackendFirst {
            if let Some(backend) = self.backend.as_deref() {
                if self.probe.last_verdict() != Some(false) {
                    if let Some(table) = self.resolver.resolve(backend, entity).await {
                        let filters = tenant_filters(entity, business_id);
                        if let Ok(rows) = backend.select_all(&table, &filters).await {
                            return (rows, DataSource::Live);
                        }
                    }
                }
            }
        }
        (self.mock_rows(entity, business_id), DataSource::Mock)
    }

    fn mock_rows(&self, entity: Entity, business_id: &str) -> Vec<Value> {
        self.mock
            .select(entity, &all_rows_query(entity, business_id))
            .rows
    }
}

fn tenant_filters(entity: Entity, business_id: &str) -> Vec<Filter> {
    if entity == Entity::Businesses {
        Vec::new()
    } else {
        vec![Filter::Eq("business_id".into(), business_id.into())]
    }
}

fn all_rows_query(entity: Entity, business_id: &str) -> SelectQuery {
    SelectQuery {
        filters: tenant_filters(entity, business_id),
        ..SelectQuery::default()
    }
}

fn str_field(row: &Value, field: &str) -> Option<String> {
    row.get(field).and_then(Value::as_str).map(str::to_owned)
}

fn id_set(rows: &[Value]) -> std::collections::HashSet<String> {
    rows.iter().filter_map(|row| str_field(row, "id")).collect()
}
