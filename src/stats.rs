use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use ts_rs::TS;

use crate::backend::{Backend, BackendError, Filter, SelectQuery};
use crate::client::DataClient;
use crate::model::{DataSource, TRANSACTION_INCOME};
use crate::resolver::Entity;
use crate::time::{month_start_ms, today_start_ms};

const DAY_MS: i64 = 86_400_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DashboardStats {
    #[ts(type = "number")]
    pub clients_total: u64,
    #[ts(type = "number")]
    pub appointments_today: u64,
    #[ts(type = "number")]
    pub professionals_active: u64,
    #[ts(type = "number")]
    pub revenue_month_cents: i64,
    #[ts(type = "number")]
    pub products_low_stock: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StatsResponse {
    pub success: bool,
    pub data: DashboardStats,
    pub source: DataSource,
}

fn tenant(business_id: &str) -> Filter {
    Filter::Eq("business_id".into(), business_id.into())
}

fn today_filters(business_id: &str) -> Vec<Filter> {
    let start = today_start_ms();
    vec![
        tenant(business_id),
        Filter::Gte("scheduled_at".into(), start.into()),
        Filter::Lte("scheduled_at".into(), (start + DAY_MS - 1).into()),
    ]
}

fn income_filters(business_id: &str) -> Vec<Filter> {
    vec![
        tenant(business_id),
        Filter::Eq("kind".into(), TRANSACTION_INCOME.into()),
        Filter::Gte("occurred_at".into(), month_start_ms().into()),
    ]
}

fn sum_amounts(rows: &[Value]) -> i64 {
    rows.iter()
        .filter_map(|row| row.get("amount_cents").and_then(Value::as_i64))
        .sum()
}

fn count_low_stock(rows: &[Value]) -> u64 {
    rows.iter()
        .filter(|row| {
            let quantity = row.get("quantity").and_then(Value::as_i64).unwrap_or(0);
            let min = row.get("min_quantity").and_then(Value::as_i64).unwrap_or(0);
            quantity <= min
        })
        .count() as u64
}

fn unbounded(filters: Vec<Filter>) -> SelectQuery {
    SelectQuery {
        filters,
        ..SelectQuery::default()
    }
}

struct LiveTables {
    clients: String,
    appointments: String,
    professionals: String,
    transactions: String,
    products: String,
}

impl DataClient {
    /// Dashboard counters, fanned out concurrently against the backend. If
    /// any leg fails (or any table cannot be resolved) the whole aggregate is
    /// recomputed from the mock store so live and mock numbers never mix.
    pub async fn dashboard_stats(&self) -> StatsResponse {
        let business_id = self.active_business_id();

        if let Some(tables) = self.resolve_stats_tables().await {
            if let Some(backend) = self.backend.as_deref() {
                match live_stats(backend, &tables, &business_id).await {
                    Ok(data) => {
                        self.probe.note(true);
                        return StatsResponse {
                            success: true,
                            data,
                            source: DataSource::Live,
                        };
                    }
                    Err(err) => {
                        if err.kind == crate::backend::BackendErrorKind::Connectivity {
                            self.probe.note(false);
                        }
                        warn!(
                            target: "glowdesk",
                            event = "stats_fallback",
                            kind = ?err.kind,
                            error = %err.message
                        );
                    }
                }
            }
        }

        StatsResponse {
            success: true,
            data: self.mock_stats(&business_id),
            source: DataSource::Mock,
        }
    }

    async fn resolve_stats_tables(&self) -> Option<LiveTables> {
        if self.mode == crate::client::ClientMode::MockOnly {
            return None;
        }
        let backend = self.backend.as_deref()?;
        if self.probe.last_verdict() == Some(false) {
            return None;
        }
        Some(LiveTables {
            clients: self.resolver.resolve(backend, Entity::Clients).await?,
            appointments: self.resolver.resolve(backend, Entity::Appointments).await?,
            professionals: self
                .resolver
                .resolve(backend, Entity::Professionals)
                .await?,
            transactions: self.resolver.resolve(backend, Entity::Transactions).await?,
            products: self.resolver.resolve(backend, Entity::Products).await?,
        })
    }

    fn mock_stats(&self, business_id: &str) -> DashboardStats {
        let income = self
            .mock
            .select(Entity::Transactions, &unbounded(income_filters(business_id)));
        let products = self
            .mock
            .select(Entity::Products, &unbounded(vec![tenant(business_id)]));
        DashboardStats {
            clients_total: self.mock.count(Entity::Clients, &[tenant(business_id)]),
            appointments_today: self
                .mock
                .count(Entity::Appointments, &today_filters(business_id)),
            professionals_active: self.mock.count(
                Entity::Professionals,
                &[
                    tenant(business_id),
                    Filter::Eq("status".into(), "active".into()),
                ],
            ),
            revenue_month_cents: sum_amounts(&income.rows),
            products_low_stock: count_low_stock(&products.rows),
        }
    }
}

async fn live_stats(
    backend: &dyn Backend,
    tables: &LiveTables,
    business_id: &str,
) -> Result<DashboardStats, BackendError> {
    // The filter sets must outlive the whole join, not just their own leg.
    let tenant_only = [tenant(business_id)];
    let today = today_filters(business_id);
    let active = [
        tenant(business_id),
        Filter::Eq("status".into(), "active".into()),
    ];
    let income = income_filters(business_id);

    let (clients, appointments, professionals, income_rows, product_rows) = futures::join!(
        backend.count(&tables.clients, &tenant_only),
        backend.count(&tables.appointments, &today),
        backend.count(&tables.professionals, &active),
        backend.select_all(&tables.transactions, &income),
        backend.select_all(&tables.products, &tenant_only),
    );

    Ok(DashboardStats {
        clients_total: clients?,
        appointments_today: appointments?,
        professionals_active: professionals?,
        revenue_month_cents: sum_amounts(&income_rows?),
        products_low_stock: count_low_stock(&product_rows?),
    })
}
