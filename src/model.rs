use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::backend::SortOrder;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_INACTIVE: &str = "inactive";

pub const APPOINTMENT_SCHEDULED: &str = "scheduled";
pub const APPOINTMENT_COMPLETED: &str = "completed";
pub const APPOINTMENT_CANCELLED: &str = "cancelled";

pub const TRANSACTION_INCOME: &str = "income";
pub const TRANSACTION_EXPENSE: &str = "expense";

/// Where the rows in a response came from. Surfaced explicitly so callers and
/// tests never have to infer provenance from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum DataSource {
    Live,
    Mock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Pagination {
    #[ts(type = "number")]
    pub page: u64,
    #[ts(type = "number")]
    pub limit: u64,
    #[ts(type = "number")]
    pub total: u64,
    #[ts(type = "number")]
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let limit = limit.max(1);
        Pagination {
            page: page.max(1),
            limit,
            total,
            total_pages: total.div_ceil(limit),
        }
    }
}

/// Envelope for list operations: always `success: true`, whichever path
/// produced the rows.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ListResponse<T: TS> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
    pub source: DataSource,
}

impl<T: TS> ListResponse<T> {
    pub fn new(data: Vec<T>, pagination: Pagination, source: DataSource) -> Self {
        ListResponse {
            success: true,
            data,
            pagination,
            source,
        }
    }
}

/// Envelope for create/update/delete/get.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MutationResponse<T: TS> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub error: Option<String>,
    pub source: DataSource,
}

impl<T: TS> MutationResponse<T> {
    pub fn ok(data: T, source: DataSource) -> Self {
        MutationResponse {
            success: true,
            data: Some(data),
            error: None,
            source,
        }
    }

    pub fn ok_empty(source: DataSource) -> Self {
        MutationResponse {
            success: true,
            data: None,
            error: None,
            source,
        }
    }

    pub fn fail(error: impl Into<String>, source: DataSource) -> Self {
        MutationResponse {
            success: false,
            data: None,
            error: Some(error.into()),
            source,
        }
    }
}

/// List parameters shared by every entity. Entity-specific filters are plain
/// optional fields; the client applies the ones that make sense per entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ListQuery {
    #[serde(default)]
    #[ts(optional, type = "number")]
    pub page: Option<u64>,
    #[serde(default)]
    #[ts(optional, type = "number")]
    pub limit: Option<u64>,
    #[serde(default)]
    #[ts(optional)]
    pub sort: Option<String>,
    #[serde(default)]
    #[ts(optional)]
    pub order: Option<SortOrder>,
    #[serde(default)]
    #[ts(optional)]
    pub search: Option<String>,
    #[serde(default)]
    #[ts(optional)]
    pub status: Option<String>,
    /// Appointments: restrict to the UTC day starting at this epoch-millis.
    #[serde(default)]
    #[ts(optional, type = "number")]
    pub date: Option<i64>,
    #[serde(default)]
    #[ts(optional)]
    pub client_id: Option<String>,
    #[serde(default)]
    #[ts(optional)]
    pub professional_id: Option<String>,
    /// Products only.
    #[serde(default)]
    #[ts(optional)]
    pub category: Option<String>,
    /// Transactions: income/expense plus an inclusive occurred_at window.
    #[serde(default)]
    #[ts(optional)]
    pub kind: Option<String>,
    #[serde(default)]
    #[ts(optional, type = "number")]
    pub date_from: Option<i64>,
    #[serde(default)]
    #[ts(optional, type = "number")]
    pub date_to: Option<i64>,
}

impl ListQuery {
    pub const DEFAULT_LIMIT: u64 = 20;
    pub const MAX_LIMIT: u64 = 100;

    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn order(&self) -> SortOrder {
        self.order.unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Business {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    #[ts(type = "number")]
    pub created_at: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Client {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub business_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    #[ts(type = "number")]
    pub created_at: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Appointment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub business_id: String,
    pub client_id: String,
    pub professional_id: String,
    pub service_id: String,
    #[ts(type = "number")]
    pub scheduled_at: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub duration_min: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    #[ts(type = "number")]
    pub created_at: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Service {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub business_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    #[ts(type = "number")]
    pub price_cents: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub duration_min: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    #[ts(type = "number")]
    pub created_at: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Professional {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub business_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    #[ts(type = "number")]
    pub created_at: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Product {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub business_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    #[ts(type = "number")]
    pub quantity: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub min_quantity: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub price_cents: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub created_at: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Transaction {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub business_id: String,
    /// `income` or `expense`.
    pub kind: String,
    #[ts(type = "number")]
    pub amount_cents: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[ts(type = "number")]
    pub occurred_at: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub created_at: i64,
    #[serde(default)]
    #[ts(type = "number")]
    pub updated_at: i64,
}
