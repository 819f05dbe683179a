use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{json, Map, Value};

use crate::backend::{Filter, RowPage, SelectQuery, SortOrder};
use crate::id::new_mock_id;
use crate::resolver::Entity;
use crate::time::now_ms;

/// In-memory stand-in for the backend. It evaluates the same `SelectQuery`
/// the live path sends over HTTP, so list semantics (tenant filter, search,
/// sort, range) cannot drift between the two.
pub struct MockStore {
    tables: Mutex<HashMap<Entity, Vec<Value>>>,
}

impl Default for MockStore {
    fn default() -> Self {
        MockStore::with_seed_data()
    }
}

impl MockStore {
    pub fn with_seed_data() -> Self {
        let mut tables = HashMap::new();
        for entity in Entity::ALL {
            tables.insert(entity, seed_rows(entity));
        }
        MockStore {
            tables: Mutex::new(tables),
        }
    }

    pub fn empty() -> Self {
        let mut tables = HashMap::new();
        for entity in Entity::ALL {
            tables.insert(entity, Vec::new());
        }
        MockStore {
            tables: Mutex::new(tables),
        }
    }

    pub fn select(&self, entity: Entity, query: &SelectQuery) -> RowPage {
        let guard = match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let rows = guard.get(&entity).map(Vec::as_slice).unwrap_or_default();

        let mut matched: Vec<Value> = rows
            .iter()
            .filter(|row| matches_query(row, query))
            .cloned()
            .collect();

        if let Some((column, order)) = &query.order {
            matched.sort_by(|a, b| {
                let cmp = cmp_values(a.get(column.as_str()), b.get(column.as_str()))
                    .then_with(|| cmp_values(a.get("id"), b.get("id")));
                match order {
                    SortOrder::Asc => cmp,
                    SortOrder::Desc => cmp.reverse(),
                }
            });
        }

        let total = matched.len() as u64;
        let start = (query.offset as usize).min(matched.len());
        let end = match query.limit {
            Some(limit) => (start + limit as usize).min(matched.len()),
            None => matched.len(),
        };
        RowPage {
            rows: matched[start..end].to_vec(),
            total,
        }
    }

    pub fn count(&self, entity: Entity, filters: &[Filter]) -> u64 {
        let query = SelectQuery {
            filters: filters.to_vec(),
            ..SelectQuery::default()
        };
        self.select(entity, &query).total
    }

    /// Appends a record, synthesizing a `mock-` prefixed id and timestamps
    /// when missing. Returns the stored row.
    pub fn insert(&self, entity: Entity, mut row: Map<String, Value>) -> Value {
        let now = now_ms();
        if !row.get("id").map(|v| v.is_string()).unwrap_or(false) {
            row.insert("id".into(), Value::String(new_mock_id()));
        }
        row.entry(String::from("created_at"))
            .or_insert(Value::from(now));
        row.insert("updated_at".into(), Value::from(now));
        let stored = Value::Object(row);
        let mut guard = match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.entry(entity).or_default().push(stored.clone());
        stored
    }

    /// Merges a patch into the row matching id + tenant. `id`, `business_id`
    /// and `created_at` are immutable.
    pub fn update(
        &self,
        entity: Entity,
        id: &str,
        business_id: &str,
        mut patch: Map<String, Value>,
    ) -> Option<Value> {
        patch.remove("id");
        patch.remove("business_id");
        patch.remove("created_at");
        let mut guard = match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let rows = guard.get_mut(&entity)?;
        let row = rows
            .iter_mut()
            .find(|row| field_is(row, "id", id) && field_is(row, "business_id", business_id))?;
        if let Value::Object(map) = row {
            for (key, value) in patch {
                map.insert(key, value);
            }
            map.insert("updated_at".into(), Value::from(now_ms()));
        }
        Some(row.clone())
    }

    pub fn delete(&self, entity: Entity, id: &str, business_id: &str) -> bool {
        let mut guard = match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(rows) = guard.get_mut(&entity) else {
            return false;
        };
        let before = rows.len();
        rows.retain(|row| !(field_is(row, "id", id) && field_is(row, "business_id", business_id)));
        rows.len() != before
    }
}

fn field_is(row: &Value, field: &str, expected: &str) -> bool {
    row.get(field).and_then(Value::as_str) == Some(expected)
}

fn matches_query(row: &Value, query: &SelectQuery) -> bool {
    for filter in &query.filters {
        let actual = row.get(filter.column());
        let ok = match filter {
            Filter::Eq(_, expected) => actual == Some(expected),
            Filter::Gte(_, bound) => cmp_values(actual, Some(bound)) != Ordering::Less,
            Filter::Lte(_, bound) => cmp_values(actual, Some(bound)) != Ordering::Greater,
        };
        if !ok {
            return false;
        }
    }
    if let Some(search) = &query.search {
        if !search.term.is_empty() {
            let term = search.term.to_lowercase();
            let hit = search.fields.iter().any(|field| {
                row.get(field.as_str())
                    .and_then(Value::as_str)
                    .map(|text| text.to_lowercase().contains(&term))
                    .unwrap_or(false)
            });
            if !hit {
                return false;
            }
        }
    }
    true
}

/// Null sorts first, numbers before strings, everything else last.
fn cmp_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(_) => 3,
        }
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            x.to_lowercase().cmp(&y.to_lowercase())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

// Deterministic seed data. Two businesses so tenant scoping is observable in
// demo mode; timestamps are fixed so sorts are reproducible.
const T0: i64 = 1_735_689_600_000; // 2025-01-01T00:00:00Z
const HOUR: i64 = 3_600_000;
const DAY: i64 = 86_400_000;

fn seed_rows(entity: Entity) -> Vec<Value> {
    match entity {
        Entity::Businesses => vec![
            json!({ "id": "biz-0001", "name": "Studio Glow", "kind": "salon",
                    "created_at": T0, "updated_at": T0 }),
            json!({ "id": "biz-0002", "name": "Aurora Hair Co.", "kind": "salon",
                    "created_at": T0, "updated_at": T0 }),
        ],
        Entity::Clients => {
            let names = [
                ("Ana Ferreira", "ana.ferreira@example.com", "+44 7700 900101"),
                ("Beth Crawford", "beth.crawford@example.com", "+44 7700 900102"),
                ("Carla Mendes", "carla.mendes@example.com", "+44 7700 900103"),
                ("Daniela Rocha", "daniela.rocha@example.com", "+44 7700 900104"),
                ("Eve Thornton", "eve.thornton@example.com", "+44 7700 900105"),
                ("Fiona Gallagher", "fiona.g@example.com", "+44 7700 900106"),
                ("Grace Odum", "grace.odum@example.com", "+44 7700 900107"),
                ("Helena Silva", "helena.silva@example.com", "+44 7700 900108"),
                ("Imogen Hart", "imogen.hart@example.com", "+44 7700 900109"),
                ("Julia Brennan", "julia.brennan@example.com", "+44 7700 900110"),
                ("Karen Doyle", "karen.doyle@example.com", "+44 7700 900111"),
                ("Laura Pinto", "laura.pinto@example.com", "+44 7700 900112"),
            ];
            let mut rows: Vec<Value> = names
                .iter()
                .enumerate()
                .map(|(i, (name, email, phone))| {
                    json!({
                        "id": format!("cli-{:04}", i + 1),
                        "business_id": "biz-0001",
                        "name": name,
                        "email": email,
                        "phone": phone,
                        "status": if i == 11 { "inactive" } else { "active" },
                        "notes": Value::Null,
                        "created_at": T0 + (i as i64) * DAY,
                        "updated_at": T0 + (i as i64) * DAY,
                    })
                })
                .collect();
            rows.push(json!({
                "id": "cli-2001", "business_id": "biz-0002", "name": "Nadia Kovacs",
                "email": "nadia.kovacs@example.com", "phone": "+44 7700 900201",
                "status": "active", "notes": Value::Null,
                "created_at": T0, "updated_at": T0,
            }));
            rows.push(json!({
                "id": "cli-2002", "business_id": "biz-0002", "name": "Olive Marsh",
                "email": "olive.marsh@example.com", "phone": "+44 7700 900202",
                "status": "active", "notes": Value::Null,
                "created_at": T0 + DAY, "updated_at": T0 + DAY,
            }));
            rows
        }
        Entity::Services => vec![
            json!({ "id": "srv-0001", "business_id": "biz-0001", "name": "Women's Cut",
                    "description": "Wash, cut and blow-dry", "price_cents": 5500,
                    "duration_min": 60, "status": "active", "created_at": T0, "updated_at": T0 }),
            json!({ "id": "srv-0002", "business_id": "biz-0001", "name": "Full Colour",
                    "description": "Single-process colour", "price_cents": 9500,
                    "duration_min": 120, "status": "active", "created_at": T0 + DAY, "updated_at": T0 + DAY }),
            json!({ "id": "srv-0003", "business_id": "biz-0001", "name": "Manicure",
                    "description": Value::Null, "price_cents": 3000,
                    "duration_min": 45, "status": "active", "created_at": T0 + 2 * DAY, "updated_at": T0 + 2 * DAY }),
            json!({ "id": "srv-0004", "business_id": "biz-0001", "name": "Pedicure",
                    "description": Value::Null, "price_cents": 3500,
                    "duration_min": 50, "status": "active", "created_at": T0 + 3 * DAY, "updated_at": T0 + 3 * DAY }),
            json!({ "id": "srv-0005", "business_id": "biz-0001", "name": "Facial",
                    "description": "Deep-cleanse facial", "price_cents": 6500,
                    "duration_min": 75, "status": "inactive", "created_at": T0 + 4 * DAY, "updated_at": T0 + 4 * DAY }),
            json!({ "id": "srv-2001", "business_id": "biz-0002", "name": "Balayage",
                    "description": Value::Null, "price_cents": 14000,
                    "duration_min": 180, "status": "active", "created_at": T0, "updated_at": T0 }),
        ],
        Entity::Professionals => vec![
            json!({ "id": "pro-0001", "business_id": "biz-0001", "name": "Marta Leao",
                    "email": "marta@studioglow.example", "phone": Value::Null,
                    "specialty": "hair", "status": "active", "created_at": T0, "updated_at": T0 }),
            json!({ "id": "pro-0002", "business_id": "biz-0001", "name": "Sofia Quinn",
                    "email": "sofia@studioglow.example", "phone": Value::Null,
                    "specialty": "nails", "status": "active", "created_at": T0 + DAY, "updated_at": T0 + DAY }),
            json!({ "id": "pro-0003", "business_id": "biz-0001", "name": "Tessa Boyd",
                    "email": "tessa@studioglow.example", "phone": Value::Null,
                    "specialty": "aesthetics", "status": "inactive", "created_at": T0 + 2 * DAY, "updated_at": T0 + 2 * DAY }),
            json!({ "id": "pro-2001", "business_id": "biz-0002", "name": "Vera Lindqvist",
                    "email": "vera@aurorahair.example", "phone": Value::Null,
                    "specialty": "hair", "status": "active", "created_at": T0, "updated_at": T0 }),
        ],
        Entity::Appointments => vec![
            json!({ "id": "apt-0001", "business_id": "biz-0001", "client_id": "cli-0001",
                    "professional_id": "pro-0001", "service_id": "srv-0001",
                    "scheduled_at": T0 + 30 * DAY + 9 * HOUR, "duration_min": 60,
                    "status": "scheduled", "notes": Value::Null,
                    "created_at": T0 + 20 * DAY, "updated_at": T0 + 20 * DAY }),
            json!({ "id": "apt-0002", "business_id": "biz-0001", "client_id": "cli-0002",
                    "professional_id": "pro-0001", "service_id": "srv-0002",
                    "scheduled_at": T0 + 30 * DAY + 11 * HOUR, "duration_min": 120,
                    "status": "scheduled", "notes": "colour consult first",
                    "created_at": T0 + 21 * DAY, "updated_at": T0 + 21 * DAY }),
            json!({ "id": "apt-0003", "business_id": "biz-0001", "client_id": "cli-0003",
                    "professional_id": "pro-0002", "service_id": "srv-0003",
                    "scheduled_at": T0 + 31 * DAY + 10 * HOUR, "duration_min": 45,
                    "status": "scheduled", "notes": Value::Null,
                    "created_at": T0 + 22 * DAY, "updated_at": T0 + 22 * DAY }),
            json!({ "id": "apt-0004", "business_id": "biz-0001", "client_id": "cli-0004",
                    "professional_id": "pro-0002", "service_id": "srv-0004",
                    "scheduled_at": T0 + 10 * DAY + 14 * HOUR, "duration_min": 50,
                    "status": "completed", "notes": Value::Null,
                    "created_at": T0 + 5 * DAY, "updated_at": T0 + 10 * DAY }),
            json!({ "id": "apt-0005", "business_id": "biz-0001", "client_id": "cli-0005",
                    "professional_id": "pro-0001", "service_id": "srv-0001",
                    "scheduled_at": T0 + 12 * DAY + 16 * HOUR, "duration_min": 60,
                    "status": "cancelled", "notes": "client rescheduled",
                    "created_at": T0 + 8 * DAY, "updated_at": T0 + 11 * DAY }),
            json!({ "id": "apt-2001", "business_id": "biz-0002", "client_id": "cli-2001",
                    "professional_id": "pro-2001", "service_id": "srv-2001",
                    "scheduled_at": T0 + 30 * DAY + 13 * HOUR, "duration_min": 180,
                    "status": "scheduled", "notes": Value::Null,
                    "created_at": T0 + 25 * DAY, "updated_at": T0 + 25 * DAY }),
        ],
        Entity::Products => vec![
            json!({ "id": "prd-0001", "business_id": "biz-0001", "name": "Argan Shampoo 250ml",
                    "category": "hair", "quantity": 24, "min_quantity": 6, "price_cents": 1800,
                    "created_at": T0, "updated_at": T0 }),
            json!({ "id": "prd-0002", "business_id": "biz-0001", "name": "Keratin Mask 500ml",
                    "category": "hair", "quantity": 4, "min_quantity": 5, "price_cents": 3200,
                    "created_at": T0 + DAY, "updated_at": T0 + DAY }),
            json!({ "id": "prd-0003", "business_id": "biz-0001", "name": "Gel Polish - Coral",
                    "category": "nails", "quantity": 12, "min_quantity": 3, "price_cents": 900,
                    "created_at": T0 + 2 * DAY, "updated_at": T0 + 2 * DAY }),
            json!({ "id": "prd-0004", "business_id": "biz-0001", "name": "Cuticle Oil 15ml",
                    "category": "nails", "quantity": 2, "min_quantity": 4, "price_cents": 700,
                    "created_at": T0 + 3 * DAY, "updated_at": T0 + 3 * DAY }),
            json!({ "id": "prd-0005", "business_id": "biz-0001", "name": "Vitamin C Serum",
                    "category": "skin", "quantity": 9, "min_quantity": 2, "price_cents": 4500,
                    "created_at": T0 + 4 * DAY, "updated_at": T0 + 4 * DAY }),
            json!({ "id": "prd-2001", "business_id": "biz-0002", "name": "Toning Shampoo 1L",
                    "category": "hair", "quantity": 7, "min_quantity": 2, "price_cents": 2600,
                    "created_at": T0, "updated_at": T0 }),
        ],
        Entity::Transactions => vec![
            json!({ "id": "txn-0001", "business_id": "biz-0001", "kind": "income",
                    "amount_cents": 5500, "description": "Women's Cut - Ana Ferreira",
                    "payment_method": "card", "occurred_at": T0 + 10 * DAY,
                    "created_at": T0 + 10 * DAY, "updated_at": T0 + 10 * DAY }),
            json!({ "id": "txn-0002", "business_id": "biz-0001", "kind": "income",
                    "amount_cents": 9500, "description": "Full Colour - Beth Crawford",
                    "payment_method": "cash", "occurred_at": T0 + 11 * DAY,
                    "created_at": T0 + 11 * DAY, "updated_at": T0 + 11 * DAY }),
            json!({ "id": "txn-0003", "business_id": "biz-0001", "kind": "expense",
                    "amount_cents": 12400, "description": "Stock order - hair care",
                    "payment_method": "transfer", "occurred_at": T0 + 12 * DAY,
                    "created_at": T0 + 12 * DAY, "updated_at": T0 + 12 * DAY }),
            json!({ "id": "txn-0004", "business_id": "biz-0001", "kind": "income",
                    "amount_cents": 3000, "description": "Manicure - Carla Mendes",
                    "payment_method": "card", "occurred_at": T0 + 13 * DAY,
                    "created_at": T0 + 13 * DAY, "updated_at": T0 + 13 * DAY }),
            json!({ "id": "txn-0005", "business_id": "biz-0001", "kind": "expense",
                    "amount_cents": 6000, "description": "Towel laundry service",
                    "payment_method": "transfer", "occurred_at": T0 + 14 * DAY,
                    "created_at": T0 + 14 * DAY, "updated_at": T0 + 14 * DAY }),
            json!({ "id": "txn-0006", "business_id": "biz-0001", "kind": "income",
                    "amount_cents": 3500, "description": "Pedicure - Daniela Rocha",
                    "payment_method": "cash", "occurred_at": T0 + 15 * DAY,
                    "created_at": T0 + 15 * DAY, "updated_at": T0 + 15 * DAY }),
            json!({ "id": "txn-2001", "business_id": "biz-0002", "kind": "income",
                    "amount_cents": 14000, "description": "Balayage - Nadia Kovacs",
                    "payment_method": "card", "occurred_at": T0 + 16 * DAY,
                    "created_at": T0 + 16 * DAY, "updated_at": T0 + 16 * DAY }),
            json!({ "id": "txn-2002", "business_id": "biz-0002", "kind": "expense",
                    "amount_cents": 4100, "description": "Colour stock",
                    "payment_method": "card", "occurred_at": T0 + 17 * DAY,
                    "created_at": T0 + 17 * DAY, "updated_at": T0 + 17 * DAY }),
        ],
    }
}
