use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::backend::{Backend, BackendErrorKind};

const DEFAULT_REPROBE_AFTER: Duration = Duration::from_secs(60);

/// Logical entity categories as application code knows them, independent of
/// the physical table names the backend ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Entity {
    Businesses,
    Clients,
    Appointments,
    Services,
    Professionals,
    Products,
    Transactions,
}

impl Entity {
    pub const ALL: [Entity; 7] = [
        Entity::Businesses,
        Entity::Clients,
        Entity::Appointments,
        Entity::Services,
        Entity::Professionals,
        Entity::Products,
        Entity::Transactions,
    ];

    pub fn logical_name(self) -> &'static str {
        match self {
            Entity::Businesses => "businesses",
            Entity::Clients => "clients",
            Entity::Appointments => "appointments",
            Entity::Services => "services",
            Entity::Professionals => "professionals",
            Entity::Products => "products",
            Entity::Transactions => "transactions",
        }
    }

    /// Candidate physical names, canonical first, then the casing and
    /// pluralization variants seen in misprovisioned deployments.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            Entity::Businesses => &["businesses", "business", "Businesses"],
            Entity::Clients => &["clients", "client", "Clients", "customers"],
            Entity::Appointments => &["appointments", "appointment", "Appointments", "bookings"],
            Entity::Services => &["services", "service", "Services"],
            Entity::Professionals => &["professionals", "professional", "Professionals", "staff"],
            Entity::Products => &["products", "product", "Products", "stock_items"],
            Entity::Transactions => &["transactions", "transaction", "Transactions", "payments"],
        }
    }
}

/// Per-logical-table resolution state. `Bound` and `Blacklisted` are
/// permanent for the resolver's lifetime; `NotFound` is re-probed once the
/// re-probe window has elapsed.
#[derive(Debug, Clone)]
pub enum BindingState {
    Unknown,
    Bound(String),
    NotFound { checked_at: Instant },
    Blacklisted { kind: BackendErrorKind },
}

/// Maps logical entity names to physical table names by probing candidates,
/// memoizing the outcome. Construct one per client instance; there are no
/// process-wide singletons.
pub struct TableResolver {
    reprobe_after: Duration,
    bindings: Mutex<HashMap<Entity, BindingState>>,
}

impl Default for TableResolver {
    fn default() -> Self {
        TableResolver::new()
    }
}

impl TableResolver {
    pub fn new() -> Self {
        Self::with_reprobe_after(DEFAULT_REPROBE_AFTER)
    }

    pub fn with_reprobe_after(reprobe_after: Duration) -> Self {
        TableResolver {
            reprobe_after,
            bindings: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self, entity: Entity) -> BindingState {
        self.bindings
            .lock()
            .ok()
            .and_then(|guard| guard.get(&entity).cloned())
            .unwrap_or(BindingState::Unknown)
    }

    fn set_state(&self, entity: Entity, state: BindingState) {
        if let Ok(mut guard) = self.bindings.lock() {
            guard.insert(entity, state);
        }
    }

    /// Drops every binding. Called when the active tenant changes.
    pub fn reset(&self) {
        if let Ok(mut guard) = self.bindings.lock() {
            guard.clear();
        }
    }

    /// Resolves the physical table for `entity`, probing candidates on the
    /// first call and serving the memoized binding afterwards. Returns `None`
    /// when no candidate responds, the table is blacklisted, or the backend
    /// is unreachable.
    pub async fn resolve(&self, backend: &dyn Backend, entity: Entity) -> Option<String> {
        match self.state(entity) {
            BindingState::Bound(table) => return Some(table),
            BindingState::Blacklisted { .. } => return None,
            BindingState::NotFound { checked_at } => {
                if checked_at.elapsed() < self.reprobe_after {
                    return None;
                }
                debug!(
                    target: "glowdesk",
                    event = "table_reprobe",
                    logical = entity.logical_name()
                );
            }
            BindingState::Unknown => {}
        }

        for candidate in entity.candidates() {
            match backend.probe_table(candidate).await {
                Ok(()) => {
                    info!(
                        target: "glowdesk",
                        event = "table_bound",
                        logical = entity.logical_name(),
                        physical = candidate
                    );
                    self.set_state(entity, BindingState::Bound(candidate.to_string()));
                    return Some(candidate.to_string());
                }
                Err(err) if err.is_blacklistable() => {
                    warn!(
                        target: "glowdesk",
                        event = "table_blacklisted",
                        logical = entity.logical_name(),
                        physical = candidate,
                        kind = ?err.kind,
                        error = %err.message
                    );
                    self.set_state(entity, BindingState::Blacklisted { kind: err.kind });
                    return None;
                }
                Err(err) if err.kind == BackendErrorKind::Connectivity => {
                    // Not a verdict about the table; leave the binding state
                    // alone and stop probing further candidates.
                    debug!(
                        target: "glowdesk",
                        event = "table_probe_offline",
                        logical = entity.logical_name(),
                        error = %err.message
                    );
                    return None;
                }
                Err(err) => {
                    debug!(
                        target: "glowdesk",
                        event = "table_probe_miss",
                        logical = entity.logical_name(),
                        physical = candidate,
                        kind = ?err.kind
                    );
                }
            }
        }

        info!(
            target: "glowdesk",
            event = "table_unresolved",
            logical = entity.logical_name()
        );
        self.set_state(
            entity,
            BindingState::NotFound {
                checked_at: Instant::now(),
            },
        );
        None
    }
}
