pub mod backend;
pub mod business_active;
pub mod client;
pub mod connectivity;
pub mod diagnostics;
mod error;
mod id;
mod logging;
pub mod mock;
pub mod model;
pub mod resolver;
pub mod stats;
mod time;

pub use backend::rest::{BackendConfig, RestBackend};
pub use backend::{Backend, BackendError, BackendErrorKind, Filter, RowPage, SelectQuery, SortOrder};
pub use business_active::{
    get_active_business_id, set_active_business_id, ActiveSetError, StoreHandle,
    DEFAULT_BUSINESS_ID,
};
pub use client::{ClientMode, DataClient};
pub use connectivity::ConnectivityProbe;
pub use diagnostics::{DatabaseStatus, IntegrityReport};
pub use error::{AppError, AppResult};
pub use logging::init_logging;
pub use mock::MockStore;
pub use model::{
    Appointment, Business, Client, DataSource, ListQuery, ListResponse, MutationResponse,
    Pagination, Product, Professional, Service, Transaction,
};
pub use resolver::{BindingState, Entity, TableResolver};
pub use stats::{DashboardStats, StatsResponse};
