use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGING: OnceCell<()> = OnceCell::new();

/// Installs the tracing subscriber (stdout sink). Safe to call more than
/// once; later calls are no-ops. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    LOGGING.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,glowdesk=debug"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init();
    });
}
