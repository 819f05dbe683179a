use anyhow::Context;
use clap::Parser;

use glowdesk_lib::{init_logging, BackendConfig, DataClient, RestBackend, StoreHandle};
use std::sync::Arc;

/// Prints the data-layer status report (connectivity, table bindings, row
/// counts) as JSON. With --mock the backend is never contacted.
#[derive(Parser)]
#[command(name = "status", about = "GlowDesk data layer status")]
struct Args {
    /// Run against the in-memory demo data instead of the backend.
    #[arg(long)]
    mock: bool,

    /// Also run the referential integrity check.
    #[arg(long)]
    integrity: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let store = StoreHandle::default_file()?;
    let client = if args.mock {
        DataClient::mock_only(store)
    } else {
        let config = BackendConfig::from_env()
            .context("backend configuration (set GLOWDESK_API_URL / GLOWDESK_API_KEY, or pass --mock)")?;
        let backend = RestBackend::new(config)?;
        DataClient::new(Arc::new(backend), store)
    };

    let status = client.database_status().await;
    println!("{}", serde_json::to_string_pretty(&status)?);

    if args.integrity {
        let report = client.validate_integrity().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
