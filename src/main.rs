use anyhow::Result;
use evn_monitor::config::Config;
use evn_monitor::logging::init_logging;
use evn_monitor::persistence::BillingCycleStore;
use evn_monitor::web::{AppState, serve};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    init_logging(&config.logging)?;

    info!("EVN Monitor {} starting up", env!("APP_VERSION"));

    let mut store = BillingCycleStore::new(config.billing_cycles_path());
    if let Err(e) = store.load() {
        // A corrupt file must not block the dashboard; cycles fall back to calendar
        error!("Failed to load billing cycles: {}", e);
    }
    for (account, cycle) in store.entries() {
        info!(account, "{}", cycle.description());
    }

    let host = config.web.host.clone();
    let port = config.web.port;
    let state = AppState::new(config, store);

    if let Err(e) = serve(state, &host, port).await {
        error!("Web server error: {}", e);
        return Err(e);
    }
    Ok(())
}
