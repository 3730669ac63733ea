//! Wake-warden binary entry point.

use tracing::info;
use wake_warden::{cli, logging, Config, Server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::parse_args()?;

    if args.help {
        cli::print_help();
        return Ok(());
    }
    if args.version {
        cli::print_version();
        return Ok(());
    }

    let config = Config::load(&args)?;

    // Initialize logging
    logging::init_with_filter(config.log_filter());

    info!("wake-warden v{}", env!("CARGO_PKG_VERSION"));

    let settings = config.to_settings()?;
    info!(
        bind = %settings.bind,
        heartbeat_timeout_secs = settings.policy.heartbeat_timeout.as_secs(),
        grace_window_secs = settings.policy.grace_window.as_secs(),
        dormant_budget_secs = settings.dormant_budget.as_secs(),
        "configuration loaded"
    );
    match &settings.bridge_script {
        Some(script) => info!(script = %script.display(), "bridge script configured"),
        None => info!("no bridge script configured; lifecycle signals are log-only"),
    }

    let server = Server::bind(settings).await?;
    server.run().await?;

    Ok(())
}
