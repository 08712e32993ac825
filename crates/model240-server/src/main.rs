/*!
 * `model240d`: REST gateway daemon for the Model 240.
 *
 * Configuration comes from `model240.toml` (or the file named by `--config`
 * or `MODEL240_CONFIG`) and `MODEL240__SECTION__KEY` environment variables.
 */
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use model240_core::config::{ConfigBuilder, DEFAULT_CONFIG_FILE, ENV_PREFIX};
use model240_server::{router, AppState};

#[derive(Parser, Debug)]
#[command(name = "model240d", version, about = "REST gateway for the Model 240 monitor")]
struct Args {
    /// Configuration file; a missing file means built-in defaults
    #[arg(short, long, env = "MODEL240_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = ConfigBuilder::new()
        .with_config_file(&args.config)
        .with_environment_prefix(ENV_PREFIX)
        .build()
        .with_context(|| {
            format!("failed to load configuration from {}", args.config.display())
        })?;

    model240_core::init_with_config(&config).context("failed to initialize logging")?;
    info!(
        "{} {} starting (devices {}, backends: {})",
        config.general.app_name,
        model240_server::VERSION,
        model240_devices::VERSION,
        model240_devices::available_backends().join(", ")
    );

    let service = model240_devices::service_from_config(&config.device)
        .context("failed to set up the instrument back end")?;

    if config.device.connect_on_startup {
        if let Err(e) = service.connect().await {
            warn!("Starting without an instrument connection: {}", e);
        }
    }

    let app = router(AppState::new(service.clone()), config.server.cors_permissive);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    service.session().shutdown().await;

    if let Err(e) = &served {
        error!("Server error: {}", e);
    }
    served.context("server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!("Failed to listen for the shutdown signal: {}", e);
            std::future::pending::<()>().await
        }
    }
}
