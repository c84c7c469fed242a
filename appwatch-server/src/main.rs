//! appwatch server — entry point.
//!
//! ```text
//! appwatch-server                  Run in the foreground
//! appwatch-server --config <path>  Load a custom config TOML
//! appwatch-server --port <n>       Override the listening port
//! appwatch-server --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use appwatch_server::config::ServerConfig;
use appwatch_server::service::AppWatchService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "appwatch-server", about = "Stream application and focus changes to a client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "appwatch-server.toml")]
    config: PathBuf,

    /// Listen on this port instead of the configured one.
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ServerConfig::load(&cli.config);
    if let Some(port) = cli.port {
        config.network.port = port;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("appwatch-server v{}", env!("CARGO_PKG_VERSION"));
    info!("listen address: {}", config.listen_addr());
    info!("refresh interval: {}ms", config.refresh_interval().as_millis());

    let service = AppWatchService::new(config);
    let stop = service.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, Ordering::SeqCst);
    });

    service.run().await?;

    Ok(())
}
