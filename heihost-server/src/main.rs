//! heihost-server entry point.
//!
//! ```text
//! heihost-server                          Serve with heihost-server.toml / defaults
//! heihost-server --config <path>          Load a custom config TOML
//! heihost-server -p 9000 -t 30            Override port and client timeout
//! heihost-server --source dash.png        Capture from another image file
//! heihost-server --gen-config             Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use heihost_core::{Server, screenshot};
use heihost_server::capture::FileCapture;
use heihost_server::config::HostConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "heihost-server", about = "E-paper image hosting server")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "heihost-server.toml")]
    config: PathBuf,

    /// Server listen port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Client timeout in seconds.
    #[arg(short = 't', long)]
    client_timeout: Option<u64>,

    /// Image file to capture screenshots from.
    #[arg(long)]
    source: Option<PathBuf>,

    /// Screenshot width.
    #[arg(long)]
    width: Option<u32>,

    /// Screenshot height.
    #[arg(long)]
    height: Option<u32>,

    /// Capture interval in seconds. A single screenshot is captured if not set.
    #[arg(long)]
    capture_interval: Option<u64>,

    /// Log level, overridden by RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the file configuration.
    fn apply(&self, config: &mut HostConfig) {
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(timeout) = self.client_timeout {
            config.network.client_timeout_secs = timeout;
        }
        if let Some(source) = &self.source {
            config.capture.source = source.clone();
        }
        if let Some(width) = self.width {
            config.capture.width = width;
        }
        if let Some(height) = self.height {
            config.capture.height = height;
        }
        if self.capture_interval.is_some() {
            config.capture.interval_secs = self.capture_interval;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&HostConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let mut config = HostConfig::load(&cli.config);
    cli.apply(&mut config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    config.validate()?;

    info!("heihost-server v{}", env!("CARGO_PKG_VERSION"));
    info!("listen port: {}", config.network.port);
    info!("client timeout: {}s", config.network.client_timeout_secs);
    info!(
        "capture: {} at {}x{}",
        config.capture.source.display(),
        config.capture.width,
        config.capture.height
    );

    // Capture runs on its own cadence; the server only reads the slot.
    let (publisher, slot) = screenshot::channel();
    tokio::spawn(FileCapture::new(&config.capture, publisher).run());

    let server = Server::bind(config.to_server_config(), slot).await?;
    server
        .run_until(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Ctrl-C received, shutting down");
        })
        .await?;

    Ok(())
}
