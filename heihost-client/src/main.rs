//! heihost-client: reference client.
//!
//! Connects to an image server, sends one get-image request with the
//! given telemetry, reassembles the compressed blocks and saves the
//! result as an 8-bit grayscale PNG.
//!
//! ```text
//! heihost-client --host 192.168.1.10 --port 8765
//! heihost-client --host 127.0.0.1 --port 8765 --output dash.png --charge 80
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use heihost_core::{GetImageRequest, HeiError, ImageClient};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "heihost-client", about = "Fetch one image from a heihost server")]
struct Cli {
    /// Image server host.
    #[arg(long)]
    host: IpAddr,

    /// Image server port.
    #[arg(long)]
    port: u16,

    /// Read timeout in seconds.
    #[arg(short = 't', long, default_value_t = 15)]
    timeout: u64,

    /// Where to save the received image.
    #[arg(short, long, default_value = "image.png")]
    output: PathBuf,

    /// Reported battery charge in percent.
    #[arg(long, default_value_t = 10)]
    charge: u8,

    /// Reported battery voltage.
    #[arg(long, default_value_t = 3_300_000)]
    voltage: u32,

    /// Reported runtime to empty.
    #[arg(long, default_value_t = 55)]
    runtime_to_empty: u32,
}

impl Cli {
    fn telemetry(&self) -> GetImageRequest {
        GetImageRequest {
            fuel_gauge_valid: true,
            runtime_to_empty: self.runtime_to_empty,
            runtime_to_full: 0,
            charge_percentage: self.charge,
            voltage: self.voltage,
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let addr = SocketAddr::new(cli.host, cli.port);
    let mut client = ImageClient::connect(addr, Duration::from_secs(cli.timeout)).await?;
    info!("connected to {addr}");

    let start = Instant::now();
    let fetched = match client.fetch(cli.telemetry()).await {
        Ok(fetched) => fetched,
        Err(HeiError::ImageUnavailable) => {
            eprintln!("server has no image yet");
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };

    let compressed: usize = fetched.block_sizes.iter().map(|&(_, c)| c as usize).sum();
    info!(
        "received {}x{} image in {} blocks ({} bytes) in {} ms",
        fetched.width,
        fetched.height,
        fetched.block_sizes.len(),
        compressed,
        start.elapsed().as_millis()
    );

    fetched.to_luma()?.save(&cli.output)?;
    info!("saved {}", cli.output.display());
    Ok(())
}
