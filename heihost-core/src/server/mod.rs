//! TCP listener and per-connection task spawning.
//!
//! The server owns nothing mutable that connections share: each accepted
//! socket gets its own [`Session`] task, and the only common state is the
//! read-only [`ScreenshotSource`].

pub mod session;

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{Instrument, info, info_span, warn};

use crate::error::HeiError;
use crate::screenshot::ScreenshotSource;

pub use session::{Session, SessionEnd};

/// Default TCP listen port.
pub const DEFAULT_PORT: u16 = 8765;

/// Default per-read / per-write client timeout.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

// ── ServerConfig ─────────────────────────────────────────────────

/// Settings applied to every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port to listen on (0 picks a free one).
    pub listen_port: u16,
    /// How long a client may stay silent, and how long a response may
    /// take to drain.
    pub client_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_PORT,
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
        }
    }
}

// ── Server ───────────────────────────────────────────────────────

/// A bound image server.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    source: Arc<dyn ScreenshotSource>,
}

impl Server {
    /// Bind the listen port on all interfaces.
    pub async fn bind(
        config: ServerConfig,
        source: impl ScreenshotSource,
    ) -> Result<Self, HeiError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.listen_port));
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            config,
            source: Arc::new(source),
        })
    }

    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, HeiError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<(), HeiError> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Sessions already running are left to finish on their own.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<(), HeiError> {
        info!("serving on {}", self.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            let accept = tokio::select! {
                result = self.listener.accept() => result,
                _ = &mut shutdown => break,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            self.spawn_session(stream, peer);
        }

        info!("listener stopped");
        Ok(())
    }

    fn spawn_session(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let session = Session::new(stream, Arc::clone(&self.source), self.config.client_timeout);

        tokio::spawn(
            async move {
                info!("new connection");
                let end = session.run().await;
                end.log();
                info!("connection closed");
            }
            .instrument(info_span!("client", %peer)),
        );
    }
}
