//! One protocol session per accepted connection.
//!
//! ```text
//!  AwaitingMessageType ──► Dispatching ──► HandlingGetImage
//!        ▲     │               │                  │
//!        │     ▼               ▼                  │
//!        │   Closed ◄──────────┘                  │
//!        └────────────────────────────────────────┘
//! ```
//!
//! The type byte and the payload that follows it are each read under
//! their own client timeout, and writing a complete response is bounded
//! by the same timeout. Anything the client does wrong closes the
//! session without a reply; a missing or unprocessable image is answered
//! with `ServerError` and the session continues.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::codec::{Decoder, Framed};
use tracing::{debug, error, info, warn};

use crate::codec::ServerCodec;
use crate::error::HeiError;
use crate::hosted::HostedImage;
use crate::message::MessageType;
use crate::protocol::{GetImageRequest, Request, Response};
use crate::screenshot::ScreenshotSource;

// ── SessionEnd ───────────────────────────────────────────────────

/// Why a session stopped.
#[derive(Debug)]
pub enum SessionEnd {
    /// The client closed the connection between messages.
    PeerClosed,
    /// Nothing was read or written within the client timeout.
    Timeout(Duration),
    /// The type byte matched no message.
    UnknownType(u8),
    /// A known message that clients may not send.
    Unhandled(MessageType),
    /// A malformed or truncated request.
    ProtocolError(HeiError),
    /// The socket failed.
    Io(std::io::Error),
}

impl From<HeiError> for SessionEnd {
    fn from(e: HeiError) -> Self {
        match e {
            HeiError::Timeout(after) => SessionEnd::Timeout(after),
            HeiError::UnknownMessageType(b) => SessionEnd::UnknownType(b),
            HeiError::UnexpectedMessage(ty) => SessionEnd::Unhandled(ty),
            HeiError::Connection(io) => SessionEnd::Io(io),
            other => SessionEnd::ProtocolError(other),
        }
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "client disconnected"),
            Self::Timeout(after) => write!(f, "timed out after {after:?}"),
            Self::UnknownType(b) => write!(f, "unknown message type {b:#04x}"),
            Self::Unhandled(ty) => write!(f, "no handler for {ty}"),
            Self::ProtocolError(e) => write!(f, "protocol error: {e}"),
            Self::Io(e) => write!(f, "connection error: {e}"),
        }
    }
}

impl SessionEnd {
    /// Log the outcome at the level it deserves.
    pub fn log(&self) {
        match self {
            Self::PeerClosed => info!("{self}"),
            Self::Timeout(_) | Self::UnknownType(_) | Self::Unhandled(_) => warn!("{self}"),
            Self::Io(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
                ) =>
            {
                warn!("{self}")
            }
            Self::ProtocolError(_) | Self::Io(_) => error!("{self}"),
        }
    }
}

// ── Session ──────────────────────────────────────────────────────

/// A single client connection.
pub struct Session<T> {
    framed: Framed<T, ServerCodec>,
    source: Arc<dyn ScreenshotSource>,
    timeout: Duration,
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: T, source: Arc<dyn ScreenshotSource>, timeout: Duration) -> Self {
        Self {
            framed: Framed::new(io, ServerCodec),
            source,
            timeout,
        }
    }

    /// Serve requests until the session ends, then close the socket.
    pub async fn run(mut self) -> SessionEnd {
        let end = self.serve().await;
        if let Err(e) = self.framed.get_mut().shutdown().await {
            debug!("error closing connection: {e}");
        }
        end
    }

    async fn serve(&mut self) -> SessionEnd {
        loop {
            let request = match self.next_request().await {
                Ok(Some(request)) => request,
                Ok(None) => return SessionEnd::PeerClosed,
                Err(e) => return e.into(),
            };

            let handled = match request {
                Request::GetImage(req) => self.handle_get_image(req).await,
            };

            if let Err(e) = handled {
                return e.into();
            }
        }
    }

    /// Wait for the next complete request.
    ///
    /// The deadline restarts once the type byte is in: a client gets one
    /// timeout to start a message and another to finish its payload.
    async fn next_request(&mut self) -> Result<Option<Request>, HeiError> {
        if self.framed.read_buffer().is_empty() {
            let mut type_byte = [0u8; 1];
            let read = timeout(self.timeout, self.framed.get_mut().read(&mut type_byte))
                .await
                .map_err(|_| HeiError::Timeout(self.timeout))??;
            if read == 0 {
                return Ok(None);
            }
            self.framed.read_buffer_mut().extend_from_slice(&type_byte);
        }

        // Unknown types fail here, before any payload is awaited.
        let mut codec = *self.framed.codec();
        if let Some(request) = codec.decode(self.framed.read_buffer_mut())? {
            return Ok(Some(request));
        }

        match timeout(self.timeout, self.framed.next()).await {
            Ok(next) => next.transpose(),
            Err(_) => Err(HeiError::Timeout(self.timeout)),
        }
    }

    async fn handle_get_image(&mut self, req: GetImageRequest) -> Result<(), HeiError> {
        debug!(
            fuel_gauge_valid = req.fuel_gauge_valid,
            runtime_to_empty = req.runtime_to_empty,
            runtime_to_full = req.runtime_to_full,
            charge_percentage = req.charge_percentage,
            voltage = req.voltage,
            "get image request"
        );

        let built = match self.source.latest_screenshot() {
            Some(screenshot) => HostedImage::build(screenshot).await,
            None => Err(HeiError::ImageUnavailable),
        };

        let image = match built {
            Ok(image) => image,
            Err(e) if e.is_recoverable() => {
                error!("cannot serve image: {e}");
                return self.send(std::iter::once(Response::ServerError)).await;
            }
            Err(e) => return Err(e),
        };

        self.send(Response::for_image(&image)).await?;
        info!(
            "sent {}x{} image in {} blocks ({} bytes)",
            image.width(),
            image.height(),
            image.num_blocks(),
            image.compressed_len()
        );
        Ok(())
    }

    /// Queue `responses` in order and flush them, all within the timeout.
    async fn send(&mut self, responses: impl Iterator<Item = Response>) -> Result<(), HeiError> {
        let framed = &mut self.framed;
        let write = async move {
            for response in responses {
                framed.feed(response).await?;
            }
            framed.flush().await
        };

        timeout(self.timeout, write)
            .await
            .map_err(|_| HeiError::Timeout(self.timeout))?
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screenshot::ScreenshotSlot;
    use image::{DynamicImage, GrayImage, Luma};
    use tokio_test::io::Builder;

    fn request_bytes() -> Vec<u8> {
        Request::GetImage(GetImageRequest::default()).to_bytes()
    }

    #[tokio::test]
    async fn missing_image_answers_server_error_and_continues() {
        let io = Builder::new()
            .read(&request_bytes())
            .write(&[0x50])
            .read(&request_bytes())
            .write(&[0x50])
            .build();

        let session = Session::new(io, Arc::new(ScreenshotSlot::empty()), Duration::from_secs(5));
        assert!(matches!(session.run().await, SessionEnd::PeerClosed));
    }

    #[tokio::test]
    async fn unknown_type_closes_without_reply() {
        let io = Builder::new().read(&[0xFF]).build();
        let session = Session::new(io, Arc::new(ScreenshotSlot::empty()), Duration::from_secs(5));
        assert!(matches!(session.run().await, SessionEnd::UnknownType(0xFF)));
    }

    #[tokio::test]
    async fn response_type_from_client_is_unhandled() {
        let io = Builder::new().read(&[0x50]).build();
        let session = Session::new(io, Arc::new(ScreenshotSlot::empty()), Duration::from_secs(5));
        assert!(matches!(
            session.run().await,
            SessionEnd::Unhandled(MessageType::ServerError)
        ));
    }

    #[tokio::test]
    async fn truncated_request_is_a_protocol_error() {
        let io = Builder::new().read(&request_bytes()[..6]).build();
        let session = Session::new(io, Arc::new(ScreenshotSlot::empty()), Duration::from_secs(5));
        assert!(matches!(session.run().await, SessionEnd::ProtocolError(_)));
    }

    #[tokio::test]
    async fn streams_header_then_blocks() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(128, 64, Luma([0])));
        let hosted = HostedImage::from_image(&image).unwrap();
        let expected: Vec<u8> = Response::for_image(&hosted)
            .flat_map(|r| r.to_bytes())
            .collect();

        let io = Builder::new().read(&request_bytes()).write(&expected).build();
        let session = Session::new(io, Arc::new(ScreenshotSlot::fixed(image)), Duration::from_secs(5));
        assert!(matches!(session.run().await, SessionEnd::PeerClosed));
    }

    #[tokio::test]
    async fn unprocessable_image_answers_server_error_and_continues() {
        let odd_width = DynamicImage::ImageLuma8(GrayImage::from_pixel(31, 4, Luma([0])));
        let io = Builder::new()
            .read(&request_bytes())
            .write(&[0x50])
            .read(&request_bytes())
            .write(&[0x50])
            .build();

        let session = Session::new(io, Arc::new(ScreenshotSlot::fixed(odd_width)), Duration::from_secs(5));
        assert!(matches!(session.run().await, SessionEnd::PeerClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn type_byte_and_payload_each_get_a_full_timeout() {
        let request = request_bytes();
        let io = Builder::new()
            .wait(Duration::from_millis(800))
            .read(&request[..1])
            .wait(Duration::from_millis(800))
            .read(&request[1..])
            .write(&[0x50])
            .build();

        let session = Session::new(io, Arc::new(ScreenshotSlot::empty()), Duration::from_secs(1));
        assert!(matches!(session.run().await, SessionEnd::PeerClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_payload_times_out() {
        let io = Builder::new()
            .read(&request_bytes()[..1])
            .wait(Duration::from_secs(60))
            .build();

        let session = Session::new(io, Arc::new(ScreenshotSlot::empty()), Duration::from_secs(1));
        assert!(matches!(session.run().await, SessionEnd::Timeout(_)));
    }

    #[tokio::test]
    async fn pipelined_requests_are_both_served() {
        let mut both = request_bytes();
        both.extend_from_slice(&request_bytes());
        let io = Builder::new().read(&both).write(&[0x50]).write(&[0x50]).build();

        let session = Session::new(io, Arc::new(ScreenshotSlot::empty()), Duration::from_secs(5));
        assert!(matches!(session.run().await, SessionEnd::PeerClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_client_times_out() {
        let io = Builder::new().wait(Duration::from_secs(60)).build();
        let session = Session::new(io, Arc::new(ScreenshotSlot::empty()), Duration::from_secs(1));
        assert!(matches!(session.run().await, SessionEnd::Timeout(_)));
    }
}
