//! Client side of the protocol.
//!
//! Sends a [`GetImageRequest`] and reassembles the packed image from the
//! header and block messages that follow, decompressing each block as it
//! arrives, the way the display device does.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use image::GrayImage;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::codec::ClientCodec;
use crate::error::HeiError;
use crate::hosted::packing;
use crate::protocol::{GetImageRequest, ImageHeaderResponse, Request, Response};

// ── FetchedImage ─────────────────────────────────────────────────

/// A received image in its packed wire layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub width: u16,
    pub height: u16,
    /// Packed, pair-swapped 4-bit pixels, `width * height / 2` bytes.
    pub packed: Vec<u8>,
    /// `(uncompressed_size, compressed_size)` of every block received.
    pub block_sizes: Vec<(u16, u16)>,
}

impl FetchedImage {
    /// Undo packing and expand the 16 levels to 8-bit grayscale.
    pub fn to_luma(&self) -> Result<GrayImage, HeiError> {
        packing::unpack_luma(&self.packed, self.width.into(), self.height.into())
    }
}

// ── ImageClient ──────────────────────────────────────────────────

/// A connection to an image server.
pub struct ImageClient {
    framed: Framed<TcpStream, ClientCodec>,
    timeout: Duration,
}

impl ImageClient {
    /// Connect to `addr`; `timeout` bounds the connect and every read.
    pub async fn connect(addr: SocketAddr, timeout: Duration) -> Result<Self, HeiError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| HeiError::Timeout(timeout))??;
        Ok(Self {
            framed: Framed::new(stream, ClientCodec),
            timeout,
        })
    }

    /// Request the current image and wait for all of its blocks.
    ///
    /// A `ServerError` reply becomes [`HeiError::ImageUnavailable`]; the
    /// connection stays usable for another attempt.
    pub async fn fetch(&mut self, telemetry: GetImageRequest) -> Result<FetchedImage, HeiError> {
        self.framed.send(Request::GetImage(telemetry)).await?;

        let header = match self.next().await? {
            Response::ImageHeader(header) => header,
            Response::ServerError => return Err(HeiError::ImageUnavailable),
            other => return Err(HeiError::UnexpectedMessage(other.message_type())),
        };

        let ImageHeaderResponse {
            width,
            height,
            num_blocks,
        } = header;
        debug!("image header: w={width}, h={height}, n={num_blocks}");

        let mut packed = Vec::with_capacity(packing::packed_len(width.into(), height.into()));
        let mut block_sizes = Vec::with_capacity(num_blocks as usize);

        for index in 0..num_blocks {
            let block = match self.next().await? {
                Response::ImageBlock(msg) => msg.block,
                Response::ServerError => return Err(HeiError::ImageUnavailable),
                other => return Err(HeiError::UnexpectedMessage(other.message_type())),
            };

            debug!(
                "block #{index:03} r={}, c={}",
                block.uncompressed_size(),
                block.compressed_size()
            );
            packed.extend_from_slice(&block.decompress()?);
            block_sizes.push((block.uncompressed_size(), block.compressed_size()));
        }

        Ok(FetchedImage {
            width,
            height,
            packed,
            block_sizes,
        })
    }

    /// Read one response; a closed connection is an error here.
    async fn next(&mut self) -> Result<Response, HeiError> {
        match tokio::time::timeout(self.timeout, self.framed.next()).await {
            Ok(Some(response)) => response,
            Ok(None) => Err(HeiError::Connection(std::io::ErrorKind::UnexpectedEof.into())),
            Err(_) => Err(HeiError::Timeout(self.timeout)),
        }
    }
}
