//! # heihost-core
//!
//! Image hosting protocol for battery-powered e-paper displays.
//!
//! This crate contains:
//! - **Encoding**: `PackedInt` fixed-width integers with explicit byte order
//! - **Protocol types**: `MessageType`, `Request`, `Response` and their payloads
//! - **Codec**: `ServerCodec` / `ClientCodec` for framed TCP I/O via `tokio_util`
//! - **Hosted image**: grayscale → 4-bit packing → LZ4 blocks (`HostedImage`)
//! - **Screenshot slot**: single-producer, many-reader handoff of the latest capture
//! - **Server**: `Server` listener with one `Session` task per connection
//! - **Client**: `ImageClient` for fetching and reassembling an image
//! - **Error**: `HeiError`, typed, `thiserror`-based error hierarchy

pub mod client;
pub mod codec;
pub mod encoding;
pub mod error;
pub mod hosted;
pub mod message;
pub mod protocol;
pub mod screenshot;
pub mod server;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use client::{FetchedImage, ImageClient};
pub use codec::{ClientCodec, ServerCodec};
pub use encoding::{ByteOrder, IntFormat, PackedInt};
pub use error::HeiError;
pub use hosted::{BLOCK_SIZE, Block, HostedImage};
pub use message::MessageType;
pub use protocol::{GetImageRequest, ImageBlockResponse, ImageHeaderResponse, Request, Response};
pub use screenshot::{ScreenshotPublisher, ScreenshotSlot, ScreenshotSource};
pub use server::{Server, ServerConfig, SessionEnd};
