//! Wire-level request and response shapes.
//!
//! # Wire Protocol
//!
//! All multi-byte integers are little-endian. Each message is one type
//! byte followed by a fixed payload.
//!
//! ## Get Image
//! ```text
//! Client ──[0x10 GetImageRequest]─────────────► Server
//!   fuel_gauge_valid: u8 | runtime_to_empty: u32 | runtime_to_full: u32
//!   charge_percentage: u8 | voltage: u32
//!
//! Server ──[0x11 ImageHeaderResponse]─────────► Client
//!   width: u16 | height: u16 | num_blocks: u16
//!
//! Server ──[0x12 ImageBlockResponse]──────────► Client   (num_blocks times)
//!   uncompressed_size: u16 | compressed_size: u16 | data: [u8; compressed_size]
//! ```
//!
//! ## No Image
//! ```text
//! Server ──[0x50 ServerError]─────────────────► Client
//!   (no payload)
//! ```

pub mod request;
pub mod response;

pub use request::{GetImageRequest, Request};
pub use response::{ImageBlockResponse, ImageHeaderResponse, Response};
