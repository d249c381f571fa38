//! Server → client messages.
//!
//! Fixed headers go through the integer encoder; the compressed bytes of
//! an image block are appended verbatim after their header.

use bytes::{BufMut, Bytes};

use crate::encoding::{self, ByteOrder, IntFormat, PackedInt};
use crate::error::HeiError;
use crate::hosted::{Block, HostedImage};
use crate::message::MessageType;

// ── ImageHeaderResponse ──────────────────────────────────────────

/// Dimensions of the image that follows, and how many blocks carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeaderResponse {
    pub width: u16,
    pub height: u16,
    pub num_blocks: u16,
}

impl ImageHeaderResponse {
    pub const LAYOUT: [IntFormat; 3] = [IntFormat::U16, IntFormat::U16, IntFormat::U16];

    pub fn decode(payload: &[u8]) -> Result<Self, HeiError> {
        let values = encoding::decode(payload, &Self::LAYOUT)?;
        let [width, height, num_blocks] = values[..] else {
            return Err(HeiError::ProtocolViolation("image header layout"));
        };

        Ok(Self {
            width: u16::try_from(width)?,
            height: u16::try_from(height)?,
            num_blocks: u16::try_from(num_blocks)?,
        })
    }
}

impl From<&HostedImage> for ImageHeaderResponse {
    fn from(image: &HostedImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            num_blocks: image.num_blocks(),
        }
    }
}

// ── ImageBlockResponse ───────────────────────────────────────────

/// One compressed block, in transmission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlockResponse {
    pub block: Block,
}

impl ImageBlockResponse {
    /// Layout of the header preceding the compressed bytes.
    pub const HEADER_LAYOUT: [IntFormat; 2] = [IntFormat::U16, IntFormat::U16];

    /// Parse `(uncompressed_size, compressed_size)` from a block header.
    pub fn decode_header(payload: &[u8]) -> Result<(u16, u16), HeiError> {
        let values = encoding::decode(payload, &Self::HEADER_LAYOUT)?;
        let [uncompressed, compressed] = values[..] else {
            return Err(HeiError::ProtocolViolation("image block header layout"));
        };
        Ok((u16::try_from(uncompressed)?, u16::try_from(compressed)?))
    }

    /// Build from a parsed header and its trailing bytes.
    pub fn from_parts(uncompressed_size: u16, data: Bytes) -> Result<Self, HeiError> {
        Ok(Self {
            block: Block::from_parts(uncompressed_size, data)?,
        })
    }
}

// ── Response ─────────────────────────────────────────────────────

/// Every message the server may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    ImageHeader(ImageHeaderResponse),
    ImageBlock(ImageBlockResponse),
    ServerError,
}

impl Response {
    pub fn message_type(&self) -> MessageType {
        match self {
            Response::ImageHeader(_) => MessageType::ImageHeaderResponse,
            Response::ImageBlock(_) => MessageType::ImageBlockResponse,
            Response::ServerError => MessageType::ServerError,
        }
    }

    /// Total encoded size including the type byte.
    pub fn encoded_len(&self) -> usize {
        let trailing = match self {
            Response::ImageBlock(msg) => msg.block.data().len(),
            _ => 0,
        };
        1 + self.message_type().fixed_payload_len() + trailing
    }

    /// Append the encoded message to `dst`.
    pub fn encode_into<B: BufMut>(&self, dst: &mut B) {
        let ty = PackedInt::from(u8::from(self.message_type()));

        match self {
            Response::ImageHeader(header) => encoding::encode_into(
                dst,
                ByteOrder::LittleEndian,
                &[
                    ty,
                    header.width.into(),
                    header.height.into(),
                    header.num_blocks.into(),
                ],
            ),
            Response::ImageBlock(msg) => {
                encoding::encode_into(
                    dst,
                    ByteOrder::LittleEndian,
                    &[
                        ty,
                        msg.block.uncompressed_size().into(),
                        msg.block.compressed_size().into(),
                    ],
                );
                dst.put_slice(msg.block.data());
            }
            Response::ServerError => encoding::encode_into(dst, ByteOrder::LittleEndian, &[ty]),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }

    /// The header followed by one block message per block, in order.
    pub fn for_image(image: &HostedImage) -> impl Iterator<Item = Response> + '_ {
        std::iter::once(Response::ImageHeader(image.into())).chain(
            image
                .blocks()
                .iter()
                .map(|block| Response::ImageBlock(ImageBlockResponse { block: block.clone() })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};

    #[test]
    fn header_layout() {
        let msg = Response::ImageHeader(ImageHeaderResponse {
            width: 1200,
            height: 825,
            num_blocks: 121,
        });
        assert_eq!(msg.to_bytes(), [0x11, 0xB0, 0x04, 0x39, 0x03, 0x79, 0x00]);
        assert_eq!(msg.encoded_len(), 7);
    }

    #[test]
    fn server_error_is_a_single_byte() {
        assert_eq!(Response::ServerError.to_bytes(), [0x50]);
    }

    #[test]
    fn block_payload_follows_header_verbatim() {
        let block = Block::compress(&[0x42; 100]).unwrap();
        let data = block.data().clone();
        let msg = Response::ImageBlock(ImageBlockResponse { block });

        let bytes = msg.to_bytes();
        assert_eq!(bytes[0], 0x12);
        assert_eq!(&bytes[1..3], &100u16.to_le_bytes());
        assert_eq!(&bytes[3..5], &(data.len() as u16).to_le_bytes());
        assert_eq!(&bytes[5..], &data[..]);
        assert_eq!(bytes.len(), msg.encoded_len());
    }

    #[test]
    fn image_sequence_is_header_then_blocks() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(256, 100, Luma([90])));
        let hosted = HostedImage::from_image(&image).unwrap();
        let messages: Vec<_> = Response::for_image(&hosted).collect();

        assert_eq!(messages.len(), 1 + hosted.blocks().len());
        assert!(matches!(
            messages[0],
            Response::ImageHeader(ImageHeaderResponse { width: 256, height: 100, .. })
        ));
        assert!(messages[1..]
            .iter()
            .all(|m| m.message_type() == MessageType::ImageBlockResponse));
    }

    #[test]
    fn header_decode_needs_six_bytes() {
        assert!(ImageHeaderResponse::decode(&[1, 2, 3, 4, 5]).is_err());
        let header = ImageHeaderResponse::decode(&[0xB0, 0x04, 0x39, 0x03, 0x79, 0x00]).unwrap();
        assert_eq!((header.width, header.height, header.num_blocks), (1200, 825, 121));
    }
}
