//! Hosted image pipeline.
//!
//! Turns a captured raster image into the wire-ready [`HostedImage`]:
//!
//! 1. Convert to 8-bit grayscale.
//! 2. Quantize to 16 levels and pack two pixels per byte ([`packing`]).
//! 3. Swap adjacent byte pairs in every row.
//! 4. Split the flattened bytes into [`BLOCK_SIZE`] chunks.
//! 5. LZ4-compress each chunk independently, without a size prefix.
//!
//! Blocks are independent so the receiver can decompress and forward
//! each one to the display as it arrives.

pub mod packing;

use std::sync::Arc;

use bytes::Bytes;
use image::DynamicImage;
use tracing::debug;

use crate::error::HeiError;

/// Maximum number of packed bytes in one block.
pub const BLOCK_SIZE: usize = 4096;

// ── Block ────────────────────────────────────────────────────────

/// One independently compressed chunk of packed pixel bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    uncompressed_size: u16,
    data: Bytes,
}

impl Block {
    /// Compress `chunk` into a block.
    pub fn compress(chunk: &[u8]) -> Result<Self, HeiError> {
        if chunk.len() > BLOCK_SIZE {
            return Err(HeiError::ImageProcessing(format!(
                "block of {} bytes exceeds {BLOCK_SIZE}",
                chunk.len()
            )));
        }

        let data = lz4_flex::block::compress(chunk);
        if data.len() > u16::MAX as usize {
            return Err(HeiError::ImageProcessing(format!(
                "compressed block too large: {} bytes",
                data.len()
            )));
        }

        Ok(Self {
            uncompressed_size: chunk.len() as u16,
            data: Bytes::from(data),
        })
    }

    /// Assemble a block received from the wire.
    pub fn from_parts(uncompressed_size: u16, data: Bytes) -> Result<Self, HeiError> {
        if uncompressed_size as usize > BLOCK_SIZE || data.len() > u16::MAX as usize {
            return Err(HeiError::ProtocolViolation("block size out of range"));
        }
        Ok(Self {
            uncompressed_size,
            data,
        })
    }

    pub fn uncompressed_size(&self) -> u16 {
        self.uncompressed_size
    }

    /// Length of the compressed data.
    pub fn compressed_size(&self) -> u16 {
        self.data.len() as u16
    }

    /// Compressed LZ4 block bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Decompress and check the result has exactly the declared size.
    pub fn decompress(&self) -> Result<Vec<u8>, HeiError> {
        let out = lz4_flex::block::decompress(&self.data, self.uncompressed_size as usize)?;
        if out.len() != self.uncompressed_size as usize {
            return Err(HeiError::Compression(format!(
                "decompressed {} bytes, expected {}",
                out.len(),
                self.uncompressed_size
            )));
        }
        Ok(out)
    }
}

// ── HostedImage ──────────────────────────────────────────────────

/// A packed grayscale image split into compressed blocks.
///
/// Built fresh for every request and dropped once sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedImage {
    width: u16,
    height: u16,
    blocks: Vec<Block>,
}

impl HostedImage {
    /// Run the full pipeline on `image`.
    pub fn from_image(image: &DynamicImage) -> Result<Self, HeiError> {
        let (width, height) = (image.width(), image.height());
        let (Ok(w16), Ok(h16)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(HeiError::ImageProcessing(format!(
                "image {width}x{height} exceeds 65535 pixels per side"
            )));
        };

        let packed = packing::pack_luma(&image.to_luma8())?;
        let blocks = packed
            .chunks(BLOCK_SIZE)
            .map(Block::compress)
            .collect::<Result<Vec<_>, _>>()?;

        if blocks.len() > u16::MAX as usize {
            return Err(HeiError::ImageProcessing(format!(
                "{} blocks do not fit the header",
                blocks.len()
            )));
        }

        let hosted = Self {
            width: w16,
            height: h16,
            blocks,
        };

        let original = hosted.packed_len();
        let compressed = hosted.compressed_len();
        debug!(
            "hosted image {width}x{height}: {compressed} / {original} bytes ({:.2}%)",
            100.0 * compressed as f64 / original as f64
        );

        Ok(hosted)
    }

    /// Run the pipeline on the blocking thread pool.
    pub async fn build(image: Arc<DynamicImage>) -> Result<Self, HeiError> {
        tokio::task::spawn_blocking(move || Self::from_image(&image))
            .await
            .map_err(|e| HeiError::ImageProcessing(format!("pipeline task failed: {e}")))?
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn num_blocks(&self) -> u16 {
        self.blocks.len() as u16
    }

    /// Total packed bytes before compression.
    pub fn packed_len(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.uncompressed_size() as usize)
            .sum()
    }

    /// Total bytes of compressed block data.
    pub fn compressed_len(&self) -> usize {
        self.blocks.iter().map(|b| b.data.len()).sum()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let v = ((x * 7 + y * 3) % 256) as u8;
            Rgb([v, v.wrapping_add(40), v / 2])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn block_sizes_sum_to_packed_length() {
        let hosted = HostedImage::from_image(&gradient(1200, 825)).unwrap();
        let total = 1200 * 825 / 2;

        assert_eq!(hosted.width(), 1200);
        assert_eq!(hosted.height(), 825);
        assert_eq!(hosted.packed_len(), total);
        assert_eq!(hosted.num_blocks() as usize, total.div_ceil(BLOCK_SIZE));

        let (last, full) = hosted.blocks().split_last().unwrap();
        assert!(full.iter().all(|b| b.uncompressed_size() as usize == BLOCK_SIZE));
        assert_eq!(last.uncompressed_size() as usize, total % BLOCK_SIZE);
    }

    #[test]
    fn blocks_decompress_to_packed_slices() {
        let image = gradient(320, 97);
        let packed = packing::pack_luma(&image.to_luma8()).unwrap();
        let hosted = HostedImage::from_image(&image).unwrap();

        for (block, expected) in hosted.blocks().iter().zip(packed.chunks(BLOCK_SIZE)) {
            assert_eq!(block.compressed_size() as usize, block.data().len());
            assert_eq!(block.decompress().unwrap(), expected);
        }
    }

    #[test]
    fn uniform_image_compresses_well() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(1200, 825, Luma([255])));
        let hosted = HostedImage::from_image(&image).unwrap();
        assert!(hosted.compressed_len() * 10 < hosted.packed_len());
    }

    #[test]
    fn pipeline_is_deterministic() {
        let image = gradient(400, 300);
        assert_eq!(
            HostedImage::from_image(&image).unwrap(),
            HostedImage::from_image(&image).unwrap()
        );
    }

    #[test]
    fn exact_multiple_has_no_short_block() {
        // 128 x 64 pixels → 4096 packed bytes → exactly one full block.
        let hosted = HostedImage::from_image(&gradient(128, 64)).unwrap();
        assert_eq!(hosted.num_blocks(), 1);
        assert_eq!(hosted.blocks()[0].uncompressed_size() as usize, BLOCK_SIZE);
    }

    #[test]
    fn zero_sized_image_is_a_processing_error() {
        let image = DynamicImage::ImageLuma8(GrayImage::new(0, 10));
        assert!(matches!(
            HostedImage::from_image(&image),
            Err(HeiError::ImageProcessing(_))
        ));
    }

    #[test]
    fn corrupt_block_fails_to_decompress() {
        let block = Block::from_parts(4096, Bytes::from_static(&[0xF0, 0x00])).unwrap();
        assert!(block.decompress().is_err());
    }

    #[tokio::test]
    async fn build_runs_off_the_reactor() {
        let hosted = HostedImage::build(Arc::new(gradient(64, 8))).await.unwrap();
        assert_eq!(hosted.packed_len(), 64 * 8 / 2);
    }
}
