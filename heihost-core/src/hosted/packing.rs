//! 4-bit grayscale quantization and nibble packing.
//!
//! The display controller consumes 16 gray levels, two pixels per byte,
//! with every pair of bytes in a row exchanged:
//!
//! ```text
//! pixels   p0 p1 p2 p3 p4 p5 p6 p7
//! packed   [p1|p0] [p3|p2] [p5|p4] [p7|p6]      (high|low nibble)
//! swapped  [p3|p2] [p1|p0] [p7|p6] [p5|p4]
//! ```

use image::GrayImage;

use crate::error::HeiError;

/// Number of gray levels after quantization.
pub const LEVELS: u8 = 16;

/// Map an 8-bit luma value to one of 16 equal-width bins.
#[inline]
pub const fn quantize(luma: u8) -> u8 {
    luma / (256 / LEVELS as u16) as u8
}

/// Pack two quantized pixels: `first` in the low nibble, `second` in
/// the high nibble.
#[inline]
pub const fn pack_pair(first: u8, second: u8) -> u8 {
    (first & 0x0F) | ((second & 0x0F) << 4)
}

/// Exchange each adjacent pair of bytes in `row` in place.
///
/// A trailing odd byte stays where it is.
pub fn swap_pairs(row: &mut [u8]) {
    for pair in row.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

/// Number of packed bytes for a `width x height` image.
pub fn packed_len(width: u32, height: u32) -> usize {
    (width as usize * height as usize).div_ceil(2)
}

/// Quantize, pack and swap a grayscale image into its wire byte layout,
/// flattened row-major.
pub fn pack_luma(gray: &GrayImage) -> Result<Vec<u8>, HeiError> {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Err(HeiError::ImageProcessing(format!(
            "zero-sized image: {width}x{height}"
        )));
    }
    if width % 2 != 0 {
        return Err(HeiError::ImageProcessing(format!(
            "image width must be even, got {width}"
        )));
    }

    let row_len = width as usize / 2;
    let mut out = Vec::with_capacity(packed_len(width, height));

    for row in gray.as_raw().chunks_exact(width as usize) {
        let start = out.len();
        out.extend(
            row.chunks_exact(2)
                .map(|px| pack_pair(quantize(px[0]), quantize(px[1]))),
        );
        debug_assert_eq!(out.len() - start, row_len);
        swap_pairs(&mut out[start..]);
    }

    Ok(out)
}

/// Reverse [`pack_luma`]: restore one byte per pixel, scaling each level
/// back to the full 0..=255 range.
pub fn unpack_luma(packed: &[u8], width: u32, height: u32) -> Result<GrayImage, HeiError> {
    if width == 0 || width % 2 != 0 || packed.len() != packed_len(width, height) {
        return Err(HeiError::ImageProcessing(format!(
            "{} packed bytes do not describe a {width}x{height} image",
            packed.len()
        )));
    }

    let scale = 255 / (LEVELS - 1);
    let row_len = width as usize / 2;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    let mut row_buf = vec![0u8; row_len];

    for row in packed.chunks_exact(row_len) {
        row_buf.copy_from_slice(row);
        swap_pairs(&mut row_buf);
        for &byte in &row_buf {
            pixels.push((byte & 0x0F) * scale);
            pixels.push((byte >> 4) * scale);
        }
    }

    GrayImage::from_raw(width, height, pixels)
        .ok_or_else(|| HeiError::ImageProcessing("pixel buffer size mismatch".into()))
}
