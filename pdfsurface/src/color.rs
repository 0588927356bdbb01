//! Pixel format conversion from the engine's 3-byte layout to RGB 565

/// Pack an 8-bit-per-channel color into RGB 565.
#[inline]
pub fn rgb_to_565(red: u8, green: u8, blue: u8) -> u16 {
    ((u16::from(red) >> 3) << 11) | ((u16::from(green) >> 2) << 5) | (u16::from(blue) >> 3)
}

/// Convert a packed `R, G, B` buffer into little-endian RGB 565.
///
/// Source and destination strides are honored independently; padding bytes
/// past `width` pixels in each destination row are left untouched. Rows
/// that do not fit in either buffer are skipped.
pub fn convert_rgb_to_565(
    source: &[u8],
    source_stride: usize,
    dest: &mut [u8],
    dest_stride: usize,
    width: usize,
    height: usize,
) {
    let src_row_bytes = width * 3;
    let dst_row_bytes = width * 2;

    for y in 0..height {
        let src_start = y * source_stride;
        let dst_start = y * dest_stride;
        let (Some(src_row), Some(dst_row)) = (
            source.get(src_start..src_start + src_row_bytes),
            dest.get_mut(dst_start..dst_start + dst_row_bytes),
        ) else {
            tracing::error!("Row {} outside conversion buffers", y);
            return;
        };

        for (rgb, out) in src_row.chunks_exact(3).zip(dst_row.chunks_exact_mut(2)) {
            let packed = rgb_to_565(rgb[0], rgb[1], rgb[2]);
            out.copy_from_slice(&packed.to_le_bytes());
        }
    }
}

/// Expand an RGB 565 value to 8-bit `(r, g, b)`.
pub fn rgb_from_565(packed: u16) -> (u8, u8, u8) {
    let r = ((packed >> 11) & 0x1f) as u8;
    let g = ((packed >> 5) & 0x3f) as u8;
    let b = (packed & 0x1f) as u8;
    ((r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2))
}

/// Split an `0xAARRGGBB` color into `(a, r, g, b)`.
#[inline]
pub fn argb_channels(color: u32) -> (u8, u8, u8, u8) {
    (
        (color >> 24) as u8,
        (color >> 16) as u8,
        (color >> 8) as u8,
        color as u8,
    )
}
