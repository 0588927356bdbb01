//! Engine-order bitmaps bound over caller memory

use crate::color::argb_channels;
use crate::error::SurfaceError;
use crate::transform::DrawRect;

/// Channel layout the engine renders in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapFormat {
    /// B, G, R, A (4 bytes per pixel)
    Bgra,
    /// B, G, R (3 bytes per pixel)
    Bgr,
}

impl BitmapFormat {
    /// Get the number of bytes per pixel for this format.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            BitmapFormat::Bgra => 4,
            BitmapFormat::Bgr => 3,
        }
    }
}

/// A packed bitmap the engine draws into.
///
/// The bitmap borrows its pixels; it is the engine-side description of a
/// [`RasterTarget`](crate::surface::RasterTarget) or of a scratch buffer.
/// When `reverse_byte_order` is set every pixel is stored R, G, B(, A)
/// instead of the engine's native B, G, R(, A).
#[derive(Debug)]
pub struct EngineBitmap<'a> {
    buf: &'a mut [u8],
    width: u32,
    height: u32,
    stride: usize,
    format: BitmapFormat,
    reverse_byte_order: bool,
}

impl<'a> EngineBitmap<'a> {
    /// Bind `buf` as a `width` x `height` bitmap with `stride` bytes per row.
    pub fn new(
        buf: &'a mut [u8],
        width: u32,
        height: u32,
        stride: usize,
        format: BitmapFormat,
        reverse_byte_order: bool,
    ) -> Result<Self, SurfaceError> {
        let row_bytes = width as usize * format.bytes_per_pixel();
        if stride < row_bytes {
            return Err(SurfaceError::InvalidTarget(format!(
                "bitmap stride {} shorter than row of {} bytes",
                stride, row_bytes
            )));
        }
        let required = match height {
            0 => Some(0),
            h => stride
                .checked_mul(h as usize - 1)
                .and_then(|bytes| bytes.checked_add(row_bytes)),
        };
        let Some(required) = required else {
            return Err(SurfaceError::InvalidTarget(format!(
                "bitmap stride {} overflows over {} rows",
                stride, height
            )));
        };
        if buf.len() < required {
            return Err(SurfaceError::InvalidTarget(format!(
                "bitmap buffer of {} bytes cannot hold {} bytes",
                buf.len(),
                required
            )));
        }
        Ok(Self {
            buf,
            width,
            height,
            stride,
            format,
            reverse_byte_order,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> BitmapFormat {
        self.format
    }

    pub fn reverse_byte_order(&self) -> bool {
        self.reverse_byte_order
    }

    /// Set the byte order used by subsequent fills and pixel writes.
    pub fn set_reverse_byte_order(&mut self, reverse: bool) {
        self.reverse_byte_order = reverse;
    }

    pub fn data(&self) -> &[u8] {
        self.buf
    }

    /// Fill `width` x `height` pixels at `(left, top)` with an ARGB color.
    ///
    /// The rectangle is clipped to the bitmap; nothing outside it is written.
    pub fn fill_rect(&mut self, left: i32, top: i32, width: i32, height: i32, argb: u32) {
        let x0 = i64::from(left).clamp(0, i64::from(self.width));
        let y0 = i64::from(top).clamp(0, i64::from(self.height));
        let x1 = (i64::from(left) + i64::from(width)).clamp(x0, i64::from(self.width));
        let y1 = (i64::from(top) + i64::from(height)).clamp(y0, i64::from(self.height));
        if x0 == x1 || y0 == y1 {
            return;
        }

        let pixel = self.encode(argb);
        let bpp = self.format.bytes_per_pixel();
        for y in y0 as usize..y1 as usize {
            let start = y * self.stride + x0 as usize * bpp;
            let end = y * self.stride + x1 as usize * bpp;
            for out in self.buf[start..end].chunks_exact_mut(bpp) {
                out.copy_from_slice(&pixel[..bpp]);
            }
        }
    }

    /// Fill a clamped draw rectangle.
    pub fn fill_draw_rect(&mut self, rect: DrawRect, argb: u32) {
        self.fill_rect(
            rect.x as i32,
            rect.y as i32,
            rect.width as i32,
            rect.height as i32,
            argb,
        );
    }

    /// Write one pixel; out-of-bounds coordinates are ignored.
    pub fn set_pixel(&mut self, x: i64, y: i64, argb: u32) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        let start = y as usize * self.stride + x as usize * bpp;
        let pixel = self.encode(argb);
        self.buf[start..start + bpp].copy_from_slice(&pixel[..bpp]);
    }

    /// Read one pixel back as ARGB; `None` outside the bitmap.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let start = y as usize * self.stride + x as usize * bpp;
        let px = self.buf.get(start..start + bpp)?;
        let (r, g, b) = if self.reverse_byte_order {
            (px[0], px[1], px[2])
        } else {
            (px[2], px[1], px[0])
        };
        let a = if bpp == 4 { px[3] } else { 0xff };
        Some(u32::from_be_bytes([a, r, g, b]))
    }

    fn encode(&self, argb: u32) -> [u8; 4] {
        let (a, r, g, b) = argb_channels(argb);
        if self.reverse_byte_order {
            [r, g, b, a]
        } else {
            [b, g, r, a]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rect_is_clipped() {
        let mut buf = vec![0u8; 4 * 4 * 4];
        let mut bitmap = EngineBitmap::new(&mut buf, 4, 4, 16, BitmapFormat::Bgra, false).unwrap();
        bitmap.fill_rect(-2, -2, 4, 4, 0xff102030);

        assert_eq!(bitmap.pixel(0, 0), Some(0xff102030));
        assert_eq!(bitmap.pixel(1, 1), Some(0xff102030));
        assert_eq!(bitmap.pixel(2, 2), Some(0));
        assert_eq!(&buf[0..4], &[0x30, 0x20, 0x10, 0xff]);
    }

    #[test]
    fn test_reverse_byte_order_stores_rgba() {
        let mut buf = vec![0u8; 4];
        let mut bitmap = EngineBitmap::new(&mut buf, 1, 1, 4, BitmapFormat::Bgra, true).unwrap();
        bitmap.set_pixel(0, 0, 0x80112233);
        assert_eq!(bitmap.pixel(0, 0), Some(0x80112233));
        assert_eq!(buf, [0x11, 0x22, 0x33, 0x80]);
    }

    #[test]
    fn test_row_padding_untouched() {
        // 2x2 BGR with 8-byte rows: 2 bytes of padding per row.
        let mut buf = vec![0xaau8; 8 + 6];
        let mut bitmap = EngineBitmap::new(&mut buf, 2, 2, 8, BitmapFormat::Bgr, true).unwrap();
        bitmap.fill_rect(0, 0, 10, 10, 0xff010203);
        assert_eq!(&buf[0..6], &[1, 2, 3, 1, 2, 3]);
        assert_eq!(&buf[6..8], &[0xaa, 0xaa]);
        assert_eq!(&buf[8..14], &[1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_out_of_bounds_pixel_ignored() {
        let mut buf = vec![0u8; 16];
        let mut bitmap = EngineBitmap::new(&mut buf, 2, 2, 8, BitmapFormat::Bgra, false).unwrap();
        bitmap.set_pixel(2, 0, 0xffffffff);
        bitmap.set_pixel(-1, 1, 0xffffffff);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_rejects_overflowing_stride() {
        let mut buf = vec![0u8; 64];
        let err = EngineBitmap::new(&mut buf, 2, 3, usize::MAX / 2 + 1, BitmapFormat::Bgr, false)
            .unwrap_err();
        assert!(matches!(err, SurfaceError::InvalidTarget(_)));
    }

    #[test]
    fn test_rejects_undersized_buffer() {
        let mut buf = vec![0u8; 15];
        assert!(EngineBitmap::new(&mut buf, 2, 2, 8, BitmapFormat::Bgra, false).is_err());
    }
}
