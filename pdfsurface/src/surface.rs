//! Raster targets, host drawing surfaces and host bitmaps
//!
//! A [`RasterTarget`] is a view over caller-owned packed pixels; it never
//! owns the memory it points to. Host surfaces (on-screen windows) and host
//! bitmaps (offscreen pixel buffers) hand out raster targets only while
//! locked, and [`LockGuard`] releases that lock on every exit path.

use crate::error::SurfaceError;

/// Pixel format of a destination buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// R, G, B, A bytes (4 bytes per pixel)
    #[default]
    Rgba8888,
    /// Little-endian RGB 565 (2 bytes per pixel)
    Rgb565,
}

impl PixelFormat {
    /// Get the number of bytes per pixel for this format.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8888 => 4,
            PixelFormat::Rgb565 => 2,
        }
    }
}

/// A mutable rectangular view of packed pixels with a byte stride.
#[derive(Debug)]
pub struct RasterTarget<'a> {
    pixels: &'a mut [u8],
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

impl<'a> RasterTarget<'a> {
    /// Describe `pixels` as a `width` x `height` buffer.
    ///
    /// Fails when the stride is shorter than a row or the slice cannot hold
    /// every row.
    pub fn new(
        pixels: &'a mut [u8],
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
    ) -> Result<Self, SurfaceError> {
        let row_bytes = width as usize * format.bytes_per_pixel();
        if stride < row_bytes {
            return Err(SurfaceError::InvalidTarget(format!(
                "stride {} shorter than row of {} bytes",
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
                "stride {} overflows over {} rows",
                stride, height
            )));
        };
        if pixels.len() < required {
            return Err(SurfaceError::InvalidTarget(format!(
                "buffer of {} bytes cannot hold {} bytes",
                pixels.len(),
                required
            )));
        }
        Ok(Self {
            pixels,
            width,
            height,
            stride,
            format,
        })
    }

    /// A tightly packed target (`stride = width * bytes_per_pixel`).
    pub fn packed(
        pixels: &'a mut [u8],
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self, SurfaceError> {
        let stride = width as usize * format.bytes_per_pixel();
        Self::new(pixels, width, height, stride, format)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row, including padding.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        self.pixels
    }
}

/// Something whose pixels must be locked before they can be written.
pub trait PixelLock {
    /// Acquire the OS-level pixel lock.
    fn lock(&mut self) -> Result<(), SurfaceError>;

    /// The locked pixels, or `None` when not locked.
    fn locked_target(&mut self) -> Option<RasterTarget<'_>>;

    /// Release the lock (and post the frame, for on-screen surfaces).
    fn unlock(&mut self);
}

/// Buffer format of an on-screen window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFormat {
    Rgba8888,
    Rgbx8888,
    Rgb565,
    Other(i32),
}

/// An on-screen drawing surface.
pub trait Surface: PixelLock {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn format(&self) -> WindowFormat;

    /// Change the buffer geometry and format for subsequent locks.
    fn set_buffers_geometry(
        &mut self,
        width: u32,
        height: u32,
        format: WindowFormat,
    ) -> Result<(), SurfaceError>;
}

/// Switch `surface` to RGBA_8888 if it uses any other format.
pub fn ensure_rgba_format<S: Surface + ?Sized>(surface: &mut S) -> Result<(), SurfaceError> {
    if surface.format() != WindowFormat::Rgba8888 {
        tracing::debug!("Set format to RGBA_8888");
        let (width, height) = (surface.width(), surface.height());
        surface.set_buffers_geometry(width, height, WindowFormat::Rgba8888)?;
    }
    Ok(())
}

/// Pixel format of a host bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostBitmapFormat {
    Rgba8888,
    Rgb565,
    Alpha8,
    Other(i32),
}

impl HostBitmapFormat {
    /// The renderable destination format, if any.
    pub fn pixel_format(self) -> Option<PixelFormat> {
        match self {
            HostBitmapFormat::Rgba8888 => Some(PixelFormat::Rgba8888),
            HostBitmapFormat::Rgb565 => Some(PixelFormat::Rgb565),
            _ => None,
        }
    }
}

/// Dimensions and format of a host bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapInfo {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub format: HostBitmapFormat,
}

/// An offscreen host bitmap.
pub trait HostBitmap: PixelLock {
    fn info(&self) -> Result<BitmapInfo, SurfaceError>;
}

/// Scoped pixel lock; unlocks on drop.
pub struct LockGuard<'a, L: PixelLock + ?Sized> {
    inner: &'a mut L,
}

impl<'a, L: PixelLock + ?Sized> LockGuard<'a, L> {
    /// Lock `inner`, logging and returning the OS error on failure.
    pub fn acquire(inner: &'a mut L) -> Result<Self, SurfaceError> {
        if let Err(e) = inner.lock() {
            tracing::error!("{}", e);
            return Err(e);
        }
        Ok(Self { inner })
    }

    /// The locked pixels.
    pub fn target(&mut self) -> Result<RasterTarget<'_>, SurfaceError> {
        self.inner
            .locked_target()
            .ok_or_else(|| SurfaceError::LockFailed("locked buffer unavailable".to_string()))
    }
}

impl<L: PixelLock + ?Sized> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        self.inner.unlock();
    }
}

/// In-memory on-screen surface, for headless hosts and tests.
#[derive(Debug, Clone)]
pub struct MemorySurface {
    width: u32,
    height: u32,
    format: WindowFormat,
    pixels: Vec<u8>,
    locked: bool,
    lock_calls: usize,
    unlock_calls: usize,
    fail_lock: bool,
    fail_geometry: bool,
    window_released: bool,
}

impl MemorySurface {
    /// An RGBA_8888 surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_format(width, height, WindowFormat::Rgba8888)
    }

    /// A surface starting in `format`.
    pub fn with_format(width: u32, height: u32, format: WindowFormat) -> Self {
        let pixels = vec![0; Self::stride_for(width, format) * height as usize];
        Self {
            width,
            height,
            format,
            pixels,
            locked: false,
            lock_calls: 0,
            unlock_calls: 0,
            fail_lock: false,
            fail_geometry: false,
            window_released: false,
        }
    }

    fn stride_for(width: u32, format: WindowFormat) -> usize {
        match format {
            WindowFormat::Rgb565 => width as usize * 2,
            _ => width as usize * 4,
        }
    }

    /// Make subsequent `lock` calls fail.
    pub fn set_fail_lock(&mut self, fail: bool) {
        self.fail_lock = fail;
    }

    /// Make subsequent format changes fail.
    pub fn set_fail_geometry(&mut self, fail: bool) {
        self.fail_geometry = fail;
    }

    /// Drop the native window behind this surface, as a host does when its
    /// view is destroyed. Locks and format changes fail afterwards.
    pub fn release_window(&mut self) {
        self.window_released = true;
    }

    pub fn stride(&self) -> usize {
        Self::stride_for(self.width, self.format)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock_calls(&self) -> usize {
        self.lock_calls
    }

    pub fn unlock_calls(&self) -> usize {
        self.unlock_calls
    }

    /// RGBA bytes of one pixel (RGBA_8888 surfaces only).
    pub fn rgba_at(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if self.format != WindowFormat::Rgba8888 || x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride() + x as usize * 4;
        let px = self.pixels.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl PixelLock for MemorySurface {
    fn lock(&mut self) -> Result<(), SurfaceError> {
        self.lock_calls += 1;
        if self.window_released {
            return Err(SurfaceError::WindowUnavailable);
        }
        if self.fail_lock {
            return Err(SurfaceError::LockFailed("injected failure".to_string()));
        }
        if self.locked {
            return Err(SurfaceError::LockFailed("surface already locked".to_string()));
        }
        self.locked = true;
        Ok(())
    }

    fn locked_target(&mut self) -> Option<RasterTarget<'_>> {
        if !self.locked {
            return None;
        }
        let format = match self.format {
            WindowFormat::Rgba8888 | WindowFormat::Rgbx8888 => PixelFormat::Rgba8888,
            WindowFormat::Rgb565 => PixelFormat::Rgb565,
            WindowFormat::Other(_) => return None,
        };
        let stride = self.stride();
        RasterTarget::new(&mut self.pixels, self.width, self.height, stride, format).ok()
    }

    fn unlock(&mut self) {
        if self.locked {
            self.locked = false;
            self.unlock_calls += 1;
        }
    }
}

impl Surface for MemorySurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> WindowFormat {
        self.format
    }

    fn set_buffers_geometry(
        &mut self,
        width: u32,
        height: u32,
        format: WindowFormat,
    ) -> Result<(), SurfaceError> {
        if self.window_released {
            return Err(SurfaceError::WindowUnavailable);
        }
        if self.fail_geometry {
            return Err(SurfaceError::FormatNegotiation("injected failure".to_string()));
        }
        self.width = width;
        self.height = height;
        self.format = format;
        self.pixels = vec![0; Self::stride_for(width, format) * height as usize];
        Ok(())
    }
}

/// In-memory host bitmap, for headless hosts and tests.
#[derive(Debug, Clone)]
pub struct MemoryBitmap {
    width: u32,
    height: u32,
    stride: usize,
    format: HostBitmapFormat,
    pixels: Vec<u8>,
    locked: bool,
    lock_calls: usize,
    unlock_calls: usize,
    fail_lock: bool,
    fail_info: bool,
}

impl MemoryBitmap {
    /// A tightly packed bitmap.
    pub fn new(width: u32, height: u32, format: HostBitmapFormat) -> Self {
        let bpp = match format {
            HostBitmapFormat::Rgba8888 => 4,
            HostBitmapFormat::Rgb565 => 2,
            _ => 1,
        };
        Self::with_stride(width, height, width as usize * bpp, format)
    }

    /// A bitmap whose rows are `stride` bytes apart.
    pub fn with_stride(width: u32, height: u32, stride: usize, format: HostBitmapFormat) -> Self {
        Self {
            width,
            height,
            stride,
            format,
            pixels: vec![0; stride * height as usize],
            locked: false,
            lock_calls: 0,
            unlock_calls: 0,
            fail_lock: false,
            fail_info: false,
        }
    }

    /// Make subsequent `lock` calls fail.
    pub fn set_fail_lock(&mut self, fail: bool) {
        self.fail_lock = fail;
    }

    /// Make subsequent `info` calls fail.
    pub fn set_fail_info(&mut self, fail: bool) {
        self.fail_info = fail;
    }

    /// Fill every byte, padding included.
    pub fn fill_bytes(&mut self, value: u8) {
        self.pixels.fill(value);
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock_calls(&self) -> usize {
        self.lock_calls
    }

    pub fn unlock_calls(&self) -> usize {
        self.unlock_calls
    }

    /// RGBA bytes of one pixel (RGBA_8888 bitmaps only).
    pub fn rgba_at(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if self.format != HostBitmapFormat::Rgba8888 || x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride + x as usize * 4;
        let px = self.pixels.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Packed value of one pixel (RGB_565 bitmaps only).
    pub fn rgb565_at(&self, x: u32, y: u32) -> Option<u16> {
        if self.format != HostBitmapFormat::Rgb565 || x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride + x as usize * 2;
        let px = self.pixels.get(offset..offset + 2)?;
        Some(u16::from_le_bytes([px[0], px[1]]))
    }
}

impl PixelLock for MemoryBitmap {
    fn lock(&mut self) -> Result<(), SurfaceError> {
        self.lock_calls += 1;
        if self.fail_lock {
            return Err(SurfaceError::LockFailed("injected failure".to_string()));
        }
        self.locked = true;
        Ok(())
    }

    fn locked_target(&mut self) -> Option<RasterTarget<'_>> {
        if !self.locked {
            return None;
        }
        let format = self.format.pixel_format()?;
        RasterTarget::new(&mut self.pixels, self.width, self.height, self.stride, format).ok()
    }

    fn unlock(&mut self) {
        if self.locked {
            self.locked = false;
            self.unlock_calls += 1;
        }
    }
}

impl HostBitmap for MemoryBitmap {
    fn info(&self) -> Result<BitmapInfo, SurfaceError> {
        if self.fail_info {
            return Err(SurfaceError::InfoUnavailable("injected failure".to_string()));
        }
        Ok(BitmapInfo {
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: self.format,
        })
    }
}
