//! Page rasterization and compositing
//!
//! Every render follows the same sequence on the calling thread:
//!
//! 1. bind the destination as an engine bitmap (RGB 565 destinations get an
//!    intermediate 3-byte scratch bitmap)
//! 2. fill the canvas color when the page does not cover the whole canvas
//! 3. fill the page color over the clamped draw rectangle
//! 4. rasterize the page with the transform and unclamped clip
//! 5. draw form fields through a short-lived form-fill environment
//! 6. convert the scratch bitmap to RGB 565
//! 7. release the destination lock
//!
//! Host surface and bitmap locks are held by a [`LockGuard`], so step 7
//! runs on every exit path.

use crate::bitmap::{BitmapFormat, EngineBitmap};
use crate::color::{convert_rgb_to_565, rgb_from_565};
use crate::engine::RenderFlags;
use crate::error::{PdfError, Result, SurfaceError};
use crate::page::Page;
use crate::surface::{ensure_rgba_format, HostBitmap, LockGuard, PixelFormat, RasterTarget, Surface};
use crate::transform::{ClipRect, Matrix, Placement};
use std::path::Path;

/// Compositing options shared by all render calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    render_annotations: bool,
    canvas_color: u32,
    page_color: u32,
}

impl RenderOptions {
    /// Create options that render page content only, without fills.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also render annotations and interactive form fields.
    pub fn set_render_annotations(mut self, render: bool) -> Self {
        self.render_annotations = render;
        self
    }

    /// ARGB color for canvas areas the page does not cover (0 = no fill).
    pub fn set_canvas_color(mut self, argb: u32) -> Self {
        self.canvas_color = argb;
        self
    }

    /// ARGB color painted under the page content (0 = no fill).
    pub fn set_page_color(mut self, argb: u32) -> Self {
        self.page_color = argb;
        self
    }

    pub fn render_annotations(&self) -> bool {
        self.render_annotations
    }

    pub fn canvas_color(&self) -> u32 {
        self.canvas_color
    }

    pub fn page_color(&self) -> u32 {
        self.page_color
    }

    fn flags(&self) -> RenderFlags {
        if self.render_annotations {
            RenderFlags::REVERSE_BYTE_ORDER | RenderFlags::ANNOT
        } else {
            RenderFlags::REVERSE_BYTE_ORDER
        }
    }
}

/// Configuration for rendering a page into a new buffer.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    dpi: f64,
    pixel_format: PixelFormat,
    options: RenderOptions,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dpi: 72.0,
            pixel_format: PixelFormat::Rgba8888,
            options: RenderOptions::new().set_page_color(0xffff_ffff),
        }
    }
}

impl RenderConfig {
    /// Create a new render configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target DPI for rendering.
    ///
    /// Default: 72 DPI (one pixel per point)
    pub fn set_target_dpi(mut self, dpi: f64) -> Self {
        self.dpi = dpi;
        self
    }

    /// Set the pixel format for the output buffer.
    ///
    /// Default: RGBA 8888
    pub fn set_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Set the compositing options.
    ///
    /// Default: white page background, no annotations
    pub fn set_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Calculate output dimensions for a page.
    pub fn calculate_size(&self, page_width: f64, page_height: f64) -> (u32, u32) {
        let scale = self.dpi / 72.0;
        let width = (page_width * scale).round().max(0.0) as u32;
        let height = (page_height * scale).round().max(0.0) as u32;
        (width, height)
    }
}

/// A page rendered into a crate-owned buffer.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Page index (0-based).
    pub page_index: usize,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row stride in bytes.
    pub stride: usize,
    /// Raw pixel data.
    pub data: Vec<u8>,
    /// Pixel format.
    pub format: PixelFormat,
}

impl RenderedPage {
    /// Get the total data size in bytes.
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// RGBA bytes of one pixel, whatever the storage format.
    pub fn rgba_at(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let offset = y as usize * self.stride + x as usize * bpp;
        let px = self.data.get(offset..offset + bpp)?;
        Some(match self.format {
            PixelFormat::Rgba8888 => [px[0], px[1], px[2], px[3]],
            PixelFormat::Rgb565 => {
                let (r, g, b) = rgb_from_565(u16::from_le_bytes([px[0], px[1]]));
                [r, g, b, 0xff]
            }
        })
    }

    /// Save the rendered page as a PNG file.
    pub fn save_as_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        use png::{BitDepth, ColorType, Encoder};
        use std::fs::File;
        use std::io::BufWriter;

        let file = File::create(path)?;
        let writer = BufWriter::new(file);

        let (color_type, data) = match self.format {
            PixelFormat::Rgba8888 => {
                let row = self.width as usize * 4;
                let mut rgba = Vec::with_capacity(row * self.height as usize);
                for y in 0..self.height as usize {
                    let start = y * self.stride;
                    rgba.extend_from_slice(&self.data[start..start + row]);
                }
                (ColorType::Rgba, rgba)
            }
            PixelFormat::Rgb565 => {
                let mut rgb = Vec::with_capacity((self.width * self.height * 3) as usize);
                for y in 0..self.height as usize {
                    for x in 0..self.width as usize {
                        let offset = y * self.stride + x * 2;
                        let packed = u16::from_le_bytes([self.data[offset], self.data[offset + 1]]);
                        let (r, g, b) = rgb_from_565(packed);
                        rgb.extend_from_slice(&[r, g, b]);
                    }
                }
                (ColorType::Rgb, rgb)
            }
        };

        let mut encoder = Encoder::new(writer, self.width, self.height);
        encoder.set_color(color_type);
        encoder.set_depth(BitDepth::Eight);

        let mut png_writer = encoder
            .write_header()
            .map_err(|e| PdfError::PngEncoding(e.to_string()))?;

        png_writer
            .write_image_data(&data)
            .map_err(|e| PdfError::PngEncoding(e.to_string()))?;

        Ok(())
    }
}

/// One page placed on the canvas.
#[derive(Clone, Copy)]
struct Job<'p> {
    page: &'p Page,
    placement: Placement,
}

impl Job<'_> {
    /// Whether the requested draw size leaves part of a `width` x `height`
    /// canvas uncovered.
    fn leaves_canvas_uncovered(&self, width: u32, height: u32) -> bool {
        let (draw_width, draw_height) = match self.placement {
            Placement::Viewport(viewport) => (i64::from(viewport.size_x), i64::from(viewport.size_y)),
            Placement::Matrix { clip, .. } => (clip.width() as i64, clip.height() as i64),
        };
        draw_width < i64::from(width) || draw_height < i64::from(height)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CanvasFill {
    /// Fill when the page leaves part of the canvas uncovered.
    Letterbox,
    /// Fill whenever a canvas color is set.
    Always,
}

/// Composite `jobs` into `target`. A `None` job aborts the call.
fn composite(
    target: &mut RasterTarget<'_>,
    jobs: &[Option<Job<'_>>],
    options: &RenderOptions,
    canvas: CanvasFill,
) -> Result<()> {
    let (width, height) = (target.width(), target.height());
    match target.format() {
        PixelFormat::Rgba8888 => {
            let stride = target.stride();
            let mut bitmap = EngineBitmap::new(
                target.pixels_mut(),
                width,
                height,
                stride,
                BitmapFormat::Bgra,
                true,
            )?;
            paint(&mut bitmap, jobs, options, canvas)
        }
        PixelFormat::Rgb565 => {
            let scratch_stride = width as usize * 3;
            let scratch_len = scratch_stride * height as usize;
            let mut scratch = Vec::new();
            if scratch.try_reserve_exact(scratch_len).is_err() {
                tracing::error!("Cannot allocate {} byte scratch bitmap", scratch_len);
                return Err(PdfError::OutOfMemory);
            }
            scratch.resize(scratch_len, 0u8);

            {
                let mut bitmap = EngineBitmap::new(
                    &mut scratch,
                    width,
                    height,
                    scratch_stride,
                    BitmapFormat::Bgr,
                    true,
                )?;
                paint(&mut bitmap, jobs, options, canvas)?;
            }

            let dest_stride = target.stride();
            convert_rgb_to_565(
                &scratch,
                scratch_stride,
                target.pixels_mut(),
                dest_stride,
                width as usize,
                height as usize,
            );
            Ok(())
        }
    }
}

fn paint(
    bitmap: &mut EngineBitmap<'_>,
    jobs: &[Option<Job<'_>>],
    options: &RenderOptions,
    canvas: CanvasFill,
) -> Result<()> {
    let (width, height) = (bitmap.width(), bitmap.height());

    if options.canvas_color != 0 {
        let fill = match canvas {
            CanvasFill::Always => true,
            CanvasFill::Letterbox => jobs
                .iter()
                .flatten()
                .any(|job| job.leaves_canvas_uncovered(width, height)),
        };
        if fill {
            bitmap.fill_rect(0, 0, width as i32, height as i32, options.canvas_color);
        }
    }

    let flags = options.flags();
    for (position, job) in jobs.iter().enumerate() {
        let Some(job) = job else {
            tracing::error!("Render page pointers invalid (batch position {})", position);
            return Err(PdfError::InvalidHandle { kind: "page" });
        };

        if options.page_color != 0 {
            let base = job.placement.clip().clamp_to(width, height);
            bitmap.fill_draw_rect(base, options.page_color);
        }

        let engine_page = job.page.engine_page();
        engine_page.render(bitmap, &job.placement, flags);

        if options.render_annotations {
            // The environment is torn down when `form` drops at the end of this block.
            if let Some(form) = job.page.document().engine.init_form_fill() {
                form.draw(bitmap, engine_page, &job.placement, flags);
            }
        }
    }
    Ok(())
}

fn composite_locked<L>(
    guard: &mut LockGuard<'_, L>,
    jobs: &[Option<Job<'_>>],
    options: &RenderOptions,
    canvas: CanvasFill,
) -> Result<()>
where
    L: crate::surface::PixelLock + ?Sized,
{
    let mut target = guard.target().inspect_err(|e| tracing::error!("{}", e))?;
    composite(&mut target, jobs, options, canvas)
}

fn batch_jobs<'p>(
    pages: &[Option<&'p Page>],
    matrices: &[Matrix],
    clips: &[ClipRect],
) -> Result<Vec<Option<Job<'p>>>> {
    if pages.len() != matrices.len() || pages.len() != clips.len() {
        tracing::error!(
            "Batch arrays misaligned: {} pages, {} matrices, {} clips",
            pages.len(),
            matrices.len(),
            clips.len()
        );
        return Err(PdfError::InvalidParameter(
            "pages, matrices and clips must have equal length".to_string(),
        ));
    }
    Ok(pages
        .iter()
        .zip(matrices.iter().zip(clips))
        .map(|(page, (matrix, clip))| {
            page.map(|page| Job {
                page,
                placement: Placement::Matrix {
                    matrix: *matrix,
                    clip: *clip,
                },
            })
        })
        .collect())
}

impl Page {
    /// Render into an already-locked buffer.
    ///
    /// The caller owns the buffer and its lock; see [`LockGuard`].
    pub fn render_into(
        &self,
        target: &mut RasterTarget<'_>,
        placement: &Placement,
        options: &RenderOptions,
    ) -> Result<()> {
        let job = Job {
            page: self,
            placement: *placement,
        };
        composite(target, &[Some(job)], options, CanvasFill::Letterbox)
    }

    /// Render into a host bitmap, locking it for the duration of the call.
    ///
    /// Only RGBA_8888 and RGB_565 bitmaps are accepted.
    pub fn render_to_bitmap<B: HostBitmap + ?Sized>(
        &self,
        bitmap: &mut B,
        placement: &Placement,
        options: &RenderOptions,
    ) -> Result<()> {
        let info = bitmap.info().inspect_err(|e| tracing::error!("{}", e))?;
        if info.format.pixel_format().is_none() {
            tracing::error!("Bitmap format must be RGBA_8888 or RGB_565");
            return Err(SurfaceError::UnsupportedFormat.into());
        }

        let mut guard = LockGuard::acquire(bitmap)?;
        let job = Job {
            page: self,
            placement: *placement,
        };
        composite_locked(&mut guard, &[Some(job)], options, CanvasFill::Letterbox)
    }

    /// Render into an on-screen surface, switching it to RGBA_8888 first if
    /// needed. The frame is posted when the lock is released.
    pub fn render_to_surface<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        placement: &Placement,
        options: &RenderOptions,
    ) -> Result<()> {
        ensure_rgba_format(surface).inspect_err(|e| tracing::error!("{}", e))?;
        let mut guard = LockGuard::acquire(surface)?;
        let job = Job {
            page: self,
            placement: *placement,
        };
        composite_locked(&mut guard, &[Some(job)], options, CanvasFill::Letterbox)
    }

    /// Render the whole page into a new buffer.
    ///
    /// # Example
    ///
    /// ```
    /// use pdfsurface::{Library, ReferenceDocumentBuilder, ReferenceEngine, RenderConfig};
    /// use std::sync::Arc;
    ///
    /// let library = Library::new(Arc::new(ReferenceEngine::new()));
    /// let bytes = ReferenceDocumentBuilder::new()
    ///     .page(100.0, 50.0)
    ///     .fill(0.0, 0.0, 50.0, 50.0, 0xffff0000)
    ///     .build();
    /// let doc = library.open_memory(&bytes, None)?;
    ///
    /// let rendered = doc.page(0)?.render(&RenderConfig::new().set_target_dpi(144.0))?;
    /// assert_eq!((rendered.width, rendered.height), (200, 100));
    /// assert_eq!(rendered.rgba_at(10, 10), Some([0xff, 0, 0, 0xff]));
    /// # Ok::<(), pdfsurface::PdfError>(())
    /// ```
    pub fn render(&self, config: &RenderConfig) -> Result<RenderedPage> {
        let dpi = config.dpi();
        if !dpi.is_finite() || dpi <= 0.0 {
            return Err(PdfError::InvalidParameter(format!("target dpi {}", dpi)));
        }
        let (width, height) =
            config.calculate_size(f64::from(self.width()), f64::from(self.height()));
        let format = config.pixel_format();
        let stride = (width as usize).checked_mul(format.bytes_per_pixel());
        let len = stride.and_then(|stride| stride.checked_mul(height as usize));
        let (Some(stride), Some(len)) = (stride, len) else {
            tracing::error!("Page buffer of {}x{} pixels overflows", width, height);
            return Err(PdfError::OutOfMemory);
        };

        let mut data = Vec::new();
        if data.try_reserve_exact(len).is_err() {
            tracing::error!("Cannot allocate {} byte page buffer", len);
            return Err(PdfError::OutOfMemory);
        }
        data.resize(len, 0u8);

        {
            let mut target = RasterTarget::new(&mut data, width, height, stride, format)?;
            let placement = Placement::offset(0, 0, width as i32, height as i32);
            self.render_into(&mut target, &placement, config.options())?;
        }

        Ok(RenderedPage {
            page_index: self.index(),
            width,
            height,
            stride,
            data,
            format,
        })
    }
}

/// Render several pages into one locked buffer, each with its own matrix
/// and clip.
///
/// The canvas color, if set, is filled once before the first page. A `None`
/// page aborts the batch; pages before it stay drawn.
pub fn render_pages_into(
    target: &mut RasterTarget<'_>,
    pages: &[Option<&Page>],
    matrices: &[Matrix],
    clips: &[ClipRect],
    options: &RenderOptions,
) -> Result<()> {
    let jobs = batch_jobs(pages, matrices, clips)?;
    composite(target, &jobs, options, CanvasFill::Always)
}

/// Render several pages into an on-screen surface (continuous scroll).
///
/// Same rules as [`render_pages_into`]; the surface is unlocked and posted on
/// every exit path.
pub fn render_pages_to_surface<S: Surface + ?Sized>(
    surface: &mut S,
    pages: &[Option<&Page>],
    matrices: &[Matrix],
    clips: &[ClipRect],
    options: &RenderOptions,
) -> Result<()> {
    let jobs = batch_jobs(pages, matrices, clips)?;
    ensure_rgba_format(surface).inspect_err(|e| tracing::error!("{}", e))?;
    let mut guard = LockGuard::acquire(surface)?;
    composite_locked(&mut guard, &jobs, options, CanvasFill::Always)
}
