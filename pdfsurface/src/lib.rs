//! # pdfsurface
//!
//! Page rasterization and compositing on top of a pluggable document engine.
//!
//! This crate sits between a host UI and a paged-document engine:
//!
//! - **Counted library lifecycle**: the engine is initialized on the first
//!   open and torn down after the last document closes
//! - **Document sources**: file descriptors, owned memory, or caller
//!   callbacks read from engine worker threads with runtime attach/detach
//! - **Compositing** into locked host surfaces and bitmaps (RGBA_8888 and
//!   RGB_565), including multi-page batches with per-page matrix and clip
//! - **Coordinate mapping** between page space and device space
//!
//! ## Quick Start
//!
//! ```
//! use pdfsurface::{
//!     Library, MemorySurface, Placement, ReferenceDocumentBuilder, ReferenceEngine, RenderOptions,
//!     Rotation, Viewport,
//! };
//! use std::sync::Arc;
//!
//! let library = Library::new(Arc::new(ReferenceEngine::new()));
//! let bytes = ReferenceDocumentBuilder::new()
//!     .meta("Title", "Report")
//!     .page(200.0, 100.0)
//!     .fill(0.0, 0.0, 100.0, 100.0, 0xff336699)
//!     .build();
//! let doc = library.open_memory(&bytes, None)?;
//! assert_eq!(doc.title().as_deref(), Some("Report"));
//!
//! let page = doc.page(0)?;
//! let mut surface = MemorySurface::new(200, 100);
//! let placement = Placement::Viewport(Viewport::new(0, 0, 200, 100, Rotation::Upright));
//! page.render_to_surface(&mut surface, &placement, &RenderOptions::new())?;
//! assert_eq!(surface.rgba_at(10, 10), Some([0x33, 0x66, 0x99, 0xff]));
//! # Ok::<(), pdfsurface::PdfError>(())
//! ```

mod bitmap;
mod color;
mod document;
mod engine;
mod error;
mod handle;
mod library;
mod page;
mod reference;
mod render;
mod session;
mod source;
mod surface;
mod transform;

pub use bitmap::{BitmapFormat, EngineBitmap};
pub use color::{argb_channels, convert_rgb_to_565, rgb_from_565, rgb_to_565};
pub use document::{Document, Pages};
pub use engine::{
    BlockSource, Engine, EngineDocument, EnginePage, FormFillEnvironment, RenderFlags, SaveFlags,
    WriteBlock,
};
pub use error::{EngineError, PdfError, Result, SourceError, SurfaceError};
pub use handle::{Handle, HandleTable};
pub use library::Library;
pub use page::Page;
pub use reference::{ReferenceDocumentBuilder, ReferenceEngine};
pub use render::{
    render_pages_into, render_pages_to_surface, RenderConfig, RenderOptions, RenderedPage,
};
pub use session::{DocumentHandle, PageHandle, Session, SessionPage};
pub use source::{
    AttachGuard, ByteSourceBridge, CallbackSource, DocumentSource, FileSource, NativeRuntime,
    ReaderSourceBridge, RuntimeAttach, SourceBridge, ThreadRegistry,
};
pub use surface::{
    ensure_rgba_format, BitmapInfo, HostBitmap, HostBitmapFormat, LockGuard, MemoryBitmap,
    MemorySurface, PixelFormat, PixelLock, RasterTarget, Surface, WindowFormat,
};
pub use transform::{
    device_to_page, page_to_device, ClipRect, DrawRect, Matrix, Placement, Rotation, Viewport,
};
