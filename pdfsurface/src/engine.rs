//! Interface of the external document engine
//!
//! The engine parses documents and rasterizes page content. This crate only
//! consumes it: documents are opened through [`Engine`], pages are painted
//! into an [`EngineBitmap`] bound over caller memory, and form-field
//! appearances are drawn through a short-lived [`FormFillEnvironment`].

use crate::bitmap::EngineBitmap;
use crate::error::{EngineError, SourceError};
use crate::transform::{Placement, Rotation};
use std::any::Any;
use std::ops::BitOr;
use std::sync::Arc;

/// Flags passed to the engine's rasterize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderFlags(u32);

impl RenderFlags {
    /// Render annotation appearances.
    pub const ANNOT: RenderFlags = RenderFlags(0x01);
    /// Store pixels R, G, B(, A) instead of B, G, R(, A).
    pub const REVERSE_BYTE_ORDER: RenderFlags = RenderFlags(0x10);

    pub fn empty() -> Self {
        RenderFlags(0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: RenderFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RenderFlags {
    type Output = RenderFlags;

    fn bitor(self, rhs: RenderFlags) -> RenderFlags {
        RenderFlags(self.0 | rhs.0)
    }
}

/// Flags for [`EngineDocument::save_as_copy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveFlags(u32);

impl SaveFlags {
    pub const INCREMENTAL: SaveFlags = SaveFlags(1);
    pub const NO_INCREMENTAL: SaveFlags = SaveFlags(2);
    pub const REMOVE_SECURITY: SaveFlags = SaveFlags(3);

    pub fn bits(self) -> u32 {
        self.0
    }
}

/// Sink for serialized document bytes.
pub trait WriteBlock {
    /// Accept `data`; return the number of bytes accepted, or a negative
    /// value on error.
    fn write_block(&mut self, data: &[u8]) -> i32;
}

impl<F: FnMut(&[u8]) -> i32> WriteBlock for F {
    fn write_block(&mut self, data: &[u8]) -> i32 {
        self(data)
    }
}

impl WriteBlock for Vec<u8> {
    fn write_block(&mut self, data: &[u8]) -> i32 {
        self.extend_from_slice(data);
        i32::try_from(data.len()).unwrap_or(i32::MAX)
    }
}

/// Random-access byte supply the engine parses from.
pub trait BlockSource: Send + Sync {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `out` with bytes starting at `position`.
    ///
    /// Returns the number of bytes read. A short read is still a success.
    fn get_block(&self, position: u64, out: &mut [u8]) -> Result<usize, SourceError>;
}

/// Process-wide document engine.
pub trait Engine: Send + Sync {
    /// One-time library initialization.
    fn init_library(&self);

    /// Library teardown; no documents may be open.
    fn destroy_library(&self);

    /// Open a document read through `source`.
    fn load_custom_document(
        &self,
        source: Arc<dyn BlockSource>,
        password: Option<&str>,
    ) -> Result<Box<dyn EngineDocument>, EngineError>;

    /// Open a document from bytes that outlive it.
    fn load_mem_document(
        &self,
        data: Arc<[u8]>,
        password: Option<&str>,
    ) -> Result<Box<dyn EngineDocument>, EngineError>;
}

/// An open engine document.
pub trait EngineDocument: Send + Sync {
    fn page_count(&self) -> usize;

    fn load_page(&self, index: usize) -> Result<Box<dyn EnginePage>, EngineError>;

    /// Page size in points without loading the page.
    fn page_size(&self, index: usize) -> Option<(f32, f32)>;

    /// Document metadata value for `tag` (e.g. "Title").
    fn meta_text(&self, tag: &str) -> Option<String>;

    /// Start a form-fill environment for this document.
    ///
    /// Returns `None` when the document has no interactive form.
    fn init_form_fill(&self) -> Option<Box<dyn FormFillEnvironment + '_>>;

    /// Serialize the document into `writer`.
    fn save_as_copy(&self, writer: &mut dyn WriteBlock, flags: SaveFlags) -> Result<(), EngineError>;
}

/// A loaded engine page.
pub trait EnginePage: Send + Sync {
    /// Width in points.
    fn width(&self) -> f32;

    /// Height in points.
    fn height(&self) -> f32;

    fn rotation(&self) -> Rotation;

    fn text(&self) -> String;

    /// Rasterize page content into `bitmap`.
    ///
    /// `placement` carries the unclamped transform and clip; the engine clips
    /// against the bitmap itself.
    fn render(&self, bitmap: &mut EngineBitmap<'_>, placement: &Placement, flags: RenderFlags);

    /// Lets a form-fill environment recover its engine's concrete page type.
    fn as_any(&self) -> &dyn Any;
}

/// A form-fill environment; dropping it tears the environment down.
pub trait FormFillEnvironment {
    /// Draw form-field appearances of `page`.
    fn draw(
        &self,
        bitmap: &mut EngineBitmap<'_>,
        page: &dyn EnginePage,
        placement: &Placement,
        flags: RenderFlags,
    );
}
