//! Page handling

use crate::document::{points_to_pixels, DocumentInner};
use crate::engine::EnginePage;
use crate::transform::{self, Rotation, Viewport};
use std::sync::Arc;

/// A loaded page.
///
/// The page keeps its document open; it can never outlive it.
pub struct Page {
    engine: Box<dyn EnginePage>,
    doc: Arc<DocumentInner>,
    index: usize,
}

impl Page {
    pub(crate) fn new(engine: Box<dyn EnginePage>, doc: Arc<DocumentInner>, index: usize) -> Self {
        Self { engine, doc, index }
    }

    pub(crate) fn engine_page(&self) -> &dyn EnginePage {
        self.engine.as_ref()
    }

    pub(crate) fn document(&self) -> &DocumentInner {
        &self.doc
    }

    /// Get the page index (0-based).
    pub fn index(&self) -> usize {
        self.index
    }

    /// Get the page width in points (1/72 inch).
    pub fn width(&self) -> f32 {
        self.engine.width()
    }

    /// Get the page height in points (1/72 inch).
    pub fn height(&self) -> f32 {
        self.engine.height()
    }

    /// Get the page size as (width, height) in points.
    pub fn size(&self) -> (f32, f32) {
        (self.width(), self.height())
    }

    /// Get the page width in whole pixels at `dpi`.
    pub fn width_pixels(&self, dpi: u32) -> u32 {
        points_to_pixels(self.width(), dpi)
    }

    /// Get the page height in whole pixels at `dpi`.
    pub fn height_pixels(&self, dpi: u32) -> u32 {
        points_to_pixels(self.height(), dpi)
    }

    /// Get the page's intrinsic rotation.
    pub fn rotation(&self) -> Rotation {
        self.engine.rotation()
    }

    /// Get the page's text content.
    pub fn text(&self) -> String {
        self.engine.text()
    }

    /// Map a page-space point to device coordinates within `viewport`.
    pub fn page_to_device(&self, viewport: &Viewport, page_x: f64, page_y: f64) -> (i32, i32) {
        transform::page_to_device(self.width(), self.height(), viewport, page_x, page_y)
    }

    /// Map a device point within `viewport` back to page space.
    ///
    /// Returns `(-1.0, -1.0)` when the mapping fails; treat that as
    /// "outside the page", not as a coordinate.
    pub fn device_to_page(&self, viewport: &Viewport, device_x: i32, device_y: i32) -> (f64, f64) {
        match transform::device_to_page(self.width(), self.height(), viewport, device_x, device_y) {
            Some(point) => point,
            None => {
                tracing::debug!(
                    "Device point ({}, {}) not mappable on page {}",
                    device_x,
                    device_y,
                    self.index
                );
                (-1.0, -1.0)
            }
        }
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("index", &self.index)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::reference::{ReferenceDocumentBuilder, ReferenceEngine};
    use crate::transform::{Rotation, Viewport};
    use crate::Library;
    use std::sync::Arc;

    #[test]
    fn test_page_dimensions() {
        let library = Library::new(Arc::new(ReferenceEngine::new()));
        let bytes = ReferenceDocumentBuilder::new()
            .page_rotated(595.0, 842.0, 1)
            .build();
        let doc = library.open_memory(&bytes, None).unwrap();
        let page = doc.page(0).unwrap();

        assert_eq!(page.size(), (595.0, 842.0));
        assert_eq!(page.width_pixels(72), 595);
        assert_eq!(page.height_pixels(150), 1754);
        assert_eq!(page.rotation(), Rotation::Clockwise90);
    }

    #[test]
    fn test_coordinate_mapping() {
        let library = Library::new(Arc::new(ReferenceEngine::new()));
        let bytes = ReferenceDocumentBuilder::new().page(100.0, 200.0).build();
        let doc = library.open_memory(&bytes, None).unwrap();
        let page = doc.page(0).unwrap();
        let viewport = Viewport::new(0, 0, 100, 200, Rotation::Upright);

        assert_eq!(page.page_to_device(&viewport, 0.0, 0.0), (0, 200));
        assert_eq!(page.page_to_device(&viewport, 100.0, 200.0), (100, 0));

        let (x, y) = page.device_to_page(&viewport, 50, 50);
        assert!((x - 50.0).abs() < 1e-3);
        assert!((y - 150.0).abs() < 1e-3);

        let collapsed = Viewport::new(0, 0, 0, 0, Rotation::Upright);
        assert_eq!(page.device_to_page(&collapsed, 5, 5), (-1.0, -1.0));
    }
}
