//! Document handling

use crate::engine::{EngineDocument, SaveFlags, WriteBlock};
use crate::error::{PdfError, Result};
use crate::library::LibraryRef;
use crate::page::Page;
use crate::render::{RenderConfig, RenderedPage};
use crate::source::DocumentSource;
use rayon::prelude::*;
use std::ops::Range;
use std::sync::Arc;

/// An open document.
///
/// Cloning is cheap; clones share the same engine document. The engine
/// document is closed when the last clone and the last [`Page`] are dropped.
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

/// Fields drop in declaration order: the engine document closes first, then
/// the source reference is released, and the library use goes last.
pub(crate) struct DocumentInner {
    pub(crate) engine: Box<dyn EngineDocument>,
    source: Arc<DocumentSource>,
    _library: LibraryRef,
}

impl Drop for DocumentInner {
    fn drop(&mut self) {
        tracing::debug!("Closing {} document", self.source.kind());
    }
}

impl Document {
    pub(crate) fn new(
        engine: Box<dyn EngineDocument>,
        source: Arc<DocumentSource>,
        library: LibraryRef,
    ) -> Self {
        Self {
            inner: Arc::new(DocumentInner {
                engine,
                source,
                _library: library,
            }),
        }
    }

    /// Get the number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.inner.engine.page_count()
    }

    /// Where this document's bytes come from ("file", "memory" or "callback").
    pub fn source_kind(&self) -> &'static str {
        self.inner.source.kind()
    }

    /// Get a page by index (0-based).
    ///
    /// # Arguments
    ///
    /// * `index` - Page index (0-based)
    ///
    /// # Returns
    ///
    /// The page at the given index, or an error if the index is out of
    /// bounds or the engine cannot load it.
    pub fn page(&self, index: usize) -> Result<Page> {
        let count = self.page_count();
        if index >= count {
            return Err(PdfError::PageIndexOutOfBounds { index, count });
        }
        match self.inner.engine.load_page(index) {
            Ok(page) => Ok(Page::new(page, self.inner.clone(), index)),
            Err(e) => {
                tracing::error!("Loaded page {} is null: {}", index, e);
                Err(e.into())
            }
        }
    }

    /// Get an iterator over all pages in the document.
    ///
    /// Pages that fail to load end the iteration.
    pub fn pages(&self) -> Pages<'_> {
        Pages {
            doc: self,
            index: 0,
            count: self.page_count(),
        }
    }

    /// Load the pages `from..=to`.
    ///
    /// Either every page loads or none is returned.
    pub fn load_pages(&self, from: usize, to: usize) -> Result<Vec<Page>> {
        if to < from {
            return Err(PdfError::InvalidParameter(format!(
                "page range {}..={} is reversed",
                from, to
            )));
        }
        (from..=to).map(|index| self.page(index)).collect()
    }

    /// Size in pixels of page `index` at `dpi`, without loading the page.
    ///
    /// Returns `(0, 0)` when the engine cannot report the size.
    pub fn page_size_by_index(&self, index: usize, dpi: u32) -> (u32, u32) {
        match self.inner.engine.page_size(index) {
            Some((width, height)) => (points_to_pixels(width, dpi), points_to_pixels(height, dpi)),
            None => {
                tracing::error!("Document is null or page {} size unavailable", index);
                (0, 0)
            }
        }
    }

    /// Get document metadata.
    ///
    /// # Arguments
    ///
    /// * `tag` - Metadata key, e.g. "Title", "Author", "Producer"
    pub fn meta_text(&self, tag: &str) -> Option<String> {
        self.inner.engine.meta_text(tag)
    }

    /// Get the document title.
    pub fn title(&self) -> Option<String> {
        self.meta_text("Title")
    }

    /// Get the document author.
    pub fn author(&self) -> Option<String> {
        self.meta_text("Author")
    }

    /// Serialize the document into `writer`.
    ///
    /// The engine calls `writer` repeatedly; a negative return from it
    /// aborts the save.
    pub fn save_as_copy(&self, writer: &mut dyn WriteBlock, flags: SaveFlags) -> Result<()> {
        self.inner.engine.save_as_copy(writer, flags).map_err(|e| {
            tracing::error!("Save as copy failed: {}", e);
            PdfError::SaveFailed {
                reason: e.to_string(),
            }
        })
    }

    /// Save the document to a byte vector.
    ///
    /// # Example
    ///
    /// ```
    /// use pdfsurface::{Library, ReferenceDocumentBuilder, ReferenceEngine, SaveFlags};
    /// use std::sync::Arc;
    ///
    /// let library = Library::new(Arc::new(ReferenceEngine::new()));
    /// let bytes = ReferenceDocumentBuilder::new().page(200.0, 100.0).build();
    /// let doc = library.open_memory(&bytes, None)?;
    ///
    /// let copy = doc.save_to_bytes(SaveFlags::NO_INCREMENTAL)?;
    /// let reopened = library.open_memory(&copy, None)?;
    /// assert_eq!(reopened.page_count(), doc.page_count());
    /// # Ok::<(), pdfsurface::PdfError>(())
    /// ```
    pub fn save_to_bytes(&self, flags: SaveFlags) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.save_as_copy(&mut out, flags)?;
        Ok(out)
    }

    /// Render a range of pages in parallel.
    ///
    /// Each page is loaded and rendered on a rayon worker; results are
    /// ordered by page index.
    pub fn render_pages_parallel(
        &self,
        range: Range<usize>,
        config: &RenderConfig,
    ) -> Result<Vec<RenderedPage>> {
        let count = self.page_count();
        if range.end > count {
            return Err(PdfError::PageIndexOutOfBounds {
                index: range.end.saturating_sub(1),
                count,
            });
        }
        range
            .into_par_iter()
            .map(|index| self.page(index)?.render(config))
            .collect()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("source", &self.source_kind())
            .field("page_count", &self.page_count())
            .finish()
    }
}

/// Points (1/72 inch) to whole pixels at `dpi`, truncating.
pub(crate) fn points_to_pixels(points: f32, dpi: u32) -> u32 {
    (points * dpi as f32 / 72.0).max(0.0) as u32
}

/// Iterator over the pages of a document.
pub struct Pages<'a> {
    doc: &'a Document,
    index: usize,
    count: usize,
}

impl Iterator for Pages<'_> {
    type Item = Page;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let page = self.doc.page(self.index).ok()?;
        self.index += 1;
        Some(page)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.count - self.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{ReferenceDocumentBuilder, ReferenceEngine};
    use crate::Library;

    fn open(builder: ReferenceDocumentBuilder) -> Document {
        let library = Library::new(Arc::new(ReferenceEngine::new()));
        library.open_memory(&builder.build(), None).unwrap()
    }

    #[test]
    fn test_page_bounds() {
        let doc = open(ReferenceDocumentBuilder::new().page(10.0, 10.0));
        assert!(doc.page(0).is_ok());
        assert!(matches!(
            doc.page(1),
            Err(PdfError::PageIndexOutOfBounds { index: 1, count: 1 })
        ));
    }

    #[test]
    fn test_load_pages_inclusive() {
        let doc = open(
            ReferenceDocumentBuilder::new()
                .page(10.0, 10.0)
                .page(20.0, 20.0)
                .page(30.0, 30.0),
        );
        let pages = doc.load_pages(1, 2).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].index(), 1);
        assert!(doc.load_pages(2, 1).is_err());
        assert!(doc.load_pages(1, 3).is_err());
    }

    #[test]
    fn test_page_size_by_index() {
        let doc = open(ReferenceDocumentBuilder::new().page(612.0, 792.0));
        assert_eq!(doc.page_size_by_index(0, 72), (612, 792));
        assert_eq!(doc.page_size_by_index(0, 144), (1224, 1584));
        assert_eq!(doc.page_size_by_index(5, 72), (0, 0));
    }

    #[test]
    fn test_meta_text() {
        let doc = open(
            ReferenceDocumentBuilder::new()
                .meta("Title", "Quarterly report")
                .page(10.0, 10.0),
        );
        assert_eq!(doc.title().as_deref(), Some("Quarterly report"));
        assert_eq!(doc.author(), None);
    }

    #[test]
    fn test_pages_outlive_document_handle() {
        let doc = open(ReferenceDocumentBuilder::new().page(10.0, 20.0).text("kept"));
        let page = doc.page(0).unwrap();
        drop(doc);
        assert_eq!(page.text(), "kept");
    }

    #[test]
    fn test_failing_writer_reports_save_failure() {
        let doc = open(ReferenceDocumentBuilder::new().page(10.0, 10.0));
        let mut writer = |_: &[u8]| -1;
        assert!(matches!(
            doc.save_as_copy(&mut writer, SaveFlags::NO_INCREMENTAL),
            Err(PdfError::SaveFailed { .. })
        ));
    }
}
