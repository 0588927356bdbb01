//! Handle-addressed facade for hosts across an FFI or runtime boundary
//!
//! A [`Session`] owns every document and page it opens and hands out
//! [`DocumentHandle`]s and [`PageHandle`]s. Open and query calls return
//! named errors; render calls return a plain `bool`, since they run every
//! frame and their failures are transient and logged where detected.

use crate::document::Document;
use crate::engine::{SaveFlags, WriteBlock};
use crate::error::{PdfError, Result};
use crate::handle::{Handle, HandleTable};
use crate::library::Library;
use crate::page::Page;
use crate::render::{self, RenderOptions};
use crate::source::{RuntimeAttach, SourceBridge};
use crate::surface::{HostBitmap, RasterTarget, Surface};
use crate::transform::{ClipRect, Matrix, Placement, Rotation, Viewport};
use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle to a document opened through a [`Session`].
pub type DocumentHandle = Handle<Document>;

/// Handle to a page loaded through a [`Session`].
pub type PageHandle = Handle<SessionPage>;

/// A page owned by a session, remembering which document it came from.
pub struct SessionPage {
    page: Page,
    document: DocumentHandle,
}

impl SessionPage {
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn document(&self) -> DocumentHandle {
        self.document
    }
}

/// Documents and pages addressed by opaque handle.
pub struct Session {
    library: Library,
    documents: Mutex<HandleTable<Document>>,
    pages: Mutex<HandleTable<SessionPage>>,
}

impl Session {
    pub fn new(library: Library) -> Self {
        Self {
            library,
            documents: Mutex::new(HandleTable::new()),
            pages: Mutex::new(HandleTable::new()),
        }
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    fn documents(&self) -> MutexGuard<'_, HandleTable<Document>> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pages(&self) -> MutexGuard<'_, HandleTable<SessionPage>> {
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn document(&self, handle: DocumentHandle) -> Result<Arc<Document>> {
        self.documents().get(handle).ok_or_else(|| {
            tracing::error!("Invalid document handle {:?}", handle);
            PdfError::InvalidHandle { kind: "document" }
        })
    }

    fn page(&self, handle: PageHandle) -> Result<Arc<SessionPage>> {
        self.pages().get(handle).ok_or_else(|| {
            tracing::error!("Invalid page handle {:?}", handle);
            PdfError::InvalidHandle { kind: "page" }
        })
    }

    fn register(&self, document: Document) -> DocumentHandle {
        self.documents().insert(document)
    }

    /// Open a document from a caller-owned file descriptor.
    pub fn open_file(&self, fd: RawFd, password: Option<&str>) -> Result<DocumentHandle> {
        let document = self.library.open_file(fd, password)?;
        Ok(self.register(document))
    }

    /// Open a document from a copy of `bytes`.
    pub fn open_memory(&self, bytes: &[u8], password: Option<&str>) -> Result<DocumentHandle> {
        let document = self.library.open_memory(bytes, password)?;
        Ok(self.register(document))
    }

    /// Open a document read through a caller object.
    pub fn open_custom(
        &self,
        bridge: Arc<dyn SourceBridge>,
        runtime: Arc<dyn RuntimeAttach>,
        password: Option<&str>,
        declared_length: i64,
    ) -> Result<DocumentHandle> {
        let document = self
            .library
            .open_custom(bridge, runtime, password, declared_length)?;
        Ok(self.register(document))
    }

    /// Close a document and every page loaded from it.
    ///
    /// Returns `false` for a stale handle.
    pub fn close_document(&self, handle: DocumentHandle) -> bool {
        let Some(document) = self.documents().remove(handle) else {
            tracing::error!("Close of invalid document handle {:?}", handle);
            return false;
        };
        let pages = self.pages().remove_where(|entry| entry.document == handle);
        tracing::debug!("Closing document {:?} with {} open pages", handle, pages.len());
        drop(pages);
        drop(document);
        true
    }

    /// Number of documents currently open.
    pub fn document_count(&self) -> usize {
        self.documents().len()
    }

    /// Number of pages currently loaded, across all documents.
    pub fn page_handle_count(&self) -> usize {
        self.pages().len()
    }

    pub fn page_count(&self, document: DocumentHandle) -> Result<usize> {
        Ok(self.document(document)?.page_count())
    }

    pub fn meta_text(&self, document: DocumentHandle, tag: &str) -> Result<Option<String>> {
        Ok(self.document(document)?.meta_text(tag))
    }

    pub fn page_size_by_index(
        &self,
        document: DocumentHandle,
        index: usize,
        dpi: u32,
    ) -> Result<(u32, u32)> {
        Ok(self.document(document)?.page_size_by_index(index, dpi))
    }

    /// Serialize a document into `writer`; `false` on any failure.
    pub fn save_as_copy(
        &self,
        document: DocumentHandle,
        writer: &mut dyn WriteBlock,
        flags: SaveFlags,
    ) -> bool {
        self.document(document)
            .and_then(|doc| doc.save_as_copy(writer, flags))
            .is_ok()
    }

    /// Load page `index`.
    pub fn load_page(&self, document: DocumentHandle, index: usize) -> Result<PageHandle> {
        let page = self.document(document)?.page(index)?;
        Ok(self.pages().insert(SessionPage { page, document }))
    }

    /// Load the pages `from..=to`; nothing is registered unless all load.
    pub fn load_pages(
        &self,
        document: DocumentHandle,
        from: usize,
        to: usize,
    ) -> Result<Vec<PageHandle>> {
        let pages = self.document(document)?.load_pages(from, to)?;
        let mut table = self.pages();
        Ok(pages
            .into_iter()
            .map(|page| table.insert(SessionPage { page, document }))
            .collect())
    }

    /// Close one page; `false` for a stale handle.
    pub fn close_page(&self, page: PageHandle) -> bool {
        if self.pages().remove(page).is_none() {
            tracing::error!("Close of invalid page handle {:?}", page);
            return false;
        }
        true
    }

    /// Close several pages; returns how many were live.
    pub fn close_pages(&self, pages: &[PageHandle]) -> usize {
        let mut table = self.pages();
        pages.iter().filter(|&&page| table.remove(page).is_some()).count()
    }

    /// Page size in points.
    pub fn page_size(&self, page: PageHandle) -> Result<(f32, f32)> {
        Ok(self.page(page)?.page.size())
    }

    /// Page size in whole pixels at `dpi`.
    pub fn page_size_pixels(&self, page: PageHandle, dpi: u32) -> Result<(u32, u32)> {
        let entry = self.page(page)?;
        Ok((entry.page.width_pixels(dpi), entry.page.height_pixels(dpi)))
    }

    pub fn page_rotation(&self, page: PageHandle) -> Result<Rotation> {
        Ok(self.page(page)?.page.rotation())
    }

    pub fn page_text(&self, page: PageHandle) -> Result<String> {
        Ok(self.page(page)?.page.text())
    }

    pub fn page_to_device(
        &self,
        page: PageHandle,
        viewport: &Viewport,
        page_x: f64,
        page_y: f64,
    ) -> Result<(i32, i32)> {
        Ok(self.page(page)?.page.page_to_device(viewport, page_x, page_y))
    }

    /// Device to page mapping; `(-1.0, -1.0)` means "outside the page".
    pub fn device_to_page(
        &self,
        page: PageHandle,
        viewport: &Viewport,
        device_x: i32,
        device_y: i32,
    ) -> Result<(f64, f64)> {
        Ok(self.page(page)?.page.device_to_page(viewport, device_x, device_y))
    }

    /// Render into a buffer the caller has already locked.
    pub fn render_into(
        &self,
        page: PageHandle,
        target: &mut RasterTarget<'_>,
        placement: &Placement,
        options: &RenderOptions,
    ) -> bool {
        let result = self
            .page(page)
            .and_then(|entry| entry.page.render_into(target, placement, options));
        succeeded(result, "render into buffer")
    }

    /// Render into a host bitmap.
    pub fn render_to_bitmap(
        &self,
        page: PageHandle,
        bitmap: &mut dyn HostBitmap,
        placement: &Placement,
        options: &RenderOptions,
    ) -> bool {
        let result = self
            .page(page)
            .and_then(|entry| entry.page.render_to_bitmap(bitmap, placement, options));
        succeeded(result, "render into bitmap")
    }

    /// Render into an on-screen surface.
    pub fn render_to_surface(
        &self,
        page: PageHandle,
        surface: &mut dyn Surface,
        placement: &Placement,
        options: &RenderOptions,
    ) -> bool {
        let result = self
            .page(page)
            .and_then(|entry| entry.page.render_to_surface(surface, placement, options));
        succeeded(result, "render into surface")
    }

    /// Render several pages into one surface. A stale page handle aborts
    /// the batch.
    pub fn render_pages_to_surface(
        &self,
        pages: &[PageHandle],
        surface: &mut dyn Surface,
        matrices: &[Matrix],
        clips: &[ClipRect],
        options: &RenderOptions,
    ) -> bool {
        let entries = self.resolve_batch(pages);
        let refs: Vec<Option<&Page>> = entries
            .iter()
            .map(|entry| entry.as_ref().map(|entry| &entry.page))
            .collect();
        let result = render::render_pages_to_surface(surface, &refs, matrices, clips, options);
        succeeded(result, "render pages into surface")
    }

    /// Render several pages into a locked buffer. A stale page handle
    /// aborts the batch.
    pub fn render_pages_into(
        &self,
        pages: &[PageHandle],
        target: &mut RasterTarget<'_>,
        matrices: &[Matrix],
        clips: &[ClipRect],
        options: &RenderOptions,
    ) -> bool {
        let entries = self.resolve_batch(pages);
        let refs: Vec<Option<&Page>> = entries
            .iter()
            .map(|entry| entry.as_ref().map(|entry| &entry.page))
            .collect();
        let result = render::render_pages_into(target, &refs, matrices, clips, options);
        succeeded(result, "render pages into buffer")
    }

    fn resolve_batch(&self, pages: &[PageHandle]) -> Vec<Option<Arc<SessionPage>>> {
        let table = self.pages();
        pages.iter().map(|&page| table.get(page)).collect()
    }
}

fn succeeded(result: Result<()>, what: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("{} failed: {}", what, e);
            false
        }
    }
}
