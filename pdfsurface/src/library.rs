//! Counted engine initialization and document open

use crate::document::Document;
use crate::engine::{BlockSource, Engine};
use crate::error::{PdfError, Result};
use crate::source::{CallbackSource, DocumentSource, FileSource, RuntimeAttach, SourceBridge};
use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex, PoisonError};

/// Entry point for opening documents.
///
/// A `Library` owns the engine and a usage counter. The first open document
/// initializes the engine and the last one closed tears it down; a failed
/// open leaves the counter where it was. Clones share the same counter, so
/// create one per host application and pass it around.
///
/// # Example
///
/// ```
/// use pdfsurface::{Library, ReferenceDocumentBuilder, ReferenceEngine};
/// use std::sync::Arc;
///
/// let library = Library::new(Arc::new(ReferenceEngine::new()));
/// let bytes = ReferenceDocumentBuilder::new().page(612.0, 792.0).build();
/// let doc = library.open_memory(&bytes, None)?;
/// assert_eq!(doc.page_count(), 1);
/// assert_eq!(library.users(), 1);
/// # Ok::<(), pdfsurface::PdfError>(())
/// ```
#[derive(Clone)]
pub struct Library {
    inner: Arc<LibraryInner>,
}

struct LibraryInner {
    engine: Arc<dyn Engine>,
    users: Mutex<usize>,
}

impl Library {
    /// Create a library around `engine`. The engine is not initialized until
    /// the first document opens.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            inner: Arc::new(LibraryInner {
                engine,
                users: Mutex::new(0),
            }),
        }
    }

    /// The engine this library drives.
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.inner.engine
    }

    /// Number of live documents holding the engine initialized.
    pub fn users(&self) -> usize {
        *self.inner.users.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register one more user, initializing the engine if this is the first.
    pub(crate) fn acquire(&self) -> LibraryRef {
        let mut users = self.inner.users.lock().unwrap_or_else(PoisonError::into_inner);
        if *users == 0 {
            tracing::debug!("Init FPDF library");
            self.inner.engine.init_library();
        }
        *users += 1;
        LibraryRef {
            library: self.clone(),
        }
    }

    fn release(&self) {
        let mut users = self.inner.users.lock().unwrap_or_else(PoisonError::into_inner);
        match *users {
            0 => tracing::error!("Library released more often than acquired"),
            1 => {
                *users = 0;
                tracing::debug!("Destroy FPDF library");
                self.inner.engine.destroy_library();
            }
            _ => *users -= 1,
        }
    }

    /// Open a document from a caller-owned file descriptor.
    ///
    /// The descriptor must stay open while the document is open; it is
    /// never closed here.
    ///
    /// # Arguments
    ///
    /// * `fd` - Readable, seekable file descriptor
    /// * `password` - Optional password for encrypted documents
    ///
    /// # Errors
    ///
    /// `EmptyFile` for a zero-length file (the engine is not touched),
    /// otherwise the engine's open failure.
    pub fn open_file(&self, fd: RawFd, password: Option<&str>) -> Result<Document> {
        let file = FileSource::new(fd)?;
        if file.is_empty() {
            tracing::error!("File is empty");
            return Err(PdfError::EmptyFile);
        }
        self.open_block_source(DocumentSource::File(file), password)
    }

    /// Open a document from bytes in memory.
    ///
    /// The bytes are copied; the copy lives as long as the document.
    pub fn open_memory(&self, bytes: &[u8], password: Option<&str>) -> Result<Document> {
        let mut copy = Vec::new();
        if copy.try_reserve_exact(bytes.len()).is_err() {
            tracing::error!("Cannot allocate {} bytes for document copy", bytes.len());
            return Err(PdfError::OutOfMemory);
        }
        copy.extend_from_slice(bytes);
        self.open_memory_owned(copy, password)
    }

    /// Open a document from owned bytes.
    pub fn open_memory_owned(&self, bytes: Vec<u8>, password: Option<&str>) -> Result<Document> {
        if bytes.is_empty() {
            tracing::error!("File is empty");
            return Err(PdfError::EmptyFile);
        }
        let data: Arc<[u8]> = Arc::from(bytes);

        let library = self.acquire();
        match self.inner.engine.load_mem_document(data.clone(), password) {
            Ok(doc) => Ok(Document::new(
                doc,
                Arc::new(DocumentSource::Memory(data)),
                library,
            )),
            Err(e) => {
                tracing::error!("Cannot open memory document: {}", e);
                Err(e.into())
            }
        }
    }

    /// Open a document whose bytes are read through a caller object.
    ///
    /// Reads may happen on any thread that touches the document; each read
    /// attaches that thread to `runtime` for its duration.
    ///
    /// # Arguments
    ///
    /// * `bridge` - Caller object serving reads
    /// * `runtime` - Thread registration for the caller's runtime
    /// * `password` - Optional password for encrypted documents
    /// * `declared_length` - Total length in bytes; must be positive
    ///
    /// # Errors
    ///
    /// `EmptyFile` when `declared_length <= 0`, before any read or engine call.
    pub fn open_custom(
        &self,
        bridge: Arc<dyn SourceBridge>,
        runtime: Arc<dyn RuntimeAttach>,
        password: Option<&str>,
        declared_length: i64,
    ) -> Result<Document> {
        if declared_length <= 0 {
            tracing::error!("File is empty");
            return Err(PdfError::EmptyFile);
        }
        let source = CallbackSource::new(bridge, runtime, declared_length as u64);
        self.open_block_source(DocumentSource::Callback(source), password)
    }

    fn open_block_source(&self, source: DocumentSource, password: Option<&str>) -> Result<Document> {
        let kind = source.kind();
        let library = self.acquire();
        let source = Arc::new(source);
        let block: Arc<dyn BlockSource> = source.clone();

        match self.inner.engine.load_custom_document(block, password) {
            Ok(doc) => Ok(Document::new(doc, source, library)),
            Err(e) => {
                tracing::error!("Cannot open {} document: {}", kind, e);
                Err(e.into())
            }
        }
    }
}

/// One counted use of a [`Library`]; dropping it releases the use.
pub(crate) struct LibraryRef {
    library: Library,
}

impl Drop for LibraryRef {
    fn drop(&mut self) {
        self.library.release();
    }
}
