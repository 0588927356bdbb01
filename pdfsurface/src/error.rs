//! Error types for pdfsurface

use thiserror::Error;

/// Result type for pdfsurface operations
pub type Result<T> = std::result::Result<T, PdfError>;

/// Error types surfaced to callers.
///
/// Open/parse failures and invalid-state failures are distinct variants so
/// UI layers can react differently (prompt for a password, show "corrupt
/// file", drop a stale view).
#[derive(Error, Debug)]
pub enum PdfError {
    /// The document source has no bytes
    #[error("File is empty")]
    EmptyFile,

    /// Password required or incorrect password
    #[error("Password required or incorrect password")]
    IncorrectPassword,

    /// The document uses a security handler the engine does not support
    #[error("Unsupported security scheme")]
    UnsupportedSecurityScheme,

    /// File not in the expected format or corrupted
    #[error("File not in PDF format or corrupted")]
    CorruptOrWrongFormat,

    /// Page not found or content error
    #[error("Page not found or content error")]
    PageNotFound,

    /// File not found or could not be opened by the engine
    #[error("File not found or could not be opened")]
    FileError,

    /// Engine error of unrecognized kind
    #[error("Unknown engine error (code {code})")]
    UnknownEngineError { code: u32 },

    /// Allocation failed; callers may free caches and retry
    #[error("Out of memory")]
    OutOfMemory,

    /// A null, stale or already-closed handle was passed to an operation
    #[error("Invalid {kind} handle")]
    InvalidHandle { kind: &'static str },

    /// Page index out of bounds
    #[error("Page index {index} out of bounds (document has {count} pages)")]
    PageIndexOutOfBounds { index: usize, count: usize },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Document source failure
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Surface or bitmap lock failure
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    /// Failed to save document
    #[error("Failed to save document: {reason}")]
    SaveFailed { reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PNG encoding error
    #[error("PNG encoding error: {0}")]
    PngEncoding(String),
}

/// Errors reported by the document engine.
///
/// The numbered variants follow the engine's last-error codes.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("Unknown error")]
    Unknown,
    #[error("File not found or could not be opened")]
    File,
    #[error("File not in PDF format or corrupted")]
    Format,
    #[error("Incorrect password")]
    Password,
    #[error("Unsupported security scheme")]
    Security,
    #[error("Page not found or content error")]
    Page,
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Engine error code {0}")]
    Other(u32),
}

impl EngineError {
    /// Create from a raw engine error code.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => EngineError::Unknown,
            2 => EngineError::File,
            3 => EngineError::Format,
            4 => EngineError::Password,
            5 => EngineError::Security,
            6 => EngineError::Page,
            other => EngineError::Other(other),
        }
    }

    /// Get the raw engine error code.
    pub fn code(&self) -> u32 {
        match self {
            EngineError::Unknown => 1,
            EngineError::File => 2,
            EngineError::Format => 3,
            EngineError::Password => 4,
            EngineError::Security => 5,
            EngineError::Page => 6,
            EngineError::OutOfMemory => 0x100,
            EngineError::Other(code) => *code,
        }
    }
}

impl From<EngineError> for PdfError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::File => PdfError::FileError,
            EngineError::Format => PdfError::CorruptOrWrongFormat,
            EngineError::Password => PdfError::IncorrectPassword,
            EngineError::Security => PdfError::UnsupportedSecurityScheme,
            EngineError::Page => PdfError::PageNotFound,
            EngineError::OutOfMemory => PdfError::OutOfMemory,
            EngineError::Unknown | EngineError::Other(_) => PdfError::UnknownEngineError {
                code: error.code(),
            },
        }
    }
}

/// Errors from a document source read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Positioned read on a file descriptor failed
    #[error("Cannot read from file descriptor (errno {errno})")]
    FileRead { errno: i32 },

    /// The caller-supplied source returned zero bytes
    #[error("Cannot read from custom source at offset {position}")]
    EmptyRead { position: u64 },

    /// The current thread could not be registered with the caller runtime
    #[error("Cannot attach current thread")]
    AttachFailed,

    /// The current thread could not be deregistered from the caller runtime
    #[error("Cannot detach current thread")]
    DetachFailed,

    /// Memory-backed sources are handed to the engine whole
    #[error("Memory-backed source does not serve block reads")]
    NotBlockReadable,

    /// The caller object was already released
    #[error("Source released")]
    Released,

    /// Requested range lies beyond the declared length
    #[error("Read of {size} bytes at {position} exceeds source length {length}")]
    OutOfRange { position: u64, size: usize, length: u64 },
}

/// OS/runtime level failures on host surfaces and bitmaps.
///
/// These are expected to be transient; render calls log them and report a
/// plain failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("Native window unavailable")]
    WindowUnavailable,
    #[error("Setting window buffer format failed: {0}")]
    FormatNegotiation(String),
    #[error("Locking surface failed: {0}")]
    LockFailed(String),
    #[error("Fetching bitmap info failed: {0}")]
    InfoUnavailable(String),
    #[error("Bitmap format must be RGBA_8888 or RGB_565")]
    UnsupportedFormat,
    #[error("Invalid raster target: {0}")]
    InvalidTarget(String),
}
