//! Shared helpers for integration tests

#![allow(dead_code)]

use pdfsurface::{Library, ReferenceDocumentBuilder, ReferenceEngine};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const RED: u32 = 0xffff0000;
pub const GREEN: u32 = 0xff00ff00;
pub const BLUE: u32 = 0xff0000ff;
pub const GREY: u32 = 0xff808080;

/// Route crate logs to the test harness; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A library over a fresh reference engine, plus a handle to its counters.
pub fn library() -> (Library, ReferenceEngine) {
    init_tracing();
    let engine = ReferenceEngine::new();
    (Library::new(Arc::new(engine.clone())), engine)
}

/// `pages` letter-size pages, each with one text line naming it.
pub fn text_document(pages: usize) -> Vec<u8> {
    let mut builder = ReferenceDocumentBuilder::new().meta("Title", "Sample document");
    for index in 0..pages {
        builder = builder
            .page(612.0, 792.0)
            .text(&format!("page {}", index + 1));
    }
    builder.build()
}

/// One 100 x 100 page: left half red, annotation and form field in the
/// bottom-right quarter.
pub fn painted_document() -> Vec<u8> {
    ReferenceDocumentBuilder::new()
        .page(100.0, 100.0)
        .fill(0.0, 0.0, 50.0, 100.0, RED)
        .annot(50.0, 0.0, 100.0, 50.0, GREEN)
        .field(75.0, 0.0, 100.0, 25.0, BLUE)
        .build()
}

/// A temp file holding `bytes`, rewound for reading.
pub fn temp_file(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

pub fn raw_fd(file: &NamedTempFile) -> i32 {
    file.as_file().as_raw_fd()
}
