//! Library, document and page lifecycle tests
//!
//! Tests cover:
//! - Counted library init and teardown
//! - Open failures by kind
//! - Pages keeping their document open
//! - Save and reopen
//! - Handle-addressed sessions

mod common;

use common::{library, temp_file, text_document};
use pdfsurface::{PdfError, ReferenceDocumentBuilder, SaveFlags, Session};
use std::sync::Arc;
use std::thread;

#[test]
fn test_page_count_matches_document() {
    let (library, _) = library();
    for pages in [1, 3, 12] {
        let doc = library.open_memory(&text_document(pages), None).unwrap();
        assert_eq!(doc.page_count(), pages);
        assert_eq!(doc.pages().count(), pages);
    }
}

#[test]
fn test_library_initialized_once_and_torn_down_after_last_close() {
    let (library, engine) = library();
    assert_eq!(engine.init_calls(), 0);

    let first = library.open_memory(&text_document(1), None).unwrap();
    let second = library.open_memory(&text_document(2), None).unwrap();
    assert_eq!(engine.init_calls(), 1);
    assert_eq!(library.users(), 2);

    drop(first);
    assert_eq!(engine.destroy_calls(), 0);
    drop(second);
    assert_eq!(engine.destroy_calls(), 1);
    assert_eq!(library.users(), 0);

    // A later open initializes again.
    let _again = library.open_memory(&text_document(1), None).unwrap();
    assert_eq!(engine.init_calls(), 2);
}

#[test]
fn test_empty_inputs_never_touch_engine() {
    let (library, engine) = library();

    assert!(matches!(library.open_memory(&[], None), Err(PdfError::EmptyFile)));

    let file = temp_file(&[]);
    assert!(matches!(
        library.open_file(common::raw_fd(&file), None),
        Err(PdfError::EmptyFile)
    ));

    assert_eq!(engine.init_calls(), 0);
    assert_eq!(library.users(), 0);
}

#[test]
fn test_failed_open_releases_library() {
    let (library, engine) = library();
    let err = library.open_memory(b"not a document", None).unwrap_err();
    assert!(matches!(err, PdfError::CorruptOrWrongFormat));
    assert_eq!(engine.init_calls(), 1);
    assert_eq!(engine.destroy_calls(), 1);
    assert_eq!(library.users(), 0);
}

#[test]
fn test_password_errors() {
    let (library, _) = library();
    let bytes = ReferenceDocumentBuilder::new()
        .password("hunter2")
        .page(10.0, 10.0)
        .build();

    assert!(matches!(
        library.open_memory(&bytes, None),
        Err(PdfError::IncorrectPassword)
    ));
    assert!(matches!(
        library.open_memory(&bytes, Some("nope")),
        Err(PdfError::IncorrectPassword)
    ));
    assert_eq!(library.open_memory(&bytes, Some("hunter2")).unwrap().page_count(), 1);

    let foreign = ReferenceDocumentBuilder::new()
        .security("custom", "x")
        .page(10.0, 10.0)
        .build();
    assert!(matches!(
        library.open_memory(&foreign, Some("x")),
        Err(PdfError::UnsupportedSecurityScheme)
    ));
}

#[test]
fn test_page_index_out_of_bounds() {
    let (library, _) = library();
    let doc = library.open_memory(&text_document(2), None).unwrap();
    assert!(matches!(
        doc.page(2),
        Err(PdfError::PageIndexOutOfBounds { index: 2, count: 2 })
    ));
    assert!(matches!(doc.load_pages(1, 0), Err(PdfError::InvalidParameter(_))));
    assert_eq!(doc.load_pages(0, 1).unwrap().len(), 2);
    assert_eq!(doc.page_size_by_index(5, 72), (0, 0));
}

#[test]
fn test_page_keeps_document_open() {
    let (library, engine) = library();
    let doc = library.open_memory(&text_document(2), None).unwrap();
    let page = doc.page(1).unwrap();
    drop(doc);

    assert_eq!(engine.open_documents(), 1);
    assert_eq!(engine.destroy_calls(), 0);
    assert_eq!(page.text(), "page 2");

    drop(page);
    assert_eq!(engine.open_documents(), 0);
    assert_eq!(engine.destroy_calls(), 1);
}

#[test]
fn test_concurrent_open_close_initializes_once() {
    let (library, engine) = library();
    let bytes = Arc::new(text_document(3));
    let anchor = library.open_memory(&bytes, None).unwrap();

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let library = library.clone();
            let bytes = bytes.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    let doc = library.open_memory(&bytes, None).unwrap();
                    assert_eq!(doc.page(2).unwrap().text(), "page 3");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(engine.init_calls(), 1);
    assert_eq!(engine.destroy_calls(), 0);
    drop(anchor);
    assert_eq!(engine.destroy_calls(), 1);
    assert_eq!(library.users(), 0);
}

#[test]
fn test_concurrent_open_close_stays_balanced() {
    let (library, engine) = library();
    let bytes = Arc::new(text_document(1));

    thread::scope(|scope| {
        for _ in 0..8 {
            let library = &library;
            let bytes = &bytes;
            scope.spawn(move || {
                for _ in 0..50 {
                    drop(library.open_memory(bytes, None).unwrap());
                }
            });
        }
    });

    assert_eq!(library.users(), 0);
    assert_eq!(engine.init_calls(), engine.destroy_calls());
    assert!(engine.init_calls() >= 1);
}

#[test]
fn test_save_and_reopen_preserves_content() {
    let (library, _) = library();
    let doc = library.open_memory(&text_document(4), None).unwrap();

    let copy = doc.save_to_bytes(SaveFlags::NO_INCREMENTAL).unwrap();
    let reopened = library.open_memory(&copy, None).unwrap();

    assert_eq!(reopened.page_count(), doc.page_count());
    assert_eq!(reopened.title(), doc.title());
    for index in 0..doc.page_count() {
        assert_eq!(
            reopened.page(index).unwrap().text(),
            doc.page(index).unwrap().text()
        );
    }
}

#[test]
fn test_save_uses_repeated_writes_and_honors_failure() {
    let (library, _) = library();
    let doc = library.open_memory(&text_document(20), None).unwrap();

    let mut calls = 0;
    let mut collected = Vec::new();
    let mut writer = |data: &[u8]| {
        calls += 1;
        collected.extend_from_slice(data);
        data.len() as i32
    };
    doc.save_as_copy(&mut writer, SaveFlags::INCREMENTAL).unwrap();
    assert!(calls > 1);
    assert_eq!(library.open_memory(&collected, None).unwrap().page_count(), 20);

    let mut failing = |_: &[u8]| -1;
    assert!(matches!(
        doc.save_as_copy(&mut failing, SaveFlags::NO_INCREMENTAL),
        Err(PdfError::SaveFailed { .. })
    ));
}

#[test]
fn test_session_close_document_invalidates_pages() {
    let (library, engine) = library();
    let session = Session::new(library);

    let doc = session.open_memory(&text_document(3), None).unwrap();
    let pages = session.load_pages(doc, 0, 2).unwrap();
    assert_eq!(session.page_handle_count(), 3);
    assert_eq!(session.page_text(pages[1]).unwrap(), "page 2");

    assert!(session.close_page(pages[0]));
    assert!(!session.close_page(pages[0]));

    assert!(session.close_document(doc));
    assert_eq!(session.page_handle_count(), 0);
    assert!(matches!(
        session.page_text(pages[2]),
        Err(PdfError::InvalidHandle { kind: "page" })
    ));
    assert!(matches!(
        session.page_count(doc),
        Err(PdfError::InvalidHandle { kind: "document" })
    ));
    assert!(!session.close_document(doc));
    assert_eq!(engine.destroy_calls(), 1);
}

#[test]
fn test_session_handles_survive_raw_round_trip() {
    let (library, _) = library();
    let session = Session::new(library);
    let doc = session.open_memory(&text_document(2), None).unwrap();

    let raw = doc.as_raw();
    let back = pdfsurface::DocumentHandle::from_raw(raw).unwrap();
    assert_eq!(session.page_count(back).unwrap(), 2);
    assert_eq!(
        session.meta_text(back, "Title").unwrap().as_deref(),
        Some("Sample document")
    );
    assert_eq!(session.page_size_by_index(back, 0, 144).unwrap(), (1224, 1584));
}

#[test]
fn test_independent_libraries_do_not_share_counts() {
    let (first, first_engine) = library();
    let (second, second_engine) = library();
    let _a = first.open_memory(&text_document(1), None).unwrap();
    let _b = second.open_memory(&text_document(1), None).unwrap();
    assert_eq!(first_engine.init_calls(), 1);
    assert_eq!(second_engine.init_calls(), 1);
    assert_eq!(first.users(), 1);
    assert_eq!(second.users(), 1);
}
