//! Document source tests: file descriptors, memory and caller callbacks

mod common;

use common::{library, raw_fd, temp_file, text_document};
use pdfsurface::{
    ByteSourceBridge, NativeRuntime, PdfError, ReaderSourceBridge, RenderConfig, ThreadRegistry,
};
use std::io::Cursor;
use std::sync::Arc;
use std::thread;

#[test]
fn test_file_source_reads_document() {
    let (library, _) = library();
    let file = temp_file(&text_document(5));

    let doc = library.open_file(raw_fd(&file), None).unwrap();
    assert_eq!(doc.source_kind(), "file");
    assert_eq!(doc.page_count(), 5);
    assert_eq!(doc.page(4).unwrap().text(), "page 5");
}

#[test]
fn test_file_source_serves_parallel_page_loads() {
    let (library, engine) = library();
    let file = temp_file(&text_document(8));
    let doc = library.open_file(raw_fd(&file), None).unwrap();

    let rendered = doc
        .render_pages_parallel(0..8, &RenderConfig::new().set_target_dpi(18.0))
        .unwrap();
    assert_eq!(rendered.len(), 8);
    assert_eq!(
        rendered.iter().map(|r| r.page_index).collect::<Vec<_>>(),
        (0..8).collect::<Vec<_>>()
    );
    assert_eq!((rendered[0].width, rendered[0].height), (153, 198));
    assert_eq!(engine.page_loads(), 8);
}

#[test]
fn test_truncated_file_is_corrupt() {
    let (library, _) = library();
    let bytes = text_document(2);
    let file = temp_file(&bytes[..bytes.len() / 2]);
    assert!(matches!(
        library.open_file(raw_fd(&file), None),
        Err(PdfError::CorruptOrWrongFormat)
    ));
}

#[test]
fn test_memory_source_kind() {
    let (library, _) = library();
    let doc = library.open_memory_owned(text_document(1), None).unwrap();
    assert_eq!(doc.source_kind(), "memory");
}

#[test]
fn test_custom_source_non_positive_length_is_empty() {
    let (library, engine) = library();
    let bridge = Arc::new(ByteSourceBridge::new(text_document(1)));

    for declared in [0, -1, i64::MIN] {
        let result = library.open_custom(bridge.clone(), Arc::new(NativeRuntime), None, declared);
        assert!(matches!(result, Err(PdfError::EmptyFile)));
    }
    assert_eq!(bridge.read_calls(), 0);
    assert_eq!(engine.init_calls(), 0);
}

#[test]
fn test_custom_source_attaches_and_detaches_each_read() {
    let (library, _) = library();
    let bytes = text_document(3);
    let bridge = Arc::new(ByteSourceBridge::new(bytes.clone()));
    let registry = Arc::new(ThreadRegistry::new());

    let doc = library
        .open_custom(bridge.clone(), registry.clone(), None, bytes.len() as i64)
        .unwrap();
    assert_eq!(doc.source_kind(), "callback");
    assert!(bridge.read_calls() > 0);
    assert_eq!(registry.attach_count(), bridge.read_calls());
    assert_eq!(registry.detach_count(), registry.attach_count());
    assert_eq!(registry.attached_threads(), 0);

    let reads_before = bridge.read_calls();
    assert_eq!(doc.page(2).unwrap().text(), "page 3");
    assert!(bridge.read_calls() > reads_before);
    assert_eq!(registry.detach_count(), registry.attach_count());

    drop(doc);
    assert!(bridge.is_released());
    assert_eq!(registry.detach_count(), registry.attach_count());
    assert_eq!(registry.attached_threads(), 0);
}

#[test]
fn test_custom_source_on_registered_thread_skips_attach() {
    let (library, _) = library();
    let bytes = text_document(2);
    let bridge = Arc::new(ByteSourceBridge::new(bytes.clone()));
    let registry = Arc::new(ThreadRegistry::new());
    registry.register_current_thread();

    let doc = library
        .open_custom(bridge.clone(), registry.clone(), None, bytes.len() as i64)
        .unwrap();
    assert_eq!(doc.page(1).unwrap().text(), "page 2");
    assert_eq!(registry.attach_count(), 0);
    assert_eq!(registry.detach_count(), 0);
    assert_eq!(registry.attached_threads(), 1);

    // Worker threads still attach for the duration of their reads.
    let worker_doc = doc.clone();
    thread::spawn(move || worker_doc.page(0).unwrap().text())
        .join()
        .unwrap();
    assert!(registry.attach_count() > 0);
    assert_eq!(registry.detach_count(), registry.attach_count());
    assert_eq!(registry.attached_threads(), 1);
}

#[test]
fn test_custom_source_overstated_length_fails_open() {
    let (library, _) = library();
    let bytes = text_document(1);
    let bridge = Arc::new(ByteSourceBridge::new(bytes.clone()));

    let result = library.open_custom(bridge, Arc::new(NativeRuntime), None, bytes.len() as i64 + 64);
    assert!(matches!(result, Err(PdfError::FileError)));
}

#[test]
fn test_custom_source_attach_failure_fails_open() {
    let (library, engine) = library();
    let bytes = text_document(1);
    let bridge = Arc::new(ByteSourceBridge::new(bytes.clone()));
    let registry = Arc::new(ThreadRegistry::new());
    registry.set_fail_attach(true);

    let result = library.open_custom(bridge.clone(), registry, None, bytes.len() as i64);
    assert!(matches!(result, Err(PdfError::FileError)));
    assert_eq!(bridge.read_calls(), 0);
    assert_eq!(engine.destroy_calls(), 1);
}

#[test]
fn test_reader_source_bridge() {
    let (library, _) = library();
    let bridge = ReaderSourceBridge::new(Cursor::new(text_document(4)));
    let length = bridge.stream_len().unwrap();

    let doc = library
        .open_custom(Arc::new(bridge), Arc::new(NativeRuntime), None, length as i64)
        .unwrap();
    assert_eq!(doc.page_count(), 4);
    assert_eq!(doc.title().as_deref(), Some("Sample document"));
}

#[test]
fn test_custom_source_save_round_trip() {
    let (library, _) = library();
    let bytes = text_document(2);
    let bridge = Arc::new(ByteSourceBridge::new(bytes.clone()));
    let doc = library
        .open_custom(bridge, Arc::new(NativeRuntime), None, bytes.len() as i64)
        .unwrap();

    let copy = doc.save_to_bytes(pdfsurface::SaveFlags::NO_INCREMENTAL).unwrap();
    assert_eq!(copy, bytes);
}
