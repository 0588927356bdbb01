//! Document sources: local files, memory blobs and caller callbacks
//!
//! Every source except the memory blob serves the engine's "read N bytes at
//! offset" requests through [`BlockSource`]. Callback-backed reads may run on
//! any worker thread, so each read registers that thread with the caller's
//! runtime for the duration of the call.

use crate::engine::BlockSource;
use crate::error::{PdfError, Result, SourceError};
use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::ThreadId;

/// Where a document's bytes come from.
pub enum DocumentSource {
    /// Positioned reads on a caller-owned file descriptor.
    File(FileSource),
    /// Owned bytes handed to the engine whole at open time.
    Memory(Arc<[u8]>),
    /// Reads delegated to a caller object.
    Callback(CallbackSource),
}

impl DocumentSource {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentSource::File(_) => "file",
            DocumentSource::Memory(_) => "memory",
            DocumentSource::Callback(_) => "callback",
        }
    }
}

impl BlockSource for DocumentSource {
    fn len(&self) -> u64 {
        match self {
            DocumentSource::File(file) => file.length,
            DocumentSource::Memory(data) => data.len() as u64,
            DocumentSource::Callback(callback) => callback.length,
        }
    }

    fn get_block(&self, position: u64, out: &mut [u8]) -> std::result::Result<usize, SourceError> {
        match self {
            DocumentSource::File(file) => file.read_at(position, out),
            DocumentSource::Memory(_) => Err(SourceError::NotBlockReadable),
            DocumentSource::Callback(callback) => callback.read_at(position, out),
        }
    }
}

/// A caller-owned file descriptor plus its length.
///
/// The descriptor is not closed by this crate; it must stay open while the
/// document is open.
#[derive(Debug)]
pub struct FileSource {
    fd: RawFd,
    length: u64,
}

impl FileSource {
    /// Describe `fd`, taking its length from `fstat`.
    pub fn new(fd: RawFd) -> Result<Self> {
        // SAFETY: `stat` is plain old data and fully written by a successful fstat.
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        let ret = unsafe { libc::fstat(fd, &mut stat) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            tracing::error!("Cannot stat file descriptor {}: {}", fd, err);
            return Err(PdfError::Io(err));
        }
        Ok(Self {
            fd,
            length: stat.st_size.max(0) as u64,
        })
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn read_at(&self, position: u64, out: &mut [u8]) -> std::result::Result<usize, SourceError> {
        let offset = libc::off_t::try_from(position).map_err(|_| SourceError::OutOfRange {
            position,
            size: out.len(),
            length: self.length,
        })?;
        // SAFETY: `out` is a valid writable region of `out.len()` bytes.
        let read = unsafe { libc::pread(self.fd, out.as_mut_ptr().cast(), out.len(), offset) };
        if read < 0 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            tracing::error!("Cannot read from file descriptor. Error: {}", errno);
            return Err(SourceError::FileRead { errno });
        }
        Ok(read as usize)
    }
}

/// Registration of the current thread with the caller's runtime.
///
/// Implementations keep per-thread state; attach/detach on one thread must
/// not disturb another.
pub trait RuntimeAttach: Send + Sync {
    /// Whether the current thread may already call into the runtime.
    fn is_attached(&self) -> bool;

    fn attach_current_thread(&self) -> std::result::Result<(), SourceError>;

    fn detach_current_thread(&self) -> std::result::Result<(), SourceError>;
}

/// Scoped runtime registration.
///
/// Attaches on entry if the thread was not attached and detaches on every
/// exit path. Threads that were already attached are left alone.
pub struct AttachGuard<'a> {
    runtime: &'a dyn RuntimeAttach,
    attached_here: bool,
}

impl<'a> AttachGuard<'a> {
    pub fn enter(runtime: &'a dyn RuntimeAttach) -> std::result::Result<Self, SourceError> {
        if runtime.is_attached() {
            return Ok(Self {
                runtime,
                attached_here: false,
            });
        }
        if let Err(e) = runtime.attach_current_thread() {
            tracing::error!("Cannot attach current thread");
            return Err(e);
        }
        Ok(Self {
            runtime,
            attached_here: true,
        })
    }

    /// Whether this guard performed the attach.
    pub fn attached_here(&self) -> bool {
        self.attached_here
    }

    /// Detach now and report the outcome.
    pub fn release(mut self) -> std::result::Result<(), SourceError> {
        self.detach()
    }

    fn detach(&mut self) -> std::result::Result<(), SourceError> {
        if !std::mem::take(&mut self.attached_here) {
            return Ok(());
        }
        self.runtime.detach_current_thread().inspect_err(|_| {
            tracing::error!("Cannot detach current thread");
        })
    }
}

impl Drop for AttachGuard<'_> {
    fn drop(&mut self) {
        let _ = self.detach();
    }
}

/// A caller object that serves reads through a refillable buffer.
///
/// `read` refills the object's buffer with up to `size` bytes from
/// `position` and returns how many it produced (zero or negative on
/// failure). `copy_buffer` then copies the buffer out.
pub trait SourceBridge: Send + Sync {
    fn read(&self, position: u64, size: usize) -> i32;

    /// Copy the buffer filled by the last `read`; returns bytes copied.
    fn copy_buffer(&self, out: &mut [u8]) -> usize;

    /// Drop the caller-side reference. Called once, attached.
    fn release(&self) {}
}

/// Reads delegated to a caller [`SourceBridge`].
///
/// Reads on one source are serialized: the bridge shares one buffer across
/// calls.
pub struct CallbackSource {
    bridge: Option<Arc<dyn SourceBridge>>,
    runtime: Arc<dyn RuntimeAttach>,
    length: u64,
    read_lock: Mutex<()>,
}

impl CallbackSource {
    pub fn new(bridge: Arc<dyn SourceBridge>, runtime: Arc<dyn RuntimeAttach>, length: u64) -> Self {
        Self {
            bridge: Some(bridge),
            runtime,
            length,
            read_lock: Mutex::new(()),
        }
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn read_at(&self, position: u64, out: &mut [u8]) -> std::result::Result<usize, SourceError> {
        let bridge = self.bridge.as_ref().ok_or(SourceError::Released)?;
        if position > self.length {
            tracing::error!(
                "Read at {} beyond custom source length {}",
                position,
                self.length
            );
            return Err(SourceError::OutOfRange {
                position,
                size: out.len(),
                length: self.length,
            });
        }

        let _serial = self.read_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let guard = AttachGuard::enter(self.runtime.as_ref())?;
        let result = Self::read_through(bridge.as_ref(), position, out);
        let detached = guard.release();
        let read = result?;
        detached?;
        Ok(read)
    }

    fn read_through(
        bridge: &dyn SourceBridge,
        position: u64,
        out: &mut [u8],
    ) -> std::result::Result<usize, SourceError> {
        let read = bridge.read(position, out.len());
        if read <= 0 {
            tracing::error!("Cannot read from custom source at {}", position);
            return Err(SourceError::EmptyRead { position });
        }
        let bounded = (read as usize).min(out.len());
        Ok(bridge.copy_buffer(&mut out[..bounded]))
    }
}

impl Drop for CallbackSource {
    fn drop(&mut self) {
        let Some(bridge) = self.bridge.take() else {
            return;
        };
        match AttachGuard::enter(self.runtime.as_ref()) {
            Ok(_guard) => bridge.release(),
            Err(e) => tracing::error!("Leaking custom source reference: {}", e),
        }
    }
}

/// Runtime in which every thread may call the source directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeRuntime;

impl RuntimeAttach for NativeRuntime {
    fn is_attached(&self) -> bool {
        true
    }

    fn attach_current_thread(&self) -> std::result::Result<(), SourceError> {
        Ok(())
    }

    fn detach_current_thread(&self) -> std::result::Result<(), SourceError> {
        Ok(())
    }
}

/// Runtime that tracks which threads are registered.
///
/// Counts attach and detach calls so hosts can verify that worker threads
/// are always deregistered.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    attached: Mutex<HashSet<ThreadId>>,
    attaches: AtomicUsize,
    detaches: AtomicUsize,
    fail_attach: AtomicBool,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permanently register the current thread (a runtime-owned thread).
    pub fn register_current_thread(&self) {
        self.threads().insert(std::thread::current().id());
    }

    /// Make subsequent attach calls fail.
    pub fn set_fail_attach(&self, fail: bool) {
        self.fail_attach.store(fail, Ordering::SeqCst);
    }

    pub fn attach_count(&self) -> usize {
        self.attaches.load(Ordering::SeqCst)
    }

    pub fn detach_count(&self) -> usize {
        self.detaches.load(Ordering::SeqCst)
    }

    /// Number of threads currently registered.
    pub fn attached_threads(&self) -> usize {
        self.threads().len()
    }

    fn threads(&self) -> std::sync::MutexGuard<'_, HashSet<ThreadId>> {
        self.attached.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RuntimeAttach for ThreadRegistry {
    fn is_attached(&self) -> bool {
        self.threads().contains(&std::thread::current().id())
    }

    fn attach_current_thread(&self) -> std::result::Result<(), SourceError> {
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(SourceError::AttachFailed);
        }
        self.threads().insert(std::thread::current().id());
        self.attaches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn detach_current_thread(&self) -> std::result::Result<(), SourceError> {
        if !self.threads().remove(&std::thread::current().id()) {
            return Err(SourceError::DetachFailed);
        }
        self.detaches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory bytes served through the refill-buffer contract.
#[derive(Debug)]
pub struct ByteSourceBridge {
    data: Vec<u8>,
    buffer: Mutex<Vec<u8>>,
    reads: AtomicUsize,
    released: AtomicBool,
}

impl ByteSourceBridge {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            buffer: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
            released: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of `read` calls served so far.
    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl SourceBridge for ByteSourceBridge {
    fn read(&self, position: u64, size: usize) -> i32 {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let Ok(start) = usize::try_from(position) else {
            return 0;
        };
        if start >= self.data.len() {
            return 0;
        }
        let end = start + size.min(self.data.len() - start).min(i32::MAX as usize);
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.clear();
        buffer.extend_from_slice(&self.data[start..end]);
        buffer.len() as i32
    }

    fn copy_buffer(&self, out: &mut [u8]) -> usize {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let n = out.len().min(buffer.len());
        out[..n].copy_from_slice(&buffer[..n]);
        n
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Any seekable reader served through the refill-buffer contract.
pub struct ReaderSourceBridge<R> {
    reader: Mutex<R>,
    buffer: Mutex<Vec<u8>>,
}

impl<R: Read + Seek + Send> ReaderSourceBridge<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Mutex::new(reader),
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Length of the underlying stream.
    pub fn stream_len(&self) -> std::io::Result<u64> {
        let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        reader.seek(SeekFrom::End(0))
    }

    fn fill(reader: &mut R, position: u64, buffer: &mut Vec<u8>, size: usize) -> std::io::Result<()> {
        reader.seek(SeekFrom::Start(position))?;
        buffer.clear();
        reader.take(size as u64).read_to_end(buffer)?;
        Ok(())
    }
}

impl<R: Read + Seek + Send> SourceBridge for ReaderSourceBridge<R> {
    fn read(&self, position: u64, size: usize) -> i32 {
        let size = size.min(i32::MAX as usize);
        let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        match Self::fill(&mut *reader, position, &mut buffer, size) {
            Ok(()) => buffer.len() as i32,
            Err(e) => {
                tracing::error!("Reader source failed at {}: {}", position, e);
                -1
            }
        }
    }

    fn copy_buffer(&self, out: &mut [u8]) -> usize {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let n = out.len().min(buffer.len());
        out[..n].copy_from_slice(&buffer[..n]);
        n
    }
}
