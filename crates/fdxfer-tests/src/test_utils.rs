//! Unified test utilities for fdxfer tests and benchmarks

use fdxfer_types::{Outcome, TransferMethod};
use fdxfer_zerocopy::{Copier, Request, Selector, Selectors, UnsupportedCache};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::{TcpListener, TcpStream};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Test data generation patterns
#[derive(Debug, Clone, Copy)]
pub enum TestDataPattern {
    /// All zeros
    Zeros,
    /// Repeating 0..=250 ramp; a shifted copy never matches
    Sequential,
    /// Deterministic pseudo-random bytes
    Random,
}

/// Generate test data with specified pattern
pub fn generate_test_data(size: usize, pattern: TestDataPattern) -> Vec<u8> {
    match pattern {
        TestDataPattern::Zeros => vec![0u8; size],
        TestDataPattern::Sequential => (0..size).map(|i| (i % 251) as u8).collect(),
        TestDataPattern::Random => {
            // xorshift, fixed seed for reproducible runs
            let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
            (0..size)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    (state >> 24) as u8
                })
                .collect()
        }
    }
}

/// System page size
pub fn page_size() -> usize {
    nix::unistd::sysconf(nix::unistd::SysconfVar::PAGE_SIZE)
        .ok()
        .flatten()
        .map_or(4096, |size| size as usize)
}

/// Sizes that straddle page and buffer boundaries
pub fn boundary_sizes() -> Vec<usize> {
    let page = page_size();
    vec![1, 42, 1025, page, page + 1, 2 * page + 1, 32769]
}

/// Anonymous temp file holding `data`, positioned at the start
pub fn file_with(data: &[u8]) -> File {
    let mut file = tempfile::tempfile().expect("Failed to create temp file");
    file.write_all(data).expect("Failed to write temp file");
    file.seek(SeekFrom::Start(0)).expect("Failed to rewind temp file");
    file
}

/// Source file with `size` bytes of sequential data, an empty destination,
/// and the data itself
pub fn file_pair(size: usize) -> (File, File, Vec<u8>) {
    let data = generate_test_data(size, TestDataPattern::Sequential);
    let src = file_with(&data);
    let dst = tempfile::tempfile().expect("Failed to create temp file");
    (src, dst, data)
}

/// Rewind `file` and read everything in it
pub fn contents(file: &mut File) -> Vec<u8> {
    file.seek(SeekFrom::Start(0)).expect("Failed to rewind");
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).expect("Failed to read back");
    buf
}

/// Current offset of `file`
pub fn offset(file: &mut File) -> u64 {
    file.stream_position().expect("Failed to query offset")
}

/// Anonymous pipe as `(reader, writer)`
pub fn pipe() -> (File, File) {
    let (read, write): (OwnedFd, OwnedFd) = nix::unistd::pipe().expect("Failed to create pipe");
    (File::from(read), File::from(write))
}

/// Connected loopback TCP pair as `(client, server)`
pub fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to read listener address");
    let client = TcpStream::connect(addr).expect("Failed to connect");
    let (server, _) = listener.accept().expect("Failed to accept");
    (client, server)
}

/// Connected Unix stream pair as `(client, server)`
pub fn unix_pair() -> (UnixStream, UnixStream) {
    UnixStream::pair().expect("Failed to create socket pair")
}

/// Socket families the splice tests run against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketFamily {
    /// Loopback TCP
    Tcp,
    /// Unix domain stream
    Unix,
}

/// Connected stream pair of the given family as `(client, server)` files
///
/// Both halves are converted to `File` so callers can treat the families
/// uniformly; `File` reads and writes work on any descriptor.
pub fn socket_pair(family: SocketFamily) -> (File, File) {
    let (client, server): (OwnedFd, OwnedFd) = match family {
        SocketFamily::Tcp => {
            let (client, server) = tcp_pair();
            (client.into(), server.into())
        }
        SocketFamily::Unix => {
            let (client, server) = unix_pair();
            (client.into(), server.into())
        }
    };
    (File::from(client), File::from(server))
}

/// Pseudo-terminal as `(master, slave)`, or `None` where ptys are unavailable
pub fn pty() -> Option<(File, File)> {
    let pty = nix::pty::openpty(None, None).ok()?;
    Some((File::from(pty.master), File::from(pty.slave)))
}

/// One selector invocation seen by a [`Recorder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Method that was asked
    pub method: TransferMethod,
    /// Bytes it reported moving
    pub bytes: u64,
    /// Whether it took ownership of the result
    pub handled: bool,
    /// Whether it reported an error
    pub failed: bool,
    /// Raw destination descriptor it was given
    pub dst_fd: i32,
    /// Raw source descriptor it was given
    pub src_fd: i32,
}

/// Shared log of selector calls
pub type CallLog = Arc<Mutex<Vec<Call>>>;

/// Wraps a real selector and logs every attempt
pub struct Recorder {
    inner: Arc<dyn Selector>,
    log: CallLog,
}

impl Recorder {
    /// Wrap `inner`, logging into `log`
    pub fn new(inner: Arc<dyn Selector>, log: CallLog) -> Self {
        Self { inner, log }
    }
}

impl Selector for Recorder {
    fn method(&self) -> TransferMethod {
        self.inner.method()
    }

    fn attempt(&self, request: &Request<'_>) -> Outcome {
        let outcome = self.inner.attempt(request);
        self.log.lock().expect("call log poisoned").push(Call {
            method: self.inner.method(),
            bytes: outcome.bytes(),
            handled: outcome.is_handled(),
            failed: matches!(outcome, Outcome::Failed(..)),
            dst_fd: request.dst.raw(),
            src_fd: request.src.raw(),
        });
        outcome
    }
}

/// Copier over the platform selectors, each wrapped in a [`Recorder`]
///
/// Uses a private unsupported cache so tests do not see each other's
/// memoized failures.
pub fn recording_copier(copier: Copier) -> (Copier, CallLog) {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let selectors = Selectors::platform().map(|selector| {
        Arc::new(Recorder::new(selector, Arc::clone(&log))) as Arc<dyn Selector>
    });
    let copier = copier
        .with_selectors(selectors)
        .with_cache(Arc::new(UnsupportedCache::new()));
    (copier, log)
}

/// Calls logged so far for `method`
pub fn calls_for(log: &CallLog, method: TransferMethod) -> Vec<Call> {
    log.lock()
        .expect("call log poisoned")
        .iter()
        .filter(|call| call.method == method)
        .cloned()
        .collect()
}

/// Whether `method` was attempted at all
pub fn was_called(log: &CallLog, method: TransferMethod) -> bool {
    !calls_for(log, method).is_empty()
}

/// Endpoint whose descriptor is not open, counting any I/O attempted on it
#[derive(Debug, Default)]
pub struct ClosedEndpoint {
    io_calls: AtomicUsize,
}

impl ClosedEndpoint {
    /// Number of `read`/`write`/`flush` calls made through the Rust traits
    pub fn io_calls(&self) -> usize {
        self.io_calls.load(Ordering::SeqCst)
    }
}

impl AsFd for ClosedEndpoint {
    fn as_fd(&self) -> BorrowedFd<'_> {
        // SAFETY: the number is never handed to a call that would create or
        // close a descriptor; the kernel rejects it with EBADF.
        unsafe { BorrowedFd::borrow_raw(i32::MAX - 1) }
    }
}

impl Read for ClosedEndpoint {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        self.io_calls.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::from_raw_os_error(nix::libc::EBADF))
    }
}

impl Write for ClosedEndpoint {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        self.io_calls.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::from_raw_os_error(nix::libc::EBADF))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.io_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
