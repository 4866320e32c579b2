//! Integration tests for fdxfer
//!
//! These drive the real kernel paths end to end: files, pipes, sockets and
//! terminals, with the platform selectors wrapped so each test can see which
//! strategy moved the bytes.

#![cfg(target_os = "linux")]

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::fd::{AsFd, AsRawFd};
use std::sync::Arc;
use std::thread;

use fdxfer_config::ConfigBuilder;
use fdxfer_tests::test_utils::{
    boundary_sizes, calls_for, contents, file_pair, file_with, generate_test_data, offset, pipe,
    pty, recording_copier, socket_pair, was_called, CallLog, ClosedEndpoint, SocketFamily,
    TestDataPattern,
};
use fdxfer_types::{EndpointKind, ErrorKind, TransferMethod, TransferOptions};
use fdxfer_zerocopy::{Copier, Endpoint, Limited, UnsupportedCache};
use proptest::prelude::*;
use rstest::rstest;
use tempfile::NamedTempFile;

/// How a test bounds the transfer
#[derive(Debug, Clone, Copy)]
enum Limit {
    Unlimited,
    OneLess,
    Half,
    More,
}

impl Limit {
    fn for_size(self, size: usize) -> Option<u64> {
        let size = size as u64;
        match self {
            Limit::Unlimited => None,
            Limit::OneLess => Some(size - 1),
            Limit::Half => Some(size / 2),
            Limit::More => Some(size + 7),
        }
    }
}

/// Which file-to-file strategy a test expects to do the work
#[derive(Debug, Clone, Copy)]
enum FileStrategy {
    RangeCopy,
    SendFile,
}

impl FileStrategy {
    fn options(self) -> TransferOptions {
        match self {
            FileStrategy::RangeCopy => TransferOptions::default(),
            FileStrategy::SendFile => TransferOptions {
                enable_range_copy: false,
                ..TransferOptions::default()
            },
        }
    }
}

fn accelerated_bytes(log: &CallLog) -> u64 {
    log.lock().unwrap().iter().map(|call| call.bytes).sum()
}

/// Run `copier` with the limit applied through [`Limited`], checking the
/// limit is charged with exactly the bytes moved
fn transfer_with_limit(
    copier: &Copier,
    dst: &mut File,
    src: File,
    limit: Option<u64>,
) -> (u64, File) {
    match limit {
        Some(limit) => {
            let mut limited = Limited::new(src, limit);
            let n = copier.transfer_limited(dst, &mut limited).unwrap();
            assert_eq!(limited.remaining(), limit - n, "limit not charged correctly");
            (n, limited.into_inner())
        }
        None => {
            let mut src = src;
            let n = copier.transfer(dst, &mut src, None).unwrap();
            (n, src)
        }
    }
}

fn check_file_copy(strategy: FileStrategy, size: usize, limit: Limit) {
    let (copier, log) = recording_copier(Copier::with_options(strategy.options()));
    let (src, mut dst, data) = file_pair(size);
    let limit = limit.for_size(size);
    let expected = limit.map_or(size, |limit| size.min(limit as usize));

    let (n, mut src) = transfer_with_limit(&copier, &mut dst, src, limit);

    assert_eq!(n, expected as u64, "size {} limit {:?}", size, limit);
    assert_eq!(offset(&mut src), expected as u64, "source offset");
    assert_eq!(offset(&mut dst), expected as u64, "destination offset");
    assert_eq!(contents(&mut dst), &data[..expected]);

    if expected == 0 {
        assert!(log.lock().unwrap().is_empty());
        return;
    }

    // Every byte went through the kernel
    assert_eq!(accelerated_bytes(&log), expected as u64);
    match strategy {
        FileStrategy::RangeCopy => assert!(was_called(&log, TransferMethod::RangeCopy)),
        FileStrategy::SendFile => {
            assert!(!was_called(&log, TransferMethod::RangeCopy));
            let sent: u64 = calls_for(&log, TransferMethod::SendFile)
                .iter()
                .map(|call| call.bytes)
                .sum();
            assert_eq!(sent, expected as u64);
        }
    }
}

#[rstest]
fn test_file_to_file(
    #[values(FileStrategy::RangeCopy, FileStrategy::SendFile)] strategy: FileStrategy,
    #[values(Limit::Unlimited, Limit::OneLess, Limit::Half, Limit::More)] limit: Limit,
) {
    for size in boundary_sizes() {
        check_file_copy(strategy, size, limit);
    }
}

#[rstest]
#[case(FileStrategy::RangeCopy)]
#[case(FileStrategy::SendFile)]
fn test_copy_file_onto_itself(#[case] strategy: FileStrategy) {
    let (copier, log) = recording_copier(Copier::with_options(strategy.options()));
    let data = b"hello world!";
    let file = file_with(data);

    let n = copier.transfer(&mut &file, &mut &file, None).unwrap();
    assert_eq!(n, data.len() as u64);

    // Overlapping ranges: the kernel refuses and the buffered loop appends
    assert_eq!(accelerated_bytes(&log), 0);
    assert!(!was_called(&log, TransferMethod::SendFile));
    match strategy {
        FileStrategy::RangeCopy => {
            let calls = calls_for(&log, TransferMethod::RangeCopy);
            assert!(!calls.is_empty());
            assert!(calls.iter().all(|call| !call.handled && call.bytes == 0));
        }
        FileStrategy::SendFile => assert!(log.lock().unwrap().is_empty()),
    }

    let mut file = file;
    let mut doubled = data.to_vec();
    doubled.extend_from_slice(data);
    assert_eq!(contents(&mut file), doubled);
}

#[rstest]
#[case(FileStrategy::RangeCopy)]
#[case(FileStrategy::SendFile)]
fn test_append_mode_destination(#[case] strategy: FileStrategy) {
    let (copier, log) = recording_copier(Copier::with_options(strategy.options()));
    let (mut src, _, data) = file_pair(42);

    let target = NamedTempFile::new().unwrap();
    fs::write(target.path(), b"prefix:").unwrap();
    let mut dst = OpenOptions::new()
        .read(true)
        .append(true)
        .open(target.path())
        .unwrap();

    let n = copier.transfer(&mut dst, &mut src, None).unwrap();
    assert_eq!(n, 42);
    assert!(!was_called(&log, TransferMethod::RangeCopy));
    assert!(!was_called(&log, TransferMethod::SendFile));
    assert!(!was_called(&log, TransferMethod::Splice));

    let mut expected = b"prefix:".to_vec();
    expected.extend_from_slice(&data);
    assert_eq!(contents(&mut dst), expected);
}

#[test]
fn test_pipe_to_pipe() {
    let (copier, log) = recording_copier(Copier::new());
    let (mut r1, mut w1) = pipe();
    let (mut r2, mut w2) = pipe();

    // Fits in the pipe buffer, no helper thread needed
    w1.write_all(b"hello").unwrap();
    drop(w1);

    let n = copier.transfer(&mut w2, &mut r1, None).unwrap();
    assert_eq!(n, 5);
    assert!(was_called(&log, TransferMethod::Splice));
    assert_eq!(accelerated_bytes(&log), 5);

    drop(w2);
    let mut out = Vec::new();
    r2.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"hello");
}

#[test]
fn test_file_to_pipe() {
    let (copier, log) = recording_copier(Copier::new());
    let (mut src, _, data) = file_pair(255);
    let (mut reader, mut writer) = pipe();

    let n = copier.transfer(&mut writer, &mut src, None).unwrap();
    assert_eq!(n, 255);
    assert!(!was_called(&log, TransferMethod::RangeCopy));
    assert!(was_called(&log, TransferMethod::SendFile));
    assert_eq!(accelerated_bytes(&log), 255);

    drop(writer);
    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(out, data);
}

#[test]
fn test_pipe_to_file() {
    let (copier, log) = recording_copier(Copier::new());
    let (_, mut dst, data) = file_pair(255);
    let (mut reader, mut writer) = pipe();

    writer.write_all(&data).unwrap();
    drop(writer);

    let n = copier.transfer(&mut dst, &mut reader, None).unwrap();
    assert_eq!(n, 255);
    assert!(was_called(&log, TransferMethod::Splice));
    assert_eq!(accelerated_bytes(&log), 255);
    assert_eq!(offset(&mut dst), 255);
    assert_eq!(contents(&mut dst), data);
}

fn check_socket_to_file(family: SocketFamily, size: usize, limit: Limit) {
    let (copier, log) = recording_copier(Copier::new());
    let (mut client, server) = socket_pair(family);
    let mut dst = tempfile::tempfile().unwrap();
    let data = generate_test_data(size, TestDataPattern::Random);
    let limit = limit.for_size(size);
    let expected = limit.map_or(size, |limit| size.min(limit as usize));

    let payload = data.clone();
    let writer = thread::spawn(move || {
        // The reader may stop early under a limit
        let _ = client.write_all(&payload);
    });

    let src_fd = server.as_raw_fd();
    let dst_fd = dst.as_raw_fd();
    let (n, server) = transfer_with_limit(&copier, &mut dst, server, limit);
    drop(server);
    writer.join().unwrap();

    assert_eq!(n, expected as u64, "{:?} size {} limit {:?}", family, size, limit);
    assert_eq!(offset(&mut dst), expected as u64);
    assert_eq!(contents(&mut dst), &data[..expected]);

    if expected > 0 {
        let calls = calls_for(&log, TransferMethod::Splice);
        assert!(!calls.is_empty(), "splice was not attempted");
        for call in calls {
            assert_eq!(call.src_fd, src_fd);
            assert_eq!(call.dst_fd, dst_fd);
        }
    }
}

#[rstest]
fn test_socket_to_file(
    #[values(SocketFamily::Tcp, SocketFamily::Unix)] family: SocketFamily,
    #[values(Limit::Unlimited, Limit::OneLess, Limit::Half, Limit::More)] limit: Limit,
) {
    for size in boundary_sizes() {
        check_socket_to_file(family, size, limit);
    }
}

#[rstest]
#[case(SocketFamily::Tcp)]
#[case(SocketFamily::Unix)]
fn test_socket_to_tty(#[case] family: SocketFamily) {
    let Some((mut master, mut tty)) = pty() else {
        eprintln!("skipping: pseudo-terminals unavailable");
        return;
    };
    let (mut client, mut server) = socket_pair(family);
    let data = vec![b'a'; 32768];

    let writer = thread::spawn(move || {
        // Bursts, not one large write
        for chunk in data.chunks(1024) {
            if client.write_all(chunk).is_err() {
                return;
            }
        }
    });
    let drain = thread::spawn(move || {
        let mut buf = [0u8; 32];
        while matches!(master.read(&mut buf), Ok(n) if n > 0) {}
    });

    let n = Copier::new().transfer(&mut tty, &mut server, None).unwrap();
    assert_eq!(n, 32768);

    writer.join().unwrap();
    drop(tty);
    drain.join().unwrap();
}

/// One side of a streaming pairing
#[derive(Debug, Clone, Copy)]
enum Side {
    File,
    Pipe,
    Socket(SocketFamily),
}

impl Side {
    /// Connected `(read, write)` halves of a pipe or socket
    fn ends(self) -> (File, File) {
        match self {
            Side::File => unreachable!("files have no peer"),
            Side::Pipe => pipe(),
            Side::Socket(family) => {
                let (client, server) = socket_pair(family);
                (server, client)
            }
        }
    }
}

/// Write `data` into `writer` on a helper thread, closing it afterwards
fn feed(mut writer: File, data: Vec<u8>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        // The reader may stop early under a limit
        let _ = writer.write_all(&data);
    })
}

/// Read `reader` to end of data on a helper thread
fn collect(mut reader: File) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    })
}

fn check_pairing(from: Side, to: Side, size: usize, limit: Limit, method: TransferMethod) {
    let (copier, log) = recording_copier(Copier::new());
    let data = generate_test_data(size, TestDataPattern::Random);
    let limit = limit.for_size(size);
    let expected = limit.map_or(size, |limit| size.min(limit as usize));

    let (src, feeder) = match from {
        Side::File => (file_with(&data), None),
        stream => {
            let (read, write) = stream.ends();
            (read, Some(feed(write, data.clone())))
        }
    };
    let (mut dst, collector) = match to {
        Side::File => (tempfile::tempfile().unwrap(), None),
        stream => {
            let (read, write) = stream.ends();
            (write, Some(collect(read)))
        }
    };

    let (n, src) = transfer_with_limit(&copier, &mut dst, src, limit);
    drop(src);
    if let Some(feeder) = feeder {
        feeder.join().unwrap();
    }
    let received = match collector {
        Some(collector) => {
            drop(dst);
            collector.join().unwrap()
        }
        None => contents(&mut dst),
    };

    let context = format!("{:?} -> {:?} size {} limit {:?}", from, to, size, limit);
    assert_eq!(n, expected as u64, "{}", context);
    assert_eq!(received, &data[..expected], "{}", context);

    let calls = log.lock().unwrap().clone();
    if expected == 0 {
        assert!(calls.is_empty(), "{}", context);
        return;
    }
    assert!(!calls.is_empty(), "{}: nothing attempted", context);
    assert!(calls.iter().all(|call| call.method == method), "{}", context);
    assert_eq!(accelerated_bytes(&log), expected as u64, "{}", context);
}

#[rstest]
fn test_file_to_socket(
    #[values(SocketFamily::Tcp, SocketFamily::Unix)] family: SocketFamily,
    #[values(Limit::Unlimited, Limit::OneLess, Limit::Half, Limit::More)] limit: Limit,
) {
    for size in boundary_sizes() {
        check_pairing(
            Side::File,
            Side::Socket(family),
            size,
            limit,
            TransferMethod::SendFile,
        );
    }
}

#[rstest]
fn test_socket_to_socket(
    #[values(SocketFamily::Tcp, SocketFamily::Unix)] from: SocketFamily,
    #[values(SocketFamily::Tcp, SocketFamily::Unix)] to: SocketFamily,
    #[values(Limit::Unlimited, Limit::OneLess, Limit::Half, Limit::More)] limit: Limit,
) {
    for size in boundary_sizes() {
        check_pairing(
            Side::Socket(from),
            Side::Socket(to),
            size,
            limit,
            TransferMethod::Splice,
        );
    }
}

#[rstest]
fn test_socket_to_pipe(
    #[values(SocketFamily::Tcp, SocketFamily::Unix)] family: SocketFamily,
    #[values(Limit::Unlimited, Limit::OneLess, Limit::Half, Limit::More)] limit: Limit,
) {
    for size in boundary_sizes() {
        check_pairing(
            Side::Socket(family),
            Side::Pipe,
            size,
            limit,
            TransferMethod::Splice,
        );
    }
}

#[rstest]
fn test_pipe_to_socket(
    #[values(SocketFamily::Tcp, SocketFamily::Unix)] family: SocketFamily,
    #[values(Limit::Unlimited, Limit::OneLess, Limit::Half, Limit::More)] limit: Limit,
) {
    for size in boundary_sizes() {
        check_pairing(
            Side::Pipe,
            Side::Socket(family),
            size,
            limit,
            TransferMethod::Splice,
        );
    }
}

#[test]
fn test_refused_self_splice_keeps_pipes_accelerated() {
    let copier = Copier::new().with_cache(Arc::new(UnsupportedCache::new()));

    // The kernel refuses to splice a pipe into itself
    let (mut reader, mut writer) = pipe();
    writer.write_all(b"hello").unwrap();
    let report = copier
        .transfer_report(&mut writer, &mut reader, Some(5))
        .unwrap();
    assert_eq!(report.bytes, 5);
    assert_eq!(report.splice_bytes, 0);
    assert_eq!(report.fallback_bytes, 5);

    // An unrelated pipe pairing still goes through splice
    let (mut r1, mut w1) = pipe();
    let (mut r2, mut w2) = pipe();
    w1.write_all(b"world").unwrap();
    drop(w1);
    let report = copier.transfer_report(&mut w2, &mut r1, None).unwrap();
    assert_eq!(report.splice_bytes, 5);
    assert!(!report.fallback_used);

    drop(w2);
    let mut out = Vec::new();
    r2.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"world");
}

#[test]
fn test_invalid_source() {
    let (copier, log) = recording_copier(Copier::new());
    let mut dst = tempfile::tempfile().unwrap();
    let mut src = ClosedEndpoint::default();

    let err = copier.transfer(&mut dst, &mut src, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(err.bytes_written(), 0);
    assert_eq!(src.io_calls(), 0);
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(offset(&mut dst), 0);
}

#[test]
fn test_invalid_destination() {
    let (copier, log) = recording_copier(Copier::new());
    let mut src = file_with(b"data");
    let mut dst = ClosedEndpoint::default();

    let err = copier.transfer(&mut dst, &mut src, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(dst.io_calls(), 0);
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(offset(&mut src), 0);
}

#[test]
fn test_invalid_on_both_sides() {
    let mut src = ClosedEndpoint::default();
    let mut dst = ClosedEndpoint::default();

    let err = Copier::new().transfer(&mut dst, &mut src, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(src.io_calls() + dst.io_calls(), 0);
}

#[test]
fn test_proc_file_copy() {
    const CMDLINE: &str = "/proc/self/cmdline";
    let Ok(expected) = fs::read(CMDLINE) else {
        eprintln!("skipping: {} unreadable", CMDLINE);
        return;
    };

    let mut src = File::open(CMDLINE).unwrap();
    let mut dst = tempfile::tempfile().unwrap();
    let n = Copier::new().transfer(&mut dst, &mut src, None).unwrap();

    assert_eq!(n, expected.len() as u64);
    assert_eq!(contents(&mut dst), expected);
}

#[rstest]
#[case(SocketFamily::Tcp)]
#[case(SocketFamily::Unix)]
fn test_probe_stream_sockets(#[case] family: SocketFamily) {
    let (client, server) = socket_pair(family);
    for socket in [&client, &server] {
        let endpoint = Endpoint::probe(socket.as_fd()).unwrap();
        assert_eq!(endpoint.kind(), EndpointKind::StreamSocket);
        assert!(endpoint.is_stream());
    }
}

#[test]
fn test_probe_other_kinds() {
    let (reader, writer) = pipe();
    assert_eq!(Endpoint::probe(reader.as_fd()).unwrap().kind(), EndpointKind::Pipe);
    assert_eq!(Endpoint::probe(writer.as_fd()).unwrap().kind(), EndpointKind::Pipe);

    let file = file_with(b"x");
    assert_eq!(
        Endpoint::probe(file.as_fd()).unwrap().kind(),
        EndpointKind::RegularFile
    );

    if let Some((_master, tty)) = pty() {
        assert_eq!(Endpoint::probe(tty.as_fd()).unwrap().kind(), EndpointKind::Other);
    }
}

#[test]
fn test_zero_limit_does_nothing() {
    let (copier, log) = recording_copier(Copier::new());
    let (mut src, mut dst, _) = file_pair(100);

    let n = copier.transfer(&mut dst, &mut src, Some(0)).unwrap();
    assert_eq!(n, 0);
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(offset(&mut src), 0);
    assert!(contents(&mut dst).is_empty());

    let mut limited = Limited::new(src, 0);
    assert_eq!(copier.transfer_limited(&mut dst, &mut limited).unwrap(), 0);
    assert_eq!(limited.remaining(), 0);
}

#[test]
fn test_report_breaks_down_methods() {
    let (_, mut dst, data) = file_pair(4096);
    let (mut reader, mut writer) = pipe();
    writer.write_all(&data).unwrap();
    drop(writer);

    let report = Copier::new()
        .with_cache(Arc::new(UnsupportedCache::new()))
        .transfer_report(&mut dst, &mut reader, None)
        .unwrap();
    assert_eq!(report.bytes, 4096);
    assert_eq!(report.splice_bytes, 4096);
    assert!(!report.fallback_used);
    assert_eq!(report.primary_method(), Some(TransferMethod::Splice));
}

#[test]
fn test_memoized_pairing_is_skipped() {
    let (mut src, mut dst, data) = file_pair(8193);
    let device = Endpoint::probe(src.as_fd()).unwrap().device();
    let dst_device = Endpoint::probe(dst.as_fd()).unwrap().device();

    let cache = Arc::new(UnsupportedCache::new());
    cache.mark_unsupported(TransferMethod::RangeCopy, device, dst_device);

    let report = Copier::new()
        .with_cache(Arc::clone(&cache))
        .transfer_report(&mut dst, &mut src, None)
        .unwrap();
    assert_eq!(report.range_copy_bytes, 0);
    assert_eq!(report.sendfile_bytes, 8193);
    assert_eq!(contents(&mut dst), data);
}

#[test]
fn test_configured_fallback_only() {
    let mut config_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    write!(
        config_file,
        "transfer:\n  enable_range_copy: false\n  enable_sendfile: false\n  enable_splice: false\n  buffer_size: 4096\n"
    )
    .unwrap();

    let config = ConfigBuilder::new()
        .add_defaults()
        .add_source_file(config_file.path())
        .build()
        .unwrap();
    let (copier, log) = recording_copier(Copier::with_options(config.transfer.to_options()));
    let (mut src, mut dst, data) = file_pair(32769);

    let report = copier.transfer_report(&mut dst, &mut src, None).unwrap();
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(report.fallback_bytes, 32769);
    assert!(report.fallback_used);
    assert_eq!(contents(&mut dst), data);
}

#[test]
fn test_copy_resumes_at_source_offset() {
    let (mut src, mut dst, data) = file_pair(10_000);
    src.seek(SeekFrom::Start(1234)).unwrap();

    let n = Copier::new().transfer(&mut dst, &mut src, None).unwrap();
    assert_eq!(n, 10_000 - 1234);
    assert_eq!(offset(&mut src), 10_000);
    assert_eq!(contents(&mut dst), &data[1234..]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_file_copy_matches_prefix(size in 0usize..100_000, limit in proptest::option::of(0u64..120_000)) {
        let (mut src, mut dst, data) = file_pair(size);
        let expected = limit.map_or(size, |limit| size.min(limit as usize));

        let n = Copier::new().transfer(&mut dst, &mut src, limit).unwrap();
        prop_assert_eq!(n, expected as u64);
        prop_assert_eq!(contents(&mut dst), &data[..expected]);
    }
}
