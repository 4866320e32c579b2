//! Transfer benchmarks
//!
//! Compares the kernel-assisted paths against the buffered fallback for
//! file-to-file and pipe-to-file transfers.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::io::{Seek, SeekFrom, Write};
use std::thread;

use fdxfer_tests::test_utils::{file_with, generate_test_data, pipe, TestDataPattern};
use fdxfer_types::TransferOptions;
use fdxfer_zerocopy::{fallback, Copier};

const SIZES: &[(&str, usize)] = &[
    ("64KB", 64 * 1024),
    ("1MB", 1024 * 1024),
    ("16MB", 16 * 1024 * 1024),
];

fn copier_variants() -> Vec<(&'static str, Copier)> {
    vec![
        ("accelerated", Copier::new()),
        (
            "sendfile_only",
            Copier::with_options(TransferOptions {
                enable_range_copy: false,
                ..TransferOptions::default()
            }),
        ),
        ("fallback", Copier::with_options(TransferOptions::fallback_only())),
    ]
}

fn bench_file_to_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_to_file");
    group.sample_size(20);

    for &(label, size) in SIZES {
        let data = generate_test_data(size, TestDataPattern::Random);
        let mut src = file_with(&data);
        let mut dst = tempfile::tempfile().expect("Failed to create destination");
        group.throughput(Throughput::Bytes(size as u64));

        for (name, copier) in copier_variants() {
            group.bench_with_input(BenchmarkId::new(name, label), &size, |b, _| {
                b.iter(|| {
                    src.seek(SeekFrom::Start(0)).unwrap();
                    dst.set_len(0).unwrap();
                    dst.seek(SeekFrom::Start(0)).unwrap();
                    black_box(copier.transfer(&mut dst, &mut src, None).unwrap())
                });
            });
        }

        group.bench_with_input(BenchmarkId::new("buffered_loop", label), &size, |b, _| {
            b.iter(|| {
                src.seek(SeekFrom::Start(0)).unwrap();
                dst.set_len(0).unwrap();
                dst.seek(SeekFrom::Start(0)).unwrap();
                black_box(
                    fallback::copy_buffered(&mut dst, &mut src, None, Default::default()).unwrap(),
                )
            });
        });
    }

    group.finish();
}

fn bench_pipe_to_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipe_to_file");
    group.sample_size(20);

    for &(label, size) in &SIZES[..2] {
        let data = generate_test_data(size, TestDataPattern::Random);
        let mut dst = tempfile::tempfile().expect("Failed to create destination");
        group.throughput(Throughput::Bytes(size as u64));

        for (name, copier) in copier_variants() {
            group.bench_with_input(BenchmarkId::new(name, label), &size, |b, _| {
                b.iter(|| {
                    let (mut reader, mut writer) = pipe();
                    let payload = data.clone();
                    let feeder = thread::spawn(move || writer.write_all(&payload).unwrap());
                    dst.set_len(0).unwrap();
                    dst.seek(SeekFrom::Start(0)).unwrap();
                    let n = copier.transfer(&mut dst, &mut reader, None).unwrap();
                    feeder.join().unwrap();
                    black_box(n)
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_file_to_file, bench_pipe_to_file);
criterion_main!(benches);
