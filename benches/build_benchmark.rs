//! Request builder benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use party::request::MultipartRequest;
use std::io::Write;

fn benchmark_build_file_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_file_sizes");
    let dir = tempfile::tempdir().unwrap();

    for size in [1024, 10 * 1024, 100 * 1024, 1024 * 1024].iter() {
        let path = dir.path().join(format!("{}.bin", size));
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&vec![0u8; *size])
            .unwrap();
        let request = MultipartRequest::new().file(&path).param("foo", "bar");

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(format!("{}_bytes", size), size, |b, _| {
            b.iter(|| black_box(request.build().unwrap()));
        });
    }

    group.finish();
}

fn benchmark_build_params(c: &mut Criterion) {
    let request = MultipartRequest::new()
        .params((0..32).map(|i| (format!("key-{}", i), format!("value-{}", i))));

    c.bench_function("build_32_params", |b| {
        b.iter(|| black_box(request.build().unwrap()));
    });
}

criterion_group!(benches, benchmark_build_file_sizes, benchmark_build_params);
criterion_main!(benches);
