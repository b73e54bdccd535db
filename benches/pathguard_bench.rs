//! PathGuard validation throughput on hostile and clean inputs.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;

use wardend::events::FileOperation;
use wardend::metrics::WardenMetrics;
use wardend::pathguard::PathGuard;

fn bench_validate(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let root = tempfile::tempdir().unwrap();
    let guard = Arc::new(PathGuard::new(
        Vec::new(),
        Vec::new(),
        Arc::new(WardenMetrics::new()),
    ));
    rt.block_on(guard.register_root("bench", root.path()));

    let clean = root.path().join("src/deeply/nested/module/file.rs");
    let clean = clean.to_string_lossy().into_owned();

    let mut group = c.benchmark_group("pathguard_validate");
    group.bench_function("clean_path", |b| {
        b.iter(|| {
            rt.block_on(guard.validate(
                black_box(&clean),
                Some("bench"),
                FileOperation::Write,
            ))
        })
    });
    group.bench_function("basic_traversal", |b| {
        b.iter(|| {
            rt.block_on(guard.validate(
                black_box("../../../../etc/passwd"),
                Some("bench"),
                FileOperation::Write,
            ))
        })
    });
    group.bench_function("double_encoded", |b| {
        b.iter(|| {
            rt.block_on(guard.validate(
                black_box("%25252e%25252e%25252fetc%25252fshadow"),
                Some("bench"),
                FileOperation::Write,
            ))
        })
    });
    group.bench_function("unicode_homoglyphs", |b| {
        b.iter(|| {
            rt.block_on(guard.validate(
                black_box("\u{ff0e}\u{ff0e}\u{2215}tmp\u{2215}payload"),
                Some("bench"),
                FileOperation::Write,
            ))
        })
    });
    group.finish();
}

criterion_group!(benches, bench_validate);
criterion_main!(benches);
