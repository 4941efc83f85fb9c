//! Benchmarks for namespace master operations.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use memspace::master::{BlockMaster, FileSystemMaster};
use memspace::session::{SessionId, SessionRegistry};
use memspace::ufs::LocalUfs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn create_master() -> (FileSystemMaster, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let master = FileSystemMaster::new(
        temp_dir.path().to_string_lossy().into_owned(),
        64 * 1024 * 1024,
        Arc::new(LocalUfs::new()),
        Arc::new(BlockMaster::new()),
    );
    (master, temp_dir)
}

fn bench_create(c: &mut Criterion) {
    let (master, _temp) = create_master();
    let mut counter = 0u64;

    c.bench_function("create_file", |b| {
        b.iter(|| {
            counter += 1;
            let path = format!("/bench/d{}/f{}", counter % 64, counter);
            master.create(black_box(&path), 1024, true, None)
        })
    });
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_file_id");

    for depth in [1usize, 4, 16].iter() {
        let (master, _temp) = create_master();
        let path: String = (0..*depth).map(|i| format!("/level{}", i)).collect();
        master.create(&path, 1024, true, None).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, _| {
            b.iter(|| master.get_file_id(black_box(&path)))
        });
    }
    group.finish();
}

fn bench_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_file_info_list");

    for entries in [10u64, 100, 1000].iter() {
        let (master, _temp) = create_master();
        let dir = master.mkdir("/dir", false).unwrap();
        for i in 0..*entries {
            master
                .create(&format!("/dir/f{}", i), 1024, false, None)
                .unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(entries), entries, |b, _| {
            b.iter(|| master.get_file_info_list(black_box(dir)))
        });
    }
    group.finish();
}

fn bench_session_heartbeat(c: &mut Criterion) {
    let registry = SessionRegistry::new(Duration::from_secs(10));
    for id in 0..10_000 {
        registry.heartbeat(SessionId::new(id));
    }
    let mut counter = 0i64;

    c.bench_function("session_heartbeat", |b| {
        b.iter(|| {
            counter = (counter + 1) % 10_000;
            registry.heartbeat(black_box(SessionId::new(counter)))
        })
    });
}

criterion_group!(
    benches,
    bench_create,
    bench_lookup,
    bench_list,
    bench_session_heartbeat
);
criterion_main!(benches);
