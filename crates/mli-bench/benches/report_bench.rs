//! Failure-path cost: what the reporting hook adds to a failing call.
//!
//! `close(-1)` fails with `EBADF` without touching any kernel object, so the
//! measured difference between variants is the hook and the reporter.

use std::cell::RefCell;
use std::sync::Arc;
use std::time::{Duration, Instant};

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mli_bench::BenchStats;
use mli_core::report::{ErrorReporter, MemoryReporter, NoopReporter, with_reporter};

fn failing_close(c: &mut Criterion, reporter: Option<Arc<dyn ErrorReporter>>, variant: &str) {
    let mut group = c.benchmark_group("failure_path");
    group.throughput(Throughput::Elements(1));

    let stats = RefCell::new(BenchStats::default());
    let mut body = || {
        group.bench_function(BenchmarkId::new("close_ebadf", variant), |b| {
            b.iter_custom(|iters| {
                let start = Instant::now();
                for _ in 0..iters {
                    black_box(mli_core::close(black_box(-1))).ok();
                }
                let dur = start.elapsed().max(Duration::from_nanos(1));
                stats.borrow_mut().record(iters, dur);
                dur
            });
        });
    };
    match reporter {
        Some(reporter) => with_reporter(reporter, body),
        None => body(),
    }
    stats.borrow().report(variant, "close_ebadf");
    group.finish();
}

fn bench_raw(c: &mut Criterion) {
    let mut group = c.benchmark_group("failure_path");
    group.throughput(Throughput::Elements(1));
    let stats = RefCell::new(BenchStats::default());
    group.bench_function(BenchmarkId::new("close_ebadf", "raw"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                // SAFETY: closing -1 only sets errno.
                black_box(unsafe { libc::close(black_box(-1)) });
            }
            let dur = start.elapsed().max(Duration::from_nanos(1));
            stats.borrow_mut().record(iters, dur);
            dur
        });
    });
    stats.borrow().report("raw", "close_ebadf");
    group.finish();
}

fn bench_reporters(c: &mut Criterion) {
    bench_raw(c);
    // Mode comes from MLI_DIAGNOSTICS; leave it unset (off) for a fair baseline.
    failing_close(c, None, "default_mode");
    failing_close(c, Some(Arc::new(NoopReporter)), "noop_reporter");

    let sink = Arc::new(MemoryReporter::new());
    failing_close(c, Some(sink.clone()), "memory_reporter");
    black_box(sink.drain());
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(1))
        .measurement_time(Duration::from_secs(2))
        .sample_size(50);
    targets = bench_reporters
);
criterion_main!(benches);
