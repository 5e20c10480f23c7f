//! Shared helpers for the mli benchmarks.
//!
//! Criterion prints its own summary; [`BenchStats`] additionally emits one
//! greppable `MLI_BENCH` line per benchmark so runs can be compared by
//! scripts without parsing criterion's output.

use std::time::Duration;

/// Per-sample timings collected inside `iter_custom`.
#[derive(Debug, Default)]
pub struct BenchStats {
    samples_ns_per_op: Vec<f64>,
    total_iters: u64,
    total_ns: u128,
}

impl BenchStats {
    pub fn record(&mut self, iters: u64, dur: Duration) {
        let ns = dur.as_nanos();
        self.total_iters = self.total_iters.saturating_add(iters);
        self.total_ns = self.total_ns.saturating_add(ns);
        if iters > 0 {
            self.samples_ns_per_op.push(ns as f64 / iters as f64);
        }
    }

    /// Median ns/op, if any samples were recorded.
    #[must_use]
    pub fn median(&self) -> Option<f64> {
        let sorted = self.sorted();
        (!sorted.is_empty()).then(|| percentile_sorted(&sorted, 0.50))
    }

    fn sorted(&self) -> Vec<f64> {
        let mut samples = self.samples_ns_per_op.clone();
        samples.sort_by(f64::total_cmp);
        samples
    }

    /// Print the summary line for `bench` under `variant`.
    pub fn report(&self, variant: &str, bench: &str) {
        let samples = self.sorted();
        if samples.is_empty() {
            return;
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let throughput_ops_s = if self.total_ns == 0 {
            0.0
        } else {
            self.total_iters as f64 / (self.total_ns as f64 / 1e9)
        };
        println!(
            "MLI_BENCH variant={variant} bench={bench} diagnostics_compiled={} samples={} p50_ns_op={:.3} p95_ns_op={:.3} mean_ns_op={:.3} throughput_ops_s={:.3}",
            mli_core::config::DIAGNOSTICS_COMPILED,
            samples.len(),
            percentile_sorted(&samples, 0.50),
            percentile_sorted(&samples, 0.95),
            mean,
            throughput_ops_s,
        );
    }
}

/// Nearest-rank percentile of an ascending slice.
#[must_use]
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    debug_assert!((0.0..=1.0).contains(&p));
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
