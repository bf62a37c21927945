//! Throughput benchmark over the supported keyed-hash variants.
//!
//! Used once at startup (or from the CLI) to find the fastest variant and
//! record it in the registry.

use std::hint::black_box;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::hash::{KEY_LEN, KeyedHash};
use crate::registry::Registry;

/// Benchmark key. Throughput does not depend on the key value.
const BENCH_KEY: [u8; KEY_LEN] = [0x42; KEY_LEN];

/// Measured throughput of one variant.
#[derive(Debug, Clone, Serialize)]
pub struct VariantThroughput {
    pub id: usize,
    pub name: String,
    pub bytes: u64,
    pub elapsed: Duration,
    pub bytes_per_sec: f64,
}

/// Time `rounds` keystream refills of `chunk_size` bytes for every supported
/// variant, in id order.
pub fn measure(registry: &Registry, chunk_size: usize, rounds: usize) -> Vec<VariantThroughput> {
    let mut buf = vec![0u8; chunk_size];
    (0..registry.count())
        .map(|id| {
            let variant = registry.get_by_id(id);
            measure_one(id, variant, &mut buf, rounds)
        })
        .collect()
}

fn measure_one(id: usize, variant: &dyn KeyedHash, buf: &mut [u8], rounds: usize) -> VariantThroughput {
    let ctx = variant.init(&BENCH_KEY);
    let chunk = buf.len() as u64;
    let start = Instant::now();
    for round in 0..rounds as u64 {
        variant.finalize_seek(&ctx, round * chunk, buf);
        black_box(&buf[..]);
    }
    let elapsed = start.elapsed();
    let bytes = chunk * rounds as u64;
    let secs = elapsed.as_secs_f64();
    let bytes_per_sec = if secs > 0.0 { bytes as f64 / secs } else { 0.0 };
    log::debug!("{}: {bytes} bytes in {elapsed:?} ({bytes_per_sec:.0} B/s)", variant.name());
    VariantThroughput {
        id,
        name: variant.name().to_string(),
        bytes,
        elapsed,
        bytes_per_sec,
    }
}

/// Record the highest-throughput entry of `results` as the registry's
/// fastest variant.
pub fn record_fastest<'a>(registry: &Registry, results: &'a [VariantThroughput]) -> Option<&'a VariantThroughput> {
    let winner = results
        .iter()
        .max_by(|a, b| a.bytes_per_sec.total_cmp(&b.bytes_per_sec))?;
    registry.set_fastest(winner.id);
    log::info!(
        "fastest keyed hash variant: {} ({:.1} MiB/s)",
        winner.name,
        winner.bytes_per_sec / (1024.0 * 1024.0)
    );
    Some(winner)
}

/// Benchmark every supported variant and record the winner as "fastest".
/// Returns the winner, or `None` when no variant is supported.
pub fn select_fastest(registry: &Registry, chunk_size: usize, rounds: usize) -> Option<VariantThroughput> {
    let results = measure(registry, chunk_size, rounds);
    record_fastest(registry, &results).cloned()
}
