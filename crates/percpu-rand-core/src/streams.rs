//! Per-core stream manager.
//!
//! Owns one generator per core slot and is the only way to reach them. Reads
//! are produced in bounded scratch chunks: pin the current core's slot, serve
//! into scratch, unpin, then hand the chunk to the sink. The pin is never held
//! across a sink write.

use std::io::Write;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::bench;
use crate::config::{Backend, StreamConfig};
use crate::entropy::{OsEntropy, SecureRandom};
use crate::error::{Error, Result};
use crate::keystream::Keystream;
use crate::percpu::CoreArena;
use crate::registry::{Registry, registry};
use crate::xoshiro::Xoshiro256PlusPlus;

/// Largest chunk served under one pin.
pub const SCRATCH_LEN: usize = 64 * 1024;

/// Contents of one core slot.
enum CoreGenerator {
    Keyed(Keystream),
    Xoshiro(Xoshiro256PlusPlus),
}

impl CoreGenerator {
    fn serve(&mut self, out: &mut [u8]) {
        match self {
            Self::Keyed(ks) => ks.serve(out),
            Self::Xoshiro(x) => x.serve(out),
        }
    }
}

/// One generator per core, all of the same [`Backend`].
pub struct CoreStreams {
    arena: CoreArena<CoreGenerator>,
    backend: Backend,
}

impl CoreStreams {
    /// Initialize from the OS CSPRNG and the process-wide registry.
    pub fn init(config: &StreamConfig) -> Result<Self> {
        Self::init_with(config, Arc::new(OsEntropy), registry())
    }

    /// Initialize with an explicit secure source and registry.
    ///
    /// The configured implementation name is installed in `registry` before
    /// any keystream is keyed. With a keyed `"fastest"` config the supported
    /// variants are benchmarked once every slot is built, and the winner is
    /// recorded before the first byte is served. Any failure drops the slots
    /// built so far.
    pub fn init_with(
        config: &StreamConfig,
        source: Arc<dyn SecureRandom>,
        registry: &'static Registry,
    ) -> Result<Self> {
        config.validate()?;
        registry.select_by_name(&config.implementation)?;

        let cores = config.core_count();
        let mut arena = CoreArena::try_with_capacity(cores).inspect_err(|e| {
            log::error!("per-core slot allocation failed for {cores} cores: {e}");
        })?;

        match config.backend {
            Backend::Keyed => {
                let limits = config.limits();
                for core in 0..cores {
                    let ks = Keystream::new(Arc::clone(&source), registry, limits).inspect_err(|e| {
                        if matches!(e, Error::AllocationFailure { .. }) {
                            log::error!("keystream allocation failed on core {core}: {e}");
                        }
                    })?;
                    arena.push(CoreGenerator::Keyed(ks));
                }
                if config.implementation == "fastest" && config.bench_rounds > 0 {
                    bench::select_fastest(registry, config.chunk_size, config.bench_rounds);
                }
            }
            Backend::Xoshiro => {
                let mut state = Xoshiro256PlusPlus::from_entropy(&*source)?;
                for core in 0..cores {
                    arena.push(CoreGenerator::Xoshiro(state.clone()));
                    if core + 1 < cores {
                        state.jump();
                    }
                }
            }
        }

        log::info!(
            "per-core streams ready: {cores} {} slots, implementation {}",
            config.backend,
            registry.current_name()
        );
        Ok(Self {
            arena,
            backend: config.backend,
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Number of live slots (0 after teardown).
    pub fn core_count(&self) -> usize {
        self.arena.len()
    }

    /// Write `len` bytes from the current core's stream to `dest`.
    ///
    /// Returns the number of bytes delivered, which is `len` on success. On a
    /// sink failure the error carries how many bytes were fully written first.
    pub fn read<W: Write>(&self, mut dest: W, len: usize) -> Result<usize> {
        if self.arena.is_empty() {
            return Err(Error::TornDown);
        }
        let mut scratch = Zeroizing::new(vec![0u8; len.min(SCRATCH_LEN)]);
        let mut delivered = 0;
        while delivered < len {
            let n = (len - delivered).min(scratch.len());
            {
                let mut pin = self.arena.pin().ok_or(Error::TornDown)?;
                pin.serve(&mut scratch[..n]);
            }
            dest.write_all(&scratch[..n])
                .map_err(|source| Error::DeliveryFault { delivered, source })?;
            delivered += n;
        }
        Ok(delivered)
    }

    /// Fill `out` from the current core's stream.
    pub fn fill(&self, out: &mut [u8]) -> Result<()> {
        let mut pin = self.arena.pin().ok_or(Error::TornDown)?;
        pin.serve(out);
        Ok(())
    }

    /// Fill `out` from a specific slot, regardless of the executing core.
    ///
    /// # Panics
    /// Panics if `core >= core_count()` on a live manager.
    pub fn fill_on_core(&self, core: usize, out: &mut [u8]) -> Result<()> {
        if self.arena.is_empty() {
            return Err(Error::TornDown);
        }
        self.arena.pin_core(core).serve(out);
        Ok(())
    }

    /// Release every slot. Idempotent; also runs on drop.
    pub fn teardown(&mut self) {
        if !self.arena.is_empty() {
            log::debug!("tearing down {} {} slots", self.arena.len(), self.backend);
        }
        self.arena.clear();
    }
}

impl Drop for CoreStreams {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for CoreStreams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreStreams")
            .field("backend", &self.backend)
            .field("cores", &self.arena.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{KeyedContext, KeyedHash, PortableBlake3};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Distinct non-degenerate draws: the first 8 bytes are a counter.
    struct Sequential(AtomicU64);

    impl SecureRandom for Sequential {
        fn fill(&self, buf: &mut [u8]) -> Result<()> {
            let n = self.0.fetch_add(1, Ordering::Relaxed) + 1;
            buf.fill(0xA5);
            buf[..8].copy_from_slice(&n.to_le_bytes());
            Ok(())
        }
    }

    struct Zeros;

    impl SecureRandom for Zeros {
        fn fill(&self, buf: &mut [u8]) -> Result<()> {
            buf.fill(0);
            Ok(())
        }
    }

    fn sequential() -> Arc<dyn SecureRandom> {
        Arc::new(Sequential(AtomicU64::new(0)))
    }

    fn config(backend: Backend, cores: usize) -> StreamConfig {
        StreamConfig {
            backend,
            cores: Some(cores),
            chunk_size: 256,
            ..StreamConfig::default()
        }
    }

    fn local_registry() -> &'static Registry {
        static LOCAL: Registry = Registry::new(crate::hash::CANDIDATES);
        &LOCAL
    }

    #[test]
    fn test_init_allocates_every_slot() {
        let s = CoreStreams::init_with(&config(Backend::Keyed, 5), sequential(), local_registry()).unwrap();
        assert_eq!(s.core_count(), 5);
        assert_eq!(s.backend(), Backend::Keyed);
    }

    #[test]
    fn test_keyed_cores_are_independently_keyed() {
        let s = CoreStreams::init_with(&config(Backend::Keyed, 3), sequential(), local_registry()).unwrap();
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        s.fill_on_core(0, &mut a).unwrap();
        s.fill_on_core(1, &mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_xoshiro_core_k_is_seed_jumped_k_times() {
        let s = CoreStreams::init_with(&config(Backend::Xoshiro, 3), sequential(), local_registry()).unwrap();
        let mut seed = [0xA5u8; 32];
        seed[..8].copy_from_slice(&1u64.to_le_bytes());
        let base = Xoshiro256PlusPlus::from_entropy(&Fixed(seed)).unwrap();

        for core in 0..3 {
            let mut got = [0u8; 40];
            s.fill_on_core(core, &mut got).unwrap();
            let mut expected = [0u8; 40];
            base.jumped(core).serve(&mut expected);
            assert_eq!(got, expected, "core {core}");
        }
    }

    struct Fixed([u8; 32]);

    impl SecureRandom for Fixed {
        fn fill(&self, buf: &mut [u8]) -> Result<()> {
            buf.copy_from_slice(&self.0[..buf.len()]);
            Ok(())
        }
    }

    #[test]
    fn test_degenerate_source_aborts_init() {
        for backend in [Backend::Keyed, Backend::Xoshiro] {
            let err = CoreStreams::init_with(&config(backend, 2), Arc::new(Zeros), local_registry()).unwrap_err();
            assert!(matches!(err, Error::SeedUnavailable { .. }), "{backend}");
        }
    }

    #[test]
    fn test_unknown_implementation_aborts_init() {
        let mut c = config(Backend::Keyed, 1);
        c.implementation = "no-such-variant".to_string();
        let err = CoreStreams::init_with(&c, sequential(), local_registry()).unwrap_err();
        assert!(matches!(err, Error::UnknownVariantName { .. }));
    }

    #[test]
    fn test_allocation_failure_aborts_init_and_allows_retry() {
        let huge = StreamConfig {
            chunk_size: 1 << (usize::BITS - 2),
            max_per_key: u64::MAX,
            ..config(Backend::Keyed, 3)
        };
        let err = CoreStreams::init_with(&huge, sequential(), local_registry()).unwrap_err();
        assert!(matches!(err, Error::AllocationFailure { .. }), "{err:?}");

        let s = CoreStreams::init_with(&config(Backend::Keyed, 3), sequential(), local_registry()).unwrap();
        assert_eq!(s.core_count(), 3);
        let mut out = [0u8; 16];
        s.fill_on_core(2, &mut out).unwrap();
    }

    /// Portable output, slowed down.
    struct Sluggish;

    impl KeyedHash for Sluggish {
        fn name(&self) -> &'static str {
            "sluggish"
        }

        fn is_supported(&self) -> bool {
            true
        }

        fn finalize_seek(&self, ctx: &KeyedContext, offset: u64, out: &mut [u8]) {
            std::thread::sleep(std::time::Duration::from_millis(2));
            PortableBlake3.finalize_seek(ctx, offset, out);
        }
    }

    static SLOW_FIRST: &[&dyn KeyedHash] = &[&Sluggish, &PortableBlake3];

    #[test]
    fn test_fastest_init_records_benchmark_winner() {
        static LOCAL: Registry = Registry::new(SLOW_FIRST);
        assert_eq!(LOCAL.fastest().name(), "sluggish");

        let c = StreamConfig {
            bench_rounds: 4,
            ..config(Backend::Keyed, 1)
        };
        let s = CoreStreams::init_with(&c, sequential(), &LOCAL).unwrap();
        assert_eq!(LOCAL.current_name(), "fastest");
        assert_eq!(LOCAL.fastest().name(), "generic");
        assert_eq!(LOCAL.resolve().name(), "generic");
        s.fill(&mut [0u8; 32]).unwrap();
    }

    #[test]
    fn test_zero_bench_rounds_keeps_recorded_fastest() {
        static LOCAL: Registry = Registry::new(SLOW_FIRST);
        let c = StreamConfig {
            bench_rounds: 0,
            ..config(Backend::Keyed, 1)
        };
        CoreStreams::init_with(&c, sequential(), &LOCAL).unwrap();
        assert_eq!(LOCAL.fastest().name(), "sluggish");

        // Fixed selections and the xoshiro backend never benchmark.
        let fixed = StreamConfig {
            implementation: "sluggish".to_string(),
            ..config(Backend::Keyed, 1)
        };
        CoreStreams::init_with(&fixed, sequential(), &LOCAL).unwrap();
        CoreStreams::init_with(&config(Backend::Xoshiro, 1), sequential(), &LOCAL).unwrap();
        assert_eq!(LOCAL.fastest().name(), "sluggish");
    }

    #[test]
    fn test_read_spans_several_scratch_chunks() {
        let s = CoreStreams::init_with(&config(Backend::Xoshiro, 1), sequential(), local_registry()).unwrap();
        let len = SCRATCH_LEN * 2 + 17;
        let mut out = Vec::new();
        assert_eq!(s.read(&mut out, len).unwrap(), len);
        assert_eq!(out.len(), len);
        assert!(out.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_read_zero_bytes() {
        let s = CoreStreams::init_with(&config(Backend::Keyed, 1), sequential(), local_registry()).unwrap();
        let mut out = Vec::new();
        assert_eq!(s.read(&mut out, 0).unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut s = CoreStreams::init_with(&config(Backend::Keyed, 2), sequential(), local_registry()).unwrap();
        s.teardown();
        s.teardown();
        assert_eq!(s.core_count(), 0);
        let mut out = Vec::new();
        assert!(matches!(s.read(&mut out, 8), Err(Error::TornDown)));
        assert!(matches!(s.fill(&mut [0u8; 4]), Err(Error::TornDown)));
        assert!(matches!(s.fill_on_core(0, &mut [0u8; 4]), Err(Error::TornDown)));
    }

    #[test]
    fn test_concurrent_reads() {
        let s = CoreStreams::init_with(&config(Backend::Keyed, 2), sequential(), local_registry()).unwrap();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let mut buf = Vec::new();
                    s.read(&mut buf, 10_000).unwrap();
                    assert_eq!(buf.len(), 10_000);
                });
            }
        });
    }

    #[test]
    fn test_debug_shows_shape_only() {
        let s = CoreStreams::init_with(&config(Backend::Xoshiro, 2), sequential(), local_registry()).unwrap();
        assert_eq!(format!("{s:?}"), "CoreStreams { backend: Xoshiro, cores: 2 }");
    }
}
