//! Keyed-hash keystream: one per core.
//!
//! The keyed BLAKE3 XOF is read as a counter-mode keystream. Each refill asks
//! the currently resolved variant for `chunk_size` bytes at the current seek
//! offset, then advances the offset. Every byte served under one key comes
//! from a distinct, increasing offset. When the next refill would push the
//! offset past `max_per_key`, a fresh key is drawn and the offset restarts at 0.
//!
//! This reuses a MAC-style finalize-at-offset as the stream. It is not a KDF,
//! and the exact bytes for a given key and offset are part of the contract.

use std::sync::Arc;

use zeroize::{Zeroize, Zeroizing};

use crate::entropy::{SecureRandom, draw};
use crate::error::{Error, Result};
use crate::hash::{KEY_LEN, KeyedContext};
use crate::registry::Registry;

/// Default refill size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Default number of keystream bytes produced under a single key.
pub const DEFAULT_MAX_PER_KEY: u64 = 0xdead_beaf;

/// Refill granularity and per-key usage budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeystreamLimits {
    pub chunk_size: usize,
    pub max_per_key: u64,
}

impl Default for KeystreamLimits {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_per_key: DEFAULT_MAX_PER_KEY,
        }
    }
}

impl KeystreamLimits {
    /// A chunk must be non-empty and fit inside one key's budget.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".to_string()));
        }
        if (self.chunk_size as u64) > self.max_per_key {
            return Err(Error::InvalidConfig(format!(
                "max_per_key ({}) is smaller than chunk_size ({})",
                self.max_per_key, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Per-core keyed-hash keystream generator.
pub struct Keystream {
    ctx: KeyedContext,
    seek: u64,
    buffer: Zeroizing<Vec<u8>>,
    position: usize,
    max_per_key: u64,
    epoch: u64,
    source: Arc<dyn SecureRandom>,
    registry: &'static Registry,
}

impl Keystream {
    /// Create a keystream keyed from `source`.
    pub fn new(
        source: Arc<dyn SecureRandom>,
        registry: &'static Registry,
        limits: KeystreamLimits,
    ) -> Result<Self> {
        let key = draw::<KEY_LEN>(&*source)?;
        Self::with_key(&key, source, registry, limits)
    }

    /// Create a keystream under a caller-chosen first key. Later rekeys still
    /// draw from `source`.
    pub fn with_key(
        key: &[u8; KEY_LEN],
        source: Arc<dyn SecureRandom>,
        registry: &'static Registry,
        limits: KeystreamLimits,
    ) -> Result<Self> {
        limits.validate()?;
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(limits.chunk_size)
            .map_err(|_| Error::AllocationFailure {
                bytes: limits.chunk_size,
            })?;
        buffer.resize(limits.chunk_size, 0);
        Ok(Self {
            ctx: KeyedContext::new(key),
            seek: 0,
            position: buffer.len(),
            buffer: Zeroizing::new(buffer),
            max_per_key: limits.max_per_key,
            epoch: 0,
            source,
            registry,
        })
    }

    /// Keystream offset of the next refill.
    pub fn seek(&self) -> u64 {
        self.seek
    }

    /// Number of rekeys since construction.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn chunk_size(&self) -> usize {
        self.buffer.len()
    }

    /// Install a fresh key from the secure source and restart at offset 0.
    /// Buffered bytes of the old key are discarded.
    pub fn rekey(&mut self) -> Result<()> {
        let key = draw::<KEY_LEN>(&*self.source)?;
        self.ctx = KeyedContext::new(&key);
        log::debug!(
            "keystream rekeyed after {} bytes (epoch {} -> {})",
            self.seek,
            self.epoch,
            self.epoch + 1
        );
        self.seek = 0;
        self.epoch += 1;
        self.buffer[..].zeroize();
        self.position = self.buffer.len();
        Ok(())
    }

    /// Fill `out` with the next bytes of the stream.
    ///
    /// # Panics
    /// Panics if the secure random source fails while a rekey is due. That is
    /// a fatal platform condition, same as an OS CSPRNG failure.
    pub fn serve(&mut self, out: &mut [u8]) {
        let mut written = 0;
        while written < out.len() {
            if self.position == self.buffer.len() {
                self.refill();
            }
            let take = (self.buffer.len() - self.position).min(out.len() - written);
            out[written..written + take]
                .copy_from_slice(&self.buffer[self.position..self.position + take]);
            self.position += take;
            written += take;
        }
    }

    fn refill(&mut self) {
        let chunk = self.buffer.len() as u64;
        if self.seek.saturating_add(chunk) > self.max_per_key {
            if let Err(e) = self.rekey() {
                panic!("secure random source failed during rekey: {e}");
            }
        }
        let variant = self.registry.resolve();
        variant.finalize_seek(&self.ctx, self.seek, &mut self.buffer[..]);
        self.seek += chunk;
        self.position = 0;
    }
}

impl std::fmt::Debug for Keystream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keystream")
            .field("seek", &self.seek)
            .field("epoch", &self.epoch)
            .field("chunk_size", &self.buffer.len())
            .field("max_per_key", &self.max_per_key)
            .finish_non_exhaustive()
    }
}

impl rand::RngCore for Keystream {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.serve(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.serve(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        self.serve(dst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{CANDIDATES, KeyedHash, PortableBlake3};
    use crate::registry::{Selection, registry};
    use std::sync::atomic::{AtomicU8, Ordering};

    /// Hands out keys `[n, n, ...]` with n = 1, 2, 3, ...
    struct Counting(AtomicU8);

    impl Counting {
        fn shared() -> Arc<dyn SecureRandom> {
            Arc::new(Self(AtomicU8::new(0)))
        }
    }

    impl SecureRandom for Counting {
        fn fill(&self, buf: &mut [u8]) -> Result<()> {
            let n = self.0.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            buf.fill(n);
            Ok(())
        }
    }

    struct Broken;

    impl SecureRandom for Broken {
        fn fill(&self, _buf: &mut [u8]) -> Result<()> {
            Err(Error::SeedUnavailable {
                reason: "unplugged".to_string(),
            })
        }
    }

    fn key_0_to_31() -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        key
    }

    fn limits(chunk_size: usize, max_per_key: u64) -> KeystreamLimits {
        KeystreamLimits {
            chunk_size,
            max_per_key,
        }
    }

    fn expected_at(key: &[u8; KEY_LEN], offset: u64, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        PortableBlake3.finalize_seek(&KeyedContext::new(key), offset, &mut out);
        out
    }

    #[test]
    fn test_limits_validation() {
        assert!(KeystreamLimits::default().validate().is_ok());
        assert!(limits(0, 100).validate().is_err());
        assert!(limits(128, 64).validate().is_err());
        assert!(limits(64, 64).validate().is_ok());
    }

    #[test]
    fn test_output_matches_reference_keystream() {
        let mut ks =
            Keystream::with_key(&key_0_to_31(), Counting::shared(), registry(), limits(64, 1 << 20))
                .unwrap();
        let mut out = [0u8; 131];
        ks.serve(&mut out);
        let hex: String = out.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(
            hex,
            "73492b19995d71cdb1e9d74decc09809eb732f1b00bc95c27cb15f9dd4d6478f\
             097a9b78582396441e22930e5c7c98fd07f896796c81420f14eb9812f0482857\
             1ebaff5af3de2f693214152e1e3825fa4deeea0414483125b4d46ee75ca0b6e8\
             602d0a3cacd8cf0850a291f18b46392f99c74b64e12ae2247592e33668bf6633\
             0471fa"
        );
    }

    #[test]
    fn test_split_requests_continue_the_stream() {
        let key = key_0_to_31();
        let mut ks = Keystream::with_key(&key, Counting::shared(), registry(), limits(64, 1 << 20)).unwrap();
        let mut served = Vec::new();
        for len in [1usize, 7, 64, 3, 100, 0, 200] {
            let mut out = vec![0u8; len];
            ks.serve(&mut out);
            served.extend_from_slice(&out);
        }
        assert_eq!(served, expected_at(&key, 0, served.len()));
    }

    #[test]
    fn test_seek_advances_by_chunks() {
        let mut ks = Keystream::with_key(&key_0_to_31(), Counting::shared(), registry(), limits(64, 1 << 20)).unwrap();
        assert_eq!(ks.seek(), 0);
        let mut out = [0u8; 1];
        ks.serve(&mut out);
        assert_eq!(ks.seek(), 64);
        let mut out = [0u8; 63];
        ks.serve(&mut out);
        assert_eq!(ks.seek(), 64);
        let mut out = [0u8; 1];
        ks.serve(&mut out);
        assert_eq!(ks.seek(), 128);
    }

    #[test]
    fn test_rekey_exactly_at_budget() {
        let mut ks = Keystream::with_key(&key_0_to_31(), Counting::shared(), registry(), limits(64, 256)).unwrap();
        let mut out = [0u8; 256];
        ks.serve(&mut out);
        assert_eq!(ks.epoch(), 0, "four chunks fit in the budget");
        assert_eq!(ks.seek(), 256);

        let mut one = [0u8; 1];
        ks.serve(&mut one);
        assert_eq!(ks.epoch(), 1);
        assert_eq!(ks.seek(), 64, "seek restarts at 0 and advances by one chunk");
    }

    #[test]
    fn test_rekey_budget_not_multiple_of_chunk() {
        let mut ks = Keystream::with_key(&key_0_to_31(), Counting::shared(), registry(), limits(64, 200)).unwrap();
        let mut out = [0u8; 192];
        ks.serve(&mut out);
        assert_eq!(ks.epoch(), 0);
        let mut one = [0u8; 1];
        ks.serve(&mut one);
        assert_eq!(ks.epoch(), 1, "192 + 64 exceeds 200");
    }

    #[test]
    fn test_rekey_switches_to_fresh_key() {
        let source = Counting::shared();
        let key = key_0_to_31();
        let mut ks = Keystream::with_key(&key, Arc::clone(&source), registry(), limits(64, 64)).unwrap();
        let mut first = [0u8; 64];
        ks.serve(&mut first);
        assert_eq!(first.to_vec(), expected_at(&key, 0, 64));

        let mut second = [0u8; 64];
        ks.serve(&mut second);
        assert_eq!(ks.epoch(), 1);
        // Counting hands out [1; 32] as the first drawn key.
        assert_eq!(second.to_vec(), expected_at(&[1u8; KEY_LEN], 0, 64));
        assert_ne!(first, second);
    }

    #[test]
    fn test_explicit_rekey_discards_buffer() {
        let mut ks = Keystream::with_key(&key_0_to_31(), Counting::shared(), registry(), limits(64, 1 << 20)).unwrap();
        let mut out = [0u8; 10];
        ks.serve(&mut out);
        ks.rekey().unwrap();
        assert_eq!(ks.seek(), 0);
        assert_eq!(ks.epoch(), 1);
        let mut next = [0u8; 10];
        ks.serve(&mut next);
        assert_eq!(next.to_vec(), expected_at(&[1u8; KEY_LEN], 0, 10));
    }

    #[test]
    fn test_explicit_rekey_reports_source_failure() {
        let mut ks = Keystream::with_key(&key_0_to_31(), Arc::new(Broken), registry(), limits(64, 1 << 20)).unwrap();
        assert!(matches!(ks.rekey(), Err(Error::SeedUnavailable { .. })));
        assert_eq!(ks.epoch(), 0);
    }

    #[test]
    #[should_panic(expected = "rekey")]
    fn test_rekey_failure_inside_serve_is_fatal() {
        let mut ks = Keystream::with_key(&key_0_to_31(), Arc::new(Broken), registry(), limits(64, 64)).unwrap();
        let mut out = [0u8; 65];
        ks.serve(&mut out);
    }

    #[test]
    fn test_new_rejects_failing_source() {
        let err = Keystream::new(Arc::new(Broken), registry(), KeystreamLimits::default()).unwrap_err();
        assert!(matches!(err, Error::SeedUnavailable { .. }));
    }

    #[test]
    fn test_consecutive_requests_differ() {
        let mut ks = Keystream::new(Arc::new(crate::entropy::OsEntropy), registry(), KeystreamLimits::default()).unwrap();
        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        ks.serve(&mut a);
        ks.serve(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_cycle_mode_yields_same_stream() {
        static LOCAL: Registry = Registry::new(CANDIDATES);
        LOCAL.select(Selection::Cycle);
        let key = key_0_to_31();
        let mut ks = Keystream::with_key(&key, Counting::shared(), &LOCAL, limits(64, 1 << 20)).unwrap();
        let mut out = vec![0u8; 64 * 5];
        ks.serve(&mut out);
        assert_eq!(out, expected_at(&key, 0, out.len()));
    }

    /// Portable output under another name.
    struct Renamed(&'static str);

    impl KeyedHash for Renamed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn is_supported(&self) -> bool {
            true
        }

        fn finalize_seek(&self, ctx: &KeyedContext, offset: u64, out: &mut [u8]) {
            PortableBlake3.finalize_seek(ctx, offset, out);
        }
    }

    #[test]
    fn test_keying_leaves_cycle_position_alone() {
        static FIRST: Renamed = Renamed("first");
        static SECOND: Renamed = Renamed("second");
        static TABLE: &[&dyn KeyedHash] = &[&FIRST, &SECOND];
        static LOCAL: Registry = Registry::new(TABLE);
        LOCAL.select(Selection::Cycle);

        let mut ks = Keystream::with_key(&key_0_to_31(), Counting::shared(), &LOCAL, limits(64, 1 << 20)).unwrap();
        ks.rekey().unwrap();
        ks.rekey().unwrap();
        assert_eq!(ks.epoch(), 2);

        // Only refills step the rotation.
        assert_eq!(LOCAL.resolve().name(), "second");
        let mut out = [0u8; 64];
        ks.serve(&mut out);
        assert_eq!(LOCAL.resolve().name(), "second");
    }

    #[test]
    fn test_rng_core_words_come_from_stream() {
        use rand::RngCore;
        let key = key_0_to_31();
        let mut ks = Keystream::with_key(&key, Counting::shared(), registry(), limits(64, 1 << 20)).unwrap();
        let word = ks.next_u64();
        let expected = expected_at(&key, 0, 8);
        assert_eq!(word.to_le_bytes().to_vec(), expected);
    }

    #[test]
    fn test_debug_hides_key_material() {
        let ks = Keystream::with_key(&[0x5A; KEY_LEN], Counting::shared(), registry(), limits(64, 128)).unwrap();
        let shown = format!("{ks:?}");
        assert!(shown.contains("seek"));
        assert!(!shown.contains("90"), "{shown}");
    }
}
