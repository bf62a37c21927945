//! Keyed BLAKE3 used as a seekable pseudorandom function.
//!
//! Every variant implements [`KeyedHash`]: a name, a capability predicate,
//! and a seek-based finalize that writes the keyed XOF of the empty message
//! starting at an arbitrary byte offset. The hashing context is shared by all
//! variants, so a stream keyed once may be finalized by any of them.

use zeroize::{Zeroize, ZeroizeOnDrop};

mod portable;
mod simd;

pub use portable::PortableBlake3;
pub use simd::SimdBlake3;

/// BLAKE3 key length in bytes.
pub const KEY_LEN: usize = 32;

/// BLAKE3 block (and XOF output block) length in bytes.
pub const BLOCK_LEN: usize = 64;

/// Hashing context derived from a secret key.
///
/// The key is wiped when the context is dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyedContext {
    key: [u8; KEY_LEN],
}

impl KeyedContext {
    /// Create a context for keyed hashing under `key`.
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self { key: *key }
    }

    pub(crate) fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// Key as eight little-endian words, the compression function's chaining value.
    pub(crate) fn key_words(&self) -> [u32; 8] {
        let mut words = [0u32; 8];
        for (word, bytes) in words.iter_mut().zip(self.key.chunks_exact(4)) {
            *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        words
    }
}

impl std::fmt::Debug for KeyedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedContext").finish_non_exhaustive()
    }
}

/// One implementation of the keyed hash primitive.
pub trait KeyedHash: Send + Sync {
    /// Unique variant name (e.g. `"generic"`).
    fn name(&self) -> &'static str;

    /// Whether this variant can run on the current machine.
    fn is_supported(&self) -> bool;

    /// Derive a hashing context from a secret key.
    fn init(&self, key: &[u8; KEY_LEN]) -> KeyedContext {
        KeyedContext::new(key)
    }

    /// Write `out.len()` bytes of keystream starting at byte `offset`.
    fn finalize_seek(&self, ctx: &KeyedContext, offset: u64, out: &mut [u8]);
}

impl std::fmt::Debug for dyn KeyedHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyedHash({})", self.name())
    }
}

/// Variants compiled into this build, in preference order. The first entry is
/// the portable fallback and the default "fastest" choice.
pub static CANDIDATES: &[&dyn KeyedHash] = &[&PortableBlake3, &SimdBlake3];
