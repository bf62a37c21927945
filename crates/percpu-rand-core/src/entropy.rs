//! Secure random source used for keys and seeds.
//!
//! Every draw is checked for an all-zero prefix. A source that hands back
//! zeros in the two lowest 64-bit words is treated as broken, not retried.

use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Bytes that must not all be zero in a fresh draw (two 64-bit words).
pub const DEGENERATE_PREFIX: usize = 16;

/// Supplier of cryptographically strong bytes.
pub trait SecureRandom: Send + Sync {
    /// Fill `buf` completely or report failure.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// The operating system CSPRNG via the `getrandom` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl SecureRandom for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        getrandom::fill(buf).map_err(|e| Error::SeedUnavailable {
            reason: e.to_string(),
        })
    }
}

/// Draw `N` bytes from `source`, rejecting a degenerate all-zero prefix.
///
/// The returned buffer is wiped when dropped.
pub fn draw<const N: usize>(source: &dyn SecureRandom) -> Result<Zeroizing<[u8; N]>> {
    let mut buf = Zeroizing::new([0u8; N]);
    source.fill(&mut buf[..])?;
    if buf[..N.min(DEGENERATE_PREFIX)].iter().all(|&b| b == 0) {
        log::warn!("secure random source returned an all-zero prefix ({N} byte draw)");
        return Err(Error::SeedUnavailable {
            reason: "source returned an all-zero prefix".to_string(),
        });
    }
    Ok(buf)
}
