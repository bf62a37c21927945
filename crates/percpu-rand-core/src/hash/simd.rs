//! BLAKE3 through the `blake3` crate, which picks SSE4.1/AVX2/AVX-512 or NEON
//! at runtime. On targets without a vector backend the crate would only
//! duplicate the portable variant, so it reports itself unsupported there.

use super::{KeyedContext, KeyedHash};

#[derive(Debug, Clone, Copy, Default)]
pub struct SimdBlake3;

impl KeyedHash for SimdBlake3 {
    fn name(&self) -> &'static str {
        "simd"
    }

    fn is_supported(&self) -> bool {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            std::arch::is_x86_feature_detected!("sse4.1")
        }
        #[cfg(target_arch = "aarch64")]
        {
            true
        }
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
        {
            false
        }
    }

    fn finalize_seek(&self, ctx: &KeyedContext, offset: u64, out: &mut [u8]) {
        let mut reader = blake3::Hasher::new_keyed(ctx.key()).finalize_xof();
        reader.set_position(offset);
        reader.fill(out);
    }
}
