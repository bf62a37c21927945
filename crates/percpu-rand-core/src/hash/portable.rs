//! Portable scalar BLAKE3, restricted to what the keystream needs: the keyed
//! XOF of the empty message.
//!
//! The empty message is a single root chunk with no blocks, so every output
//! block is one compression of an all-zero block under the key, with the
//! output block index as the counter.

use super::{BLOCK_LEN, KeyedContext, KeyedHash};

const IV: [u32; 8] = [
    0x6A09_E667,
    0xBB67_AE85,
    0x3C6E_F372,
    0xA54F_F53A,
    0x510E_527F,
    0x9B05_688C,
    0x1F83_D9AB,
    0x5BE0_CD19,
];

const MSG_PERMUTATION: [usize; 16] = [2, 6, 3, 10, 7, 0, 4, 13, 1, 11, 12, 5, 9, 14, 15, 8];

const CHUNK_START: u32 = 1 << 0;
const CHUNK_END: u32 = 1 << 1;
const ROOT: u32 = 1 << 3;
const KEYED_HASH: u32 = 1 << 4;

/// Scalar BLAKE3 that runs everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableBlake3;

impl KeyedHash for PortableBlake3 {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn finalize_seek(&self, ctx: &KeyedContext, offset: u64, out: &mut [u8]) {
        let cv = ctx.key_words();
        let flags = KEYED_HASH | CHUNK_START | CHUNK_END | ROOT;
        let mut counter = offset / BLOCK_LEN as u64;
        let mut skip = (offset % BLOCK_LEN as u64) as usize;
        let mut block = [0u8; BLOCK_LEN];
        let mut written = 0;

        while written < out.len() {
            let words = compress(&cv, &[0u32; 16], counter, 0, flags);
            for (bytes, word) in block.chunks_exact_mut(4).zip(words) {
                bytes.copy_from_slice(&word.to_le_bytes());
            }
            let take = (BLOCK_LEN - skip).min(out.len() - written);
            out[written..written + take].copy_from_slice(&block[skip..skip + take]);
            written += take;
            skip = 0;
            counter += 1;
        }
    }
}

#[inline(always)]
fn g(state: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize, mx: u32, my: u32) {
    state[a] = state[a].wrapping_add(state[b]).wrapping_add(mx);
    state[d] = (state[d] ^ state[a]).rotate_right(16);
    state[c] = state[c].wrapping_add(state[d]);
    state[b] = (state[b] ^ state[c]).rotate_right(12);
    state[a] = state[a].wrapping_add(state[b]).wrapping_add(my);
    state[d] = (state[d] ^ state[a]).rotate_right(8);
    state[c] = state[c].wrapping_add(state[d]);
    state[b] = (state[b] ^ state[c]).rotate_right(7);
}

fn round(state: &mut [u32; 16], m: &[u32; 16]) {
    // Columns.
    g(state, 0, 4, 8, 12, m[0], m[1]);
    g(state, 1, 5, 9, 13, m[2], m[3]);
    g(state, 2, 6, 10, 14, m[4], m[5]);
    g(state, 3, 7, 11, 15, m[6], m[7]);
    // Diagonals.
    g(state, 0, 5, 10, 15, m[8], m[9]);
    g(state, 1, 6, 11, 12, m[10], m[11]);
    g(state, 2, 7, 8, 13, m[12], m[13]);
    g(state, 3, 4, 9, 14, m[14], m[15]);
}

fn permute(m: &mut [u32; 16]) {
    let mut permuted = [0u32; 16];
    for (dst, &src) in permuted.iter_mut().zip(MSG_PERMUTATION.iter()) {
        *dst = m[src];
    }
    *m = permuted;
}

/// Full 16-word compression output, as used for extended (XOF) output.
fn compress(cv: &[u32; 8], block: &[u32; 16], counter: u64, block_len: u32, flags: u32) -> [u32; 16] {
    let mut state = [
        cv[0],
        cv[1],
        cv[2],
        cv[3],
        cv[4],
        cv[5],
        cv[6],
        cv[7],
        IV[0],
        IV[1],
        IV[2],
        IV[3],
        counter as u32,
        (counter >> 32) as u32,
        block_len,
        flags,
    ];
    let mut m = *block;

    for r in 0..7 {
        round(&mut state, &m);
        if r < 6 {
            permute(&mut m);
        }
    }

    for i in 0..8 {
        state[i] ^= state[i + 8];
        state[i + 8] ^= cv[i];
    }
    state
}
