//! Content CRCs for TMEM regions, palettes, and textures
//!
//! These are cache keys, not integrity checks: the fast mode is a seeded XXH3 truncated to 32 bits.
//! The seed chains hashes together, e.g. hashing texel bytes and then folding in the palette CRC.

use crc::Crc;
use rdp_config::ContentHashMode;
use xxhash_rust::xxh3;

/// Seed used for every hash that does not continue a previous one
pub const CRC_SEED: u32 = 0xFFFF_FFFF;

/// Palettes are 16 entries; each entry is the first halfword of a TMEM qword
pub const PALETTE_ENTRIES: usize = 16;
pub const PALETTE_STRIDE: usize = 8;
pub const PALETTE_TMEM_LEN: usize = PALETTE_ENTRIES * PALETTE_STRIDE;

const CRC: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

#[inline]
#[must_use]
pub fn content_crc(mode: ContentHashMode, seed: u32, bytes: &[u8]) -> u32 {
    match mode {
        ContentHashMode::Fast => xxh3::xxh3_64_with_seed(bytes, seed.into()) as u32,
        ContentHashMode::Strict => {
            let mut digest = CRC.digest_with_initial(seed);
            digest.update(bytes);
            digest.finalize()
        }
    }
}

/// Hash a 16-entry palette as it is laid out in the upper half of TMEM.
///
/// Only the first two bytes of each of the 16 qwords are hashed; the remaining bytes are the
/// hardware's quadrupled copies and are never read when sampling.
#[must_use]
pub fn palette_crc(mode: ContentHashMode, seed: u32, palette: &[u8]) -> u32 {
    debug_assert!(palette.len() >= PALETTE_TMEM_LEN);

    let mut combined = [0_u8; 2 * PALETTE_ENTRIES];
    for (dst, src) in combined.chunks_exact_mut(2).zip(palette.chunks(PALETTE_STRIDE)) {
        dst.copy_from_slice(&src[..2]);
    }

    content_crc(mode, seed, &combined)
}
