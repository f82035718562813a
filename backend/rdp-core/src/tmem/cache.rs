//! Direct-mapped cache of TMEM block loads
//!
//! Games frequently re-upload the same block of RDRAM into TMEM. Each slot remembers one
//! `(RDRAM address, qword count, dxt)` load along with the resulting TMEM bytes, so a repeated load
//! can skip the swizzling copy and, more importantly, reuse the content CRC it computed last time.

use crate::tmem::{TMEM_LEN, Tmem};
use rustc_hash::FxHasher;
use std::hash::Hasher;

pub const TMEM_CACHE_BITS: u32 = 11;
pub const TMEM_CACHE_SLOTS: usize = 1 << TMEM_CACHE_BITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct TmemCacheEntry {
    valid: bool,
    address: u32,
    qwords: u16,
    dxt: u16,
    crc: u32,
}

impl TmemCacheEntry {
    fn matches(&self, address: u32, qwords: u16, dxt: u16) -> bool {
        self.valid && self.address == address && self.qwords == qwords && self.dxt == dxt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TmemCacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone)]
pub struct TmemCache {
    entries: Box<[TmemCacheEntry]>,
    payloads: Box<[u8]>,
    stats: TmemCacheStats,
}

pub(crate) fn slot_index(address: u32) -> usize {
    let mut hasher = FxHasher::default();
    hasher.write_u32(address);
    (hasher.finish() as usize) & (TMEM_CACHE_SLOTS - 1)
}

// Byte range of a load inside TMEM, or None if it would run past the end
fn tmem_range(tmem_qword: u32, qwords: u16) -> Option<(usize, usize)> {
    let start = tmem_qword as usize * 8;
    let len = usize::from(qwords) * 8;
    (start + len <= TMEM_LEN).then_some((start, len))
}

impl TmemCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: vec![TmemCacheEntry::default(); TMEM_CACHE_SLOTS].into_boxed_slice(),
            payloads: vec![0; TMEM_CACHE_SLOTS * TMEM_LEN].into_boxed_slice(),
            stats: TmemCacheStats::default(),
        }
    }

    fn payload(&self, slot: usize) -> &[u8] {
        &self.payloads[slot * TMEM_LEN..(slot + 1) * TMEM_LEN]
    }

    fn payload_mut(&mut self, slot: usize) -> &mut [u8] {
        &mut self.payloads[slot * TMEM_LEN..(slot + 1) * TMEM_LEN]
    }

    /// Attempt to satisfy a block load from the cache.
    ///
    /// On a hit, the cached bytes are copied into TMEM at qword `tmem_qword`, the TMEM content
    /// descriptor is set to the cached CRC, and this returns `true`. A miss leaves TMEM untouched.
    pub fn try_load(
        &mut self,
        tmem: &mut Tmem,
        address: u32,
        tmem_qword: u32,
        qwords: u16,
        dxt: u16,
    ) -> bool {
        let slot = slot_index(address);
        let entry = self.entries[slot];
        let range = tmem_range(tmem_qword, qwords);

        let (Some((start, len)), true) = (range, entry.matches(address, qwords, dxt)) else {
            self.stats.misses += 1;
            return false;
        };

        tmem.bytes_mut()[start..start + len].copy_from_slice(&self.payload(slot)[..len]);
        tmem.set_content_hash(start as u32, len as u32, entry.crc);
        self.stats.hits += 1;

        log::trace!(
            "TMEM cache hit: address={address:08X}, qwords={qwords}, dxt={dxt:03X}, crc={:08X}",
            entry.crc
        );

        true
    }

    /// Record the TMEM bytes just produced by a block load, overwriting whatever occupied the slot.
    ///
    /// Also sets the TMEM content descriptor for the loaded range. Loads that do not fit inside
    /// TMEM are not cached.
    pub fn add_entry(
        &mut self,
        tmem: &mut Tmem,
        address: u32,
        tmem_qword: u32,
        qwords: u16,
        dxt: u16,
    ) {
        let Some((start, len)) = tmem_range(tmem_qword, qwords) else {
            log::debug!(
                "Not caching TMEM load that runs past end of TMEM: qword={tmem_qword}, qwords={qwords}"
            );
            return;
        };

        let loaded = &tmem.bytes()[start..start + len];
        let crc = tmem.crc(crate::hash::CRC_SEED, loaded);

        let slot = slot_index(address);
        self.payload_mut(slot)[..len].copy_from_slice(&tmem.bytes()[start..start + len]);
        self.entries[slot] = TmemCacheEntry { valid: true, address, qwords, dxt, crc };

        tmem.set_content_hash(start as u32, len as u32, crc);
    }

    /// Invalidate every slot along with the TMEM content descriptor.
    ///
    /// Must be called whenever RDRAM may have changed behind the cache's back.
    pub fn drop_all(&mut self, tmem: &mut Tmem) {
        self.entries.fill(TmemCacheEntry::default());
        tmem.invalidate_content_hash();

        log::debug!("TMEM cache dropped");
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> TmemCacheStats {
        self.stats
    }
}

impl Default for TmemCache {
    fn default() -> Self {
        Self::new()
    }
}
