//! Emulated texture memory (TMEM)
//!
//! 4KB of texture memory stored in N64 byte order. The upper 2KB doubles as palette memory when
//! a TLUT is in use; palette entries occupy the first halfword of each qword.
//!
//! Besides the raw bytes, `Tmem` tracks two derived values so that texture lookups don't need to
//! rehash memory on every draw:
//! * A content descriptor `(offset, len, crc)` for the region most recently written through the
//!   TMEM cache. Any untracked write invalidates it.
//! * Per-palette CRCs, refreshed whenever palette memory is written.

pub mod cache;
pub mod load;


use crate::hash;
use crate::hash::{CRC_SEED, PALETTE_TMEM_LEN};
use bincode::{Decode, Encode};
use rdp_config::ContentHashMode;

pub const TMEM_LEN: usize = 4096;
pub const TMEM_QWORDS: u32 = (TMEM_LEN / 8) as u32;
pub const TMEM_ADDRESS_MASK: u32 = TMEM_LEN as u32 - 1;

// Word (32-bit) and halfword indices wrap within 4KB
const WORD_INDEX_MASK: u32 = 0x3FF;
const HALFWORD_INDEX_MASK: u32 = 0x7FF;

/// Qword address where palette memory begins
pub const PALETTE_BASE_QWORD: u32 = 256;
pub const PALETTE_BASE: usize = PALETTE_BASE_QWORD as usize * 8;
pub const PALETTE_COUNT: usize = 16;

/// Describes a TMEM byte range whose content hash is already known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct TmemContentHash {
    pub offset: u32,
    pub len: u32,
    pub crc: u32,
}

impl TmemContentHash {
    fn overlaps(self, offset: u32, len: u32) -> bool {
        offset < self.offset + self.len && self.offset < offset + len
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Tmem {
    bytes: Box<[u8; TMEM_LEN]>,
    content_hash: Option<TmemContentHash>,
    palette_crcs: [u32; PALETTE_COUNT],
    palette_crc256: u32,
    hash_mode: ContentHashMode,
}

impl Tmem {
    #[must_use]
    pub fn new(hash_mode: ContentHashMode) -> Self {
        let mut tmem = Self {
            bytes: Box::new([0; TMEM_LEN]),
            content_hash: None,
            palette_crcs: [0; PALETTE_COUNT],
            palette_crc256: 0,
            hash_mode,
        };
        tmem.refresh_all_palette_crcs();

        tmem
    }

    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8; TMEM_LEN] {
        &self.bytes
    }

    #[inline]
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8; TMEM_LEN] {
        &mut self.bytes
    }

    #[inline]
    #[must_use]
    pub fn hash_mode(&self) -> ContentHashMode {
        self.hash_mode
    }

    /// Switch hash functions, rehashing the palettes and dropping the content descriptor
    pub(crate) fn set_hash_mode(&mut self, hash_mode: ContentHashMode) {
        if hash_mode == self.hash_mode {
            return;
        }

        self.hash_mode = hash_mode;
        self.content_hash = None;
        self.refresh_all_palette_crcs();
    }

    #[inline]
    #[must_use]
    pub fn crc(&self, seed: u32, bytes: &[u8]) -> u32 {
        hash::content_crc(self.hash_mode, seed, bytes)
    }

    /// Big-endian halfword at a byte address; the address wraps within TMEM
    #[inline]
    #[must_use]
    pub fn read_u16(&self, address: u32) -> u16 {
        let address = address & TMEM_ADDRESS_MASK & !1;
        u16::from_be_bytes([self.bytes[address as usize], self.bytes[address as usize + 1]])
    }

    #[inline]
    #[must_use]
    pub fn read_u8(&self, address: u32) -> u8 {
        self.bytes[(address & TMEM_ADDRESS_MASK) as usize]
    }

    #[inline]
    pub(crate) fn write_u16_index(&mut self, index: u32, value: u16) {
        let address = ((index & HALFWORD_INDEX_MASK) << 1) as usize;
        self.bytes[address..address + 2].copy_from_slice(&value.to_be_bytes());
    }

    /// Swap the two 32-bit words of each of `qwords` consecutive qwords, starting at a word index.
    /// This is how TMEM stores odd texture lines.
    pub(crate) fn interleave_dwords(&mut self, word_index: u32, qwords: u32) {
        let mut index = word_index;
        for _ in 0..qwords {
            let a = ((index & WORD_INDEX_MASK) << 2) as usize;
            let b = (((index + 1) & WORD_INDEX_MASK) << 2) as usize;
            for i in 0..4 {
                self.bytes.swap(a + i, b + i);
            }
            index += 2;
        }
    }

    #[inline]
    #[must_use]
    pub fn content_hash(&self) -> Option<TmemContentHash> {
        self.content_hash
    }

    #[inline]
    pub(crate) fn set_content_hash(&mut self, offset: u32, len: u32, crc: u32) {
        self.content_hash = Some(TmemContentHash { offset, len, crc });
    }

    #[inline]
    pub(crate) fn invalidate_content_hash(&mut self) {
        self.content_hash = None;
    }

    /// CRC of `len` bytes starting at byte `offset`, clamped to the end of TMEM.
    ///
    /// Reuses the tracked content descriptor when it describes exactly this range.
    #[must_use]
    pub fn region_crc(&self, offset: u32, len: u32) -> u32 {
        let offset = offset & TMEM_ADDRESS_MASK;
        let len = len.min(TMEM_LEN as u32 - offset);

        if let Some(known) = self.content_hash {
            if known.offset == offset && known.len == len {
                log::trace!("TMEM region {offset:03X}+{len} hash reused: {:08X}", known.crc);
                return known.crc;
            }
        }

        let start = offset as usize;
        self.crc(CRC_SEED, &self.bytes[start..start + len as usize])
    }

    /// CRC of the 16-entry palette `palette` (0-15)
    #[inline]
    #[must_use]
    pub fn palette_crc(&self, palette: u8) -> u32 {
        self.palette_crcs[(palette & 0xF) as usize]
    }

    /// CRC over all 16 palette CRCs, used for 8-bit color-indexed textures
    #[inline]
    #[must_use]
    pub fn palette_crc256(&self) -> u32 {
        self.palette_crc256
    }

    pub(crate) fn refresh_palette_crc(&mut self, palette: u8) {
        let start = PALETTE_BASE + usize::from(palette & 0xF) * PALETTE_TMEM_LEN;
        self.palette_crcs[(palette & 0xF) as usize] = hash::palette_crc(
            self.hash_mode,
            CRC_SEED,
            &self.bytes[start..start + PALETTE_TMEM_LEN],
        );
    }

    pub(crate) fn refresh_palette_crc256(&mut self) {
        let mut crc_bytes = [0_u8; 4 * PALETTE_COUNT];
        for (chunk, crc) in crc_bytes.chunks_exact_mut(4).zip(self.palette_crcs) {
            chunk.copy_from_slice(&crc.to_le_bytes());
        }
        self.palette_crc256 = self.crc(CRC_SEED, &crc_bytes);
    }

    pub(crate) fn refresh_all_palette_crcs(&mut self) {
        for palette in 0..PALETTE_COUNT as u8 {
            self.refresh_palette_crc(palette);
        }
        self.refresh_palette_crc256();
    }

    /// Bookkeeping after a load wrote `len` bytes starting at byte `offset` (wrapping).
    ///
    /// Palette CRCs are refreshed if the write reached palette memory, so that color-indexed
    /// texture CRCs can never go stale because a block or tile load overwrote a palette.
    pub(crate) fn note_write(&mut self, offset: u32, len: u32) {
        let offset = offset & TMEM_ADDRESS_MASK;
        let end = offset as usize + len as usize;
        let touches_palettes = end > PALETTE_BASE || end > TMEM_LEN;
        if touches_palettes {
            self.refresh_all_palette_crcs();
        }
    }

    /// Drop the content descriptor if it covers any part of the given byte range.
    pub(crate) fn invalidate_content_hash_overlapping(&mut self, offset: u32, len: u32) {
        if self.content_hash.is_some_and(|known| known.overlaps(offset, len)) {
            self.invalidate_content_hash();
        }
    }
}
